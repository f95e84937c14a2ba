use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use project::{open_session, ProjectDb, TrackStore};
use timeline::query;
use timeline::sync::{get_active_elements, global_to_local_frame, time_to_frame};
use timeline::{EngineConfig, TimelineCommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "timeline-cli", about = "Inspect and edit stored timelines")]
struct Cli {
    /// Project database (defaults to the app data dir)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Engine config as JSON
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Create a project with an empty main track
    New { name: String },
    List,
    Show {
        project: String,
        #[arg(long)]
        json: bool,
    },
    /// Apply a JSON array of commands as one undoable edit and save
    Apply { project: String, commands: PathBuf },
    /// Print nested compositions active at a time and their local frames
    Active {
        project: String,
        #[arg(long)]
        time: f64,
        #[arg(long, default_value_t = 30.0)]
        fps: f64,
    },
}

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            EngineConfig::from_json_str(&raw)?
        }
        None => EngineConfig::default(),
    };
    let db_path = cli.db.clone().unwrap_or_else(project::default_db_path);
    let db = ProjectDb::open_or_create(&db_path)?;

    match cli.command {
        Cmd::New { name } => {
            let id = db.create_project(&name)?;
            db.save_tracks(&id, &project::load_or_init(&db, &id)?)?;
            println!("{id}");
        }
        Cmd::List => {
            for p in db.list_projects()? {
                println!("{}  {}", p.id, p.name);
            }
        }
        Cmd::Show { project, json } => {
            let store = open_session(&db, &project, &config)?;
            let tracks = store.tracks();
            if json {
                println!("{}", serde_json::to_string_pretty(&tracks[..])?);
                return Ok(());
            }
            for t in query::tracks_ordered_by_position(&tracks) {
                let flags = match (t.is_main, t.muted) {
                    (true, true) => " [main, muted]",
                    (true, false) => " [main]",
                    (false, true) => " [muted]",
                    (false, false) => "",
                };
                println!("{} {} ({}){}", t.position, t.name, t.kind, flags);
                for e in &t.elements {
                    let hidden = if e.hidden { " hidden" } else { "" };
                    println!("    {:>8.3} .. {:>8.3}  {} [{}]{}", e.start_time, e.effective_end(), e.name, e.payload.kind_name(), hidden);
                }
            }
            println!("total duration: {:.3}s", store.total_duration());
        }
        Cmd::Apply { project, commands } => {
            let raw = std::fs::read_to_string(&commands).with_context(|| format!("reading {}", commands.display()))?;
            let commands: Vec<TimelineCommand> = serde_json::from_str(&raw).context("parsing commands")?;
            let store = open_session(&db, &project, &config)?;
            let count = commands.len();
            store.apply("Scripted edit", |tracks| {
                let mut current = tracks.to_vec();
                for cmd in commands {
                    let label = cmd.label();
                    let (next, outcome) = cmd.apply(&current)?;
                    info!(label, ?outcome, "applied");
                    current = next;
                }
                Ok(current)
            })?;
            db.save_tracks(&project, &store.tracks())?;
            println!("applied {count} commands, revision {}", db.timeline_revision(&project)?.unwrap_or(0));
        }
        Cmd::Active { project, time, fps } => {
            let store = open_session(&db, &project, &config)?;
            let tracks = store.tracks();
            let global = time_to_frame(time, fps);
            for a in get_active_elements(&tracks, time) {
                let local = global_to_local_frame(global, &a.element, fps);
                println!("{}  {}  local frame {:?}", a.track_id, a.element.name, local);
            }
        }
    }
    Ok(())
}
