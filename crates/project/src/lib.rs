use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use timeline::{EngineConfig, TimelineStore, Track};
use tracing::{debug, info};
use uuid::Uuid;

pub fn app_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| std::env::temp_dir());
    base.join("timeline_engine")
}

pub fn default_db_path() -> PathBuf { app_data_dir().join("projects.sqlite3") }

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("stored timeline for session {session} is corrupt")]
    Corrupt { session: String, #[source] source: serde_json::Error },
}

/// Load/save of a session's track list. Implementations must be safe to call
/// from the autosave writer thread.
pub trait TrackStore: Send + Sync {
    /// `None` when nothing was ever saved for the session.
    fn load_tracks(&self, session_id: &str) -> Result<Option<Vec<Track>>>;
    fn save_tracks(&self, session_id: &str, tracks: &[Track]) -> Result<()>;
}

/// Loads a session, falling back to a single empty main track.
pub fn load_or_init(store: &dyn TrackStore, session_id: &str) -> Result<Vec<Track>> {
    match store.load_tracks(session_id)? {
        Some(tracks) => {
            debug!(session_id, tracks = tracks.len(), "loaded timeline");
            Ok(timeline::ops::ensure_main_track(tracks))
        }
        None => {
            info!(session_id, "no stored timeline, starting empty");
            Ok(vec![Track::new_main()])
        }
    }
}

/// Builds a ready-to-edit store for a session.
pub fn open_session(store: &dyn TrackStore, session_id: &str, config: &EngineConfig) -> Result<TimelineStore> {
    let tracks = load_or_init(store, session_id)?;
    let timeline = TimelineStore::from_tracks(tracks, config)
        .with_context(|| format!("stored timeline for {session_id} violates invariants"))?;
    Ok(timeline)
}

fn decode(session_id: &str, raw: &str) -> Result<Vec<Track>> {
    serde_json::from_str(raw)
        .map_err(|source| ProjectError::Corrupt { session: session_id.to_string(), source }.into())
}

/// SQLite-backed store; one timeline row per project.
pub struct ProjectDb {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl ProjectDb {
    pub fn open_or_create(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() { fs::create_dir_all(dir)?; }
        let conn = Connection::open(path)?;
        // WAL keeps autosave writes from blocking readers
        conn.pragma_update(None, "journal_mode", &"WAL")?;
        conn.pragma_update(None, "synchronous", &"NORMAL")?;
        conn.pragma_update(None, "foreign_keys", &"ON")?;
        let _ = conn.pragma_update(None, "cache_size", &"-20000"); // ~20MB page cache
        apply_migrations(&conn)?;
        info!(path = %path.display(), "opened project database");
        Ok(Self { conn: Mutex::new(conn), path: path.to_path_buf() })
    }

    pub fn path(&self) -> &Path { &self.path }

    pub fn create_project(&self, name: &str) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.ensure_project(&id, name)?;
        Ok(id)
    }

    pub fn ensure_project(&self, id: &str, name: &str) -> Result<()> {
        let now = Utc::now().timestamp();
        self.conn.lock().execute(
            "INSERT OR IGNORE INTO projects(id, name, settings_json, created_at, updated_at) VALUES(?1, ?2, '{}', ?3, ?3)",
            params![id, name, now],
        )?;
        Ok(())
    }

    pub fn list_projects(&self) -> Result<Vec<ProjectRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, name, updated_at FROM projects ORDER BY updated_at DESC LIMIT 500")?;
        let rows = stmt.query_map([], |row| {
            Ok(ProjectRow { id: row.get(0)?, name: row.get(1)?, updated_at: row.get(2)? })
        })?;
        let mut out = Vec::new();
        for r in rows { out.push(r?); }
        Ok(out)
    }

    /// Number of saves recorded for the project's timeline.
    pub fn timeline_revision(&self, project_id: &str) -> Result<Option<i64>> {
        Ok(self
            .conn
            .lock()
            .query_row("SELECT revision FROM timelines WHERE project_id = ?1", params![project_id], |row| row.get(0))
            .optional()?)
    }

    pub fn timeline_updated_at(&self, project_id: &str) -> Result<Option<DateTime<Utc>>> {
        let secs: Option<i64> = self
            .conn
            .lock()
            .query_row("SELECT updated_at FROM timelines WHERE project_id = ?1", params![project_id], |row| row.get(0))
            .optional()?;
        Ok(secs.and_then(|s| Utc.timestamp_opt(s, 0).single()))
    }
}

impl TrackStore for ProjectDb {
    fn load_tracks(&self, session_id: &str) -> Result<Option<Vec<Track>>> {
        let raw: Option<String> = self
            .conn
            .lock()
            .query_row("SELECT tracks_json FROM timelines WHERE project_id = ?1", params![session_id], |row| row.get(0))
            .optional()?;
        raw.map(|r| decode(session_id, &r)).transpose()
    }

    fn save_tracks(&self, session_id: &str, tracks: &[Track]) -> Result<()> {
        let json = serde_json::to_string(tracks)?;
        let now = Utc::now().timestamp();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO projects(id, name, settings_json, created_at, updated_at) VALUES(?1, ?1, '{}', ?2, ?2)",
            params![session_id, now],
        )?;
        tx.execute(
            "INSERT INTO timelines(project_id, tracks_json, revision, updated_at) VALUES(?1, ?2, 1, ?3) \
             ON CONFLICT(project_id) DO UPDATE SET tracks_json = excluded.tracks_json, revision = revision + 1, updated_at = excluded.updated_at",
            params![session_id, json, now],
        )?;
        tx.execute("UPDATE projects SET updated_at = ?2 WHERE id = ?1", params![session_id, now])?;
        tx.commit()?;
        debug!(session_id, bytes = json.len(), "saved timeline");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ProjectRow {
    pub id: String,
    pub name: String,
    pub updated_at: i64,
}

fn apply_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(include_str!("../migrations/V0001__init.sql"))?;
    conn.execute(
        "INSERT OR IGNORE INTO migrations(name, applied_at) VALUES(?1, strftime('%s','now'))",
        params!["V0001__init"],
    )?;
    Ok(())
}

/// In-process store that keeps serialized snapshots, so loads go through the
/// same JSON path as the database.
#[derive(Default)]
pub struct MemoryTrackStore {
    sessions: Mutex<HashMap<String, String>>,
    writes: Mutex<Vec<String>>,
}

impl MemoryTrackStore {
    pub fn new() -> Self { Self::default() }

    /// Session ids in the order their saves landed.
    pub fn write_log(&self) -> Vec<String> { self.writes.lock().clone() }
}

impl TrackStore for MemoryTrackStore {
    fn load_tracks(&self, session_id: &str) -> Result<Option<Vec<Track>>> {
        self.sessions.lock().get(session_id).map(|raw| decode(session_id, raw)).transpose()
    }

    fn save_tracks(&self, session_id: &str, tracks: &[Track]) -> Result<()> {
        let json = serde_json::to_string(tracks)?;
        self.sessions.lock().insert(session_id.to_string(), json);
        self.writes.lock().push(session_id.to_string());
        Ok(())
    }
}
