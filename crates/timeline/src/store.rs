//! The single owner of timeline state.
//!
//! All edits run under one lock spanning read → compute → publish, so
//! concurrent callers (UI events, scripted edits, autosave ticks) serialize
//! against each other. Readers get `Arc<[Track]>` snapshots that are never
//! mutated after publication.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::command::{CommandOutcome, TimelineCommand};
use crate::config::EngineConfig;
use crate::error::{Result, TimelineError};
use crate::history::{CommandHistory, Snapshot};
use crate::model::{Element, ElementId, Track, TrackId};
use crate::ops;
use crate::query;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// `tracks` is the state the change published.
    Changed { revision: u64, label: String, tracks: Snapshot },
    Undone { revision: u64, tracks: Snapshot },
    Redone { revision: u64, tracks: Snapshot },
    Replaced { revision: u64 },
    Rejected { label: String, error: TimelineError },
}

struct StoreState {
    tracks: Snapshot,
    history: CommandHistory,
    revision: u64,
}

pub struct TimelineStore {
    state: Mutex<StoreState>,
    subscribers: Mutex<Vec<Sender<StoreEvent>>>,
}

impl Default for TimelineStore {
    fn default() -> Self { Self::new(&EngineConfig::default()) }
}

impl TimelineStore {
    /// Starts with a single empty main track.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            state: Mutex::new(StoreState {
                tracks: vec![Track::new_main()].into(),
                history: CommandHistory::new(config.max_history),
                revision: 0,
            }),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn from_tracks(tracks: Vec<Track>, config: &EngineConfig) -> Result<Self> {
        let store = Self::new(config);
        store.replace_all(tracks)?;
        Ok(store)
    }

    pub fn tracks(&self) -> Snapshot { self.state.lock().tracks.clone() }

    pub fn revision(&self) -> u64 { self.state.lock().revision }

    pub fn element_at(&self, track_id: TrackId, element_id: ElementId) -> Option<Element> {
        query::element_at(&self.tracks(), track_id, element_id)
    }

    pub fn total_duration(&self) -> f64 { query::total_duration(&self.tracks()) }

    pub fn subscribe(&self) -> Receiver<StoreEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Applies one user-visible edit: exactly one history entry for the
    /// whole closure, however many operations it chains.
    pub fn apply_with<T>(&self, label: &str, f: impl FnOnce(&[Track]) -> Result<(Vec<Track>, T)>) -> Result<T> {
        let mut state = self.state.lock();
        let computed = f(&state.tracks).and_then(|(next, value)| {
            query::validate_tracks(&next)?;
            Ok((next, value))
        });
        let (next, value) = match computed {
            Ok(ok) => ok,
            Err(error) => {
                drop(state);
                warn!(label, %error, "edit rejected");
                self.notify(StoreEvent::Rejected { label: label.to_string(), error: error.clone() });
                return Err(error);
            }
        };
        if next[..] == state.tracks[..] {
            debug!(label, "edit produced no change");
            return Ok(value);
        }
        let next: Snapshot = next.into();
        let before = std::mem::replace(&mut state.tracks, next.clone());
        state.history.push(label, before);
        state.revision += 1;
        let revision = state.revision;
        drop(state);
        self.notify(StoreEvent::Changed { revision, label: label.to_string(), tracks: next });
        Ok(value)
    }

    pub fn apply(&self, label: &str, f: impl FnOnce(&[Track]) -> Result<Vec<Track>>) -> Result<()> {
        self.apply_with(label, |tracks| f(tracks).map(|next| (next, ())))
    }

    pub fn dispatch(&self, command: TimelineCommand) -> Result<CommandOutcome> {
        let label = command.label();
        self.apply_with(label, move |tracks| command.apply(tracks))
    }

    pub fn undo(&self) -> bool {
        let mut state = self.state.lock();
        let current = state.tracks.clone();
        let Some(previous) = state.history.undo(current) else { return false };
        state.tracks = previous.clone();
        state.revision += 1;
        let revision = state.revision;
        drop(state);
        self.notify(StoreEvent::Undone { revision, tracks: previous });
        true
    }

    pub fn redo(&self) -> bool {
        let mut state = self.state.lock();
        let current = state.tracks.clone();
        let Some(next) = state.history.redo(current) else { return false };
        state.tracks = next.clone();
        state.revision += 1;
        let revision = state.revision;
        drop(state);
        self.notify(StoreEvent::Redone { revision, tracks: next });
        true
    }

    pub fn can_undo(&self) -> bool { self.state.lock().history.can_undo() }

    pub fn can_redo(&self) -> bool { self.state.lock().history.can_redo() }

    /// Groups every edit until [`end_batch`](Self::end_batch) into one undo step.
    pub fn begin_batch(&self, label: &str) {
        let mut state = self.state.lock();
        let before = state.tracks.clone();
        state.history.begin_batch(label, before);
    }

    pub fn end_batch(&self) -> bool {
        let mut state = self.state.lock();
        let current = state.tracks.clone();
        state.history.end_batch(&current)
    }

    /// Swaps in a loaded track list. History is cleared; loading is not an edit.
    pub fn replace_all(&self, tracks: Vec<Track>) -> Result<()> {
        let tracks = ops::ensure_main_track(tracks);
        query::validate_tracks(&tracks)?;
        let mut state = self.state.lock();
        state.tracks = tracks.into();
        state.history.clear();
        state.revision += 1;
        let revision = state.revision;
        drop(state);
        info!(revision, "timeline replaced");
        self.notify(StoreEvent::Replaced { revision });
        Ok(())
    }

    fn notify(&self, event: StoreEvent) {
        self.subscribers.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl std::fmt::Debug for TimelineStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TimelineStore")
            .field("tracks", &state.tracks.len())
            .field("revision", &state.revision)
            .finish()
    }
}

/// Shared handle for multi-threaded hosts.
pub type SharedStore = Arc<TimelineStore>;
