//! Snapshot-based undo/redo.
//!
//! Snapshots are `Arc<[Track]>`: the store publishes each new state as an
//! immutable shared slice, so recording history is a pointer copy rather than
//! a deep clone of the whole timeline.
//!
//! - Pushing a new entry clears the redo stack (linear history).
//! - `undo`/`redo` swap the caller's current state with the stored one.
//! - A batch suppresses pushes and records a single entry when it ends, so a
//!   drag or any multi-step edit undoes atomically.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::model::Track;

pub type Snapshot = Arc<[Track]>;

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub label: String,
    pub snapshot: Snapshot,
    pub timestamp: Instant,
}

#[derive(Debug)]
pub struct CommandHistory {
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    max_entries: usize,
    batch: Option<HistoryEntry>,
}

impl Default for CommandHistory {
    fn default() -> Self { Self::new(100) }
}

impl CommandHistory {
    pub fn new(max_entries: usize) -> Self {
        Self { undo_stack: Vec::new(), redo_stack: Vec::new(), max_entries: max_entries.max(1), batch: None }
    }

    /// Records the state *before* an edit. Suppressed while a batch is open.
    pub fn push(&mut self, label: &str, before: Snapshot) {
        if self.batch.is_some() {
            debug!(label, "push suppressed: batch in progress");
            return;
        }
        self.redo_stack.clear();
        self.undo_stack.push(HistoryEntry { label: label.to_string(), snapshot: before, timestamp: Instant::now() });
        if self.undo_stack.len() > self.max_entries {
            let overflow = self.undo_stack.len() - self.max_entries;
            self.undo_stack.drain(..overflow);
        }
        debug!(label, undo_depth = self.undo_stack.len(), "history entry pushed");
    }

    /// Pops the latest snapshot and stores `current` for redo. An open batch
    /// is committed first, so its edits undo as one step.
    pub fn undo(&mut self, current: Snapshot) -> Option<Snapshot> {
        self.commit_open_batch(&current);
        let entry = self.undo_stack.pop()?;
        debug!(label = %entry.label, undo_remaining = self.undo_stack.len(), "undo");
        self.redo_stack.push(HistoryEntry { label: entry.label, snapshot: current, timestamp: Instant::now() });
        Some(entry.snapshot)
    }

    pub fn redo(&mut self, current: Snapshot) -> Option<Snapshot> {
        self.commit_open_batch(&current);
        let entry = self.redo_stack.pop()?;
        debug!(label = %entry.label, redo_remaining = self.redo_stack.len(), "redo");
        self.undo_stack.push(HistoryEntry { label: entry.label, snapshot: current, timestamp: Instant::now() });
        Some(entry.snapshot)
    }

    pub fn begin_batch(&mut self, label: &str, before: Snapshot) {
        if self.batch.is_some() {
            warn!(label, "begin_batch called while already batching, ignoring");
            return;
        }
        self.batch = Some(HistoryEntry { label: label.to_string(), snapshot: before, timestamp: Instant::now() });
    }

    /// Closes the batch. An entry is recorded only if `current` differs from
    /// the state the batch started from. Returns whether one was recorded.
    pub fn end_batch(&mut self, current: &Snapshot) -> bool {
        let Some(entry) = self.batch.take() else { return false };
        if Arc::ptr_eq(&entry.snapshot, current) || entry.snapshot[..] == current[..] {
            debug!(label = %entry.label, "batch ended without changes");
            return false;
        }
        self.push(&entry.label, entry.snapshot);
        true
    }

    pub fn in_batch(&self) -> bool { self.batch.is_some() }

    pub fn can_undo(&self) -> bool { !self.undo_stack.is_empty() }

    pub fn can_redo(&self) -> bool { !self.redo_stack.is_empty() }

    pub fn undo_len(&self) -> usize { self.undo_stack.len() }

    pub fn redo_len(&self) -> usize { self.redo_stack.len() }

    pub fn undo_label(&self) -> Option<&str> { self.undo_stack.last().map(|e| e.label.as_str()) }

    pub fn redo_label(&self) -> Option<&str> { self.redo_stack.last().map(|e| e.label.as_str()) }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.batch = None;
    }

    fn commit_open_batch(&mut self, current: &Snapshot) {
        if self.batch.is_some() {
            warn!("closing open batch before undo/redo");
            self.end_batch(current);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrackKind;

    fn state(n: usize) -> Snapshot {
        let mut tracks = vec![Track::new_main()];
        for i in 0..n {
            tracks.push(Track::new(TrackKind::Text, i as i64 + 1));
        }
        tracks.into()
    }

    #[test]
    fn undo_then_redo_swaps_states() {
        let mut h = CommandHistory::default();
        let s0 = state(0);
        let s1 = state(1);
        h.push("add track", s0.clone());
        let restored = h.undo(s1.clone()).unwrap();
        assert!(Arc::ptr_eq(&restored, &s0));
        assert!(h.can_redo());
        let again = h.redo(restored).unwrap();
        assert!(Arc::ptr_eq(&again, &s1));
        assert_eq!(h.undo_label(), Some("add track"));
    }

    #[test]
    fn push_clears_redo() {
        let mut h = CommandHistory::default();
        h.push("a", state(0));
        h.undo(state(1));
        assert!(h.can_redo());
        h.push("b", state(0));
        assert!(!h.can_redo());
    }

    #[test]
    fn depth_is_bounded() {
        let mut h = CommandHistory::new(3);
        for i in 0..5 {
            h.push(&format!("edit {i}"), state(i));
        }
        assert_eq!(h.undo_len(), 3);
        assert_eq!(h.undo_label(), Some("edit 4"));
    }

    #[test]
    fn batch_records_single_entry() {
        let mut h = CommandHistory::default();
        let before = state(0);
        h.begin_batch("drag", before.clone());
        h.push("step 1", state(1));
        h.push("step 2", state(2));
        assert_eq!(h.undo_len(), 0);
        assert!(h.end_batch(&state(2)));
        assert_eq!(h.undo_len(), 1);
        assert_eq!(h.undo_label(), Some("drag"));
    }

    #[test]
    fn empty_batch_records_nothing() {
        let mut h = CommandHistory::default();
        let s = state(0);
        h.begin_batch("noop", s.clone());
        assert!(!h.end_batch(&s));
        assert!(!h.can_undo());
    }

    #[test]
    fn undo_commits_open_batch_first() {
        let mut h = CommandHistory::default();
        let s0 = state(0);
        let s1 = state(1);
        let s2 = state(2);
        h.push("add", s0.clone());
        h.begin_batch("drag", s1.clone());
        let restored = h.undo(s2.clone()).unwrap();
        assert!(Arc::ptr_eq(&restored, &s1));
        assert!(!h.in_batch());
        assert_eq!(h.undo_label(), Some("add"));
        assert_eq!(h.redo_label(), Some("drag"));
    }

    #[test]
    fn undo_with_unchanged_open_batch_pops_previous_entry() {
        let mut h = CommandHistory::default();
        let s0 = state(0);
        let s1 = state(1);
        h.push("add", s0.clone());
        h.begin_batch("drag", s1.clone());
        let restored = h.undo(s1).unwrap();
        assert!(Arc::ptr_eq(&restored, &s0));
    }

    #[test]
    fn undo_on_empty_is_none() {
        let mut h = CommandHistory::default();
        assert!(h.undo(state(0)).is_none());
        assert!(h.redo(state(0)).is_none());
    }
}
