//! Debounced, strictly ordered persistence of timeline snapshots.
//!
//! Each request captures its session id and a monotonically increasing
//! sequence number when it is scheduled. A single writer thread coalesces
//! requests per session and writes them in sequence order, so an older
//! snapshot can never land after a newer one. A request whose session is no
//! longer active when its turn comes is skipped.

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use project::TrackStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use timeline::{Snapshot, StoreEvent, TimelineStore};
use tracing::{debug, info, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SaveError {
    #[error("autosave writer stopped")]
    Stopped,
    #[error("flush timed out")]
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaveStatus {
    Pending,
    Written,
    /// The session changed before the write ran.
    Skipped,
    /// A newer request for the same session replaced this one.
    Superseded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveEvent {
    pub seq: u64,
    pub session_id: String,
    pub status: SaveStatus,
}

struct SaveRequest {
    seq: u64,
    session_id: String,
    tracks: Snapshot,
    due: Instant,
}

#[derive(Clone)]
pub struct SaveHandle {
    tx_submit: Sender<SaveRequest>,
    tx_flush: Sender<Sender<()>>,
    seq: Arc<AtomicU64>,
    active: Arc<Mutex<Option<String>>>,
    debounce: Duration,
    pub rx_events: Receiver<SaveEvent>,
}

pub struct SaveRuntime;

impl SaveRuntime {
    pub fn start(store: Arc<dyn TrackStore>, debounce: Duration) -> SaveHandle {
        let (tx_submit, rx_submit) = unbounded::<SaveRequest>();
        let (tx_flush, rx_flush) = unbounded::<Sender<()>>();
        let (tx_events, rx_events) = unbounded::<SaveEvent>();
        let active = Arc::new(Mutex::new(None));

        let writer = Writer {
            store,
            active: active.clone(),
            tx_events,
            pending: BTreeMap::new(),
            latest_seq: HashMap::new(),
        };
        thread::spawn(move || writer.run(rx_submit, rx_flush));

        SaveHandle { tx_submit, tx_flush, seq: Arc::new(AtomicU64::new(0)), active, debounce, rx_events }
    }
}

impl SaveHandle {
    /// Switches the session autosave writes belong to. Pending writes for
    /// any other session will be skipped.
    pub fn set_active_session(&self, session_id: Option<&str>) {
        let mut active = self.active.lock();
        if active.as_deref() != session_id {
            info!(from = ?active.as_deref(), to = ?session_id, "autosave session changed");
            *active = session_id.map(str::to_string);
        }
    }

    pub fn active_session(&self) -> Option<String> { self.active.lock().clone() }

    /// Queues a save for `session_id`, returning its sequence number.
    pub fn schedule(&self, session_id: &str, tracks: Snapshot) -> Result<u64, SaveError> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let request = SaveRequest { seq, session_id: session_id.to_string(), tracks, due: Instant::now() + self.debounce };
        self.tx_submit.send(request).map_err(|_| SaveError::Stopped)?;
        Ok(seq)
    }

    /// Queues a save for whichever session is active right now; `None` when
    /// no session is open.
    pub fn schedule_active(&self, tracks: Snapshot) -> Result<Option<u64>, SaveError> {
        let Some(session_id) = self.active_session() else { return Ok(None) };
        self.schedule(&session_id, tracks).map(Some)
    }

    /// Writes everything pending immediately and waits for it to finish.
    pub fn flush(&self, timeout: Duration) -> Result<(), SaveError> {
        let (ack_tx, ack_rx) = bounded(1);
        self.tx_flush.send(ack_tx).map_err(|_| SaveError::Stopped)?;
        match ack_rx.recv_timeout(timeout) {
            Ok(()) => Ok(()),
            Err(RecvTimeoutError::Timeout) => Err(SaveError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(SaveError::Stopped),
        }
    }
}

struct Writer {
    store: Arc<dyn TrackStore>,
    active: Arc<Mutex<Option<String>>>,
    tx_events: Sender<SaveEvent>,
    pending: BTreeMap<u64, SaveRequest>,
    /// Highest sequence number seen per session, written or pending.
    latest_seq: HashMap<String, u64>,
}

impl Writer {
    fn run(mut self, rx_submit: Receiver<SaveRequest>, rx_flush: Receiver<Sender<()>>) {
        loop {
            crossbeam_channel::select! {
                recv(rx_submit) -> msg => {
                    if let Ok(request) = msg { self.enqueue(request); }
                    else { break; }
                }
                recv(rx_flush) -> msg => {
                    if let Ok(ack) = msg {
                        // requests sent before the flush must be part of it
                        while let Ok(request) = rx_submit.try_recv() { self.enqueue(request); }
                        self.write_due(None);
                        let _ = ack.send(());
                    }
                    else { break; }
                }
                default(Duration::from_millis(5)) => {}
            }
            self.write_due(Some(Instant::now()));
        }
        // Handles are gone; don't lose the last edits.
        self.write_due(None);
        debug!("autosave writer stopped");
    }

    fn enqueue(&mut self, request: SaveRequest) {
        let latest = self.latest_seq.get(&request.session_id).copied().unwrap_or(0);
        if request.seq <= latest {
            self.emit(request.seq, &request.session_id, SaveStatus::Superseded);
            return;
        }
        self.latest_seq.insert(request.session_id.clone(), request.seq);
        let older: Vec<u64> = self
            .pending
            .values()
            .filter(|p| p.session_id == request.session_id)
            .map(|p| p.seq)
            .collect();
        for seq in older {
            if let Some(old) = self.pending.remove(&seq) {
                self.emit(old.seq, &old.session_id, SaveStatus::Superseded);
            }
        }
        self.emit(request.seq, &request.session_id, SaveStatus::Pending);
        self.pending.insert(request.seq, request);
    }

    /// Writes pending requests in sequence order. With `now`, only requests
    /// whose debounce elapsed are written, stopping at the first that hasn't
    /// so later requests never overtake earlier ones.
    fn write_due(&mut self, now: Option<Instant>) {
        while let Some(entry) = self.pending.first_entry() {
            if now.is_some_and(|now| entry.get().due > now) { break; }
            let request = entry.remove();
            let status = self.write(&request);
            self.emit(request.seq, &request.session_id, status);
        }
    }

    fn write(&self, request: &SaveRequest) -> SaveStatus {
        let active = self.active.lock().clone();
        if active.as_deref() != Some(request.session_id.as_str()) {
            debug!(seq = request.seq, session = %request.session_id, "session changed, skipping save");
            return SaveStatus::Skipped;
        }
        match self.store.save_tracks(&request.session_id, &request.tracks) {
            Ok(()) => {
                debug!(seq = request.seq, session = %request.session_id, "autosaved");
                SaveStatus::Written
            }
            Err(e) => {
                warn!(seq = request.seq, session = %request.session_id, error = %format!("{e:#}"), "autosave failed");
                SaveStatus::Failed(format!("{e:#}"))
            }
        }
    }

    fn emit(&self, seq: u64, session_id: &str, status: SaveStatus) {
        let _ = self.tx_events.send(SaveEvent { seq, session_id: session_id.to_string(), status });
    }
}

/// Saves `store` into `session_id` after every edit, undo or redo, using the
/// snapshot each event published. The session is fixed for the listener's
/// lifetime; once the handle's active session moves on, the writer skips
/// these saves. The listener exits once the store is dropped.
pub fn autosave_on_change(store: &TimelineStore, session_id: &str, handle: SaveHandle) -> thread::JoinHandle<()> {
    let events = store.subscribe();
    let session_id = session_id.to_string();
    thread::spawn(move || {
        for event in events.iter() {
            let tracks = match event {
                StoreEvent::Changed { tracks, .. } | StoreEvent::Undone { tracks, .. } | StoreEvent::Redone { tracks, .. } => tracks,
                StoreEvent::Replaced { .. } | StoreEvent::Rejected { .. } => continue,
            };
            if let Err(e) = handle.schedule(&session_id, tracks) {
                warn!(session = %session_id, error = %e, "could not schedule autosave");
                break;
            }
        }
        debug!(session = %session_id, "autosave listener stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use project::MemoryTrackStore;
    use timeline::{Track, TrackKind};

    const WAIT: Duration = Duration::from_secs(5);

    fn snapshot(kinds: &[TrackKind]) -> Snapshot {
        let mut tracks = vec![Track::new_main()];
        tracks.extend(kinds.iter().enumerate().map(|(i, k)| Track::new(*k, i as i64 + 1)));
        tracks.into()
    }

    fn drain(handle: &SaveHandle) -> Vec<SaveEvent> { handle.rx_events.try_iter().collect() }

    #[test]
    fn rapid_saves_coalesce_into_one_write() {
        let mem = Arc::new(MemoryTrackStore::new());
        let handle = SaveRuntime::start(mem.clone(), Duration::from_millis(200));
        handle.set_active_session(Some("a"));
        for n in 0..3 {
            handle.schedule("a", snapshot(&vec![TrackKind::Text; n])).unwrap();
        }
        handle.flush(WAIT).unwrap();
        assert_eq!(mem.write_log(), vec!["a".to_string()]);
        let stored = mem.load_tracks("a").unwrap().unwrap();
        assert_eq!(stored.len(), 3);

        let events = drain(&handle);
        let superseded = events.iter().filter(|e| e.status == SaveStatus::Superseded).count();
        assert_eq!(superseded, 2);
        assert!(events.contains(&SaveEvent { seq: 3, session_id: "a".into(), status: SaveStatus::Written }));
    }

    #[test]
    fn write_for_previous_session_is_skipped() {
        let mem = Arc::new(MemoryTrackStore::new());
        let handle = SaveRuntime::start(mem.clone(), Duration::from_millis(200));
        handle.set_active_session(Some("a"));
        let seq = handle.schedule_active(snapshot(&[])).unwrap().unwrap();
        handle.set_active_session(Some("b"));
        handle.flush(WAIT).unwrap();
        assert!(mem.write_log().is_empty());
        assert!(drain(&handle).contains(&SaveEvent { seq, session_id: "a".into(), status: SaveStatus::Skipped }));
    }

    #[test]
    fn no_active_session_schedules_nothing() {
        let mem = Arc::new(MemoryTrackStore::new());
        let handle = SaveRuntime::start(mem, Duration::from_millis(10));
        assert_eq!(handle.schedule_active(snapshot(&[])).unwrap(), None);
    }

    #[test]
    fn debounced_write_lands_without_flush() {
        let mem = Arc::new(MemoryTrackStore::new());
        let handle = SaveRuntime::start(mem.clone(), Duration::from_millis(10));
        handle.set_active_session(Some("a"));
        let seq = handle.schedule("a", snapshot(&[TrackKind::Audio])).unwrap();
        let deadline = Instant::now() + WAIT;
        let mut written = false;
        while !written && Instant::now() < deadline {
            if let Ok(e) = handle.rx_events.recv_timeout(Duration::from_millis(50)) {
                written = e.seq == seq && e.status == SaveStatus::Written;
            }
        }
        assert!(written);
        assert_eq!(mem.write_log().len(), 1);
    }

    struct Broken;

    impl TrackStore for Broken {
        fn load_tracks(&self, _: &str) -> anyhow::Result<Option<Vec<Track>>> { Ok(None) }
        fn save_tracks(&self, _: &str, _: &[Track]) -> anyhow::Result<()> { anyhow::bail!("disk full") }
    }

    #[test]
    fn failed_write_is_reported_and_writer_keeps_running() {
        let handle = SaveRuntime::start(Arc::new(Broken), Duration::from_millis(50));
        handle.set_active_session(Some("a"));
        let first = handle.schedule("a", snapshot(&[])).unwrap();
        handle.flush(WAIT).unwrap();
        let second = handle.schedule("a", snapshot(&[])).unwrap();
        handle.flush(WAIT).unwrap();
        let failed: Vec<u64> = drain(&handle)
            .into_iter()
            .filter(|e| matches!(&e.status, SaveStatus::Failed(msg) if msg.contains("disk full")))
            .map(|e| e.seq)
            .collect();
        assert_eq!(failed, vec![first, second]);
    }
}
