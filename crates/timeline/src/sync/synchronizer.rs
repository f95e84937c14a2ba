use std::collections::{BTreeMap, HashSet};
use std::fmt::Display;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::model::{Element, ElementId, ElementPayload, Track, TrackId};

use super::active::get_active_elements;
use super::frames::{global_to_local_frame, time_to_frame, ElementFrames, Frame};

#[derive(Debug, Clone, PartialEq)]
pub enum SyncCommand {
    /// A composition entered the playhead; it should load and show `local_frame`.
    Activate { element_id: ElementId, track_id: TrackId, composition_id: String, local_frame: Frame },
    Deactivate { element_id: ElementId },
    Seek { element_id: ElementId, local_frame: Frame },
    /// Low-priority hint; instances may ignore it.
    Preload { element_id: ElementId, from_frame: Frame, to_frame: Frame },
    Transport { element_id: ElementId, playing: bool, rate: f32 },
}

/// Control surface of a nested-composition player.
pub trait NestedInstanceControl {
    type Error: Display;

    fn activate(&mut self, element_id: ElementId, composition_id: &str, local_frame: Frame) -> Result<(), Self::Error>;
    fn deactivate(&mut self, element_id: ElementId) -> Result<(), Self::Error>;
    fn seek(&mut self, element_id: ElementId, local_frame: Frame) -> Result<(), Self::Error>;
    fn set_transport(&mut self, element_id: ElementId, playing: bool, rate: f32) -> Result<(), Self::Error>;

    fn preload(&mut self, _element_id: ElementId, _from_frame: Frame, _to_frame: Frame) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Forwards commands to `control`. Failures are logged and counted, never
/// propagated: a late or broken instance must not stall playback.
pub fn dispatch_commands<C: NestedInstanceControl>(control: &mut C, commands: &[SyncCommand]) -> usize {
    let mut failures = 0;
    for cmd in commands {
        let result = match cmd {
            SyncCommand::Activate { element_id, composition_id, local_frame, .. } => {
                control.activate(*element_id, composition_id, *local_frame)
            }
            SyncCommand::Deactivate { element_id } => control.deactivate(*element_id),
            SyncCommand::Seek { element_id, local_frame } => control.seek(*element_id, *local_frame),
            SyncCommand::Preload { element_id, from_frame, to_frame } => control.preload(*element_id, *from_frame, *to_frame),
            SyncCommand::Transport { element_id, playing, rate } => control.set_transport(*element_id, *playing, *rate),
        };
        if let Err(e) = result {
            failures += 1;
            warn!(?cmd, error = %e, "nested instance command failed");
        }
    }
    failures
}

#[derive(Debug, Clone)]
struct Instance {
    element: Element,
    /// Global frame the instance was last explicitly positioned at. Cleared
    /// once playback starts, since the instance then advances on its own.
    positioned_at: Option<Frame>,
    reported_local_frame: Option<Frame>,
    preload_window: Option<(Frame, Frame)>,
}

#[derive(Debug, Clone, Copy)]
struct PendingSeek {
    global_frame: Frame,
    requested_at: Instant,
}

#[derive(Debug)]
pub struct FrameSynchronizer {
    config: SyncConfig,
    fps: f64,
    instances: BTreeMap<ElementId, Instance>,
    pending_seek: Option<PendingSeek>,
    last_global_frame: Option<Frame>,
    last_pushed_frame: Option<Frame>,
    playing: bool,
    rate: f32,
}

impl FrameSynchronizer {
    pub fn new(fps: f64, config: SyncConfig) -> Self {
        Self {
            config,
            fps,
            instances: BTreeMap::new(),
            pending_seek: None,
            last_global_frame: None,
            last_pushed_frame: None,
            playing: false,
            rate: 1.0,
        }
    }

    pub fn fps(&self) -> f64 { self.fps }

    pub fn is_playing(&self) -> bool { self.playing }

    /// Last global frame that was actually pushed to the instances.
    pub fn last_pushed_frame(&self) -> Option<Frame> { self.last_pushed_frame }

    pub fn active_ids(&self) -> Vec<ElementId> { self.instances.keys().copied().collect() }

    /// Called once per playhead update. Activates/deactivates instances,
    /// corrects drift and queues a debounced seek when the frame changed.
    /// Drift on any instance re-seeks every active instance at once.
    pub fn update(&mut self, tracks: &[Track], time: f64, now: Instant) -> Vec<SyncCommand> {
        let global = time_to_frame(time, self.fps);
        let mut out = Vec::new();

        let active: Vec<_> = get_active_elements(tracks, time)
            .into_iter()
            .filter_map(|a| global_to_local_frame(global, &a.element, self.fps).map(|local| (a, local)))
            .collect();
        let live: HashSet<ElementId> = active.iter().map(|(a, _)| a.element.id).collect();

        self.instances.retain(|id, _| {
            let keep = live.contains(id);
            if !keep { out.push(SyncCommand::Deactivate { element_id: *id }); }
            keep
        });

        let positioned = if self.playing { None } else { Some(global) };
        let mut resync = false;
        for (a, local) in active {
            let id = a.element.id;
            match self.instances.get_mut(&id) {
                Some(inst) => {
                    inst.element = a.element;
                    let Some(reported) = inst.reported_local_frame.take() else { continue };
                    let drift = (reported - local).abs();
                    if drift > self.config.drift_tolerance_frames {
                        warn!(element = %id, drift, "nested instance drifted, forcing re-sync");
                        resync = true;
                    }
                }
                None => {
                    let composition_id = match &a.element.payload {
                        ElementPayload::NestedComposition { composition_id, .. } => composition_id.clone(),
                        _ => continue,
                    };
                    debug!(element = %id, local, "activating nested composition");
                    out.push(SyncCommand::Activate { element_id: id, track_id: a.track_id, composition_id, local_frame: local });
                    if self.playing {
                        out.push(SyncCommand::Transport { element_id: id, playing: true, rate: self.rate });
                    }
                    let mut inst = Instance { element: a.element, positioned_at: positioned, reported_local_frame: None, preload_window: None };
                    Self::push_preload(&self.config, self.fps, &mut inst, local, &mut out);
                    self.instances.insert(id, inst);
                    self.last_pushed_frame = Some(global);
                }
            }
        }

        let mut force = false;
        if self.last_global_frame != Some(global) {
            let jumped = self
                .last_global_frame
                .map_or(true, |prev| (global - prev).abs() > self.config.drift_tolerance_frames.max(1));
            // Paused scrubs are debounced; a jump during playback re-syncs at once.
            if !self.playing || jumped {
                self.pending_seek = Some(PendingSeek { global_frame: global, requested_at: now });
                force = self.playing;
            }
        }
        self.last_global_frame = Some(global);
        if resync {
            for inst in self.instances.values_mut() {
                inst.positioned_at = None;
            }
            self.pending_seek = Some(PendingSeek { global_frame: global, requested_at: now });
            force = true;
        }

        out.extend(self.flush(now, force));
        out
    }

    /// Issues a pending seek once the playhead has been still for the
    /// debounce window. Call from the host tick when no update arrives.
    pub fn poll(&mut self, now: Instant) -> Vec<SyncCommand> { self.flush(now, false) }

    /// Latest local frame an instance says it is showing; checked against the
    /// expected frame on the next update.
    pub fn report_local_frame(&mut self, element_id: ElementId, local_frame: Frame) {
        if let Some(inst) = self.instances.get_mut(&element_id) {
            inst.reported_local_frame = Some(local_frame);
        }
    }

    /// Broadcasts play/pause/rate to every active instance. Starting playback
    /// first flushes any pending seek so instances start from the right frame.
    pub fn set_transport(&mut self, playing: bool, rate: f32, now: Instant) -> Vec<SyncCommand> {
        let mut out = if playing { self.flush(now, true) } else { Vec::new() };
        self.playing = playing;
        self.rate = rate;
        for (&element_id, inst) in self.instances.iter_mut() {
            if playing { inst.positioned_at = None; }
            out.push(SyncCommand::Transport { element_id, playing, rate });
        }
        out
    }

    /// Drops all instances, e.g. when the timeline is replaced.
    pub fn reset(&mut self) -> Vec<SyncCommand> {
        self.pending_seek = None;
        self.last_global_frame = None;
        self.last_pushed_frame = None;
        std::mem::take(&mut self.instances)
            .into_keys()
            .map(|element_id| SyncCommand::Deactivate { element_id })
            .collect()
    }

    fn flush(&mut self, now: Instant, force: bool) -> Vec<SyncCommand> {
        let Some(pending) = self.pending_seek else { return Vec::new() };
        let window = Duration::from_millis(self.config.seek_debounce_ms);
        if !force && now.saturating_duration_since(pending.requested_at) < window {
            return Vec::new();
        }
        self.pending_seek = None;
        self.last_pushed_frame = Some(pending.global_frame);
        let positioned = if self.playing { None } else { Some(pending.global_frame) };
        let mut out = Vec::new();
        for (id, inst) in self.instances.iter_mut() {
            if inst.positioned_at == Some(pending.global_frame) { continue; }
            let Some(local) = global_to_local_frame(pending.global_frame, &inst.element, self.fps) else { continue };
            inst.positioned_at = positioned;
            out.push(SyncCommand::Seek { element_id: *id, local_frame: local });
            Self::push_preload(&self.config, self.fps, inst, local, &mut out);
        }
        if !out.is_empty() {
            debug!(frame = pending.global_frame, commands = out.len(), "flushed debounced seek");
        }
        out
    }

    fn push_preload(config: &SyncConfig, fps: f64, inst: &mut Instance, local: Frame, out: &mut Vec<SyncCommand>) {
        if !config.preload_enabled || config.preload_frames <= 0 { return; }
        let (lo, hi) = ElementFrames::of(&inst.element, fps).local_bounds();
        let window = ((local - config.preload_frames).max(lo), (local + config.preload_frames).min(hi));
        if inst.preload_window == Some(window) { return; }
        inst.preload_window = Some(window);
        out.push(SyncCommand::Preload { element_id: inst.element.id, from_frame: window.0, to_frame: window.1 });
    }
}
