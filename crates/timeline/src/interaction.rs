use crate::model::{Element, ElementId, TrackId};
use crate::sync::{frame_to_time, time_to_frame};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DragMode { Move, TrimStart, TrimEnd }

/// Pointer-session state for an in-progress drag. Never persisted or
/// versioned; it only yields candidate times for a real command.
#[derive(Clone, Copy, Debug)]
pub struct DragState {
    pub track_id: TrackId,
    pub element_id: ElementId,
    pub mode: DragMode,
    pub start_mouse_x: f32,
    /// Pointer time minus element start at grab time.
    pub click_offset: f64,
    pub orig_start: f64,
    pub current_time: f64,
}

impl DragState {
    pub fn begin(track_id: TrackId, element: &Element, mode: DragMode, mouse_x: f32, pointer_time: f64) -> Self {
        Self {
            track_id,
            element_id: element.id,
            mode,
            start_mouse_x: mouse_x,
            click_offset: pointer_time - element.start_time,
            orig_start: element.start_time,
            current_time: element.start_time,
        }
    }

    /// Candidate start time for the pointer at `pointer_time`, clamped at zero
    /// and optionally snapped to the frame grid.
    pub fn candidate_start_time(&self, pointer_time: f64, snap_fps: Option<f64>) -> f64 {
        let raw = (pointer_time - self.click_offset).max(0.0);
        match snap_fps {
            Some(fps) if fps > 0.0 => frame_to_time(time_to_frame(raw, fps), fps),
            _ => raw,
        }
    }

    pub fn update(&mut self, pointer_time: f64, snap_fps: Option<f64>) -> f64 {
        self.current_time = self.candidate_start_time(pointer_time, snap_fps);
        self.current_time
    }

    pub fn moved(&self) -> bool { (self.current_time - self.orig_start).abs() > f64::EPSILON }
}

/// Converts a horizontal pointer position into timeline seconds.
pub fn pointer_to_time(x: f32, origin_x: f32, px_per_second: f32, scroll_seconds: f64) -> f64 {
    if px_per_second <= 0.0 { return scroll_seconds.max(0.0); }
    (((x - origin_x) / px_per_second) as f64 + scroll_seconds).max(0.0)
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    items: Vec<(TrackId, ElementId)>,
}

impl Selection {
    pub fn select_only(&mut self, track_id: TrackId, element_id: ElementId) {
        self.items.clear();
        self.items.push((track_id, element_id));
    }

    pub fn toggle(&mut self, track_id: TrackId, element_id: ElementId) {
        if let Some(pos) = self.items.iter().position(|&(_, e)| e == element_id) {
            self.items.remove(pos);
        } else {
            self.items.push((track_id, element_id));
        }
    }

    pub fn clear(&mut self) { self.items.clear(); }

    pub fn contains(&self, element_id: ElementId) -> bool { self.items.iter().any(|&(_, e)| e == element_id) }

    pub fn items(&self) -> &[(TrackId, ElementId)] { &self.items }

    pub fn is_empty(&self) -> bool { self.items.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::fixtures::element;

    #[test]
    fn drag_keeps_grab_offset() {
        let e = element(2.0, 3.0);
        let mut drag = DragState::begin(TrackId::new(), &e, DragMode::Move, 100.0, 2.5);
        assert_eq!(drag.update(4.5, None), 4.0);
        assert!(drag.moved());
        assert_eq!(drag.candidate_start_time(0.1, None), 0.0);
    }

    #[test]
    fn drag_snaps_to_frames() {
        let e = element(0.0, 3.0);
        let drag = DragState::begin(TrackId::new(), &e, DragMode::Move, 0.0, 0.0);
        assert_eq!(drag.candidate_start_time(1.01, Some(10.0)), 1.0);
    }

    #[test]
    fn pointer_conversion() {
        assert_eq!(pointer_to_time(150.0, 50.0, 100.0, 2.0), 3.0);
        assert_eq!(pointer_to_time(0.0, 50.0, 100.0, 0.0), 0.0);
    }

    #[test]
    fn selection_toggle() {
        let mut sel = Selection::default();
        let (t, e) = (TrackId::new(), ElementId::new());
        sel.toggle(t, e);
        assert!(sel.contains(e));
        sel.toggle(t, e);
        assert!(sel.is_empty());
        sel.select_only(t, e);
        assert_eq!(sel.items(), &[(t, e)]);
    }
}
