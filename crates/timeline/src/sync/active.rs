use crate::model::{Element, Track, TrackId};

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveElement {
    pub track_id: TrackId,
    pub element: Element,
}

/// Visible nested-composition elements whose effective interval contains `time`.
pub fn get_active_elements(tracks: &[Track], time: f64) -> Vec<ActiveElement> {
    let mut out = Vec::new();
    for track in tracks {
        for e in &track.elements {
            if e.hidden || !e.payload.is_nested_composition() { continue; }
            if e.contains_time(time) {
                out.push(ActiveElement { track_id: track.id, element: e.clone() });
            }
        }
    }
    out
}
