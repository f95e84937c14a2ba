//! Read-only queries over a track list.
//!
//! Every query returns owned data so callers never hold references into the
//! store's published state.

use crate::error::{NotFound, Result, TimelineError};
use crate::model::{Element, ElementId, Track, TrackId};
use crate::overlap;

pub fn tracks_ordered_by_position(tracks: &[Track]) -> Vec<Track> {
    let mut out = tracks.to_vec();
    out.sort_by_key(|t| t.position);
    out
}

pub fn track(tracks: &[Track], track_id: TrackId) -> Option<Track> {
    tracks.iter().find(|t| t.id == track_id).cloned()
}

pub fn element_at(tracks: &[Track], track_id: TrackId, element_id: ElementId) -> Option<Element> {
    tracks.iter().find(|t| t.id == track_id)?.element(element_id).cloned()
}

/// Locates an element anywhere in the timeline, returning it with its track id.
pub fn find_element(tracks: &[Track], element_id: ElementId) -> Option<(TrackId, Element)> {
    tracks
        .iter()
        .find_map(|t| t.element(element_id).map(|e| (t.id, e.clone())))
}

/// Max effective end across all tracks; zero for an empty timeline.
pub fn total_duration(tracks: &[Track]) -> f64 {
    tracks.iter().map(Track::end_time).fold(0.0, f64::max)
}

pub fn elements_at_time(tracks: &[Track], time: f64) -> Vec<(TrackId, Element)> {
    let mut out = Vec::new();
    for t in tracks {
        for e in &t.elements {
            if e.contains_time(time) { out.push((t.id, e.clone())); }
        }
    }
    out
}

pub fn main_track_id(tracks: &[Track]) -> Option<TrackId> {
    tracks.iter().find(|t| t.is_main).map(|t| t.id)
}

/// Full structural check: exactly one main track, valid element timing,
/// unique ids and no overlap inside any track.
pub fn validate_tracks(tracks: &[Track]) -> Result<()> {
    let mains = tracks.iter().filter(|t| t.is_main).count();
    if mains != 1 {
        return Err(TimelineError::Invariant(format!("expected one main track, found {mains}")));
    }
    let mut seen = std::collections::HashSet::new();
    for t in tracks {
        if !seen.insert(t.id.0) {
            return Err(TimelineError::Invariant(format!("duplicate track id {}", t.id)));
        }
        for e in &t.elements {
            if !seen.insert(e.id.0) {
                return Err(TimelineError::Invariant(format!("duplicate element id {}", e.id)));
            }
            e.check_timing()?;
            if !t.kind.accepts(&e.payload) {
                return Err(TimelineError::Invariant(format!(
                    "{} element {} on {} track {}",
                    e.payload.kind_name(),
                    e.id,
                    t.kind,
                    t.id
                )));
            }
        }
        if let Some((a, b)) = overlap::find_overlaps(&t.elements).first() {
            return Err(TimelineError::Invariant(format!("elements {a} and {b} overlap on track {}", t.id)));
        }
    }
    Ok(())
}

pub(crate) fn track_index(tracks: &[Track], track_id: TrackId) -> Result<usize> {
    tracks
        .iter()
        .position(|t| t.id == track_id)
        .ok_or(TimelineError::NotFound(NotFound::Track(track_id)))
}

pub(crate) fn element_index(track: &Track, element_id: ElementId) -> Result<usize> {
    track
        .elements
        .iter()
        .position(|e| e.id == element_id)
        .ok_or(TimelineError::NotFound(NotFound::Element(element_id)))
}
