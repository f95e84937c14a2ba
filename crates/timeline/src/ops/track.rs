use tracing::debug;

use crate::error::{Result, ValidationError};
use crate::model::{Track, TrackId, TrackKind};
use crate::overlap;
use crate::query;

use super::{finish, ripple, with_track};

/// Appends an empty track after every existing position.
pub fn add_track(tracks: &[Track], kind: TrackKind) -> (Vec<Track>, TrackId) {
    let position = tracks.iter().map(|t| t.position).max().map_or(0, |p| p + 1);
    let track = Track::new(kind, position);
    let id = track.id;
    let mut next = tracks.to_vec();
    next.push(track);
    (next, id)
}

/// Inserts an empty track at `index` in position order; `index` is clamped
/// to `[0, len]`. Positions are renumbered `0..n` afterwards.
pub fn insert_track_at(tracks: &[Track], kind: TrackKind, index: usize) -> (Vec<Track>, TrackId) {
    let mut ordered = query::tracks_ordered_by_position(tracks);
    let index = index.min(ordered.len());
    let track = Track::new(kind, 0);
    let id = track.id;
    ordered.insert(index, track);
    renumber(&mut ordered);
    (ordered, id)
}

/// Moves a track to `new_index` in position order (clamped).
pub fn reorder_track(tracks: &[Track], track_id: TrackId, new_index: usize) -> Result<Vec<Track>> {
    let mut ordered = query::tracks_ordered_by_position(tracks);
    let from = query::track_index(&ordered, track_id)?;
    let track = ordered.remove(from);
    let to = new_index.min(ordered.len());
    ordered.insert(to, track);
    renumber(&mut ordered);
    Ok(ordered)
}

pub fn toggle_track_mute(tracks: &[Track], track_id: TrackId) -> Result<Vec<Track>> {
    let (next, ()) = with_track(tracks, track_id, |t| {
        t.muted = !t.muted;
        Ok(())
    })?;
    Ok(next)
}

pub fn remove_track(tracks: &[Track], track_id: TrackId) -> Result<Vec<Track>> {
    let idx = removable_index(tracks, track_id)?;
    let mut next = tracks.to_vec();
    next.remove(idx);
    Ok(finish(tracks, next))
}

/// Removes a track and closes the time it occupied on every other track.
///
/// The removed elements' intervals are merged into gaps; each remaining
/// element starting at or after a gap's end moves left by the gap length.
/// Gaps are applied latest first so earlier shifts never move an element
/// across a gap that has not been processed yet. Elements that start before
/// a gap's end stay put; shifted elements landing on them are pushed right
/// by the resolver.
pub fn remove_track_with_ripple(tracks: &[Track], track_id: TrackId) -> Result<Vec<Track>> {
    let idx = removable_index(tracks, track_id)?;
    let mut next = tracks.to_vec();
    let removed = next.remove(idx);
    let occupied: Vec<(f64, f64)> = removed.elements.iter().map(|e| (e.start_time, e.effective_end())).collect();
    let mut gaps = ripple::merge_ranges(occupied);
    gaps.sort_by(|a, b| b.0.total_cmp(&a.0));
    debug!(track = %track_id, gaps = gaps.len(), "ripple removing track");

    for track in next.iter_mut() {
        for &(gap_start, gap_end) in &gaps {
            ripple::shift_from(&mut track.elements, gap_end, -(gap_end - gap_start), None);
        }
        overlap::resolve_track(track)?;
    }
    Ok(finish(tracks, next))
}

fn removable_index(tracks: &[Track], track_id: TrackId) -> Result<usize> {
    let idx = query::track_index(tracks, track_id)?;
    if tracks[idx].is_main {
        return Err(ValidationError::MainTrackProtected.into());
    }
    Ok(idx)
}

fn renumber(ordered: &mut [Track]) {
    for (i, t) in ordered.iter_mut().enumerate() {
        t.position = i as i64;
    }
}
