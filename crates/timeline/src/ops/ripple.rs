use tracing::debug;

use crate::error::Result;
use crate::model::{check_time, Element, ElementId, Track, TrackId, TIME_EPSILON};
use crate::overlap;
use crate::query;

use super::with_track;

/// Moves every element (except `exclude`) whose start is at or after
/// `boundary` by `delta` seconds. Starts never go below zero.
pub(crate) fn shift_from(elements: &mut [Element], boundary: f64, delta: f64, exclude: Option<ElementId>) -> usize {
    let mut moved = 0;
    for e in elements.iter_mut() {
        if Some(e.id) == exclude { continue; }
        if e.start_time >= boundary - TIME_EPSILON {
            e.start_time = (e.start_time + delta).max(0.0);
            moved += 1;
        }
    }
    moved
}

/// Sorts and merges `(start, end)` ranges; touching ranges merge too.
pub fn merge_ranges(mut ranges: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    ranges.retain(|(s, e)| e > s);
    ranges.sort_by(|a, b| a.0.total_cmp(&b.0));
    let mut merged: Vec<(f64, f64)> = Vec::with_capacity(ranges.len());
    for (s, e) in ranges {
        match merged.last_mut() {
            Some(last) if s <= last.1 + TIME_EPSILON => last.1 = last.1.max(e),
            _ => merged.push((s, e)),
        }
    }
    merged
}

/// Deletes an element and pulls every later element on the same track left
/// by the removed element's effective duration.
pub fn remove_element_with_ripple(tracks: &[Track], track_id: TrackId, element_id: ElementId) -> Result<Vec<Track>> {
    let (next, ()) = with_track(tracks, track_id, |t| {
        let idx = query::element_index(t, element_id)?;
        let removed = t.elements.remove(idx);
        let moved = shift_from(&mut t.elements, removed.effective_end(), -removed.effective_duration(), None);
        debug!(element = %element_id, moved, "ripple delete");
        overlap::resolve_track(t)
    })?;
    Ok(next)
}

/// Moves an element and carries its neighbours along.
///
/// Moving right shifts the other elements starting at or after the old end;
/// moving left shifts the other elements starting at or after the new end.
/// Both use the same signed delta; the resolver cleans up afterwards.
pub fn set_start_time_with_ripple(
    tracks: &[Track],
    track_id: TrackId,
    element_id: ElementId,
    start_time: f64,
) -> Result<Vec<Track>> {
    check_time("start_time", start_time)?;
    let (next, ()) = with_track(tracks, track_id, |t| {
        let idx = query::element_index(t, element_id)?;
        let old_start = t.elements[idx].start_time;
        let length = t.elements[idx].effective_duration();
        let delta = start_time - old_start;
        if delta.abs() < TIME_EPSILON { return Ok(()); }
        let boundary = if delta > 0.0 { old_start + length } else { start_time + length };
        t.elements[idx].start_time = start_time;
        let moved = shift_from(&mut t.elements, boundary, delta, Some(element_id));
        debug!(element = %element_id, delta, moved, "ripple move");
        overlap::resolve_track(t)
    })?;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::fixtures::*;

    #[test]
    fn merge_ranges_joins_touching_and_overlapping() {
        let merged = merge_ranges(vec![(5.0, 8.0), (0.0, 3.0), (2.0, 4.0), (8.0, 9.0)]);
        assert_eq!(merged, vec![(0.0, 4.0), (5.0, 9.0)]);
    }

    #[test]
    fn ripple_delete_closes_gap() {
        let tracks = main_with(&[(0.0, 2.0), (2.0, 3.0), (6.0, 1.0)]);
        let target = tracks[0].elements[1].id;
        let main = tracks[0].id;
        let out = remove_element_with_ripple(&tracks, main, target).unwrap();
        assert_eq!(spans(&out[0]), vec![(0.0, 2.0), (3.0, 4.0)]);
    }

    #[test]
    fn ripple_delete_leaves_earlier_elements() {
        let tracks = main_with(&[(0.0, 2.0), (4.0, 1.0)]);
        let target = tracks[0].elements[1].id;
        let out = remove_element_with_ripple(&tracks, tracks[0].id, target).unwrap();
        assert_eq!(spans(&out[0]), vec![(0.0, 2.0)]);
    }

    #[test]
    fn ripple_move_right_pushes_followers() {
        let tracks = main_with(&[(0.0, 2.0), (2.0, 2.0), (5.0, 1.0)]);
        let first = tracks[0].elements[0].id;
        let out = set_start_time_with_ripple(&tracks, tracks[0].id, first, 1.0).unwrap();
        assert_eq!(spans(&out[0]), vec![(1.0, 3.0), (3.0, 5.0), (6.0, 7.0)]);
    }

    #[test]
    fn ripple_move_left_pulls_followers() {
        let tracks = main_with(&[(0.0, 1.0), (3.0, 2.0), (5.0, 1.0)]);
        let mid = tracks[0].elements[1].id;
        let out = set_start_time_with_ripple(&tracks, tracks[0].id, mid, 1.0).unwrap();
        assert_eq!(spans(&out[0]), vec![(0.0, 1.0), (1.0, 3.0), (3.0, 4.0)]);
    }

    #[test]
    fn ripple_move_rejects_negative_start() {
        let tracks = main_with(&[(1.0, 1.0)]);
        let id = tracks[0].elements[0].id;
        assert!(set_start_time_with_ripple(&tracks, tracks[0].id, id, -1.0).unwrap_err().is_validation());
    }
}
