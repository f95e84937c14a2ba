use tracing::debug;

use crate::error::{Result, ValidationError};
use crate::model::{Element, ElementId, Track, TrackId, TIME_EPSILON};
use crate::query;

use super::with_track;

fn check_split_time(e: &Element, split_time: f64) -> Result<()> {
    let (start, end) = (e.start_time, e.effective_end());
    if !split_time.is_finite() || split_time <= start + TIME_EPSILON || split_time >= end - TIME_EPSILON {
        return Err(ValidationError::SplitOutOfRange { split_time, start, end }.into());
    }
    Ok(())
}

/// Returns the left half (original id, tail trimmed) and the right half
/// (fresh id, head trimmed, starting at `split_time`).
fn halves(e: &Element, split_time: f64) -> (Element, Element) {
    let mut left = e.clone();
    left.trim_end += e.effective_end() - split_time;
    let mut right = e.clone();
    right.id = ElementId::new();
    right.trim_start += split_time - e.start_time;
    right.start_time = split_time;
    (left, right)
}

/// Splits an element in two at `split_time`, which must fall strictly
/// inside its effective interval. Returns the id of the right half.
pub fn split(tracks: &[Track], track_id: TrackId, element_id: ElementId, split_time: f64) -> Result<(Vec<Track>, ElementId)> {
    with_track(tracks, track_id, |t| {
        let idx = query::element_index(t, element_id)?;
        check_split_time(&t.elements[idx], split_time)?;
        let (left, right) = halves(&t.elements[idx], split_time);
        let right_id = right.id;
        t.elements[idx] = left;
        t.elements.insert(idx + 1, right);
        debug!(element = %element_id, right = %right_id, split_time, "split");
        Ok(right_id)
    })
}

/// Splits and keeps only the part before `split_time`.
pub fn split_keep_left(tracks: &[Track], track_id: TrackId, element_id: ElementId, split_time: f64) -> Result<Vec<Track>> {
    let (next, ()) = with_track(tracks, track_id, |t| {
        let idx = query::element_index(t, element_id)?;
        check_split_time(&t.elements[idx], split_time)?;
        let (left, _) = halves(&t.elements[idx], split_time);
        t.elements[idx] = left;
        Ok(())
    })?;
    Ok(next)
}

/// Splits and keeps only the part after `split_time`. The kept part retains
/// the original id.
pub fn split_keep_right(tracks: &[Track], track_id: TrackId, element_id: ElementId, split_time: f64) -> Result<Vec<Track>> {
    let (next, ()) = with_track(tracks, track_id, |t| {
        let idx = query::element_index(t, element_id)?;
        check_split_time(&t.elements[idx], split_time)?;
        let (_, mut right) = halves(&t.elements[idx], split_time);
        right.id = element_id;
        t.elements[idx] = right;
        Ok(())
    })?;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::fixtures::*;

    #[test]
    fn split_covers_original_interval() {
        let mut tracks = main_with(&[(2.0, 10.0)]);
        tracks[0].elements[0].trim_start = 1.0;
        tracks[0].elements[0].trim_end = 1.0;
        let (tid, eid) = (tracks[0].id, tracks[0].elements[0].id);
        let (out, right_id) = split(&tracks, tid, eid, 5.0).unwrap();
        let left = out[0].element(eid).unwrap();
        let right = out[0].element(right_id).unwrap();
        assert_eq!(left.effective_end(), 5.0);
        assert_eq!(right.start_time, 5.0);
        assert_eq!(right.effective_end(), 10.0);
        assert_eq!(left.trim_start, 1.0);
        assert_eq!(left.trim_end, 6.0);
        assert_eq!(right.trim_start, 4.0);
        assert_eq!(right.trim_end, 1.0);
        assert_eq!(left.effective_duration() + right.effective_duration(), 8.0);
        assert_eq!(left.payload, right.payload);
    }

    #[test]
    fn split_rejects_edges_and_outside() {
        let tracks = main_with(&[(2.0, 4.0)]);
        let (tid, eid) = (tracks[0].id, tracks[0].elements[0].id);
        for t in [2.0, 6.0, 1.0, 7.0, f64::NAN] {
            assert!(split(&tracks, tid, eid, t).unwrap_err().is_validation(), "split at {t}");
        }
    }

    #[test]
    fn keep_left_and_keep_right() {
        let tracks = main_with(&[(0.0, 4.0)]);
        let (tid, eid) = (tracks[0].id, tracks[0].elements[0].id);
        let left = split_keep_left(&tracks, tid, eid, 1.0).unwrap();
        assert_eq!(spans(&left[0]), vec![(0.0, 1.0)]);
        let right = split_keep_right(&tracks, tid, eid, 1.0).unwrap();
        assert_eq!(spans(&right[0]), vec![(1.0, 4.0)]);
        assert_eq!(right[0].elements[0].id, eid);
        assert_eq!(right[0].elements[0].trim_start, 1.0);
    }
}
