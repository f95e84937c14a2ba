use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ValidationError};
use crate::model::{Element, ElementId, Track, TrackId, TIME_EPSILON};
use crate::overlap;
use crate::query;

use super::{finish, ripple};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleteRangeOptions {
    /// Tracks to cut; `None` means every track.
    pub tracks: Option<Vec<TrackId>>,
    /// Close the deleted span on the cut tracks.
    pub ripple: bool,
    /// With `ripple`, close the span on every track instead.
    pub cross_track_ripple: bool,
}

/// How an element's effective interval relates to a deletion range.
/// Touching edges count as no overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOverlap {
    None,
    Contained,
    /// The range covers the element's tail.
    Tail,
    /// The range covers the element's head.
    Head,
    /// The range sits strictly inside the element.
    Inside,
}

pub fn classify_range_overlap(e: &Element, start: f64, end: f64) -> RangeOverlap {
    let (s, en) = (e.start_time, e.effective_end());
    if !e.overlaps_range(start, end) {
        return RangeOverlap::None;
    }
    let starts_before = s < start - TIME_EPSILON;
    let ends_after = en > end + TIME_EPSILON;
    match (starts_before, ends_after) {
        (false, false) => RangeOverlap::Contained,
        (true, false) => RangeOverlap::Tail,
        (false, true) => RangeOverlap::Head,
        (true, true) => RangeOverlap::Inside,
    }
}

/// Removes `[start, end)` from the selected tracks, trimming or splitting
/// elements that straddle the range, and optionally rippling later content
/// left by the range length.
pub fn delete_time_range(tracks: &[Track], start: f64, end: f64, options: &DeleteRangeOptions) -> Result<Vec<Track>> {
    if !start.is_finite() || !end.is_finite() || start < 0.0 || end <= start + TIME_EPSILON {
        return Err(ValidationError::InvalidRange { start, end }.into());
    }
    if let Some(ids) = &options.tracks {
        for id in ids {
            query::track_index(tracks, *id)?;
        }
    }
    let targeted = |id: TrackId| options.tracks.as_ref().map_or(true, |ids| ids.contains(&id));
    let length = end - start;

    let mut next = tracks.to_vec();
    let mut touched = 0usize;
    for track in next.iter_mut().filter(|t| targeted(t.id)) {
        let mut kept = Vec::with_capacity(track.elements.len() + 1);
        for e in track.elements.drain(..) {
            match classify_range_overlap(&e, start, end) {
                RangeOverlap::None => kept.push(e),
                RangeOverlap::Contained => touched += 1,
                RangeOverlap::Tail => {
                    let mut e = e;
                    e.trim_end += e.effective_end() - start;
                    kept.push(e);
                    touched += 1;
                }
                RangeOverlap::Head => {
                    let mut e = e;
                    e.trim_start += end - e.start_time;
                    e.start_time = end;
                    kept.push(e);
                    touched += 1;
                }
                RangeOverlap::Inside => {
                    let mut left = e.clone();
                    left.trim_end += e.effective_end() - start;
                    let mut right = e;
                    right.id = ElementId::new();
                    right.trim_start += end - right.start_time;
                    right.start_time = end;
                    kept.push(left);
                    kept.push(right);
                    touched += 1;
                }
            }
        }
        track.elements = kept;
    }

    if options.ripple {
        for track in next.iter_mut() {
            if options.cross_track_ripple || targeted(track.id) {
                ripple::shift_from(&mut track.elements, end, -length, None);
            }
        }
    }
    for track in next.iter_mut() {
        overlap::resolve_track(track)?;
    }
    debug!(start, end, touched, ripple = options.ripple, "deleted time range");
    Ok(finish(tracks, next))
}
