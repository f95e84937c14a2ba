//! Overlap detection and resolution for a single track.
//!
//! This is the only place the overlap policy lives. Ripple edits and range
//! deletion shift elements freely and then hand the track to
//! [`resolve_overlaps`], which sorts by start time and pushes each element
//! forward until it abuts its predecessor. Relative order, durations and
//! trims are preserved; no element is ever dropped.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TimelineError, ValidationError};
use crate::model::{Element, ElementId, Track};

/// What to do when a placement would overlap an existing element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Fail the operation, leaving the track untouched.
    #[default]
    Reject,
    /// Run the resolver and push later elements forward.
    Resolve,
}

pub fn has_overlap(elements: &[Element]) -> bool {
    !find_overlaps(elements).is_empty()
}

/// All overlapping pairs, in start-time order of the first member.
pub fn find_overlaps(elements: &[Element]) -> Vec<(ElementId, ElementId)> {
    let mut sorted: Vec<&Element> = elements.iter().collect();
    sorted.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    let mut out = Vec::new();
    for (i, a) in sorted.iter().enumerate() {
        for b in &sorted[i + 1..] {
            if b.start_time >= a.effective_end() { break; }
            if a.overlaps(b) { out.push((a.id, b.id)); }
        }
    }
    out
}

/// First element in `elements` (ignoring `exclude`) that overlaps `[start, end)`.
pub fn first_conflict(elements: &[Element], start: f64, end: f64, exclude: Option<ElementId>) -> Option<ElementId> {
    elements
        .iter()
        .filter(|e| Some(e.id) != exclude)
        .find(|e| e.overlaps_range(start, end))
        .map(|e| e.id)
}

/// Returns the list unchanged when nothing overlaps; otherwise sorted by start
/// time with each element pushed to at least the previous effective end.
pub fn resolve_overlaps(mut elements: Vec<Element>) -> Result<Vec<Element>> {
    if let Some(bad) = elements
        .iter()
        .find(|e| !e.start_time.is_finite() || !e.effective_duration().is_finite() || e.effective_duration() <= 0.0)
    {
        return Err(TimelineError::Invariant(format!(
            "element {} has an unusable interval ({} + {})",
            bad.id,
            bad.start_time,
            bad.effective_duration()
        )));
    }
    if !has_overlap(&elements) {
        return Ok(elements);
    }
    elements.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    let mut prev_end: Option<f64> = None;
    let mut pushed = 0usize;
    for e in elements.iter_mut() {
        if let Some(end) = prev_end {
            if e.start_time < end {
                e.start_time = end;
                pushed += 1;
            }
        }
        prev_end = Some(e.effective_end());
    }
    debug!(pushed, "resolved overlaps");
    Ok(elements)
}

pub fn resolve_track(track: &mut Track) -> Result<()> {
    let elements = std::mem::take(&mut track.elements);
    track.elements = resolve_overlaps(elements)?;
    Ok(())
}

/// Applies `policy` to a track after a placement of `placed`.
pub(crate) fn enforce(track: &mut Track, placed: ElementId, policy: OverlapPolicy) -> Result<()> {
    match policy {
        OverlapPolicy::Resolve => resolve_track(track),
        OverlapPolicy::Reject => {
            let Some(e) = track.element(placed) else { return Ok(()) };
            match first_conflict(&track.elements, e.start_time, e.effective_end(), Some(placed)) {
                Some(existing) => Err(ValidationError::Overlap { existing }.into()),
                None => Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ElementDraft, ElementPayload, MediaKind};

    fn clip(start: f64, duration: f64) -> Element {
        ElementDraft::new(
            "c",
            ElementPayload::Media { media_id: "m".into(), media_kind: MediaKind::Video },
            start,
            duration,
        )
        .into_element()
    }

    #[test]
    fn non_overlapping_list_is_returned_as_is() {
        let list = vec![clip(5.0, 1.0), clip(0.0, 2.0)];
        let ids: Vec<_> = list.iter().map(|e| e.id).collect();
        let out = resolve_overlaps(list).unwrap();
        assert_eq!(out.iter().map(|e| e.id).collect::<Vec<_>>(), ids);
    }

    #[test]
    fn pushes_later_elements_to_abut() {
        let a = clip(0.0, 4.0);
        let b = clip(3.0, 2.0);
        let c = clip(5.5, 1.0);
        let out = resolve_overlaps(vec![c, b, a]).unwrap();
        assert_eq!(out[0].start_time, 0.0);
        assert_eq!(out[1].start_time, 4.0);
        assert_eq!(out[2].start_time, 6.0);
        assert!(!has_overlap(&out));
    }

    #[test]
    fn preserves_trim_and_duration() {
        let a = clip(0.0, 4.0);
        let mut b = clip(1.0, 10.0);
        b.trim_start = 2.0;
        b.trim_end = 3.0;
        let out = resolve_overlaps(vec![a, b]).unwrap();
        assert_eq!(out[1].start_time, 4.0);
        assert_eq!(out[1].trim_start, 2.0);
        assert_eq!(out[1].duration, 10.0);
    }

    #[test]
    fn rejects_non_finite_start() {
        let mut a = clip(0.0, 1.0);
        a.start_time = f64::NAN;
        assert!(matches!(resolve_overlaps(vec![a]), Err(TimelineError::Invariant(_))));
    }

    #[test]
    fn reject_policy_reports_existing_element() {
        let mut track = Track::new_main();
        let a = clip(0.0, 4.0);
        let b = clip(2.0, 1.0);
        let (aid, bid) = (a.id, b.id);
        track.elements = vec![a, b];
        let err = enforce(&mut track, bid, OverlapPolicy::Reject).unwrap_err();
        assert_eq!(err, TimelineError::Validation(ValidationError::Overlap { existing: aid }));
    }
}
