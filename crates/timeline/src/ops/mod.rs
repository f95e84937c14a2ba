//! Timeline mutations.
//!
//! Every operation takes the current track list by reference and returns a
//! brand new list (or a rejection), so a failed edit never leaves partial
//! writes behind. Operations that can introduce overlap finish by running
//! the overlap resolver on the tracks they touched.

mod element;
mod range;
mod ripple;
mod split;
mod track;

pub use element::{
    add_effect, add_element, duplicate_element, move_element_to_track, place_element_on_new_track,
    remove_effect, remove_element, set_start_time, toggle_element_hidden, trim, update_composition_props,
    update_element_duration, update_text_content,
};
pub use range::{classify_range_overlap, delete_time_range, DeleteRangeOptions, RangeOverlap};
pub use ripple::{merge_ranges, remove_element_with_ripple, set_start_time_with_ripple};
pub use split::{split, split_keep_left, split_keep_right};
pub use track::{
    add_track, insert_track_at, remove_track, remove_track_with_ripple, reorder_track, toggle_track_mute,
};

use crate::error::{NotFound, Result, TimelineError};
use crate::model::{Element, ElementId, Track, TrackId};
use crate::query;

/// Guarantees a main track exists. A fresh one is placed ahead of all others.
pub fn ensure_main_track(mut tracks: Vec<Track>) -> Vec<Track> {
    if !tracks.iter().any(|t| t.is_main) {
        let mut main = Track::new_main();
        main.position = tracks.iter().map(|t| t.position).min().map_or(0, |p| p - 1);
        tracks.push(main);
    }
    tracks
}

/// Post-edit housekeeping: drop non-main tracks that this edit emptied and
/// make sure the main track is still there.
pub(crate) fn finish(before: &[Track], mut after: Vec<Track>) -> Vec<Track> {
    after.retain(|t| {
        if t.is_main || !t.elements.is_empty() { return true; }
        let was_populated = before.iter().any(|b| b.id == t.id && !b.elements.is_empty());
        if was_populated { tracing::debug!(track = %t.id, "pruning emptied track"); }
        !was_populated
    });
    ensure_main_track(after)
}

pub(crate) fn with_track<T>(
    tracks: &[Track],
    track_id: TrackId,
    f: impl FnOnce(&mut Track) -> Result<T>,
) -> Result<(Vec<Track>, T)> {
    let idx = query::track_index(tracks, track_id)?;
    let mut next = tracks.to_vec();
    let value = f(&mut next[idx])?;
    Ok((finish(tracks, next), value))
}

pub(crate) fn with_element(
    tracks: &[Track],
    track_id: TrackId,
    element_id: ElementId,
    f: impl FnOnce(&mut Element) -> Result<()>,
) -> Result<Vec<Track>> {
    let (next, ()) = with_track(tracks, track_id, |t| {
        let e = t.element_mut(element_id).ok_or(TimelineError::NotFound(NotFound::Element(element_id)))?;
        f(e)
    })?;
    Ok(next)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::model::{Element, ElementDraft, ElementPayload, MediaKind, TextStyle, Track, TrackKind};

    pub fn video(start: f64, duration: f64) -> ElementDraft {
        ElementDraft::new(
            "clip",
            ElementPayload::Media { media_id: "media-1".into(), media_kind: MediaKind::Video },
            start,
            duration,
        )
    }

    pub fn audio(start: f64, duration: f64) -> ElementDraft {
        ElementDraft::new(
            "sound",
            ElementPayload::Media { media_id: "media-2".into(), media_kind: MediaKind::Audio },
            start,
            duration,
        )
    }

    pub fn text(start: f64, duration: f64) -> ElementDraft {
        ElementDraft::new(
            "title",
            ElementPayload::Text { content: "Hello".into(), style: TextStyle::default() },
            start,
            duration,
        )
    }

    pub fn element(start: f64, duration: f64) -> Element { video(start, duration).into_element() }

    /// Main track populated with video clips at the given `(start, duration)` pairs.
    pub fn main_with(clips: &[(f64, f64)]) -> Vec<Track> {
        let mut main = Track::new_main();
        main.elements = clips.iter().map(|&(s, d)| element(s, d)).collect();
        vec![main]
    }

    pub fn track_with(kind: TrackKind, position: i64, clips: &[(f64, f64)]) -> Track {
        let mut t = Track::new(kind, position);
        t.elements = clips.iter().map(|&(s, d)| element(s, d)).collect();
        t
    }

    pub fn spans(track: &Track) -> Vec<(f64, f64)> {
        let mut out: Vec<_> = track.elements.iter().map(|e| (e.start_time, e.effective_end())).collect();
        out.sort_by(|a, b| a.0.total_cmp(&b.0));
        out
    }
}
