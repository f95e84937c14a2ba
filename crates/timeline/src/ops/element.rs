use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{NotFound, Result, TimelineError, ValidationError};
use crate::model::{check_time, check_trim, ElementDraft, ElementId, ElementPayload, Track, TrackId};
use crate::overlap::{self, OverlapPolicy};
use crate::query;

use super::{finish, ripple::shift_from, track::add_track, with_element, with_track};

fn check_draft(track: &Track, draft: &ElementDraft) -> Result<()> {
    if !track.kind.accepts(&draft.payload) {
        return Err(ValidationError::IncompatibleTrack { track: track.kind, payload: draft.payload.kind_name() }.into());
    }
    draft.payload.validate()?;
    check_time("start_time", draft.start_time)?;
    check_trim(0.0, 0.0, draft.duration)?;
    Ok(())
}

/// Places a new element on a track with a fresh id and zero trim.
///
/// `policy` decides what happens if the new interval overlaps an existing
/// element: reject the edit, or let the resolver push things apart.
pub fn add_element(
    tracks: &[Track],
    track_id: TrackId,
    draft: ElementDraft,
    policy: OverlapPolicy,
) -> Result<(Vec<Track>, ElementId)> {
    with_track(tracks, track_id, |t| {
        check_draft(t, &draft)?;
        let element = draft.into_element();
        let id = element.id;
        t.elements.push(element);
        overlap::enforce(t, id, policy)?;
        debug!(track = %track_id, element = %id, "element added");
        Ok(id)
    })
}

/// Creates a track of the payload's preferred kind and places the element on it.
pub fn place_element_on_new_track(tracks: &[Track], draft: ElementDraft) -> Result<(Vec<Track>, TrackId, ElementId)> {
    draft.payload.validate()?;
    let (with_new, track_id) = add_track(tracks, draft.payload.preferred_track_kind());
    let (next, element_id) = add_element(&with_new, track_id, draft, OverlapPolicy::Reject)?;
    Ok((next, track_id, element_id))
}

pub fn remove_element(tracks: &[Track], track_id: TrackId, element_id: ElementId) -> Result<Vec<Track>> {
    let (next, ()) = with_track(tracks, track_id, |t| {
        let idx = query::element_index(t, element_id)?;
        t.elements.remove(idx);
        Ok(())
    })?;
    Ok(next)
}

/// Moves an element between tracks, keeping its id and start time. The
/// destination must accept the payload; the destination track is resolved
/// for overlap afterwards.
pub fn move_element_to_track(
    tracks: &[Track],
    from: TrackId,
    to: TrackId,
    element_id: ElementId,
) -> Result<Vec<Track>> {
    let from_idx = query::track_index(tracks, from)?;
    let to_idx = query::track_index(tracks, to)?;
    let el_idx = query::element_index(&tracks[from_idx], element_id)?;
    if from_idx == to_idx {
        return Ok(tracks.to_vec());
    }
    let dest = &tracks[to_idx];
    let payload = &tracks[from_idx].elements[el_idx].payload;
    if !dest.kind.accepts(payload) {
        return Err(ValidationError::IncompatibleTrack { track: dest.kind, payload: payload.kind_name() }.into());
    }
    let mut next = tracks.to_vec();
    let element = next[from_idx].elements.remove(el_idx);
    next[to_idx].elements.push(element);
    overlap::resolve_track(&mut next[to_idx])?;
    debug!(element = %element_id, %from, %to, "element moved between tracks");
    Ok(finish(tracks, next))
}

/// Sets both trim values. They must stay non-negative and leave a positive
/// effective duration.
pub fn trim(
    tracks: &[Track],
    track_id: TrackId,
    element_id: ElementId,
    trim_start: f64,
    trim_end: f64,
) -> Result<Vec<Track>> {
    let (next, ()) = with_track(tracks, track_id, |t| {
        let e = t.element_mut(element_id).ok_or(TimelineError::NotFound(NotFound::Element(element_id)))?;
        check_trim(trim_start, trim_end, e.duration)?;
        e.trim_start = trim_start;
        e.trim_end = trim_end;
        overlap::resolve_track(t)
    })?;
    Ok(next)
}

pub fn set_start_time(tracks: &[Track], track_id: TrackId, element_id: ElementId, start_time: f64) -> Result<Vec<Track>> {
    check_time("start_time", start_time)?;
    let (next, ()) = with_track(tracks, track_id, |t| {
        let e = t.element_mut(element_id).ok_or(TimelineError::NotFound(NotFound::Element(element_id)))?;
        e.start_time = start_time;
        overlap::resolve_track(t)
    })?;
    Ok(next)
}

/// Changes the intrinsic content length, e.g. once the registry reports the
/// real duration of freshly imported media.
pub fn update_element_duration(
    tracks: &[Track],
    track_id: TrackId,
    element_id: ElementId,
    duration: f64,
) -> Result<Vec<Track>> {
    let (next, ()) = with_track(tracks, track_id, |t| {
        let e = t.element_mut(element_id).ok_or(TimelineError::NotFound(NotFound::Element(element_id)))?;
        check_trim(e.trim_start, e.trim_end, duration)?;
        e.duration = duration;
        overlap::resolve_track(t)
    })?;
    Ok(next)
}

pub fn toggle_element_hidden(tracks: &[Track], track_id: TrackId, element_id: ElementId) -> Result<Vec<Track>> {
    with_element(tracks, track_id, element_id, |e| {
        e.hidden = !e.hidden;
        Ok(())
    })
}

pub fn update_text_content(
    tracks: &[Track],
    track_id: TrackId,
    element_id: ElementId,
    content: impl Into<String>,
) -> Result<Vec<Track>> {
    let content = content.into();
    with_element(tracks, track_id, element_id, |e| {
        if content.trim().is_empty() {
            return Err(ValidationError::MissingBody { kind: e.payload.kind_name() }.into());
        }
        match &mut e.payload {
            ElementPayload::Text { content: body, .. } | ElementPayload::Markdown { content: body, .. } => {
                *body = content;
                Ok(())
            }
            _ => Err(ValidationError::NotTextual.into()),
        }
    })
}

/// Replaces the props passed to a nested composition.
pub fn update_composition_props(
    tracks: &[Track],
    track_id: TrackId,
    element_id: ElementId,
    props: Map<String, Value>,
) -> Result<Vec<Track>> {
    with_element(tracks, track_id, element_id, |e| match &mut e.payload {
        ElementPayload::NestedComposition { props: current, .. } => {
            *current = props;
            Ok(())
        }
        _ => Err(ValidationError::NotNestedComposition.into()),
    })
}

/// Attaches an effect id; attaching one that is already present is a no-op.
pub fn add_effect(tracks: &[Track], track_id: TrackId, element_id: ElementId, effect_id: &str) -> Result<Vec<Track>> {
    with_element(tracks, track_id, element_id, |e| {
        if !e.effects.iter().any(|x| x == effect_id) {
            e.effects.push(effect_id.to_string());
        }
        Ok(())
    })
}

pub fn remove_effect(tracks: &[Track], track_id: TrackId, element_id: ElementId, effect_id: &str) -> Result<Vec<Track>> {
    with_element(tracks, track_id, element_id, |e| {
        e.effects.retain(|x| x != effect_id);
        Ok(())
    })
}

/// Copies an element to its own effective end under a fresh id. Elements
/// starting at or after that point move right by the copy's length.
pub fn duplicate_element(tracks: &[Track], track_id: TrackId, element_id: ElementId) -> Result<(Vec<Track>, ElementId)> {
    with_track(tracks, track_id, |t| {
        let source = t.element(element_id).ok_or(TimelineError::NotFound(NotFound::Element(element_id)))?;
        let mut copy = source.clone();
        copy.id = ElementId::new();
        copy.start_time = source.effective_end();
        let id = copy.id;
        let moved = shift_from(&mut t.elements, copy.start_time, copy.effective_duration(), None);
        debug!(source = %element_id, copy = %id, moved, "duplicated element");
        t.elements.push(copy);
        overlap::resolve_track(t)?;
        Ok(id)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MediaKind, TrackKind};
    use crate::ops::fixtures::*;

    #[test]
    fn composition_props_only_on_compositions() {
        let comp = ElementDraft::new(
            "intro",
            ElementPayload::NestedComposition { composition_id: "intro".into(), props: Map::new() },
            0.0,
            2.0,
        );
        let (tracks, tid, eid) = place_element_on_new_track(&main_with(&[(0.0, 1.0)]), comp).unwrap();
        let mut props = Map::new();
        props.insert("title".into(), Value::from("Hello"));
        let out = update_composition_props(&tracks, tid, eid, props.clone()).unwrap();
        let ElementPayload::NestedComposition { props: stored, .. } = &out[1].element(eid).unwrap().payload else {
            panic!("payload kind changed");
        };
        assert_eq!(stored, &props);

        let clip = tracks[0].elements[0].id;
        let err = update_composition_props(&tracks, tracks[0].id, clip, Map::new()).unwrap_err();
        assert_eq!(err, TimelineError::from(ValidationError::NotNestedComposition));
    }
    #[test]
    fn add_element_assigns_id_and_zero_trim() {
        let tracks = main_with(&[]);
        let (out, id) = add_element(&tracks, tracks[0].id, video(1.0, 4.0), OverlapPolicy::Reject).unwrap();
        let e = out[0].element(id).unwrap();
        assert_eq!((e.trim_start, e.trim_end), (0.0, 0.0));
        assert_eq!(e.start_time, 1.0);
    }

    #[test]
    fn add_element_rejects_incompatible_track() {
        let tracks = main_with(&[]);
        let (tracks, audio_track) = add_track(&tracks, TrackKind::Audio);
        let err = add_element(&tracks, audio_track, text(0.0, 1.0), OverlapPolicy::Reject).unwrap_err();
        assert_eq!(
            err,
            TimelineError::Validation(ValidationError::IncompatibleTrack { track: TrackKind::Audio, payload: "text" })
        );
    }

    #[test]
    fn add_element_rejects_missing_payload_fields() {
        let tracks = main_with(&[]);
        let mut draft = video(0.0, 1.0);
        draft.payload = ElementPayload::Media { media_id: String::new(), media_kind: MediaKind::Video };
        assert!(add_element(&tracks, tracks[0].id, draft, OverlapPolicy::Reject).unwrap_err().is_validation());
        let (tracks, text_track) = add_track(&tracks, TrackKind::Text);
        let mut draft = text(0.0, 1.0);
        draft.payload = ElementPayload::Text { content: "  ".into(), style: Default::default() };
        assert!(add_element(&tracks, text_track, draft, OverlapPolicy::Reject).unwrap_err().is_validation());
    }

    #[test]
    fn add_element_overlap_policy() {
        let tracks = main_with(&[(0.0, 4.0)]);
        let main = tracks[0].id;
        assert!(add_element(&tracks, main, video(2.0, 2.0), OverlapPolicy::Reject).is_err());
        let (out, id) = add_element(&tracks, main, video(2.0, 2.0), OverlapPolicy::Resolve).unwrap();
        assert_eq!(out[0].element(id).unwrap().start_time, 4.0);
    }

    #[test]
    fn move_to_incompatible_track_leaves_state() {
        let tracks = main_with(&[(0.0, 2.0)]);
        let (tracks, audio_track) = add_track(&tracks, TrackKind::Audio);
        let el = tracks[0].elements[0].id;
        let err = move_element_to_track(&tracks, tracks[0].id, audio_track, el).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn move_prunes_emptied_source_track() {
        let tracks = main_with(&[(0.0, 2.0)]);
        let (tracks, tid) = add_track(&tracks, TrackKind::Media);
        let (tracks, el) = add_element(&tracks, tid, video(1.0, 2.0), OverlapPolicy::Reject).unwrap();
        let out = move_element_to_track(&tracks, tid, tracks[0].id, el).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(spans(&out[0]), vec![(0.0, 2.0), (2.0, 4.0)]);
    }

    #[test]
    fn trim_validates_bounds() {
        let tracks = main_with(&[(0.0, 5.0)]);
        let (tid, eid) = (tracks[0].id, tracks[0].elements[0].id);
        assert!(trim(&tracks, tid, eid, 3.0, 2.0).is_err());
        assert!(trim(&tracks, tid, eid, -1.0, 0.0).is_err());
        let out = trim(&tracks, tid, eid, 1.0, 2.0).unwrap();
        assert_eq!(out[0].elements[0].effective_duration(), 2.0);
    }

    #[test]
    fn removing_last_element_prunes_non_main_track() {
        let tracks = main_with(&[]);
        let (tracks, tid) = add_track(&tracks, TrackKind::Text);
        let (tracks, el) = add_element(&tracks, tid, text(0.0, 1.0), OverlapPolicy::Reject).unwrap();
        let out = remove_element(&tracks, tid, el).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].is_main);
        let main = out[0].id;
        let (with_clip, clip) = add_element(&out, main, video(0.0, 1.0), OverlapPolicy::Reject).unwrap();
        let emptied = remove_element(&with_clip, main, clip).unwrap();
        assert_eq!(emptied.len(), 1);
        assert!(emptied[0].elements.is_empty());
    }

    #[test]
    fn text_update_and_effects() {
        let tracks = main_with(&[]);
        let (tracks, tid, eid) = place_element_on_new_track(&tracks, text(0.0, 2.0)).unwrap();
        let out = update_text_content(&tracks, tid, eid, "World").unwrap();
        let out = add_effect(&out, tid, eid, "blur").unwrap();
        let out = add_effect(&out, tid, eid, "blur").unwrap();
        let e = query::element_at(&out, tid, eid).unwrap();
        assert_eq!(e.effects, vec!["blur".to_string()]);
        assert!(matches!(e.payload, ElementPayload::Text { ref content, .. } if content == "World"));
        assert!(update_text_content(&out, tid, eid, "").is_err());
        let out = remove_effect(&out, tid, eid, "blur").unwrap();
        assert!(query::element_at(&out, tid, eid).unwrap().effects.is_empty());
    }

    #[test]
    fn duplicate_lands_after_source() {
        let tracks = main_with(&[(1.0, 2.0), (3.0, 1.0)]);
        let (tid, eid) = (tracks[0].id, tracks[0].elements[0].id);
        let (out, copy) = duplicate_element(&tracks, tid, eid).unwrap();
        assert_ne!(copy, eid);
        assert_eq!(spans(&out[0]), vec![(1.0, 3.0), (3.0, 5.0), (5.0, 6.0)]);
        assert_eq!(out[0].element(copy).unwrap().start_time, 3.0);
    }

    #[test]
    fn duplicate_keeps_earlier_elements_and_shifts_later_ones() {
        let tracks = main_with(&[(0.0, 1.0), (2.0, 2.0), (7.0, 1.0)]);
        let (tid, eid) = (tracks[0].id, tracks[0].elements[1].id);
        let (out, copy) = duplicate_element(&tracks, tid, eid).unwrap();
        assert_eq!(out[0].element(copy).unwrap().start_time, 4.0);
        assert_eq!(spans(&out[0]), vec![(0.0, 1.0), (2.0, 4.0), (4.0, 6.0), (9.0, 10.0)]);
    }

    #[test]
    fn hidden_toggle_and_duration_update() {
        let tracks = main_with(&[(0.0, 2.0)]);
        let (tid, eid) = (tracks[0].id, tracks[0].elements[0].id);
        let out = toggle_element_hidden(&tracks, tid, eid).unwrap();
        assert!(out[0].elements[0].hidden);
        assert!(update_element_duration(&out, tid, eid, 0.0).is_err());
        let out = update_element_duration(&out, tid, eid, 6.0).unwrap();
        assert_eq!(out[0].elements[0].effective_end(), 6.0);
    }
}
