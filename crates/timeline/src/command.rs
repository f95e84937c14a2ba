use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::model::{ElementDraft, ElementId, Track, TrackId, TrackKind};
use crate::ops::{self, DeleteRangeOptions};
use crate::overlap::OverlapPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitKeep {
    #[default]
    Both,
    Left,
    Right,
}

/// A user-visible edit expressed with primitive arguments, so UI code and
/// programmatic callers never touch the track list directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum TimelineCommand {
    AddTrack { kind: TrackKind },
    InsertTrackAt { kind: TrackKind, index: usize },
    RemoveTrack { track_id: TrackId, #[serde(default)] ripple: bool },
    ReorderTrack { track_id: TrackId, index: usize },
    ToggleTrackMute { track_id: TrackId },
    AddElement { track_id: TrackId, draft: ElementDraft, #[serde(default)] on_overlap: OverlapPolicy },
    PlaceOnNewTrack { draft: ElementDraft },
    RemoveElement { track_id: TrackId, element_id: ElementId, #[serde(default)] ripple: bool },
    MoveElementToTrack { from: TrackId, to: TrackId, element_id: ElementId },
    Trim { track_id: TrackId, element_id: ElementId, trim_start: f64, trim_end: f64 },
    SetStartTime { track_id: TrackId, element_id: ElementId, start_time: f64, #[serde(default)] ripple: bool },
    Split { track_id: TrackId, element_id: ElementId, split_time: f64, #[serde(default)] keep: SplitKeep },
    DeleteTimeRange { start: f64, end: f64, #[serde(default)] options: DeleteRangeOptions },
    UpdateDuration { track_id: TrackId, element_id: ElementId, duration: f64 },
    ToggleHidden { track_id: TrackId, element_id: ElementId },
    UpdateText { track_id: TrackId, element_id: ElementId, content: String },
    UpdateProps { track_id: TrackId, element_id: ElementId, props: Map<String, Value> },
    AddEffect { track_id: TrackId, element_id: ElementId, effect_id: String },
    RemoveEffect { track_id: TrackId, element_id: ElementId, effect_id: String },
    Duplicate { track_id: TrackId, element_id: ElementId },
}

/// Ids created by a command, when it creates any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Applied,
    Track(TrackId),
    Element(ElementId),
    Placed { track_id: TrackId, element_id: ElementId },
}

impl TimelineCommand {
    pub fn label(&self) -> &'static str {
        match self {
            TimelineCommand::AddTrack { .. } | TimelineCommand::InsertTrackAt { .. } => "Add track",
            TimelineCommand::RemoveTrack { ripple: true, .. } => "Ripple delete track",
            TimelineCommand::RemoveTrack { .. } => "Delete track",
            TimelineCommand::ReorderTrack { .. } => "Reorder track",
            TimelineCommand::ToggleTrackMute { .. } => "Toggle mute",
            TimelineCommand::AddElement { .. } | TimelineCommand::PlaceOnNewTrack { .. } => "Add element",
            TimelineCommand::RemoveElement { ripple: true, .. } => "Ripple delete",
            TimelineCommand::RemoveElement { .. } => "Delete element",
            TimelineCommand::MoveElementToTrack { .. } => "Move element",
            TimelineCommand::Trim { .. } => "Trim",
            TimelineCommand::SetStartTime { ripple: true, .. } => "Ripple move",
            TimelineCommand::SetStartTime { .. } => "Move element",
            TimelineCommand::Split { .. } => "Split",
            TimelineCommand::DeleteTimeRange { .. } => "Delete range",
            TimelineCommand::UpdateDuration { .. } => "Change duration",
            TimelineCommand::ToggleHidden { .. } => "Toggle visibility",
            TimelineCommand::UpdateText { .. } => "Edit text",
            TimelineCommand::UpdateProps { .. } => "Edit composition props",
            TimelineCommand::AddEffect { .. } => "Add effect",
            TimelineCommand::RemoveEffect { .. } => "Remove effect",
            TimelineCommand::Duplicate { .. } => "Duplicate element",
        }
    }

    /// Runs the command against `tracks` without touching any shared state.
    pub fn apply(self, tracks: &[Track]) -> Result<(Vec<Track>, CommandOutcome)> {
        use CommandOutcome::{Applied, Element, Track as TrackOut};
        Ok(match self {
            TimelineCommand::AddTrack { kind } => {
                let (next, id) = ops::add_track(tracks, kind);
                (next, TrackOut(id))
            }
            TimelineCommand::InsertTrackAt { kind, index } => {
                let (next, id) = ops::insert_track_at(tracks, kind, index);
                (next, TrackOut(id))
            }
            TimelineCommand::RemoveTrack { track_id, ripple: false } => (ops::remove_track(tracks, track_id)?, Applied),
            TimelineCommand::RemoveTrack { track_id, ripple: true } => {
                (ops::remove_track_with_ripple(tracks, track_id)?, Applied)
            }
            TimelineCommand::ReorderTrack { track_id, index } => (ops::reorder_track(tracks, track_id, index)?, Applied),
            TimelineCommand::ToggleTrackMute { track_id } => (ops::toggle_track_mute(tracks, track_id)?, Applied),
            TimelineCommand::AddElement { track_id, draft, on_overlap } => {
                let (next, id) = ops::add_element(tracks, track_id, draft, on_overlap)?;
                (next, Element(id))
            }
            TimelineCommand::PlaceOnNewTrack { draft } => {
                let (next, track_id, element_id) = ops::place_element_on_new_track(tracks, draft)?;
                (next, CommandOutcome::Placed { track_id, element_id })
            }
            TimelineCommand::RemoveElement { track_id, element_id, ripple: false } => {
                (ops::remove_element(tracks, track_id, element_id)?, Applied)
            }
            TimelineCommand::RemoveElement { track_id, element_id, ripple: true } => {
                (ops::remove_element_with_ripple(tracks, track_id, element_id)?, Applied)
            }
            TimelineCommand::MoveElementToTrack { from, to, element_id } => {
                (ops::move_element_to_track(tracks, from, to, element_id)?, Applied)
            }
            TimelineCommand::Trim { track_id, element_id, trim_start, trim_end } => {
                (ops::trim(tracks, track_id, element_id, trim_start, trim_end)?, Applied)
            }
            TimelineCommand::SetStartTime { track_id, element_id, start_time, ripple: false } => {
                (ops::set_start_time(tracks, track_id, element_id, start_time)?, Applied)
            }
            TimelineCommand::SetStartTime { track_id, element_id, start_time, ripple: true } => {
                (ops::set_start_time_with_ripple(tracks, track_id, element_id, start_time)?, Applied)
            }
            TimelineCommand::Split { track_id, element_id, split_time, keep } => match keep {
                SplitKeep::Both => {
                    let (next, right) = ops::split(tracks, track_id, element_id, split_time)?;
                    (next, Element(right))
                }
                SplitKeep::Left => (ops::split_keep_left(tracks, track_id, element_id, split_time)?, Applied),
                SplitKeep::Right => (ops::split_keep_right(tracks, track_id, element_id, split_time)?, Applied),
            },
            TimelineCommand::DeleteTimeRange { start, end, options } => {
                (ops::delete_time_range(tracks, start, end, &options)?, Applied)
            }
            TimelineCommand::UpdateDuration { track_id, element_id, duration } => {
                (ops::update_element_duration(tracks, track_id, element_id, duration)?, Applied)
            }
            TimelineCommand::ToggleHidden { track_id, element_id } => {
                (ops::toggle_element_hidden(tracks, track_id, element_id)?, Applied)
            }
            TimelineCommand::UpdateText { track_id, element_id, content } => {
                (ops::update_text_content(tracks, track_id, element_id, content)?, Applied)
            }
            TimelineCommand::UpdateProps { track_id, element_id, props } => {
                (ops::update_composition_props(tracks, track_id, element_id, props)?, Applied)
            }
            TimelineCommand::AddEffect { track_id, element_id, effect_id } => {
                (ops::add_effect(tracks, track_id, element_id, &effect_id)?, Applied)
            }
            TimelineCommand::RemoveEffect { track_id, element_id, effect_id } => {
                (ops::remove_effect(tracks, track_id, element_id, &effect_id)?, Applied)
            }
            TimelineCommand::Duplicate { track_id, element_id } => {
                let (next, id) = ops::duplicate_element(tracks, track_id, element_id)?;
                (next, Element(id))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::fixtures::*;

    #[test]
    fn commands_round_trip_through_json() {
        let cmd = TimelineCommand::Split {
            track_id: TrackId::new(),
            element_id: ElementId::new(),
            split_time: 1.5,
            keep: SplitKeep::Left,
        };
        let raw = serde_json::to_string(&cmd).unwrap();
        assert!(raw.contains(r#""command":"split""#));
        let back: TimelineCommand = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, cmd);
    }

    #[test]
    fn split_command_reports_right_half() {
        let tracks = main_with(&[(0.0, 4.0)]);
        let cmd = TimelineCommand::Split {
            track_id: tracks[0].id,
            element_id: tracks[0].elements[0].id,
            split_time: 2.0,
            keep: SplitKeep::Both,
        };
        let (next, outcome) = cmd.apply(&tracks).unwrap();
        let CommandOutcome::Element(right) = outcome else { panic!("expected element outcome") };
        assert!(next[0].element(right).is_some());
    }
}
