use thiserror::Error;

use crate::model::{ElementId, TrackId, TrackKind};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{payload} element cannot be placed on a {track} track")]
    IncompatibleTrack { track: TrackKind, payload: &'static str },
    #[error("{kind} element is missing its content reference")]
    MissingContent { kind: &'static str },
    #[error("{kind} element is missing its body content")]
    MissingBody { kind: &'static str },
    #[error("invalid {field}: {value}")]
    InvalidTime { field: &'static str, value: f64 },
    #[error("invalid trim {trim_start}/{trim_end} for duration {duration}")]
    InvalidTrim { trim_start: f64, trim_end: f64, duration: f64 },
    #[error("split time {split_time} is not inside [{start}, {end})")]
    SplitOutOfRange { split_time: f64, start: f64, end: f64 },
    #[error("invalid time range [{start}, {end})")]
    InvalidRange { start: f64, end: f64 },
    #[error("element would overlap {existing} on the target track")]
    Overlap { existing: ElementId },
    #[error("the main track cannot be removed")]
    MainTrackProtected,
    #[error("element does not carry editable text")]
    NotTextual,
    #[error("element is not a nested composition")]
    NotNestedComposition,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFound {
    #[error("track {0} not found")]
    Track(TrackId),
    #[error("element {0} not found")]
    Element(ElementId),
    #[error("content {0} not registered")]
    Content(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    NotFound(#[from] NotFound),
    #[error("structural invariant violated: {0}")]
    Invariant(String),
}

impl TimelineError {
    pub fn is_validation(&self) -> bool { matches!(self, TimelineError::Validation(_)) }

    pub fn is_not_found(&self) -> bool { matches!(self, TimelineError::NotFound(_)) }
}

pub type Result<T, E = TimelineError> = std::result::Result<T, E>;
