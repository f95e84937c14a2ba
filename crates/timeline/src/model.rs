use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::ValidationError;

/// Times closer than this are treated as equal when comparing interval edges.
pub const TIME_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub Uuid);

impl TrackId {
    pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Default for TrackId {
    fn default() -> Self { Self::new() }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub Uuid);

impl ElementId {
    pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Default for ElementId {
    fn default() -> Self { Self::new() }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Media,
    Text,
    Markdown,
    Audio,
    Sticker,
    Captions,
    NestedComposition,
}

impl TrackKind {
    pub fn default_name(self) -> &'static str {
        match self {
            TrackKind::Media => "Media Track",
            TrackKind::Text => "Text Track",
            TrackKind::Markdown => "Markdown Track",
            TrackKind::Audio => "Audio Track",
            TrackKind::Sticker => "Sticker Track",
            TrackKind::Captions => "Captions Track",
            TrackKind::NestedComposition => "Composition Track",
        }
    }

    /// Whether an element carrying `payload` may live on a track of this kind.
    pub fn accepts(self, payload: &ElementPayload) -> bool {
        match (self, payload) {
            (TrackKind::Media, ElementPayload::Media { media_kind, .. }) => {
                matches!(media_kind, MediaKind::Video | MediaKind::Image)
            }
            (TrackKind::Audio, ElementPayload::Media { media_kind, .. }) => {
                matches!(media_kind, MediaKind::Audio)
            }
            (TrackKind::Text, ElementPayload::Text { .. }) => true,
            (TrackKind::Markdown, ElementPayload::Markdown { .. }) => true,
            (TrackKind::Sticker, ElementPayload::Sticker { .. }) => true,
            (TrackKind::Captions, ElementPayload::Captions { .. }) => true,
            (TrackKind::NestedComposition, ElementPayload::NestedComposition { .. }) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrackKind::Media => "media",
            TrackKind::Text => "text",
            TrackKind::Markdown => "markdown",
            TrackKind::Audio => "audio",
            TrackKind::Sticker => "sticker",
            TrackKind::Captions => "captions",
            TrackKind::NestedComposition => "nested_composition",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Image,
    Audio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    pub font_family: String,
    pub font_size: f32,
    pub color: String,
    pub background_color: Option<String>,
    pub bold: bool,
    pub italic: bool,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: "Arial".into(),
            font_size: 48.0,
            color: "#ffffff".into(),
            background_color: None,
            bold: false,
            italic: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Kind-specific element content. Unknown `type` tags fail deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementPayload {
    Media { media_id: String, media_kind: MediaKind },
    Text { content: String, #[serde(default)] style: TextStyle },
    Markdown { content: String, #[serde(default)] theme: Option<String> },
    Sticker { sticker_id: String },
    Captions { #[serde(default)] segments: Vec<CaptionSegment> },
    NestedComposition { composition_id: String, #[serde(default)] props: Map<String, Value> },
}

impl ElementPayload {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ElementPayload::Media { media_kind: MediaKind::Video, .. } => "video",
            ElementPayload::Media { media_kind: MediaKind::Image, .. } => "image",
            ElementPayload::Media { media_kind: MediaKind::Audio, .. } => "audio",
            ElementPayload::Text { .. } => "text",
            ElementPayload::Markdown { .. } => "markdown",
            ElementPayload::Sticker { .. } => "sticker",
            ElementPayload::Captions { .. } => "captions",
            ElementPayload::NestedComposition { .. } => "nested_composition",
        }
    }

    /// Track kind a new track should get when this payload needs one.
    pub fn preferred_track_kind(&self) -> TrackKind {
        match self {
            ElementPayload::Media { media_kind: MediaKind::Audio, .. } => TrackKind::Audio,
            ElementPayload::Media { .. } => TrackKind::Media,
            ElementPayload::Text { .. } => TrackKind::Text,
            ElementPayload::Markdown { .. } => TrackKind::Markdown,
            ElementPayload::Sticker { .. } => TrackKind::Sticker,
            ElementPayload::Captions { .. } => TrackKind::Captions,
            ElementPayload::NestedComposition { .. } => TrackKind::NestedComposition,
        }
    }

    /// Checks the fields each kind requires.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            ElementPayload::Media { media_id, .. } if media_id.trim().is_empty() => {
                Err(ValidationError::MissingContent { kind: self.kind_name() })
            }
            ElementPayload::Sticker { sticker_id } if sticker_id.trim().is_empty() => {
                Err(ValidationError::MissingContent { kind: self.kind_name() })
            }
            ElementPayload::NestedComposition { composition_id, .. } if composition_id.trim().is_empty() => {
                Err(ValidationError::MissingContent { kind: self.kind_name() })
            }
            ElementPayload::Text { content, .. } | ElementPayload::Markdown { content, .. }
                if content.trim().is_empty() =>
            {
                Err(ValidationError::MissingBody { kind: self.kind_name() })
            }
            _ => Ok(()),
        }
    }

    pub fn is_nested_composition(&self) -> bool {
        matches!(self, ElementPayload::NestedComposition { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    #[serde(default)]
    pub name: String,
    pub start_time: f64,
    pub duration: f64,
    #[serde(default)]
    pub trim_start: f64,
    #[serde(default)]
    pub trim_end: f64,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub effects: Vec<String>,
    #[serde(flatten)]
    pub payload: ElementPayload,
}

impl Element {
    pub fn effective_duration(&self) -> f64 { self.duration - self.trim_start - self.trim_end }

    pub fn effective_end(&self) -> f64 { self.start_time + self.effective_duration() }

    /// Half-open containment: `[start_time, effective_end)`.
    pub fn contains_time(&self, time: f64) -> bool {
        time >= self.start_time && time < self.effective_end()
    }

    /// Half-open interval overlap. Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &Element) -> bool {
        self.start_time < other.effective_end() - TIME_EPSILON
            && other.start_time < self.effective_end() - TIME_EPSILON
    }

    pub fn overlaps_range(&self, start: f64, end: f64) -> bool {
        self.start_time < end - TIME_EPSILON && start < self.effective_end() - TIME_EPSILON
    }

    pub(crate) fn check_timing(&self) -> Result<(), ValidationError> {
        check_time("start_time", self.start_time)?;
        check_trim(self.trim_start, self.trim_end, self.duration)
    }
}

pub(crate) fn check_time(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::InvalidTime { field, value });
    }
    Ok(())
}

pub(crate) fn check_trim(trim_start: f64, trim_end: f64, duration: f64) -> Result<(), ValidationError> {
    if !duration.is_finite() || duration <= 0.0 {
        return Err(ValidationError::InvalidTime { field: "duration", value: duration });
    }
    let valid = trim_start.is_finite()
        && trim_end.is_finite()
        && trim_start >= 0.0
        && trim_end >= 0.0
        && trim_start + trim_end < duration - TIME_EPSILON;
    if !valid {
        return Err(ValidationError::InvalidTrim { trim_start, trim_end, duration });
    }
    Ok(())
}

/// A finished element record waiting to be placed. Placement assigns the
/// identity and zero trim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDraft {
    #[serde(default)]
    pub name: String,
    pub start_time: f64,
    pub duration: f64,
    #[serde(flatten)]
    pub payload: ElementPayload,
}

impl ElementDraft {
    pub fn new(name: impl Into<String>, payload: ElementPayload, start_time: f64, duration: f64) -> Self {
        Self { name: name.into(), start_time, duration, payload }
    }

    pub(crate) fn into_element(self) -> Element {
        Element {
            id: ElementId::new(),
            name: self.name,
            start_time: self.start_time,
            duration: self.duration,
            trim_start: 0.0,
            trim_end: 0.0,
            hidden: false,
            effects: Vec::new(),
            payload: self.payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub kind: TrackKind,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub is_main: bool,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub elements: Vec<Element>,
}

impl Track {
    pub fn new(kind: TrackKind, position: i64) -> Self {
        Self {
            id: TrackId::new(),
            name: kind.default_name().to_string(),
            kind,
            muted: false,
            is_main: false,
            position,
            elements: Vec::new(),
        }
    }

    pub fn new_main() -> Self {
        Self { name: "Main Track".into(), is_main: true, ..Self::new(TrackKind::Media, 0) }
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> { self.elements.iter().find(|e| e.id == id) }

    pub(crate) fn element_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.iter_mut().find(|e| e.id == id)
    }

    pub fn end_time(&self) -> f64 {
        self.elements.iter().map(Element::effective_end).fold(0.0, f64::max)
    }
}
