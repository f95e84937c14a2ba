use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{NotFound, Result};
use crate::model::{check_time, check_trim, ElementDraft, ElementPayload};

/// What a payload points at outside the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ContentRef {
    Media(String),
    Composition(String),
}

impl ContentRef {
    pub fn of(payload: &ElementPayload) -> Option<Self> {
        match payload {
            ElementPayload::Media { media_id, .. } => Some(ContentRef::Media(media_id.clone())),
            ElementPayload::NestedComposition { composition_id, .. } => Some(ContentRef::Composition(composition_id.clone())),
            _ => None,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ContentRef::Media(id) | ContentRef::Composition(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentInfo {
    pub duration: f64,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// Resolves content references to intrinsic properties. Implemented by the
/// host's media library; the engine never decodes anything itself.
pub trait ContentRegistry {
    fn resolve(&self, content: &ContentRef) -> Option<ContentInfo>;
}

impl ContentRegistry for HashMap<ContentRef, ContentInfo> {
    fn resolve(&self, content: &ContentRef) -> Option<ContentInfo> { self.get(content).cloned() }
}

impl ElementDraft {
    /// Builds a draft whose duration comes from the registry. Payloads without
    /// a content reference (text, stickers...) need an explicit duration and
    /// go through [`ElementDraft::new`] instead.
    pub fn from_content(
        registry: &dyn ContentRegistry,
        name: impl Into<String>,
        payload: ElementPayload,
        start_time: f64,
    ) -> Result<Self> {
        payload.validate()?;
        check_time("start_time", start_time)?;
        let content = ContentRef::of(&payload)
            .ok_or_else(|| NotFound::Content(payload.kind_name().to_string()))?;
        let info = registry.resolve(&content).ok_or_else(|| NotFound::Content(content.id().to_string()))?;
        check_trim(0.0, 0.0, info.duration)?;
        Ok(ElementDraft::new(name, payload, start_time, info.duration))
    }
}
