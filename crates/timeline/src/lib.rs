//! Multi-track timeline editing engine.
//!
//! Tracks hold non-overlapping elements; every edit is a pure function from
//! one track list to the next, owned and versioned by [`TimelineStore`].
//! The [`sync`] module keeps nested-composition players aligned with the
//! main playhead.

pub mod command;
pub mod config;
pub mod error;
pub mod history;
pub mod interaction;
pub mod model;
pub mod ops;
pub mod overlap;
pub mod query;
pub mod registry;
pub mod store;
pub mod sync;

pub use command::{CommandOutcome, SplitKeep, TimelineCommand};
pub use config::{EngineConfig, SyncConfig};
pub use error::{NotFound, Result, TimelineError, ValidationError};
pub use history::{CommandHistory, HistoryEntry, Snapshot};
pub use model::{
    CaptionSegment, Element, ElementDraft, ElementId, ElementPayload, MediaKind, TextStyle, Track, TrackId,
    TrackKind, TIME_EPSILON,
};
pub use ops::{DeleteRangeOptions, RangeOverlap};
pub use overlap::OverlapPolicy;
pub use registry::{ContentInfo, ContentRef, ContentRegistry};
pub use store::{SharedStore, StoreEvent, TimelineStore};
pub use sync::{Frame, FrameSynchronizer, NestedInstanceControl, SyncCommand};
