//! Keeps nested-composition instances aligned with the main playhead.
//!
//! Playback flows one way: playhead time → active element set + local
//! frames → commands for the nested instances. Commands are advisory and
//! fire-and-forget; nothing here ever blocks the main clock.

mod active;
mod frames;
mod synchronizer;

pub use active::{get_active_elements, ActiveElement};
pub use frames::{frame_to_time, global_to_local_frame, local_to_global_frame, time_to_frame, ElementFrames, Frame};
pub use synchronizer::{dispatch_commands, FrameSynchronizer, NestedInstanceControl, SyncCommand};
