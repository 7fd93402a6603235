//! Domain models - core business types and the attendance roster
//!
//! This module contains the canonical data types used throughout the system:
//! - `Roster` - the running attendee -> sighting tally for one session
//! - `Sighting` - per-attendee capture history
//! - `CaptureEvent` - one submitted image plus its raw extraction response
//! - `SessionPhase` - the session state machine

pub mod roster;
pub mod types;

// Re-export commonly used types at module level
pub use roster::{AttendeeRow, Roster};
pub use types::{CaptureEvent, CaptureSummary, SessionPhase};
