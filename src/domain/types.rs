//! Shared types for the attendance session

use serde::Serialize;
use uuid::Uuid;

/// Generate a new UUIDv7 (time-sortable) capture id
pub fn new_capture_id() -> String {
    Uuid::now_v7().to_string()
}

/// Get current epoch milliseconds
#[inline]
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Session state machine.
///
/// `Idle -> AwaitingImage -> Submitting -> Normalizing -> Aggregated` and
/// back to `AwaitingImage` for the next capture. A failed submission lands
/// in `Error`, which returns to `AwaitingImage` on the next user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    AwaitingImage,
    Submitting,
    Normalizing,
    Aggregated,
    Error,
}

impl SessionPhase {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::AwaitingImage => "awaiting_image",
            SessionPhase::Submitting => "submitting",
            SessionPhase::Normalizing => "normalizing",
            SessionPhase::Aggregated => "aggregated",
            SessionPhase::Error => "error",
        }
    }
}

/// One submitted image plus the raw textual response from the extraction
/// service. Ephemeral - created per submission, discarded after
/// normalization; only the id and timestamp outlive it (in logs and in the
/// roster's sighting history).
#[derive(Debug, Clone)]
pub struct CaptureEvent {
    /// UUIDv7 capture id
    pub id: String,
    /// Submission time (epoch ms)
    pub ts: u64,
    /// Raw free-text reply from the extraction service
    pub raw_text: String,
}

impl CaptureEvent {
    pub fn new(raw_text: String) -> Self {
        Self { id: new_capture_id(), ts: epoch_ms(), raw_text }
    }
}

/// Outcome of one processed capture, surfaced to the UI
#[derive(Debug, Clone, Serialize)]
pub struct CaptureSummary {
    /// Capture id (UUIDv7)
    pub capture_id: String,
    /// Submission time (epoch ms)
    pub ts: u64,
    /// Distinct names recognized in this capture
    pub names_seen: usize,
    /// Names not previously present in the roster
    pub new_names: usize,
    /// True when the response normalized to nothing ("no names found")
    pub no_names_found: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_as_str() {
        assert_eq!(SessionPhase::Idle.as_str(), "idle");
        assert_eq!(SessionPhase::AwaitingImage.as_str(), "awaiting_image");
        assert_eq!(SessionPhase::Error.as_str(), "error");
    }

    #[test]
    fn test_capture_event_ids_unique() {
        let a = CaptureEvent::new("Alice".to_string());
        let b = CaptureEvent::new("Alice".to_string());
        assert_ne!(a.id, b.id);
        assert!(a.ts > 0);
    }
}
