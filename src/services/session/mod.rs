//! Session state and submission orchestration
//!
//! The Session is the one piece of state with a lifecycle. It owns:
//! - the attendance roster (the running tally)
//! - the API credential (memory only, never persisted or logged)
//! - the extractor, normalizer and exporter collaborators
//! - the session phase state machine
//!
//! Handlers receive the session explicitly (behind `Arc<tokio::sync::Mutex>`
//! in the binaries); holding the lock across `submit` is what enforces the
//! single-in-flight submission rule.


use crate::domain::roster::{AttendeeRow, Roster};
use crate::domain::types::{CaptureEvent, CaptureSummary, SessionPhase};
use crate::infra::config::Config;
use crate::infra::stats::Stats;
use crate::io::export::{ExportError, Exporter};
use crate::io::extractor::{ExtractNames, ServiceError};
use crate::services::normalizer::Normalizer;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Render model for the tally views (HTML table, JSON API, TUI table)
#[derive(Debug, Clone, Serialize)]
pub struct RosterSnapshot {
    pub phase: SessionPhase,
    pub credential_set: bool,
    pub attendees: Vec<AttendeeRow>,
    pub total_attendees: usize,
    pub total_sightings: u64,
}

/// One interactive attendance-counting session
pub struct Session<E> {
    extractor: E,
    normalizer: Normalizer,
    exporter: Exporter,
    roster: Roster,
    phase: SessionPhase,
    api_key: Option<String>,
    stats: Arc<Stats>,
}

impl<E: ExtractNames> Session<E> {
    pub fn new(config: &Config, extractor: E, stats: Arc<Stats>) -> Self {
        Self {
            extractor,
            normalizer: Normalizer::from_config(config),
            exporter: Exporter::from_config(config),
            roster: Roster::new(),
            phase: SessionPhase::Idle,
            api_key: None,
            stats,
        }
    }

    /// Store the API credential for this session (memory only)
    pub fn set_credential(&mut self, api_key: String) {
        self.acknowledge_error();
        self.api_key = Some(api_key);
        if self.phase == SessionPhase::Idle {
            self.set_phase(SessionPhase::AwaitingImage);
        }
        info!("credential_set");
    }

    pub fn credential_set(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn roster_len(&self) -> usize {
        self.roster.len()
    }

    /// Drive one capture through Submitting -> Normalizing -> Aggregated.
    /// On any service error the roster is left unchanged and the session
    /// lands in `Error` until the next user action.
    pub async fn submit(&mut self, image: &[u8]) -> Result<CaptureSummary, ServiceError> {
        self.acknowledge_error();

        let Some(api_key) = self.api_key.clone() else {
            self.set_phase(SessionPhase::Error);
            return Err(ServiceError::MissingCredential);
        };

        self.set_phase(SessionPhase::Submitting);
        let start = Instant::now();
        let raw_text = match self.extractor.extract_names(image, &api_key).await {
            Ok(raw) => raw,
            Err(e) => {
                self.stats.record_failure(start.elapsed().as_millis() as u64);
                self.set_phase(SessionPhase::Error);
                return Err(e);
            }
        };
        let latency_ms = start.elapsed().as_millis() as u64;

        self.set_phase(SessionPhase::Normalizing);
        let capture = CaptureEvent::new(raw_text);
        let names = self.normalizer.normalize(&capture.raw_text);

        if names.is_empty() {
            // NormalizationWarning: not fatal, roster untouched
            self.stats.record_empty(latency_ms);
            self.set_phase(SessionPhase::AwaitingImage);
            warn!(capture_id = %capture.id, "no_names_found");
            return Ok(CaptureSummary {
                capture_id: capture.id,
                ts: capture.ts,
                names_seen: 0,
                new_names: 0,
                no_names_found: true,
            });
        }

        let outcome = self.roster.record(&names, capture.ts);
        self.stats.record_capture(latency_ms, outcome.seen as u64);
        self.set_phase(SessionPhase::Aggregated);

        info!(
            capture_id = %capture.id,
            names_seen = %outcome.seen,
            new_names = %outcome.new_names,
            attendees = %self.roster.len(),
            latency_ms = %latency_ms,
            "capture_aggregated"
        );

        Ok(CaptureSummary {
            capture_id: capture.id,
            ts: capture.ts,
            names_seen: outcome.seen,
            new_names: outcome.new_names,
            no_names_found: false,
        })
    }

    /// Deterministic render model, attendees alphabetical by name
    pub fn snapshot(&self) -> RosterSnapshot {
        RosterSnapshot {
            phase: self.phase,
            credential_set: self.api_key.is_some(),
            attendees: self.roster.rows(),
            total_attendees: self.roster.len(),
            total_sightings: self.roster.total_sightings(),
        }
    }

    /// Export the tally to a delimited file; session state is unaffected
    pub fn export(&mut self) -> Result<PathBuf, ExportError> {
        self.acknowledge_error();
        let path = self.exporter.export(&self.roster.rows())?;
        self.stats.record_export();
        Ok(path)
    }

    /// Clear the roster back to empty
    pub fn reset(&mut self) {
        self.roster.clear();
        self.set_phase(if self.api_key.is_some() {
            SessionPhase::AwaitingImage
        } else {
            SessionPhase::Idle
        });
        info!("session_reset");
    }

    /// `Error` is terminal for the failed capture only; any user action
    /// acknowledges it and returns the session to `AwaitingImage`
    fn acknowledge_error(&mut self) {
        if self.phase == SessionPhase::Error {
            self.set_phase(SessionPhase::AwaitingImage);
        }
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            debug!(from = %self.phase.as_str(), to = %phase.as_str(), "session_phase");
            self.phase = phase;
        }
    }
}
