//! Detection event log.
//!
//! Failures inside the entity resolver never reach the caller. They are
//! reported here instead, one structured warning per event.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::redact::redact_sensitive_data;

/// Target of every detection event; filter on it to route them separately.
pub const DETECTION_TARGET: &str = "parley::detection";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DetectionEvent {
    /// A detector returned an error; its output for the call is discarded.
    DetectorFailed {
        detector: String,
        error: String,
        text: String,
    },
    /// A detector produced a hit without a usable span.
    ContractViolation { detector: String, message: String },
    /// Detectors that could not be scheduled because they wait on each other.
    DependencyCycle { detectors: Vec<String> },
}

impl DetectionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            DetectionEvent::DetectorFailed { .. } => "detector_failed",
            DetectionEvent::ContractViolation { .. } => "contract_violation",
            DetectionEvent::DependencyCycle { .. } => "dependency_cycle",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DetectionLogEntry {
    pub timestamp: DateTime<Utc>,
    pub event: DetectionEvent,
}

pub struct DetectionEventLogger;

impl DetectionEventLogger {
    /// Redact user-supplied text and emit the event as a single warning.
    pub fn log_event(mut event: DetectionEvent) -> DetectionLogEntry {
        match &mut event {
            DetectionEvent::DetectorFailed { error, text, .. } => {
                *error = redact_sensitive_data(error);
                *text = redact_sensitive_data(text);
            }
            DetectionEvent::ContractViolation { message, .. } => {
                *message = redact_sensitive_data(message);
            }
            DetectionEvent::DependencyCycle { .. } => {}
        }

        let entry = DetectionLogEntry {
            timestamp: Utc::now(),
            event,
        };
        let payload = serde_json::to_string(&entry).unwrap_or_else(|_| format!("{entry:?}"));
        warn!(
            target: DETECTION_TARGET,
            kind = entry.event.kind(),
            event = %payload,
            "Detection event"
        );
        entry
    }
}
