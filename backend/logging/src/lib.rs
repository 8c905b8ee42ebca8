//! Structured logging for the parley engine.
//!
//! Console and rolling NDJSON output, redaction of user content before it
//! reaches a log line, and the detection event log written by the entity
//! resolver.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{DetectionEvent, DetectionEventLogger, DetectionLogEntry, DETECTION_TARGET};
pub use logger::{init_logger, LOG_FILE_PREFIX};
pub use redact::redact_sensitive_data;
