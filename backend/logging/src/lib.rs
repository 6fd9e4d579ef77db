//! Telemetry and structured logging components for Concierge.
//!
//! Handles log redaction, console and rolling NDJSON file output, and the
//! per-turn state event stream.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{TurnEvent, TurnEventLogger, TurnLogEntry, TURN_EVENTS_TARGET};
pub use logger::{LoggerOptions, init_logger};
pub use redact::redact_sensitive_data;
