pub mod intent_log;
pub mod session_store;
pub mod transcript;

pub use intent_log::{IntentLog, IntentRecord};
pub use session_store::{History, SessionStore, TurnGuard};
pub use transcript::TranscriptWriter;
