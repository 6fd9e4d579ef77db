//! Structured Logger
//!
//! Wraps `tracing` to provide console output, optional JSON file rotation
//! (NDJSON), and environment-based level control.

use std::path::PathBuf;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone)]
pub struct LoggerOptions {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for `concierge.log.YYYY-MM-DD`; no file output when `None`.
    pub log_dir: Option<PathBuf>,
    /// Emit JSON lines on the console instead of human-readable text.
    pub json_console: bool,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            log_dir: None,
            json_console: false,
        }
    }
}

/// Initialize the global structured logger.
///
/// Console output goes to stderr so it never interleaves with REPL replies.
/// Calling it twice is harmless; the second call is ignored.
pub fn init_logger(options: &LoggerOptions) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&options.level));

    let file_layer = options.log_dir.as_ref().map(|dir| {
        let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, "concierge.log");
        fmt::layer()
            .json()
            .with_writer(file_appender)
            .with_ansi(false)
    });

    let (json_console, text_console) = if options.json_console {
        (Some(fmt::layer().json().with_writer(std::io::stderr)), None)
    } else {
        (
            None,
            Some(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_ansi(true),
            ),
        )
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(json_console)
        .with(text_console)
        .with(file_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let options = LoggerOptions {
            level: "debug".into(),
            ..LoggerOptions::default()
        };
        init_logger(&options);
        init_logger(&options);
        tracing::debug!("logger initialised twice");
    }
}
