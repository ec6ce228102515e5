//! Logging setup
//!
//! Filter directives come from `EYEORB_LOG` (same syntax as `RUST_LOG`),
//! defaulting to `info`.

use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Environment variable holding filter directives
pub const LOG_ENV: &str = "EYEORB_LOG";

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single line per event
    #[default]
    Compact,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = InitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(InitError::UnknownFormat(other.to_string())),
        }
    }
}

/// Errors emitted when configuring the tracing subscriber
#[derive(Debug, Error)]
pub enum InitError {
    #[error("unknown log format: {0}")]
    UnknownFormat(String),

    #[error("tracing has already been initialised")]
    AlreadyInitialised,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// Returns [`InitError::AlreadyInitialised`] when a subscriber is already
/// set; callers that do not care may ignore it.
pub fn init_tracing(format: LogFormat) -> Result<(), InitError> {
    let registry = Registry::default().with(env_filter());
    let result = match format {
        LogFormat::Compact => registry
            .with(tracing_subscriber::fmt::layer().compact().with_target(true))
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init(),
    };
    result.map_err(|_| InitError::AlreadyInitialised)
}
