//! Tracing subscriber setup for rundispatch binaries.
//!
//! Callers such as CI steps capture stdout line by line and parse the
//! `run_id=` / `run_url=` pairs the CLI prints there. Every log record is
//! therefore written to stderr, in either format, and stdout stays reserved
//! for command output.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Shape of log records on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line records.
    #[default]
    Text,
    /// Newline-delimited JSON records, one object per event.
    Json,
}

impl LogFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }

    fn layer(self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
        match self {
            LogFormat::Text => layer.boxed(),
            LogFormat::Json => layer.json().flatten_event(true).boxed(),
        }
    }
}

/// `RUST_LOG` when set, otherwise everything at `level` and above.
fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Install the global subscriber. Only the first call in a process takes
/// effect; later calls are ignored.
pub fn init_tracing(format: LogFormat, level: Level) {
    tracing_subscriber::registry()
        .with(format.layer())
        .with(env_filter(level))
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_json_flag() {
        assert_eq!(LogFormat::from_json_flag(true), LogFormat::Json);
        assert_eq!(LogFormat::from_json_flag(false), LogFormat::Text);
        assert_eq!(LogFormat::default(), LogFormat::Text);
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing(LogFormat::Text, Level::DEBUG);
        init_tracing(LogFormat::Json, Level::INFO);
        tracing::info!(event = "test", "still logging after second init");
    }
}
