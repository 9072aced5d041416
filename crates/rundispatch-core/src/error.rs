//! Error taxonomy for dispatch and run correlation.

use thiserror::Error;

/// Coarse classification of a [`DispatchError`], for callers that branch on
/// the kind of failure rather than its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The remote API answered with an unexpected status.
    Protocol,
    /// The workflow could not be resolved from its file pattern.
    NotFound,
    /// A polling deadline elapsed. The remote outcome is unknown.
    Timeout,
    /// Configuration, transport or decoding failures.
    Other,
}

/// Errors produced while dispatching a workflow and locating its run.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A single RPC call returned a status other than the one it succeeds on.
    #[error("{operation}: expected status {expected} but received {actual}")]
    Protocol {
        operation: &'static str,
        expected: u16,
        actual: u16,
    },

    /// No workflow definition path matched the pattern.
    #[error("unable to find ID for workflow: {pattern}")]
    WorkflowNotFound { pattern: String },

    /// A polling deadline elapsed before a non-empty result was seen.
    #[error("timed out after {timeout_ms}ms while attempting to fetch data")]
    Timeout { timeout_ms: u64 },

    /// The workflow pattern is not a valid regular expression.
    #[error("invalid workflow pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Rejected configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// HTTP transport failure (connection, TLS, body decoding).
    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::Protocol { .. } => ErrorKind::Protocol,
            DispatchError::WorkflowNotFound { .. } => ErrorKind::NotFound,
            DispatchError::Timeout { .. } => ErrorKind::Timeout,
            DispatchError::InvalidPattern { .. }
            | DispatchError::InvalidConfig(_)
            | DispatchError::Transport(_)
            | DispatchError::Serialization(_) => ErrorKind::Other,
        }
    }

    /// True for a protocol error carrying HTTP 404.
    pub fn is_not_found_status(&self) -> bool {
        matches!(self, DispatchError::Protocol { actual: 404, .. })
    }
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        DispatchError::Transport(err.to_string())
    }
}

/// Result type for dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Map a status other than `expected` to [`DispatchError::Protocol`].
pub(crate) fn expect_status(operation: &'static str, expected: u16, actual: u16) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(DispatchError::Protocol {
            operation,
            expected,
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_displays_both_statuses() {
        let err = DispatchError::Protocol {
            operation: "dispatch workflow",
            expected: 204,
            actual: 422,
        };
        let msg = err.to_string();
        assert!(msg.contains("dispatch workflow"));
        assert!(msg.contains("204"));
        assert!(msg.contains("422"));
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn test_kinds_are_distinct_per_variant() {
        let not_found = DispatchError::WorkflowNotFound {
            pattern: "deploy".to_string(),
        };
        assert_eq!(not_found.kind(), ErrorKind::NotFound);
        assert!(not_found.to_string().contains("deploy"));

        let timeout = DispatchError::Timeout { timeout_ms: 1500 };
        assert_eq!(timeout.kind(), ErrorKind::Timeout);
        assert!(timeout.to_string().contains("1500ms"));

        let config = DispatchError::InvalidConfig("owner must not be empty".to_string());
        assert_eq!(config.kind(), ErrorKind::Other);
    }

    #[test]
    fn test_not_found_status_only_matches_404() {
        let missing = DispatchError::Protocol {
            operation: "list jobs for run",
            expected: 200,
            actual: 404,
        };
        assert!(missing.is_not_found_status());

        let forbidden = DispatchError::Protocol {
            operation: "list jobs for run",
            expected: 200,
            actual: 403,
        };
        assert!(!forbidden.is_not_found_status());
        assert!(!DispatchError::Timeout { timeout_ms: 1 }.is_not_found_status());
    }
}
