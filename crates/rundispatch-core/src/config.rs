//! Dispatch configuration.
//!
//! Values are gathered by the caller (the CLI reads flags and environment
//! variables) and handed to the [`crate::Dispatcher`] explicitly.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;

use crate::client::{RepoSlug, WorkflowRef};
use crate::error::{DispatchError, Result};

pub const DEFAULT_SERVER_URL: &str = "https://github.com";
pub const DEFAULT_WORKFLOW_TIMEOUT: Duration = Duration::from_secs(300);
/// Workflow input that carries the correlation token.
pub const DISTINCT_ID_INPUT: &str = "distinct_id";

/// Everything needed to dispatch one workflow and find its run.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub repo: RepoSlug,
    /// Ref the workflow runs against, e.g. `refs/heads/main`.
    pub git_ref: String,
    pub workflow: WorkflowRef,
    pub workflow_inputs: BTreeMap<String, String>,
    /// Overall budget for locating the dispatched run.
    pub workflow_timeout: Duration,
    /// Web URL used to build run links.
    pub server_url: String,
}

impl DispatchConfig {
    pub fn new(repo: RepoSlug, git_ref: &str, workflow: WorkflowRef) -> Self {
        DispatchConfig {
            repo,
            git_ref: git_ref.to_string(),
            workflow,
            workflow_inputs: BTreeMap::new(),
            workflow_timeout: DEFAULT_WORKFLOW_TIMEOUT,
            server_url: DEFAULT_SERVER_URL.to_string(),
        }
    }

    pub fn with_inputs(mut self, inputs: BTreeMap<String, String>) -> Self {
        self.workflow_inputs = inputs;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.workflow_timeout = timeout;
        self
    }

    pub fn with_server_url(mut self, server_url: &str) -> Self {
        self.server_url = server_url.trim_end_matches('/').to_string();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.repo.owner.trim().is_empty() {
            return Err(DispatchError::InvalidConfig("owner must not be empty".into()));
        }
        if self.repo.repo.trim().is_empty() {
            return Err(DispatchError::InvalidConfig("repo must not be empty".into()));
        }
        if self.git_ref.trim().is_empty() {
            return Err(DispatchError::InvalidConfig("ref must not be empty".into()));
        }
        if self.workflow_timeout.is_zero() {
            return Err(DispatchError::InvalidConfig(
                "workflow timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Browser link to a run.
    pub fn run_url(&self, run_id: u64) -> String {
        format!(
            "{}/{}/{}/actions/runs/{}",
            self.server_url, self.repo.owner, self.repo.repo, run_id
        )
    }
}

impl WorkflowRef {
    /// Digits-only values are workflow ids, anything else is a file pattern.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(DispatchError::InvalidConfig("workflow must not be empty".into()));
        }
        if value.bytes().all(|b| b.is_ascii_digit()) {
            let id = value
                .parse()
                .map_err(|e| DispatchError::InvalidConfig(format!("workflow id {value}: {e}")))?;
            return Ok(WorkflowRef::Id(id));
        }
        Ok(WorkflowRef::File(value.to_string()))
    }
}

/// Parse a JSON object of workflow inputs.
///
/// Numbers and booleans are accepted and passed on in their string form,
/// since dispatch inputs are always strings on the wire.
pub fn parse_workflow_inputs(raw: &str) -> Result<BTreeMap<String, String>> {
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    let parsed: Value = serde_json::from_str(raw)?;
    let Value::Object(map) = parsed else {
        return Err(DispatchError::InvalidConfig(
            "workflow inputs must be a JSON object".into(),
        ));
    };

    map.into_iter()
        .map(|(key, value)| match value {
            Value::String(s) => Ok((key, s)),
            Value::Number(n) => Ok((key, n.to_string())),
            Value::Bool(b) => Ok((key, b.to_string())),
            other => Err(DispatchError::InvalidConfig(format!(
                "workflow input '{key}' must be a string, number or boolean, got {other}"
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn config() -> DispatchConfig {
        DispatchConfig::new(
            RepoSlug::new("octo", "widgets"),
            "refs/heads/main",
            WorkflowRef::File("deploy.yml".into()),
        )
    }

    #[test]
    fn test_workflow_ref_parse() {
        assert_eq!(WorkflowRef::parse("1234").unwrap(), WorkflowRef::Id(1234));
        assert_eq!(
            WorkflowRef::parse(" deploy.yml ").unwrap(),
            WorkflowRef::File("deploy.yml".into())
        );
        assert_eq!(
            WorkflowRef::parse("12-release.yml").unwrap(),
            WorkflowRef::File("12-release.yml".into())
        );
        assert!(WorkflowRef::parse("").is_err());
    }

    #[test]
    fn test_parse_workflow_inputs_mixed_scalars() {
        let inputs =
            parse_workflow_inputs(r#"{"env": "staging", "replicas": 3, "dry_run": false}"#)
                .expect("parse");
        assert_eq!(inputs.get("env").map(String::as_str), Some("staging"));
        assert_eq!(inputs.get("replicas").map(String::as_str), Some("3"));
        assert_eq!(inputs.get("dry_run").map(String::as_str), Some("false"));
    }

    #[test]
    fn test_parse_workflow_inputs_empty() {
        assert!(parse_workflow_inputs("").unwrap().is_empty());
        assert!(parse_workflow_inputs("  ").unwrap().is_empty());
        assert!(parse_workflow_inputs("{}").unwrap().is_empty());
    }

    #[test]
    fn test_parse_workflow_inputs_rejects_nested() {
        let err = parse_workflow_inputs(r#"{"matrix": {"os": "linux"}}"#).unwrap_err();
        assert!(err.to_string().contains("matrix"));

        let err = parse_workflow_inputs(r#"["a", "b"]"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);

        assert!(parse_workflow_inputs("{not json").is_err());
    }

    #[test]
    fn test_validate() {
        assert!(config().validate().is_ok());

        let mut bad = config();
        bad.repo.owner = String::new();
        assert!(bad.validate().is_err());

        let bad = config().with_timeout(Duration::ZERO);
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.git_ref = " ".into();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_run_url() {
        let cfg = config().with_server_url("https://ghe.example.com/");
        assert_eq!(
            cfg.run_url(987),
            "https://ghe.example.com/octo/widgets/actions/runs/987"
        );
        assert_eq!(
            config().run_url(1),
            "https://github.com/octo/widgets/actions/runs/1"
        );
    }
}
