//! RPC boundary to the remote CI platform.
//!
//! [`CiClient`] exposes the four remote operations the dispatcher needs. An
//! implementation reports the raw status of each call in [`ApiResponse`];
//! deciding which statuses count as success is left to the caller.
//!
//! The production implementation lives in [`crate::github`], an in-memory
//! fake in [`crate::fakes`].

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Repository coordinates, displayed as `owner/repo`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoSlug {
    pub owner: String,
    pub repo: String,
}

impl RepoSlug {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        RepoSlug {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Identifies a workflow definition either by numeric id or by file name
/// (or a regular expression over its path).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowRef {
    Id(u64),
    File(String),
}

impl fmt::Display for WorkflowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowRef::Id(id) => write!(f, "{id}"),
            WorkflowRef::File(name) => write!(f, "{name}"),
        }
    }
}

/// Raw outcome of one RPC call.
///
/// `data` is only meaningful when `status` is the operation's success status;
/// otherwise implementations fill it with `Default::default()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(status: u16, data: T) -> Self {
        ApiResponse { status, data }
    }
}

impl<T: Default> ApiResponse<T> {
    /// A response whose body was not decoded.
    pub fn status_only(status: u16) -> Self {
        ApiResponse {
            status,
            data: T::default(),
        }
    }
}

/// A workflow definition stored in the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    /// Path of the definition file, e.g. `.github/workflows/deploy.yml`.
    pub path: String,
}

/// One execution of a workflow definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    /// Web page of the run as reported by the platform.
    #[serde(default)]
    pub html_url: Option<String>,
}

impl WorkflowRun {
    pub fn new(id: u64) -> Self {
        WorkflowRun { id, html_url: None }
    }

    pub fn with_html_url(mut self, html_url: &str) -> Self {
        self.html_url = Some(html_url.to_string());
        self
    }
}

/// A unit of parallel work within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    /// Absent until the job has been picked up by a runner.
    #[serde(default)]
    pub steps: Vec<JobStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStep {
    pub name: String,
}

/// Remote operations needed to dispatch a workflow and find its run.
#[async_trait]
pub trait CiClient: Send + Sync {
    /// Trigger a workflow. Succeeds with 204.
    async fn dispatch_workflow(
        &self,
        repo: &RepoSlug,
        workflow: &WorkflowRef,
        git_ref: &str,
        inputs: &BTreeMap<String, String>,
    ) -> Result<ApiResponse<()>>;

    /// List the repository's workflow definitions. Succeeds with 200.
    async fn list_workflows(&self, repo: &RepoSlug) -> Result<ApiResponse<Vec<WorkflowDefinition>>>;

    /// List the most recent runs of a workflow, newest first. Succeeds with 200.
    async fn list_workflow_runs(
        &self,
        repo: &RepoSlug,
        workflow_id: u64,
        per_page: u8,
        branch: Option<&str>,
    ) -> Result<ApiResponse<Vec<WorkflowRun>>>;

    /// List the jobs of the most recent attempt of a run. Succeeds with 200.
    async fn list_jobs_for_run(
        &self,
        repo: &RepoSlug,
        run_id: u64,
    ) -> Result<ApiResponse<Vec<Job>>>;
}
