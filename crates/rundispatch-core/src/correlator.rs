//! Single-shot queries that narrow down candidate runs and read their steps.
//!
//! Nothing here retries. Polling policy is layered on top by the dispatcher.

use std::collections::HashSet;

use regex::Regex;

use crate::client::{CiClient, Job, RepoSlug, WorkflowRun};
use crate::error::{expect_status, DispatchError, Result};
use crate::obs;
use crate::refs::GitRefKind;

const PAGE_SIZE_UNFILTERED: u8 = 10;
const PAGE_SIZE_BRANCH: u8 = 5;

/// A run listing query derived from a workflow id and a git ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollQuery {
    pub workflow_id: u64,
    pub branch: Option<String>,
    pub per_page: u8,
}

impl PollQuery {
    /// Filter by branch only for branch refs with a resolvable short name.
    pub fn for_ref(workflow_id: u64, git_ref: &str) -> Self {
        let branch = GitRefKind::classify(git_ref)
            .branch_filter()
            .map(str::to_string);
        let per_page = if branch.is_some() {
            PAGE_SIZE_BRANCH
        } else {
            PAGE_SIZE_UNFILTERED
        };
        PollQuery {
            workflow_id,
            branch,
            per_page,
        }
    }
}

/// Distinct step names across all jobs, in first-seen order.
pub fn aggregate_step_names(jobs: &[Job]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut steps = Vec::new();
    for step in jobs.iter().flat_map(|job| job.steps.iter()) {
        if seen.insert(step.name.as_str()) {
            steps.push(step.name.clone());
        }
    }
    steps
}

/// Run and step lookups against one repository.
pub struct Correlator<'a, C: CiClient + ?Sized> {
    client: &'a C,
    repo: &'a RepoSlug,
}

impl<'a, C: CiClient + ?Sized> Correlator<'a, C> {
    pub fn new(client: &'a C, repo: &'a RepoSlug) -> Self {
        Correlator { client, repo }
    }

    /// Id of the first workflow whose path matches `pattern` as a regular
    /// expression.
    ///
    /// When several definitions match, the first one in listing order wins.
    /// The API does not promise a stable order, so prefer patterns that match
    /// exactly one path.
    pub async fn find_workflow_id(&self, pattern: &str) -> Result<u64> {
        let matcher = Regex::new(pattern).map_err(|source| DispatchError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        let response = self.client.list_workflows(self.repo).await?;
        expect_status("list workflows", 200, response.status)?;

        let workflow_id = response
            .data
            .iter()
            .find(|workflow| matcher.is_match(&workflow.path))
            .map(|workflow| workflow.id)
            .ok_or_else(|| DispatchError::WorkflowNotFound {
                pattern: pattern.to_string(),
            })?;

        obs::emit_workflow_resolved(&self.repo.to_string(), pattern, workflow_id);
        Ok(workflow_id)
    }

    /// Ids of the most recent runs of a workflow, in listing order.
    pub async fn find_execution_ids(&self, workflow_id: u64, git_ref: &str) -> Result<Vec<u64>> {
        let runs = self.find_runs(workflow_id, git_ref).await?;
        Ok(runs.into_iter().map(|run| run.id).collect())
    }

    /// Most recent runs of a workflow, in listing order.
    pub async fn find_runs(&self, workflow_id: u64, git_ref: &str) -> Result<Vec<WorkflowRun>> {
        let query = PollQuery::for_ref(workflow_id, git_ref);
        let response = self
            .client
            .list_workflow_runs(
                self.repo,
                query.workflow_id,
                query.per_page,
                query.branch.as_deref(),
            )
            .await?;
        expect_status("list workflow runs", 200, response.status)?;

        let run_ids: Vec<u64> = response.data.iter().map(|run| run.id).collect();
        obs::emit_runs_fetched(
            &self.repo.to_string(),
            workflow_id,
            query.branch.as_deref(),
            &run_ids,
        );
        Ok(response.data)
    }

    /// Step names of the latest attempt of a run, deduplicated across jobs.
    pub async fn find_step_names(&self, run_id: u64) -> Result<Vec<String>> {
        let response = self
            .client
            .list_jobs_for_run(self.repo, run_id)
            .await?;
        expect_status("list jobs for run", 200, response.status)?;

        let steps = aggregate_step_names(&response.data);
        let job_ids: Vec<u64> = response.data.iter().map(|job| job.id).collect();
        obs::emit_steps_fetched(&self.repo.to_string(), run_id, &job_ids, &steps);
        Ok(steps)
    }
}
