//! In-memory fake of [`CiClient`] (testing only)
//!
//! `MemoryCiClient` replays scripted responses and records every call, so
//! polling behaviour can be asserted without a network.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::{
    ApiResponse, CiClient, Job, RepoSlug, WorkflowDefinition, WorkflowRef, WorkflowRun,
};
use crate::error::Result;

/// Remote operation, used to override statuses and count calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Dispatch,
    ListWorkflows,
    ListRuns,
    ListJobs,
}

/// A dispatch call as the fake received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedDispatch {
    pub repo: RepoSlug,
    pub workflow: WorkflowRef,
    pub git_ref: String,
    pub inputs: BTreeMap<String, String>,
}

/// A run listing query as the fake received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRunQuery {
    pub workflow_id: u64,
    pub per_page: u8,
    pub branch: Option<String>,
}

#[derive(Debug, Default)]
struct FakeState {
    workflows: Vec<WorkflowDefinition>,
    run_listings: VecDeque<Vec<WorkflowRun>>,
    current_runs: Vec<WorkflowRun>,
    jobs: HashMap<u64, VecDeque<ApiResponse<Vec<Job>>>>,
    statuses: HashMap<Endpoint, u16>,
    calls: HashMap<Endpoint, usize>,
    dispatches: Vec<RecordedDispatch>,
    run_queries: Vec<RecordedRunQuery>,
}

/// Scripted CI client.
///
/// - Run listings are served in the order they were pushed; once the script
///   is exhausted the last listing keeps being returned. Before the first
///   listing is pushed, runs are empty.
/// - Job responses are scripted per run the same way. Unknown runs answer 404.
/// - A status override makes an endpoint answer that status with no body.
#[derive(Debug, Default)]
pub struct MemoryCiClient {
    state: Mutex<FakeState>,
}

impl MemoryCiClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workflows(mut self, workflows: Vec<WorkflowDefinition>) -> Self {
        self.state.get_mut().unwrap().workflows = workflows;
        self
    }

    /// Append one response to the run listing script.
    pub fn push_run_listing(mut self, runs: Vec<WorkflowRun>) -> Self {
        self.state.get_mut().unwrap().run_listings.push_back(runs);
        self
    }

    /// Append a successful job listing to the script for `run_id`.
    pub fn with_jobs(mut self, run_id: u64, jobs: Vec<Job>) -> Self {
        self.state
            .get_mut()
            .unwrap()
            .jobs
            .entry(run_id)
            .or_default()
            .push_back(ApiResponse::new(200, jobs));
        self
    }

    /// Append a bodiless job listing with `status` to the script for `run_id`.
    pub fn with_jobs_status(mut self, run_id: u64, status: u16) -> Self {
        self.state
            .get_mut()
            .unwrap()
            .jobs
            .entry(run_id)
            .or_default()
            .push_back(ApiResponse::status_only(status));
        self
    }

    pub fn with_status(mut self, endpoint: Endpoint, status: u16) -> Self {
        self.state.get_mut().unwrap().statuses.insert(endpoint, status);
        self
    }

    pub fn calls(&self, endpoint: Endpoint) -> usize {
        let state = self.state.lock().unwrap();
        state.calls.get(&endpoint).copied().unwrap_or(0)
    }

    pub fn dispatches(&self) -> Vec<RecordedDispatch> {
        self.state.lock().unwrap().dispatches.clone()
    }

    pub fn run_queries(&self) -> Vec<RecordedRunQuery> {
        self.state.lock().unwrap().run_queries.clone()
    }
}

impl FakeState {
    /// Count the call and return the overriding status, if any.
    fn record(&mut self, endpoint: Endpoint) -> Option<u16> {
        *self.calls.entry(endpoint).or_insert(0) += 1;
        self.statuses.get(&endpoint).copied()
    }
}

/// Pop the next scripted item, repeating the last one once drained.
fn next_scripted<T: Clone>(script: &mut VecDeque<T>) -> Option<T> {
    if script.len() > 1 {
        script.pop_front()
    } else {
        script.front().cloned()
    }
}

#[async_trait]
impl CiClient for MemoryCiClient {
    async fn dispatch_workflow(
        &self,
        repo: &RepoSlug,
        workflow: &WorkflowRef,
        git_ref: &str,
        inputs: &BTreeMap<String, String>,
    ) -> Result<ApiResponse<()>> {
        let mut state = self.state.lock().unwrap();
        let status = state.record(Endpoint::Dispatch).unwrap_or(204);
        state.dispatches.push(RecordedDispatch {
            repo: repo.clone(),
            workflow: workflow.clone(),
            git_ref: git_ref.to_string(),
            inputs: inputs.clone(),
        });
        Ok(ApiResponse::status_only(status))
    }

    async fn list_workflows(&self, _repo: &RepoSlug) -> Result<ApiResponse<Vec<WorkflowDefinition>>> {
        let mut state = self.state.lock().unwrap();
        if let Some(status) = state.record(Endpoint::ListWorkflows) {
            return Ok(ApiResponse::status_only(status));
        }
        Ok(ApiResponse::new(200, state.workflows.clone()))
    }

    async fn list_workflow_runs(
        &self,
        _repo: &RepoSlug,
        workflow_id: u64,
        per_page: u8,
        branch: Option<&str>,
    ) -> Result<ApiResponse<Vec<WorkflowRun>>> {
        let mut state = self.state.lock().unwrap();
        let overridden = state.record(Endpoint::ListRuns);
        state.run_queries.push(RecordedRunQuery {
            workflow_id,
            per_page,
            branch: branch.map(str::to_string),
        });
        if let Some(status) = overridden {
            return Ok(ApiResponse::status_only(status));
        }

        if let Some(next) = state.run_listings.pop_front() {
            state.current_runs = next;
        }
        let runs = state
            .current_runs
            .iter()
            .take(per_page as usize)
            .cloned()
            .collect();
        Ok(ApiResponse::new(200, runs))
    }

    async fn list_jobs_for_run(
        &self,
        _repo: &RepoSlug,
        run_id: u64,
    ) -> Result<ApiResponse<Vec<Job>>> {
        let mut state = self.state.lock().unwrap();
        if let Some(status) = state.record(Endpoint::ListJobs) {
            return Ok(ApiResponse::status_only(status));
        }

        let scripted = state.jobs.get_mut(&run_id).and_then(next_scripted);
        Ok(scripted.unwrap_or_else(|| ApiResponse::status_only(404)))
    }
}
