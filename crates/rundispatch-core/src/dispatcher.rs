//! Dispatch a workflow and recover the run it created.
//!
//! The dispatch endpoint answers 204 with no body, so the run has to be found
//! again by listing recent runs of the workflow and checking which one carries
//! the correlation token. The workflow is expected to name one of its steps
//! after the `distinct_id` input, which makes the token visible in the job
//! listing of the run.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn, Instrument};

use crate::client::{CiClient, WorkflowRef};
use crate::config::{DispatchConfig, DISTINCT_ID_INPUT};
use crate::correlator::Correlator;
use crate::error::{expect_status, DispatchError, Result};
use crate::obs;
use crate::retry::retry_or_die;

/// Upper bound for one round of waiting for runs to show up.
pub const RUN_FETCH_TIMEOUT: Duration = Duration::from_secs(60);
/// Pause between two rounds of checking candidate runs for the token.
pub const MATCH_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Progress of a return-dispatch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPhase {
    Idle,
    Dispatched,
    PollingForRun,
    RunFound,
    PollingForSteps,
    StepsFound,
    Failed,
}

impl DispatchPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchPhase::Idle => "idle",
            DispatchPhase::Dispatched => "dispatched",
            DispatchPhase::PollingForRun => "polling_for_run",
            DispatchPhase::RunFound => "run_found",
            DispatchPhase::PollingForSteps => "polling_for_steps",
            DispatchPhase::StepsFound => "steps_found",
            DispatchPhase::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DispatchPhase::StepsFound | DispatchPhase::Failed)
    }
}

/// The run a dispatch created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchedRun {
    pub run_id: u64,
    pub run_url: String,
    /// Distinct step names of the run's latest attempt.
    pub steps: Vec<String>,
}

/// Dispatches workflows for one repository and locates their runs.
pub struct Dispatcher {
    client: Arc<dyn CiClient>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn CiClient>, config: DispatchConfig) -> Self {
        Dispatcher { client, config }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    fn correlator(&self) -> Correlator<'_, dyn CiClient> {
        Correlator::new(self.client.as_ref(), &self.config.repo)
    }

    /// Id of the first workflow of the configured repository whose path
    /// matches `pattern`. See [`Correlator::find_workflow_id`] for how
    /// ambiguous patterns are handled.
    pub async fn resolve_workflow_id(&self, pattern: &str) -> Result<u64> {
        self.correlator().find_workflow_id(pattern).await
    }

    /// Numeric id of the configured workflow, resolving file patterns.
    pub async fn workflow_id(&self) -> Result<u64> {
        match &self.config.workflow {
            WorkflowRef::Id(id) => Ok(*id),
            WorkflowRef::File(pattern) => self.resolve_workflow_id(pattern).await,
        }
    }

    /// Trigger the configured workflow with `distinct_id` among its inputs.
    pub async fn dispatch(&self, distinct_id: &str) -> Result<()> {
        self.dispatch_to(&self.config.workflow, distinct_id).await
    }

    async fn dispatch_to(&self, workflow: &WorkflowRef, distinct_id: &str) -> Result<()> {
        let mut inputs = self.config.workflow_inputs.clone();
        // Written last so it replaces a caller input of the same name.
        inputs.insert(DISTINCT_ID_INPUT.to_string(), distinct_id.to_string());

        let response = self
            .client
            .dispatch_workflow(&self.config.repo, workflow, &self.config.git_ref, &inputs)
            .await?;
        expect_status("dispatch workflow", 204, response.status)?;

        obs::emit_workflow_dispatched(
            &self.config.repo.to_string(),
            &self.config.git_ref,
            &workflow.to_string(),
            inputs.len(),
        );
        Ok(())
    }

    /// Poll until the workflow has at least one run on `git_ref` and return
    /// the most recent one.
    ///
    /// This narrows by workflow, branch and recency only. Use
    /// [`Dispatcher::return_dispatch`] to pick the run carrying a token.
    pub async fn await_execution_id(
        &self,
        workflow_id: u64,
        git_ref: &str,
        timeout: Duration,
    ) -> Result<u64> {
        let correlator = self.correlator();
        let run_ids = retry_or_die(
            || correlator.find_execution_ids(workflow_id, git_ref),
            timeout,
        )
        .await?;

        run_ids
            .into_iter()
            .next()
            .ok_or(DispatchError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            })
    }

    /// Poll until the run reports at least one step name.
    pub async fn await_step_names(&self, run_id: u64, timeout: Duration) -> Result<Vec<String>> {
        let correlator = self.correlator();
        retry_or_die(|| correlator.find_step_names(run_id), timeout).await
    }

    /// Dispatch the workflow and wait until the run carrying `distinct_id`
    /// is found, within the configured workflow timeout.
    ///
    /// Not idempotent: calling this again after a failure triggers another
    /// run.
    pub async fn return_dispatch(&self, distinct_id: &str) -> Result<DispatchedRun> {
        let span = obs::dispatch_span(distinct_id);
        async {
            obs::emit_phase(DispatchPhase::Idle);
            let result = self.dispatch_and_correlate(distinct_id).await;
            if let Err(err) = &result {
                obs::emit_phase(DispatchPhase::Failed);
                warn!(error = %err, kind = ?err.kind(), "return dispatch failed");
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn dispatch_and_correlate(&self, distinct_id: &str) -> Result<DispatchedRun> {
        self.config.validate()?;
        let started = Instant::now();

        // Resolve first so an unknown workflow never triggers a run.
        let workflow_id = self.workflow_id().await?;
        self.dispatch_to(&WorkflowRef::Id(workflow_id), distinct_id).await?;
        obs::emit_phase(DispatchPhase::Dispatched);

        let timeout = self.config.workflow_timeout;
        let fetch_timeout = RUN_FETCH_TIMEOUT.min(timeout);
        let git_ref = self.config.git_ref.as_str();
        let correlator = self.correlator();
        let mut attempts: u32 = 0;

        while started.elapsed() < timeout {
            attempts += 1;
            obs::emit_phase(DispatchPhase::PollingForRun);
            let runs = retry_or_die(
                || correlator.find_runs(workflow_id, git_ref),
                fetch_timeout,
            )
            .await?;
            obs::emit_phase(DispatchPhase::RunFound);

            obs::emit_phase(DispatchPhase::PollingForSteps);
            for run in runs {
                let run_id = run.id;
                match correlator.find_step_names(run_id).await {
                    Ok(steps) if steps.iter().any(|step| step == distinct_id) => {
                        obs::emit_phase(DispatchPhase::StepsFound);
                        let run_url = run
                            .html_url
                            .unwrap_or_else(|| self.config.run_url(run_id));
                        obs::emit_run_identified(run_id, &run_url, attempts);
                        return Ok(DispatchedRun {
                            run_id,
                            run_url,
                            steps,
                        });
                    }
                    Ok(_) => debug!(run_id, "run does not carry the distinct id"),
                    Err(err) if err.is_not_found_status() => {
                        debug!(run_id, "jobs not available for run yet, skipping")
                    }
                    Err(err) => return Err(err),
                }
            }

            info!(
                attempt = attempts,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "dispatched run not identified yet"
            );
            sleep(MATCH_RETRY_INTERVAL).await;
        }

        Err(DispatchError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        })
    }
}
