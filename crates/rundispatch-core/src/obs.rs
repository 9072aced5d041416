//! Structured log events for the dispatch lifecycle.
//!
//! Every record carries an `event` field so log pipelines can filter on it.
//! Records emitted inside [`dispatch_span`] are tagged with the correlation
//! token.

use tracing::{debug, info, Span};

use crate::dispatcher::DispatchPhase;

/// Span for one return-dispatch operation. Attach it to the operation's
/// future with `tracing::Instrument` rather than entering it, since the
/// operation suspends.
pub fn dispatch_span(distinct_id: &str) -> Span {
    tracing::info_span!("rundispatch", distinct_id = %distinct_id)
}

pub fn emit_workflow_resolved(repo: &str, pattern: &str, workflow_id: u64) {
    info!(event = "workflow.resolved", repo = %repo, pattern = %pattern, workflow_id);
}

pub fn emit_workflow_dispatched(repo: &str, git_ref: &str, workflow: &str, input_count: usize) {
    info!(
        event = "workflow.dispatched",
        repo = %repo,
        git_ref = %git_ref,
        workflow = %workflow,
        input_count,
    );
}

pub fn emit_runs_fetched(repo: &str, workflow_id: u64, branch: Option<&str>, run_ids: &[u64]) {
    debug!(
        event = "runs.fetched",
        repo = %repo,
        workflow_id,
        branch = branch.unwrap_or("<unfiltered>"),
        runs = ?run_ids,
    );
}

pub fn emit_steps_fetched(repo: &str, run_id: u64, job_ids: &[u64], steps: &[String]) {
    debug!(
        event = "steps.fetched",
        repo = %repo,
        run_id,
        jobs = ?job_ids,
        steps = ?steps,
    );
}

pub fn emit_phase(phase: DispatchPhase) {
    debug!(event = "dispatch.phase", phase = phase.as_str());
}

pub fn emit_run_identified(run_id: u64, run_url: &str, attempts: u32) {
    info!(event = "run.identified", run_id, run_url = %run_url, attempts);
}
