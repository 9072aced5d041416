//! rundispatch core library
//!
//! Triggers a `workflow_dispatch` run on a remote CI platform and recovers
//! the id of the run it created:
//! - `refs`: branch/tag classification of git refs
//! - `retry`: bounded polling until a listing is non-empty
//! - `correlator`: single-shot run and step lookups
//! - `dispatcher`: dispatch, await, and token-matching orchestration

pub mod client;
pub mod config;
pub mod correlator;
pub mod dispatcher;
pub mod error;
pub mod fakes;
pub mod github;
pub mod obs;
pub mod refs;
pub mod retry;
pub mod telemetry;

// Re-export key types
pub use client::{
    ApiResponse, CiClient, Job, JobStep, RepoSlug, WorkflowDefinition, WorkflowRef, WorkflowRun,
};
pub use config::{parse_workflow_inputs, DispatchConfig, DISTINCT_ID_INPUT};
pub use correlator::{aggregate_step_names, Correlator, PollQuery};
pub use dispatcher::{DispatchPhase, DispatchedRun, Dispatcher};
pub use error::{DispatchError, ErrorKind, Result};
pub use github::{GitHubClient, GitHubConfig};
pub use refs::{branch_name_from_ref, is_tag_ref, GitRefKind};
pub use retry::{retry_or_die, RETRY_INTERVAL};
pub use telemetry::{init_tracing, LogFormat};
