//! rundispatch - dispatch a workflow and report the run it created
//!
//! ## Commands
//!
//! - `dispatch`: trigger the workflow and wait for the run carrying the distinct id
//! - `resolve-workflow`: print the id of the workflow matching a file pattern
//! - `runs`: print the ids of the most recent runs of the workflow
//! - `steps`: print the step names of a run

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};

use rundispatch_core::github::DEFAULT_API_URL;
use rundispatch_core::{
    init_tracing, parse_workflow_inputs, retry_or_die, Correlator, DispatchConfig, Dispatcher,
    GitHubClient, GitHubConfig, LogFormat, RepoSlug, WorkflowRef,
};

#[derive(Parser)]
#[command(name = "rundispatch")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Dispatch a CI workflow and find the run it created", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    target: TargetArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Repository, workflow and credentials shared by every command.
#[derive(Args)]
struct TargetArgs {
    /// API token used to authenticate
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Repository owner
    #[arg(long, env = "RUNDISPATCH_OWNER", global = true)]
    owner: Option<String>,

    /// Repository name
    #[arg(long, env = "RUNDISPATCH_REPO", global = true)]
    repo: Option<String>,

    /// Git ref to run the workflow against, e.g. refs/heads/main
    #[arg(long = "ref", env = "RUNDISPATCH_REF", global = true)]
    git_ref: Option<String>,

    /// Workflow id, file name, or regular expression over the workflow path
    #[arg(long, env = "RUNDISPATCH_WORKFLOW", global = true)]
    workflow: Option<String>,

    /// REST API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL, global = true)]
    api_url: String,

    /// Web URL used to build run links
    #[arg(long, env = "GITHUB_SERVER_URL", default_value = "https://github.com", global = true)]
    server_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch the workflow and wait for the run it created
    Dispatch {
        /// Workflow inputs as a JSON object
        #[arg(long, env = "RUNDISPATCH_WORKFLOW_INPUTS")]
        workflow_inputs: Option<String>,

        /// Seconds to wait for the run to be identified
        #[arg(long, env = "RUNDISPATCH_WORKFLOW_TIMEOUT_SECONDS", default_value = "300")]
        workflow_timeout_seconds: u64,

        /// Correlation token passed as the distinct_id input (random if omitted)
        #[arg(long)]
        distinct_id: Option<String>,
    },

    /// Print the id of the first workflow whose path matches a pattern
    ResolveWorkflow {
        /// Regular expression over the workflow path
        pattern: String,
    },

    /// Print the ids of the most recent runs of the workflow on the ref
    Runs,

    /// Wait for a run to report its steps and print them
    Steps {
        /// Run id
        run_id: u64,

        /// Seconds to wait for steps to appear
        #[arg(long, default_value = "60")]
        timeout_seconds: u64,
    },
}

impl TargetArgs {
    fn required<'a>(value: &'a Option<String>, flag: &str) -> Result<&'a str> {
        value
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .with_context(|| format!("--{flag} is required"))
    }

    fn client(&self) -> Result<Arc<GitHubClient>> {
        let token = Self::required(&self.token, "token")?;
        let config = GitHubConfig::new(token).with_api_url(&self.api_url);
        let client = GitHubClient::new(config).context("Failed to create GitHub client")?;
        Ok(Arc::new(client))
    }

    /// Owner and name only; enough for commands that never dispatch.
    fn repo(&self) -> Result<RepoSlug> {
        Ok(RepoSlug::new(
            Self::required(&self.owner, "owner")?,
            Self::required(&self.repo, "repo")?,
        ))
    }

    fn dispatch_config(&self) -> Result<DispatchConfig> {
        let repo = self.repo()?;
        let git_ref = Self::required(&self.git_ref, "ref")?;
        let workflow = WorkflowRef::parse(Self::required(&self.workflow, "workflow")?)
            .context("Invalid --workflow")?;

        Ok(DispatchConfig::new(repo, git_ref, workflow).with_server_url(&self.server_url))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(LogFormat::from_json_flag(cli.json), level);

    match cli.command {
        Commands::Dispatch {
            workflow_inputs,
            workflow_timeout_seconds,
            distinct_id,
        } => {
            let inputs = parse_workflow_inputs(workflow_inputs.as_deref().unwrap_or(""))
                .context("Invalid --workflow-inputs")?;
            let config = cli
                .target
                .dispatch_config()?
                .with_inputs(inputs)
                .with_timeout(Duration::from_secs(workflow_timeout_seconds));
            let distinct_id = distinct_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

            let dispatcher = Dispatcher::new(cli.target.client()?, config);
            info!(distinct_id = %distinct_id, "dispatching workflow");
            let run = dispatcher
                .return_dispatch(&distinct_id)
                .await
                .context("Failed to identify the dispatched run")?;

            println!("run_id={}", run.run_id);
            println!("run_url={}", run.run_url);
        }

        Commands::ResolveWorkflow { pattern } => {
            let client = cli.target.client()?;
            let repo = cli.target.repo()?;
            let workflow_id = Correlator::new(client.as_ref(), &repo)
                .find_workflow_id(&pattern)
                .await
                .with_context(|| format!("Failed to resolve workflow '{pattern}'"))?;
            println!("{workflow_id}");
        }

        Commands::Runs => {
            let client = cli.target.client()?;
            let dispatcher = Dispatcher::new(client.clone(), cli.target.dispatch_config()?);
            let workflow_id = dispatcher
                .workflow_id()
                .await
                .context("Failed to resolve workflow")?;
            let config = dispatcher.config();
            let run_ids = Correlator::new(client.as_ref(), &config.repo)
                .find_execution_ids(workflow_id, &config.git_ref)
                .await
                .context("Failed to list workflow runs")?;
            for run_id in run_ids {
                println!("{run_id}");
            }
        }

        Commands::Steps {
            run_id,
            timeout_seconds,
        } => {
            let client = cli.target.client()?;
            let repo = cli.target.repo()?;
            let correlator = Correlator::new(client.as_ref(), &repo);
            let steps = retry_or_die(
                || correlator.find_step_names(run_id),
                Duration::from_secs(timeout_seconds),
            )
            .await
                .with_context(|| format!("Failed to fetch steps of run {run_id}"))?;
            for step in steps {
                println!("{step}");
            }
        }
    }

    Ok(())
}
