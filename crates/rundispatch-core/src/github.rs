//! GitHub REST implementation of [`CiClient`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{
    ApiResponse, CiClient, Job, RepoSlug, WorkflowDefinition, WorkflowRef, WorkflowRun,
};
use crate::error::{DispatchError, Result};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const WORKFLOWS_PER_PAGE: u8 = 100;
/// Job listings only cover the most recent attempt of a run.
const JOB_FILTER: &str = "latest";

/// GitHub API client configuration.
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// REST API base URL, without trailing slash.
    pub api_url: String,
    /// Token sent as a bearer credential.
    pub token: String,
}

impl GitHubConfig {
    pub fn new(token: &str) -> Self {
        GitHubConfig {
            api_url: DEFAULT_API_URL.to_string(),
            token: token.to_string(),
        }
    }

    /// Point the client at a GitHub Enterprise API.
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }
}

/// Client for the GitHub Actions REST endpoints.
pub struct GitHubClient {
    base_url: Url,
    http_client: reqwest::Client,
}

#[derive(Serialize)]
struct DispatchBody<'a> {
    #[serde(rename = "ref")]
    git_ref: &'a str,
    inputs: &'a BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct WorkflowsPage {
    workflows: Vec<WorkflowDefinition>,
}

#[derive(Deserialize)]
struct RunsPage {
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Deserialize)]
struct JobsPage {
    jobs: Vec<Job>,
}

impl GitHubClient {
    pub fn new(config: GitHubConfig) -> Result<Self> {
        let base_url = Url::parse(&config.api_url).map_err(|e| {
            DispatchError::InvalidConfig(format!("invalid API URL '{}': {e}", config.api_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(DispatchError::InvalidConfig(format!(
                "API URL '{}' cannot carry a path",
                config.api_url
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|e| DispatchError::InvalidConfig(format!("token is not a valid header: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("rundispatch/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        Ok(GitHubClient {
            base_url,
            http_client,
        })
    }

    /// `{api}/repos/{owner}/{repo}/actions/{segments}`. Every segment is
    /// percent-encoded, so a `/` inside a workflow file name cannot change
    /// the endpoint.
    fn actions_url(&self, repo: &RepoSlug, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                DispatchError::InvalidConfig(format!("API URL '{}' cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(["repos", repo.owner.as_str(), repo.repo.as_str(), "actions"])
            .extend(segments);
        Ok(url)
    }

    /// Decode the body only on 200; other statuses are reported as-is.
    async fn read_page<P: DeserializeOwned, T: Default>(
        response: reqwest::Response,
        extract: impl FnOnce(P) -> T,
    ) -> Result<ApiResponse<T>> {
        let status = response.status().as_u16();
        if status != 200 {
            return Ok(ApiResponse::status_only(status));
        }
        let page: P = response.json().await?;
        Ok(ApiResponse::new(status, extract(page)))
    }
}

#[async_trait]
impl CiClient for GitHubClient {
    async fn dispatch_workflow(
        &self,
        repo: &RepoSlug,
        workflow: &WorkflowRef,
        git_ref: &str,
        inputs: &BTreeMap<String, String>,
    ) -> Result<ApiResponse<()>> {
        let workflow = workflow.to_string();
        let url = self.actions_url(repo, &["workflows", &workflow, "dispatches"])?;
        debug!(%url, "POST workflow dispatch");

        let response = self
            .http_client
            .post(url)
            .json(&DispatchBody { git_ref, inputs })
            .send()
            .await?;

        Ok(ApiResponse::status_only(response.status().as_u16()))
    }

    async fn list_workflows(&self, repo: &RepoSlug) -> Result<ApiResponse<Vec<WorkflowDefinition>>> {
        let url = self.actions_url(repo, &["workflows"])?;
        debug!(%url, "GET workflows");

        let response = self
            .http_client
            .get(url)
            .query(&[("per_page", WORKFLOWS_PER_PAGE)])
            .send()
            .await?;

        Self::read_page(response, |page: WorkflowsPage| page.workflows).await
    }

    async fn list_workflow_runs(
        &self,
        repo: &RepoSlug,
        workflow_id: u64,
        per_page: u8,
        branch: Option<&str>,
    ) -> Result<ApiResponse<Vec<WorkflowRun>>> {
        let url = self.actions_url(repo, &["workflows", &workflow_id.to_string(), "runs"])?;
        debug!(%url, per_page, ?branch, "GET workflow runs");

        let mut request = self
            .http_client
            .get(url)
            .query(&[("per_page", per_page.to_string())]);
        if let Some(branch) = branch {
            request = request.query(&[("branch", branch)]);
        }
        let response = request.send().await?;

        Self::read_page(response, |page: RunsPage| page.workflow_runs).await
    }

    async fn list_jobs_for_run(
        &self,
        repo: &RepoSlug,
        run_id: u64,
    ) -> Result<ApiResponse<Vec<Job>>> {
        let url = self.actions_url(repo, &["runs", &run_id.to_string(), "jobs"])?;
        debug!(%url, "GET run jobs");

        let response = self
            .http_client
            .get(url)
            .query(&[("filter", JOB_FILTER)])
            .send()
            .await?;

        Self::read_page(response, |page: JobsPage| page.jobs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_to_public_api() {
        let config = GitHubConfig::new("ghp_test");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.token, "ghp_test");
    }

    #[test]
    fn test_with_api_url_strips_trailing_slash() {
        let config = GitHubConfig::new("t").with_api_url("https://ghe.example.com/api/v3/");
        assert_eq!(config.api_url, "https://ghe.example.com/api/v3");
    }

    #[test]
    fn test_actions_url_layout() {
        let client = GitHubClient::new(GitHubConfig::new("t")).expect("client");
        let repo = RepoSlug::new("octo", "widgets");
        let url = client.actions_url(&repo, &["runs", "12", "jobs"]).expect("url");
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/octo/widgets/actions/runs/12/jobs"
        );
    }

    #[test]
    fn test_actions_url_keeps_enterprise_prefix() {
        let config = GitHubConfig::new("t").with_api_url("https://ghe.example.com/api/v3/");
        let client = GitHubClient::new(config).expect("client");
        let repo = RepoSlug::new("octo", "widgets");
        let url = client.actions_url(&repo, &["workflows"]).expect("url");
        assert_eq!(
            url.as_str(),
            "https://ghe.example.com/api/v3/repos/octo/widgets/actions/workflows"
        );
    }

    #[test]
    fn test_dispatch_url_encodes_workflow_file_name() {
        let client = GitHubClient::new(GitHubConfig::new("t")).expect("client");
        let repo = RepoSlug::new("octo", "widgets");
        let workflow = WorkflowRef::File("nested/deploy v2.yml".into()).to_string();
        let url = client
            .actions_url(&repo, &["workflows", &workflow, "dispatches"])
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/octo/widgets/actions/workflows/nested%2Fdeploy%20v2.yml/dispatches"
        );
    }

    #[test]
    fn test_invalid_api_url_is_rejected() {
        let config = GitHubConfig::new("t").with_api_url("not a url");
        let err = GitHubClient::new(config).err().expect("should fail");
        assert!(err.to_string().contains("invalid API URL"));
    }

    #[test]
    fn test_token_with_newline_is_rejected() {
        let err = GitHubClient::new(GitHubConfig::new("bad\ntoken"))
            .err()
            .expect("should fail");
        assert!(err.to_string().contains("invalid configuration"));
    }

    #[test]
    fn test_dispatch_body_shape() {
        let mut inputs = BTreeMap::new();
        inputs.insert("distinct_id".to_string(), "abc".to_string());
        let body = serde_json::to_value(DispatchBody {
            git_ref: "refs/heads/main",
            inputs: &inputs,
        })
        .expect("serialize");
        assert_eq!(
            body,
            serde_json::json!({"ref": "refs/heads/main", "inputs": {"distinct_id": "abc"}})
        );
    }

    #[test]
    fn test_runs_page_decodes_listing() {
        let page: RunsPage = serde_json::from_str(
            r#"{"total_count": 2, "workflow_runs": [{"id": 5}, {"id": 4, "html_url": "https://github.com/o/r/actions/runs/4"}]}"#,
        )
        .expect("decode");
        assert_eq!(
            page.workflow_runs,
            vec![
                WorkflowRun::new(5),
                WorkflowRun::new(4).with_html_url("https://github.com/o/r/actions/runs/4"),
            ]
        );
    }
}
