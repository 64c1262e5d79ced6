//! GitHub REST client and the [`PullRequestPublisher`] seam.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use confsync_core::{RepoSlug, Settings, Target};
use confsync_renderer::{PullRequestContext, Renderer};

use crate::error::PublishError;

const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = "sync-configs";
const PER_PAGE: usize = 100;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct NewPullRequest<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
}

#[derive(Debug, Deserialize)]
struct PullRequestResponse {
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct RepositoryResponse {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message: Option<String>,
}

/// A remote branch as listed by the API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteBranch {
    pub name: String,
    #[serde(default)]
    pub protected: bool,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(http: reqwest::Client, api_url: &str, token: Option<&str>) -> Self {
        Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.map(str::to_owned),
        }
    }

    pub fn from_settings(http: reqwest::Client, settings: &Settings) -> Self {
        Self::new(http, &settings.github_api_url, settings.token())
    }

    fn repo_url(&self, repo: &RepoSlug, rest: &str) -> String {
        format!("{}/repos/{}/{}{rest}", self.api_url, repo.owner, repo.repo)
    }

    fn authed(&self, req: RequestBuilder) -> Result<RequestBuilder, PublishError> {
        let token = self.token.as_deref().ok_or(PublishError::MissingToken)?;
        Ok(req
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", USER_AGENT))
    }

    async fn send(&self, repo: &RepoSlug, req: RequestBuilder) -> Result<Response, PublishError> {
        let resp = self.authed(req)?.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp
            .json::<ApiMessage>()
            .await
            .ok()
            .and_then(|m| m.message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
        if status == StatusCode::FORBIDDEN {
            return Err(PublishError::Forbidden {
                repo: repo.to_string(),
                message,
            });
        }
        Err(PublishError::Status {
            repo: repo.to_string(),
            status: status.as_u16(),
            message,
        })
    }

    /// Open a pull request and return its web URL.
    pub async fn create_pull_request(
        &self,
        repo: &RepoSlug,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<String, PublishError> {
        let payload = NewPullRequest {
            title,
            body,
            head,
            base,
        };
        debug!("opening pull request {head} -> {base} on {repo}");
        let req = self.http.post(self.repo_url(repo, "/pulls")).json(&payload);
        let pr: PullRequestResponse = self.send(repo, req).await?.json().await?;
        Ok(pr.html_url)
    }

    pub async fn default_branch(&self, repo: &RepoSlug) -> Result<String, PublishError> {
        let req = self.http.get(self.repo_url(repo, ""));
        let info: RepositoryResponse = self.send(repo, req).await?.json().await?;
        Ok(info.default_branch)
    }

    /// Every branch of `repo`, following pagination.
    pub async fn list_branches(&self, repo: &RepoSlug) -> Result<Vec<RemoteBranch>, PublishError> {
        let mut all = Vec::new();
        for page in 1.. {
            let req = self
                .http
                .get(self.repo_url(repo, "/branches"))
                .query(&[("per_page", PER_PAGE), ("page", page)]);
            let batch: Vec<RemoteBranch> = self.send(repo, req).await?.json().await?;
            let last = batch.len() < PER_PAGE;
            all.extend(batch);
            if last {
                break;
            }
        }
        Ok(all)
    }

    pub async fn delete_branch(&self, repo: &RepoSlug, branch: &str) -> Result<(), PublishError> {
        let req = self
            .http
            .delete(self.repo_url(repo, &format!("/git/refs/heads/{branch}")));
        self.send(repo, req).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Publisher seam
// ---------------------------------------------------------------------------

/// Opens a pull request for a pushed topic branch.
#[async_trait]
pub trait PullRequestPublisher: Send + Sync {
    async fn open_pull_request(
        &self,
        target: &Target,
        head: &str,
        base: &str,
        instruction: &str,
    ) -> Result<String, PublishError>;
}

/// [`PullRequestPublisher`] backed by the GitHub REST API.
pub struct GitHubPublisher {
    client: GitHubClient,
    renderer: Arc<Renderer>,
    requested_by: String,
}

impl GitHubPublisher {
    pub fn new(client: GitHubClient, renderer: Arc<Renderer>, requested_by: &str) -> Self {
        Self {
            client,
            renderer,
            requested_by: requested_by.to_string(),
        }
    }
}

#[async_trait]
impl PullRequestPublisher for GitHubPublisher {
    async fn open_pull_request(
        &self,
        target: &Target,
        head: &str,
        base: &str,
        instruction: &str,
    ) -> Result<String, PublishError> {
        let ctx = PullRequestContext::new(target, instruction, &self.requested_by, base, head);
        let (title, body) = self.renderer.pull_request(&ctx)?;
        self.client
            .create_pull_request(&target.slug, &title, &body, head, base)
            .await
    }
}
