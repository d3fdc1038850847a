//! GitHub hosting for bonvoy.
//!
//! Implements [`HostingOperations`] on top of the GitHub REST API: releases
//! are created and deleted through the releases endpoint, the release pull
//! request through the pulls endpoint.

use async_trait::async_trait;
use bonvoy_release::config::BonvoyConfig;
use bonvoy_release::error::{Error, Result};
use bonvoy_release::ops::{
    HostingOperations, PullRequestInfo, PullRequestParams, ReleaseInfo, ReleaseParams,
};
use octocrab::Octocrab;
use tracing::debug;

const BACKEND: &str = "github";

/// Repository and credentials for the GitHub API.
#[derive(Debug, Clone)]
pub struct GitHubHostingConfig {
    /// Repository owner (e.g., "bonvoy")
    pub owner: String,
    /// Repository name (e.g., "bonvoy-rs")
    pub repo: String,
    /// GitHub token for authentication
    pub token: String,
}

impl GitHubHostingConfig {
    /// Creates a new configuration.
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            token: token.into(),
        }
    }

    /// Creates configuration from the environment.
    ///
    /// Reads `GITHUB_TOKEN`. Owner and repo come from the `github` section of
    /// the bonvoy configuration, falling back to the git remote URL.
    #[must_use]
    pub fn from_env(config: &BonvoyConfig, remote_url: Option<&str>) -> Option<Self> {
        let token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty())?;
        let (owner, repo) = match (&config.github.owner, &config.github.repo) {
            (Some(owner), Some(repo)) => (owner.clone(), repo.clone()),
            _ => parse_github_remote(remote_url?)?,
        };
        Some(Self::new(owner, repo, token))
    }
}

/// Parse a GitHub remote URL into (owner, repo).
#[must_use]
pub fn parse_github_remote(url: &str) -> Option<(String, String)> {
    let url = url.trim();
    let rest = url
        .strip_prefix("git@github.com:")
        .or_else(|| url.strip_prefix("ssh://git@github.com/"))
        .or_else(|| url.strip_prefix("https://github.com/"))?;
    let path = rest.strip_suffix(".git").unwrap_or(rest);
    let (owner, repo) = path.split_once('/')?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}

/// Map an octocrab failure into a bonvoy error, keeping the HTTP status so
/// the retry classifier can see it.
fn api_error(e: &octocrab::Error) -> Error {
    match e {
        octocrab::Error::GitHub { source, .. } => Error::http(
            BACKEND,
            Some(source.status_code.as_u16()),
            source.message.clone(),
        ),
        other => Error::http(BACKEND, None, other.to_string()),
    }
}

fn is_not_found(e: &octocrab::Error) -> bool {
    matches!(
        e,
        octocrab::Error::GitHub { source, .. } if source.status_code.as_u16() == 404
    )
}

/// GitHub implementation of the hosting contract.
pub struct GitHubHosting {
    config: GitHubHostingConfig,
    client: Octocrab,
}

impl GitHubHosting {
    /// Creates a hosting client.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is empty or the HTTP client cannot be built.
    pub fn new(config: GitHubHostingConfig) -> Result<Self> {
        if config.token.is_empty() {
            return Err(Error::config(
                "GITHUB_TOKEN is not set or empty",
                "Export a token with `contents` and `pull-requests` write access",
            ));
        }
        let client = Octocrab::builder()
            .personal_token(config.token.clone())
            .build()
            .map_err(|e| Error::http(BACKEND, None, format!("Failed to create GitHub client: {e}")))?;
        Ok(Self { config, client })
    }

    /// Repository this client talks to, as `owner/repo`.
    #[must_use]
    pub fn repository(&self) -> String {
        format!("{}/{}", self.config.owner, self.config.repo)
    }
}

#[async_trait]
impl HostingOperations for GitHubHosting {
    async fn create_release(&self, params: &ReleaseParams) -> Result<ReleaseInfo> {
        let release = self
            .client
            .repos(&self.config.owner, &self.config.repo)
            .releases()
            .create(&params.tag_name)
            .name(&params.name)
            .body(&params.body)
            .draft(params.draft)
            .prerelease(params.prerelease)
            .send()
            .await
            .map_err(|e| api_error(&e))?;

        debug!(id = release.id.0, tag = %release.tag_name, "GitHub release created");
        Ok(ReleaseInfo {
            id: release.id.0,
            url: release.html_url.to_string(),
            tag: release.tag_name,
        })
    }

    async fn create_pr(&self, params: &PullRequestParams) -> Result<PullRequestInfo> {
        let pr = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .create(&params.title, &params.head, &params.base)
            .body(&params.body)
            .send()
            .await
            .map_err(|e| api_error(&e))?;

        Ok(PullRequestInfo {
            number: pr.number,
            url: pr.html_url.map(|u| u.to_string()).unwrap_or_default(),
        })
    }

    async fn release_exists(&self, tag: &str) -> Result<bool> {
        match self
            .client
            .repos(&self.config.owner, &self.config.repo)
            .releases()
            .get_by_tag(tag)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(api_error(&e)),
        }
    }

    async fn delete_release(&self, id: u64) -> Result<()> {
        self.client
            .repos(&self.config.owner, &self.config.repo)
            .releases()
            .delete(id)
            .await
            .map_err(|e| api_error(&e))?;
        debug!(id, "GitHub release deleted");
        Ok(())
    }
}
