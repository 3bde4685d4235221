use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, RequestBuilder};

use crate::error::{AppError, Result};
use crate::repository::{RemoteFiles, Repository, RepositoryResolver};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Build a repository API URL.
/// `api_base` is either the public API or a GitHub Enterprise / proxy prefix.
pub fn build_api_url(api_base: &str, full_name: &str, tail: &str) -> String {
    let base = api_base.trim_end_matches('/');
    format!("{}/repos/{}/{}", base, full_name, tail.trim_start_matches('/'))
}

/// Creates [`GitHubRepo`] handles sharing one HTTP client.
#[derive(Debug, Clone)]
pub struct GitHubResolver {
    client: Client,
    api_base: String,
}

impl GitHubResolver {
    pub fn new(client: Client, api_base: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into(),
        }
    }
}

impl RepositoryResolver for GitHubResolver {
    fn resolve(
        &self,
        user_agent: &str,
        full_name: &str,
        token: Option<&str>,
    ) -> Result<Arc<dyn Repository>> {
        let repo = GitHubRepo::new(
            self.client.clone(),
            &self.api_base,
            user_agent,
            full_name,
            token,
        )?;
        Ok(Arc::new(repo))
    }
}

#[derive(Debug, Clone)]
pub struct GitHubRepo {
    client: Client,
    api_base: String,
    user_agent: String,
    full_name: String,
    name: String,
    token: Option<String>,
}

impl GitHubRepo {
    pub fn new(
        client: Client,
        api_base: &str,
        user_agent: &str,
        full_name: &str,
        token: Option<&str>,
    ) -> Result<Self> {
        if user_agent.trim().is_empty() {
            return Err(AppError::config(
                "The GitHub API user-agent must be specified. See: https://developer.github.com/v3/#user-agent-required",
            ));
        }
        let Some((owner, name)) = full_name.split_once('/') else {
            return Err(AppError::config(format!(
                "GitHub repository must be 'owner/repo' (got '{}')",
                full_name
            )));
        };
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(AppError::config(format!(
                "GitHub repository must be 'owner/repo' (got '{}')",
                full_name
            )));
        }

        Ok(Self {
            client,
            api_base: api_base.to_string(),
            user_agent: user_agent.to_string(),
            full_name: full_name.to_string(),
            name: name.to_string(),
            token: token.filter(|t| !t.is_empty()).map(str::to_string),
        })
    }

    fn request(&self, url: &str, accept: &str) -> RequestBuilder {
        let builder = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, accept);
        match &self.token {
            Some(token) => builder.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => builder,
        }
    }

    async fn send(&self, url: &str, accept: &str) -> Result<reqwest::Response> {
        let resp = self
            .request(url, accept)
            .send()
            .await
            .map_err(|e| AppError::network_with_url(url, e.to_string()))?;

        if !resp.status().is_success() {
            return Err(AppError::github(format!(
                "GitHub API returned status {} for {}",
                resp.status(),
                url
            )));
        }
        Ok(resp)
    }
}

#[async_trait]
impl Repository for GitHubRepo {
    fn name(&self) -> &str {
        &self.name
    }

    fn full_name(&self) -> &str {
        &self.full_name
    }

    async fn head(&self, branch: &str) -> Result<String> {
        let url = build_api_url(&self.api_base, &self.full_name, &format!("commits/{}", branch));
        // The sha media type answers with the bare commit id.
        let body = self
            .send(&url, "application/vnd.github.sha")
            .await?
            .text()
            .await
            .map_err(|e| AppError::github(format!("Failed to read head commit: {}", e)))?;

        let sha = body.trim();
        if sha.is_empty() || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AppError::github(format!(
                "Unexpected head commit for {}@{}: {:?}",
                self.full_name, branch, sha
            )));
        }
        Ok(sha.to_string())
    }

    async fn get(&self, sub_path: &str, git_ref: &str) -> Result<RemoteFiles> {
        let url = build_api_url(&self.api_base, &self.full_name, &format!("tarball/{}", git_ref));
        let bytes = self
            .send(&url, "application/vnd.github+json")
            .await?
            .bytes()
            .await
            .map_err(|e| AppError::network_with_url(&url, e.to_string()))?;

        log::info!(
            "Fetched {} ({} bytes) at {}",
            self.full_name,
            bytes.len(),
            git_ref
        );
        RemoteFiles::from_tarball(git_ref, sub_path, bytes.to_vec())
    }
}
