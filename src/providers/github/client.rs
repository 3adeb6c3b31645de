use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use std::time::Duration;
use url::Url;

use crate::auth::Token;
use crate::error::{PulseError, Result};

use super::types::{RepoSummary, SearchResponse};
use super::RepoSearch;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(12);

/// GitHub API client for repository search.
#[derive(Clone)]
pub struct GitHubSearchClient {
    /// HTTP client
    client: reqwest::Client,
    /// `.../search/repositories`
    pub(super) search_url: Url,
}

impl GitHubSearchClient {
    /// Create a new GitHub search client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - GitHub API base URL (e.g., "https://api.github.com")
    /// * `token` - Optional GitHub personal access token, raising the rate limit
    pub fn new(base_url: &str, token: Option<Token>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));

        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
                .map_err(|e| PulseError::Config(format!("Invalid GitHub token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .user_agent("oss-analytics-dashboard")
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PulseError::Config(format!("Failed to create HTTP client: {e}")))?;

        let mut base = Url::parse(base_url)
            .map_err(|e| PulseError::Config(format!("Invalid GitHub base URL: {e}")))?;
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let search_url = base
            .join("search/repositories")
            .map_err(|e| PulseError::Config(format!("Invalid search URL: {e}")))?;

        Ok(Self { client, search_url })
    }

    /// Fetch the first page of a repository search, most-starred first.
    ///
    /// Any non-200 response is an error.
    pub async fn search_repositories(&self, query: &str, per_page: u32) -> Result<SearchResponse> {
        debug!("GitHub search: {query}");

        let response = self
            .client
            .get(self.search_url.clone())
            .query(&[
                ("q", query),
                ("sort", "stars"),
                ("order", "desc"),
                ("per_page", &per_page.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(PulseError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl RepoSearch for GitHubSearchClient {
    async fn search(&self, query: &str, per_page: u32) -> Result<Vec<RepoSummary>> {
        Ok(self.search_repositories(query, per_page).await?.items)
    }
}
