mod client;
mod types;


use async_trait::async_trait;

use crate::error::Result;

pub use client::GitHubSearchClient;
pub use types::RepoSummary;

/// Repository search backend used for candidate discovery.
#[async_trait]
pub trait RepoSearch: Send + Sync {
    /// One page of results for a GitHub search query string.
    async fn search(&self, query: &str, per_page: u32) -> Result<Vec<RepoSummary>>;
}
