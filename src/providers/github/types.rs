use serde::{Deserialize, Serialize};

/// Response from the repository search endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Total matches across all pages
    #[serde(default)]
    pub total_count: u64,
    /// Whether GitHub gave up before scanning every match
    #[serde(default)]
    pub incomplete_results: bool,
    /// This page of repositories
    #[serde(default)]
    pub items: Vec<RepoSummary>,
}

/// Repository summary as returned by search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoSummary {
    /// `owner/name`
    pub full_name: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    /// RFC 3339 timestamp of the last push
    pub pushed_at: Option<String>,
    #[serde(default)]
    pub archived: bool,
}

impl RepoSummary {
    /// Date part of `pushed_at`, or empty.
    pub fn pushed_date(&self) -> String {
        self.pushed_at
            .as_deref()
            .map(|ts| ts.chars().take(10).collect())
            .unwrap_or_default()
    }
}
