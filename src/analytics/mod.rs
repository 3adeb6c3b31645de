mod discovery;
mod filters;
mod metrics;
mod network;
mod pipeline_status;
mod ranking;
mod windows;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use discovery::discover_candidates;
pub use metrics::{build_trend_rows, fetch_repo_metrics};
pub use network::{degree_rows, fetch_edges};
pub use pipeline_status::fetch_pipeline_status;
pub use ranking::rank_trend_rows;
pub use windows::AnalysisWindows;

/// Window lengths, in days, the dashboard accepts.
pub const ALLOWED_WINDOW_DAYS: [u32; 3] = [7, 14, 30];

/// How strict the candidate search is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendMode {
    #[default]
    Trending,
    Balanced,
    Broad,
}

impl TrendMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trending => "trending",
            Self::Balanced => "balanced",
            Self::Broad => "broad",
        }
    }

    /// Unknown or missing values select [`TrendMode::Trending`].
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("balanced") => Self::Balanced,
            Some("broad") => Self::Broad,
            _ => Self::Trending,
        }
    }
}

impl fmt::Display for TrendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
