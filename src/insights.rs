use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics::TrendMode;

/// A repository surfaced by search, before any warehouse enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub repo_name: String,
    /// `YYYY-MM-DD` of the last push, empty when the API omitted it
    pub last_activity_date: String,
}

/// Window counts for one repository as read from the warehouse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoMetrics {
    pub repo_name: String,
    pub curr_events: i64,
    pub prev_events: i64,
    /// Distinct non-blacklisted contributors
    pub curr_contributors: i64,
    pub prev_contributors: i64,
    /// Distinct contributors including bots
    pub curr_contributors_all: i64,
    pub prev_contributors_all: i64,
}

impl RepoMetrics {
    pub fn empty(repo_name: &str) -> Self {
        Self {
            repo_name: repo_name.to_string(),
            ..Self::default()
        }
    }

    fn curr_activity(&self) -> i64 {
        self.curr_events + self.curr_contributors
    }

    fn prev_activity(&self) -> i64 {
        self.prev_events + self.prev_contributors
    }

    /// Activity in at least one window.
    pub fn has_baseline(&self) -> bool {
        self.curr_activity() > 0 || self.prev_activity() > 0
    }

    /// Activity in both windows, so the delta is a real trend.
    pub fn has_exact_baseline(&self) -> bool {
        self.curr_activity() > 0 && self.prev_activity() > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendRow {
    pub repo_name: String,
    pub last_activity_date: String,
    pub curr_events: i64,
    pub prev_events: i64,
    pub curr_contributors: i64,
    pub prev_contributors: i64,
    pub activity_delta_window: i64,
    pub contributors_delta_window: i64,
    pub delta_score: i64,
    /// Current-window events; named for the chart column it feeds
    pub stars_total: i64,
    /// Current-window contributors; named for the chart column it feeds
    pub forks_total: i64,
    pub has_baseline: bool,
    pub has_exact_baseline: bool,
}

impl TrendRow {
    pub fn new(candidate: &Candidate, metrics: &RepoMetrics) -> Self {
        let activity_delta_window = metrics.curr_events - metrics.prev_events;
        let contributors_delta_window = metrics.curr_contributors - metrics.prev_contributors;
        Self {
            repo_name: candidate.repo_name.clone(),
            last_activity_date: candidate.last_activity_date.clone(),
            curr_events: metrics.curr_events,
            prev_events: metrics.prev_events,
            curr_contributors: metrics.curr_contributors,
            prev_contributors: metrics.prev_contributors,
            activity_delta_window,
            contributors_delta_window,
            delta_score: activity_delta_window + contributors_delta_window,
            stars_total: metrics.curr_events,
            forks_total: metrics.curr_contributors,
            has_baseline: metrics.has_baseline(),
            has_exact_baseline: metrics.has_exact_baseline(),
        }
    }
}

/// Event and human-contributor movement for a ranked repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEventRow {
    pub repo_name: String,
    pub curr_event_count: i64,
    pub prev_event_count: i64,
    pub curr_contributor_count: i64,
    pub prev_contributor_count: i64,
    pub event_delta: i64,
    pub contributor_delta: i64,
}

impl From<&TrendRow> for UserEventRow {
    fn from(row: &TrendRow) -> Self {
        Self {
            repo_name: row.repo_name.clone(),
            curr_event_count: row.curr_events,
            prev_event_count: row.prev_events,
            curr_contributor_count: row.curr_contributors,
            prev_contributor_count: row.prev_contributors,
            event_delta: row.activity_delta_window,
            contributor_delta: row.contributors_delta_window,
        }
    }
}

/// Two repositories sharing contributors. Always `source_repo < target_repo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRow {
    pub source_repo: String,
    pub target_repo: String,
    pub shared_contributor_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegreeRow {
    pub repo_name: String,
    pub degree: i64,
}

/// Latest run of the external ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStatus {
    pub run_id: String,
    pub dag_id: String,
    pub status: String,
    pub executed_for_date: String,
    pub run_started_at: String,
    pub raw_events_rows: i64,
}

/// Everything one dashboard view shows. Cached as a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardPayload {
    pub project_id: String,
    pub window_days: u32,
    pub trend_mode: TrendMode,
    pub include_network: bool,
    pub generated_at: DateTime<Utc>,
    pub trend_rows: Vec<TrendRow>,
    pub user_event_rows: Vec<UserEventRow>,
    pub edge_rows: Vec<EdgeRow>,
    pub degree_rows: Vec<DegreeRow>,
    pub trend_error: Option<String>,
    pub trend_warning: Option<String>,
    pub edge_error: Option<String>,
    pub pipeline_status: Option<PipelineStatus>,
}

impl DashboardPayload {
    pub fn empty(
        project_id: &str,
        window_days: u32,
        trend_mode: TrendMode,
        include_network: bool,
    ) -> Self {
        Self {
            project_id: project_id.to_string(),
            window_days,
            trend_mode,
            include_network,
            generated_at: Utc::now(),
            trend_rows: Vec::new(),
            user_event_rows: Vec::new(),
            edge_rows: Vec::new(),
            degree_rows: Vec::new(),
            trend_error: None,
            trend_warning: None,
            edge_error: None,
            pipeline_status: None,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.trend_error.is_some() || self.edge_error.is_some()
    }
}
