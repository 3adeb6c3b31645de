//! In-memory stand-ins for the warehouse and search backends.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

use crate::error::{PulseError, Result};
use crate::providers::bigquery::{AnalyticalQuery, QueryRow, TableRef, Warehouse, WarehouseTables};
use crate::providers::github::{RepoSearch, RepoSummary};

enum Reply {
    Rows(Vec<QueryRow>),
    Fail(String),
}

/// Answers a query with the first registered reply whose marker occurs in the SQL.
/// Unmatched queries return no rows.
#[derive(Default)]
pub struct FakeWarehouse {
    replies: Vec<(&'static str, Reply)>,
    queries: Mutex<Vec<AnalyticalQuery>>,
}

impl FakeWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, marker: &'static str, rows: Vec<Value>) -> Self {
        let rows = rows
            .into_iter()
            .map(|v| serde_json::from_value(v).expect("row must be a JSON object"))
            .collect();
        self.replies.push((marker, Reply::Rows(rows)));
        self
    }

    pub fn failing_on(mut self, marker: &'static str, message: &str) -> Self {
        self.replies.push((marker, Reply::Fail(message.to_string())));
        self
    }

    pub fn queries(&self) -> Vec<AnalyticalQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Warehouse for FakeWarehouse {
    async fn query(&self, query: &AnalyticalQuery) -> Result<Vec<QueryRow>> {
        self.queries.lock().unwrap().push(query.clone());
        match self.replies.iter().find(|(marker, _)| query.sql.contains(marker)) {
            Some((_, Reply::Rows(rows))) => Ok(rows.clone()),
            Some((_, Reply::Fail(message))) => Err(PulseError::Query(message.clone())),
            None => Ok(Vec::new()),
        }
    }
}

/// Returns the same page for every query and counts calls.
#[derive(Default)]
pub struct FakeSearch {
    items: Vec<RepoSummary>,
    fail: bool,
    calls: Mutex<usize>,
}

impl FakeSearch {
    pub fn with_repos(names: &[&str]) -> Self {
        Self {
            items: names
                .iter()
                .map(|name| RepoSummary {
                    full_name: Some(name.to_string()),
                    pushed_at: Some("2024-03-30T00:00:00Z".to_string()),
                    ..RepoSummary::default()
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl RepoSearch for FakeSearch {
    async fn search(&self, _query: &str, _per_page: u32) -> Result<Vec<RepoSummary>> {
        *self.calls.lock().unwrap() += 1;
        if self.fail {
            return Err(PulseError::Api {
                status: 503,
                message: "search unavailable".into(),
            });
        }
        Ok(self.items.clone())
    }
}

pub fn test_tables() -> WarehouseTables {
    WarehouseTables {
        daily_activity: TableRef::new("p", "mart", "int_repo_daily_activity").unwrap(),
        events: TableRef::new("p", "mart", "stg_github_events").unwrap(),
        pipeline_runs: TableRef::new("p", "mart", "pipeline_runs").unwrap(),
    }
}
