use std::collections::HashMap;

use log::debug;

use crate::error::Result;
use crate::insights::{Candidate, RepoMetrics, TrendRow};
use crate::providers::bigquery::{row_i64, row_string, AnalyticalQuery, Warehouse, WarehouseTables};

use super::filters::{is_valid_repo_name, BLACKLIST_PATTERN};
use super::windows::AnalysisWindows;

/// Events and contributors for both windows in one pass over each table.
///
/// `curr_contributors`/`prev_contributors` skip blacklisted identities; the
/// `_all` variants count every non-null contributor.
fn metrics_query(tables: &WarehouseTables) -> String {
    format!(
        r#"
    WITH target AS (
      SELECT repo_name FROM UNNEST(@repo_names) AS repo_name
    ),
    activity AS (
      SELECT
        a.repo_name,
        SUM(IF(a.activity_date BETWEEN @curr_start AND @curr_end, COALESCE(a.total_events, 0), 0)) AS curr_events,
        SUM(IF(a.activity_date BETWEEN @prev_start AND @prev_end, COALESCE(a.total_events, 0), 0)) AS prev_events
      FROM {daily} a
      JOIN target t ON a.repo_name = t.repo_name
      WHERE a.activity_date BETWEEN @prev_start AND @curr_end
      GROUP BY a.repo_name
    ),
    contributors AS (
      SELECT
        s.repo_name,
        COUNT(DISTINCT IF(s.activity_date BETWEEN @curr_start AND @curr_end
          AND NOT REGEXP_CONTAINS(LOWER(s.contributor), @blacklist), s.contributor, NULL)) AS curr_contributors,
        COUNT(DISTINCT IF(s.activity_date BETWEEN @prev_start AND @prev_end
          AND NOT REGEXP_CONTAINS(LOWER(s.contributor), @blacklist), s.contributor, NULL)) AS prev_contributors,
        COUNT(DISTINCT IF(s.activity_date BETWEEN @curr_start AND @curr_end, s.contributor, NULL)) AS curr_contributors_all,
        COUNT(DISTINCT IF(s.activity_date BETWEEN @prev_start AND @prev_end, s.contributor, NULL)) AS prev_contributors_all
      FROM {events} s
      JOIN target t ON s.repo_name = t.repo_name
      WHERE s.contributor IS NOT NULL
        AND s.activity_date BETWEEN @prev_start AND @curr_end
      GROUP BY s.repo_name
    )
    SELECT
      t.repo_name,
      IFNULL(a.curr_events, 0) AS curr_events,
      IFNULL(a.prev_events, 0) AS prev_events,
      IFNULL(c.curr_contributors, 0) AS curr_contributors,
      IFNULL(c.prev_contributors, 0) AS prev_contributors,
      IFNULL(c.curr_contributors_all, 0) AS curr_contributors_all,
      IFNULL(c.prev_contributors_all, 0) AS prev_contributors_all
    FROM target t
    LEFT JOIN activity a ON a.repo_name = t.repo_name
    LEFT JOIN contributors c ON c.repo_name = t.repo_name
    "#,
        daily = tables.daily_activity,
        events = tables.events,
    )
}

/// Window metrics for every candidate with a well-formed name, in input order.
///
/// Repositories the warehouse has no rows for get zeroes. An empty (or
/// entirely malformed) input returns without querying. Query failures are
/// returned to the caller.
pub async fn fetch_repo_metrics(
    warehouse: &dyn Warehouse,
    tables: &WarehouseTables,
    candidates: &[Candidate],
    windows: &AnalysisWindows,
) -> Result<Vec<RepoMetrics>> {
    let names: Vec<String> = candidates
        .iter()
        .map(|c| c.repo_name.as_str())
        .filter(|name| is_valid_repo_name(name))
        .map(str::to_string)
        .collect();

    if names.is_empty() {
        return Ok(Vec::new());
    }

    let query = AnalyticalQuery::new(metrics_query(tables))
        .bind("repo_names", names.clone())
        .bind("curr_start", windows.curr_start)
        .bind("curr_end", windows.curr_end)
        .bind("prev_start", windows.prev_start)
        .bind("prev_end", windows.prev_end)
        .bind("blacklist", BLACKLIST_PATTERN);

    let rows = warehouse.query(&query).await?;
    debug!("Metrics query returned {} rows for {} repos", rows.len(), names.len());

    let mut by_name: HashMap<String, RepoMetrics> = rows
        .iter()
        .map(|row| {
            let repo_name = row_string(row, "repo_name", "");
            let metrics = RepoMetrics {
                repo_name: repo_name.clone(),
                curr_events: row_i64(row, "curr_events"),
                prev_events: row_i64(row, "prev_events"),
                curr_contributors: row_i64(row, "curr_contributors"),
                prev_contributors: row_i64(row, "prev_contributors"),
                curr_contributors_all: row_i64(row, "curr_contributors_all"),
                prev_contributors_all: row_i64(row, "prev_contributors_all"),
            };
            (repo_name, metrics)
        })
        .collect();

    Ok(names
        .iter()
        .map(|name| by_name.remove(name).unwrap_or_else(|| RepoMetrics::empty(name)))
        .collect())
}

/// Pair candidates with their metrics into unranked trend rows.
///
/// Candidates without metrics (malformed names) are dropped.
pub fn build_trend_rows(candidates: &[Candidate], metrics: &[RepoMetrics]) -> Vec<TrendRow> {
    let by_name: HashMap<&str, &RepoMetrics> =
        metrics.iter().map(|m| (m.repo_name.as_str(), m)).collect();

    candidates
        .iter()
        .filter_map(|candidate| {
            by_name
                .get(candidate.repo_name.as_str())
                .map(|metrics| TrendRow::new(candidate, metrics))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PulseError;
    use crate::providers::bigquery::ParamValue;
    use crate::test_support::{test_tables, FakeWarehouse};
    use chrono::NaiveDate;
    use serde_json::json;

    const MARKER: &str = "curr_contributors_all";

    fn windows() -> AnalysisWindows {
        AnalysisWindows::ending_at(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(), 14)
    }

    fn candidate(name: &str) -> Candidate {
        Candidate {
            repo_name: name.to_string(),
            last_activity_date: "2024-03-30".to_string(),
        }
    }

    #[tokio::test]
    async fn test_empty_candidates_issue_no_query() {
        let warehouse = FakeWarehouse::new();
        let metrics = fetch_repo_metrics(&warehouse, &test_tables(), &[], &windows())
            .await
            .unwrap();
        assert!(metrics.is_empty());
        assert!(warehouse.queries().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_names_are_dropped_before_querying() {
        let warehouse = FakeWarehouse::new();
        let candidates = vec![candidate("good/repo"), candidate("bad'); DROP --")];

        let metrics = fetch_repo_metrics(&warehouse, &test_tables(), &candidates, &windows())
            .await
            .unwrap();

        assert_eq!(metrics.len(), 1);
        assert_eq!(
            warehouse.queries()[0].param("repo_names"),
            Some(&ParamValue::StringArray(vec!["good/repo".to_string()]))
        );
    }

    #[tokio::test]
    async fn test_query_binds_windows_and_blacklist() {
        let warehouse = FakeWarehouse::new();
        fetch_repo_metrics(&warehouse, &test_tables(), &[candidate("a/a")], &windows())
            .await
            .unwrap();

        let queries = warehouse.queries();
        let query = &queries[0];
        let d = |day| ParamValue::Date(NaiveDate::from_ymd_opt(2024, 3, day).unwrap());
        assert_eq!(query.param("curr_end"), Some(&d(31)));
        assert_eq!(query.param("curr_start"), Some(&d(17)));
        assert_eq!(query.param("prev_end"), Some(&d(17)));
        assert_eq!(query.param("prev_start"), Some(&d(3)));
        assert_eq!(
            query.param("blacklist"),
            Some(&ParamValue::String("(copilot|claude|codex)".to_string()))
        );
        assert!(query.sql.contains("`p.mart.int_repo_daily_activity`"));
        assert!(query.sql.contains("`p.mart.stg_github_events`"));
        assert_eq!(
            query
                .sql
                .matches("REGEXP_CONTAINS(LOWER(s.contributor), @blacklist)")
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_missing_rows_are_zero_filled_in_input_order() {
        let warehouse = FakeWarehouse::new().on(
            MARKER,
            vec![json!({
                "repo_name": "b/b",
                "curr_events": 30,
                "prev_events": "10",
                "curr_contributors": 4,
                "prev_contributors": 2,
                "curr_contributors_all": 6,
                "prev_contributors_all": 2
            })],
        );
        let candidates = vec![candidate("a/a"), candidate("b/b")];

        let metrics = fetch_repo_metrics(&warehouse, &test_tables(), &candidates, &windows())
            .await
            .unwrap();

        assert_eq!(metrics[0], RepoMetrics::empty("a/a"));
        assert_eq!(metrics[1].repo_name, "b/b");
        assert_eq!(metrics[1].prev_events, 10);
        assert_eq!(metrics[1].curr_contributors_all, 6);

        let rows = build_trend_rows(&candidates, &metrics);
        assert_eq!(rows[0].delta_score, 0);
        assert!(!rows[0].has_baseline);
        assert_eq!(rows[1].activity_delta_window, 20);
        assert_eq!(rows[1].contributors_delta_window, 2);
        assert_eq!(rows[1].delta_score, 22);
        assert!(rows[1].has_exact_baseline);
    }

    #[tokio::test]
    async fn test_query_failure_propagates() {
        let warehouse = FakeWarehouse::new().failing_on(MARKER, "boom");
        let result =
            fetch_repo_metrics(&warehouse, &test_tables(), &[candidate("a/a")], &windows()).await;
        assert!(matches!(result, Err(PulseError::Query(_))));
    }

    #[test]
    fn test_build_trend_rows_skips_candidates_without_metrics() {
        let candidates = vec![candidate("a/a"), candidate("bad")];
        let rows = build_trend_rows(&candidates, &[RepoMetrics::empty("a/a")]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].repo_name, "a/a");
    }
}
