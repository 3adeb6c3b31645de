use std::collections::HashMap;

use log::{debug, warn};

use crate::error::Result;
use crate::insights::{DegreeRow, EdgeRow};
use crate::providers::bigquery::{row_i64, row_string, AnalyticalQuery, Warehouse, WarehouseTables};

use super::filters::{valid_repo_names, BLACKLIST_PATTERN};
use super::windows::AnalysisWindows;

/// Upper bound on edges returned for one view.
pub const MAX_EDGES: u32 = 400;

fn edges_query(tables: &WarehouseTables) -> String {
    format!(
        r#"
    WITH target_repos AS (
      SELECT repo_name FROM UNNEST(@repo_names) AS repo_name
    ),
    repo_contributors AS (
      SELECT DISTINCT
        s.repo_name,
        s.contributor
      FROM {events} s
      JOIN target_repos tr ON s.repo_name = tr.repo_name
      WHERE s.contributor IS NOT NULL
        AND s.activity_date BETWEEN @curr_start AND @curr_end
        AND NOT REGEXP_CONTAINS(LOWER(s.contributor), @blacklist)
    ),
    paired AS (
      SELECT
        a.repo_name AS source_repo,
        b.repo_name AS target_repo,
        COUNT(DISTINCT a.contributor) AS shared_contributor_count
      FROM repo_contributors a
      JOIN repo_contributors b
        ON a.contributor = b.contributor
       AND a.repo_name < b.repo_name
      GROUP BY 1, 2
    )
    SELECT
      source_repo,
      target_repo,
      shared_contributor_count
    FROM paired
    WHERE shared_contributor_count >= @min_shared
    ORDER BY shared_contributor_count DESC, source_repo, target_repo
    LIMIT @max_edges
    "#,
        events = tables.events,
    )
}

/// Repository pairs sharing at least `min_shared` human contributors in the
/// current window, heaviest first.
///
/// Rows that break `source_repo < target_repo` or the threshold are dropped
/// even if the warehouse returns them.
pub async fn fetch_edges(
    warehouse: &dyn Warehouse,
    tables: &WarehouseTables,
    repo_names: &[String],
    windows: &AnalysisWindows,
    min_shared: u32,
) -> Result<Vec<EdgeRow>> {
    let names = valid_repo_names(repo_names.iter().map(String::as_str));
    if names.is_empty() {
        return Ok(Vec::new());
    }

    let query = AnalyticalQuery::new(edges_query(tables))
        .bind("repo_names", names)
        .bind("curr_start", windows.curr_start)
        .bind("curr_end", windows.curr_end)
        .bind("blacklist", BLACKLIST_PATTERN)
        .bind("min_shared", min_shared)
        .bind("max_edges", MAX_EDGES);

    let rows = warehouse.query(&query).await?;

    let mut edges: Vec<EdgeRow> = rows
        .iter()
        .map(|row| EdgeRow {
            source_repo: row_string(row, "source_repo", ""),
            target_repo: row_string(row, "target_repo", ""),
            shared_contributor_count: row_i64(row, "shared_contributor_count"),
        })
        .filter(|edge| {
            let keep = edge.source_repo < edge.target_repo
                && edge.shared_contributor_count >= i64::from(min_shared);
            if !keep {
                warn!("Dropping non-canonical edge {edge:?}");
            }
            keep
        })
        .collect();

    edges.sort_by(|a, b| b.shared_contributor_count.cmp(&a.shared_contributor_count));
    edges.truncate(MAX_EDGES as usize);
    debug!("Built {} edges", edges.len());

    Ok(edges)
}

/// Weighted degree per repository, highest first, ties by name.
pub fn degree_rows(edges: &[EdgeRow], top_n: usize) -> Vec<DegreeRow> {
    let mut degrees: HashMap<&str, i64> = HashMap::new();
    for edge in edges {
        *degrees.entry(edge.source_repo.as_str()).or_default() += edge.shared_contributor_count;
        *degrees.entry(edge.target_repo.as_str()).or_default() += edge.shared_contributor_count;
    }

    let mut rows: Vec<DegreeRow> = degrees
        .into_iter()
        .map(|(repo_name, degree)| DegreeRow {
            repo_name: repo_name.to_string(),
            degree,
        })
        .collect();

    rows.sort_by(|a, b| b.degree.cmp(&a.degree).then_with(|| a.repo_name.cmp(&b.repo_name)));
    rows.truncate(top_n);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::bigquery::ParamValue;
    use crate::test_support::{test_tables, FakeWarehouse};
    use chrono::NaiveDate;
    use serde_json::json;

    const MARKER: &str = "shared_contributor_count";

    fn windows() -> AnalysisWindows {
        AnalysisWindows::ending_at(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(), 7)
    }

    fn edge(source: &str, target: &str, count: i64) -> EdgeRow {
        EdgeRow {
            source_repo: source.to_string(),
            target_repo: target.to_string(),
            shared_contributor_count: count,
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_input_issues_no_query() {
        let warehouse = FakeWarehouse::new();
        let edges = fetch_edges(&warehouse, &test_tables(), &[], &windows(), 1)
            .await
            .unwrap();
        assert!(edges.is_empty());
        assert!(warehouse.queries().is_empty());
    }

    #[tokio::test]
    async fn test_edges_are_canonical_and_above_threshold() {
        let warehouse = FakeWarehouse::new().on(
            MARKER,
            vec![
                json!({"source_repo": "a/a", "target_repo": "b/b", "shared_contributor_count": 3}),
                json!({"source_repo": "c/c", "target_repo": "b/b", "shared_contributor_count": 5}),
                json!({"source_repo": "d/d", "target_repo": "d/d", "shared_contributor_count": 9}),
                json!({"source_repo": "a/a", "target_repo": "c/c", "shared_contributor_count": 1}),
                json!({"source_repo": "b/b", "target_repo": "c/c",
                       "shared_contributor_count": "4"}),
            ],
        );

        let edges = fetch_edges(
            &warehouse,
            &test_tables(),
            &names(&["a/a", "b/b", "c/c", "d/d"]),
            &windows(),
            2,
        )
        .await
        .unwrap();

        assert_eq!(edges, vec![edge("b/b", "c/c", 4), edge("a/a", "b/b", 3)]);
        for e in &edges {
            assert!(e.source_repo < e.target_repo);
            assert!(e.shared_contributor_count >= 2);
        }
    }

    #[tokio::test]
    async fn test_edge_query_parameters() {
        let warehouse = FakeWarehouse::new();
        fetch_edges(&warehouse, &test_tables(), &names(&["a/a", "oops"]), &windows(), 1)
            .await
            .unwrap();

        let queries = warehouse.queries();
        let query = &queries[0];
        assert_eq!(
            query.param("repo_names"),
            Some(&ParamValue::StringArray(names(&["a/a"])))
        );
        assert_eq!(query.param("min_shared"), Some(&ParamValue::Int64(1)));
        assert_eq!(query.param("max_edges"), Some(&ParamValue::Int64(400)));
        assert_eq!(
            query.param("curr_start"),
            Some(&ParamValue::Date(NaiveDate::from_ymd_opt(2024, 3, 24).unwrap()))
        );
        assert!(query.sql.contains("a.repo_name < b.repo_name"));
        assert!(query.sql.contains("NOT REGEXP_CONTAINS(LOWER(s.contributor), @blacklist)"));
    }

    #[test]
    fn test_degree_rows_sum_both_endpoints() {
        let edges = vec![
            edge("a/a", "b/b", 3),
            edge("b/b", "c/c", 2),
            edge("a/a", "c/c", 1),
            edge("d/d", "e/e", 1),
        ];

        let rows = degree_rows(&edges, 15);

        let pairs: Vec<_> = rows.iter().map(|r| (r.repo_name.as_str(), r.degree)).collect();
        assert_eq!(
            pairs,
            vec![("b/b", 5), ("a/a", 4), ("c/c", 3), ("d/d", 1), ("e/e", 1)]
        );
    }

    #[test]
    fn test_degree_rows_truncate() {
        let edges = vec![edge("a/a", "b/b", 3), edge("c/c", "d/d", 1)];
        let rows = degree_rows(&edges, 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].repo_name, "a/a");
        assert_eq!(rows[1].repo_name, "b/b");
    }

    #[test]
    fn test_degree_rows_empty() {
        assert!(degree_rows(&[], 15).is_empty());
    }
}
