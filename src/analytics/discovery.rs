use chrono::{Days, NaiveDate};
use futures::future::join_all;
use indexmap::IndexMap;
use log::{debug, info, warn};

use crate::insights::Candidate;
use crate::providers::github::{RepoSearch, RepoSummary};

use super::filters::{is_blacklisted, is_valid_repo_name};
use super::TrendMode;

const SEARCH_PAGE_SIZE: u32 = 30;

/// Search queries for a mode, strictest popularity floor first.
pub fn mode_queries(mode: TrendMode, since: NaiveDate) -> Vec<String> {
    let floors: &[&str] = match mode {
        TrendMode::Trending => &["stars:>=100", "stars:>=40 forks:>=20", "forks:>=50"],
        TrendMode::Balanced => &["stars:>=40", "forks:>=10"],
        TrendMode::Broad => &["stars:>=10", "forks:>=2"],
    };
    floors.iter().map(|floor| pushed_query(since, Some(floor))).collect()
}

/// Looser queries used only when every mode query came back empty.
pub fn fallback_queries(since: NaiveDate) -> Vec<String> {
    ["stars:>=5", "forks:>=1"]
        .iter()
        .map(|floor| pushed_query(since, Some(floor)))
        .chain(std::iter::once(pushed_query(since, None)))
        .collect()
}

fn pushed_query(since: NaiveDate, floor: Option<&str>) -> String {
    let since = since.format("%Y-%m-%d");
    match floor {
        Some(floor) => format!("pushed:>={since} {floor} -is:archived"),
        None => format!("pushed:>={since} -is:archived"),
    }
}

/// Merge per-query result pages into distinct candidates.
///
/// Pages are taken in query order and the first sighting of a name wins, so
/// a repository keeps the rank of the strictest query that found it.
/// Malformed, blacklisted and archived repositories are dropped.
pub fn merge_search_results(pages: Vec<Vec<RepoSummary>>) -> Vec<Candidate> {
    let mut merged: IndexMap<String, Candidate> = IndexMap::new();

    for item in pages.into_iter().flatten() {
        let Some(name) = item.full_name.as_deref() else {
            continue;
        };
        if item.archived || !is_valid_repo_name(name) || is_blacklisted(name) {
            continue;
        }
        if merged.contains_key(name) {
            continue;
        }
        merged.insert(
            name.to_string(),
            Candidate {
                repo_name: name.to_string(),
                last_activity_date: item.pushed_date(),
            },
        );
    }

    merged.into_values().collect()
}

async fn run_tier(search: &dyn RepoSearch, queries: &[String]) -> Vec<Candidate> {
    let pages = join_all(queries.iter().map(|query| async move {
        match search.search(query, SEARCH_PAGE_SIZE).await {
            Ok(items) => items,
            Err(e) => {
                warn!("Skipping search query {query:?}: {e}");
                Vec::new()
            }
        }
    }))
    .await;

    merge_search_results(pages)
}

/// Find up to `limit` candidate repositories pushed within the last `window_days`.
///
/// A failed sub-query is skipped; the remaining ones still count. When the
/// mode queries yield nothing, the fallback tier is tried once.
pub async fn discover_candidates(
    search: &dyn RepoSearch,
    mode: TrendMode,
    window_days: u32,
    today: NaiveDate,
    limit: usize,
) -> Vec<Candidate> {
    let since = today - Days::new(u64::from(window_days));

    let mut candidates = run_tier(search, &mode_queries(mode, since)).await;

    if candidates.is_empty() {
        info!("No {mode} candidates since {since}, relaxing search filters");
        candidates = run_tier(search, &fallback_queries(since)).await;
    }

    candidates.truncate(limit);
    debug!("Discovered {} candidates", candidates.len());
    candidates
}
