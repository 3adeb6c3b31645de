use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use log::{debug, info, warn};

use crate::analytics::{
    build_trend_rows, degree_rows, discover_candidates, fetch_edges, fetch_pipeline_status,
    fetch_repo_metrics, rank_trend_rows, AnalysisWindows, TrendMode,
};
use crate::auth::Token;
use crate::cache::{DashboardCache, DashboardKey, SearchKey};
use crate::config::{Config, DashboardConfig};
use crate::error::Result;
use crate::insights::{Candidate, DashboardPayload, PipelineStatus, UserEventRow};
use crate::providers::bigquery::{BigQueryClient, Warehouse, WarehouseTables};
use crate::providers::github::{GitHubSearchClient, RepoSearch};

/// Shown in place of the project id when none is configured.
pub const PROJECT_NOT_SET: &str = "(Not set)";

const MISSING_PROJECT_ERROR: &str = "BigQuery client init failed: GCP project id is not configured. \
     Set GCP_PROJECT_ID/PROJECT_ID/GOOGLE_CLOUD_PROJECT.";
const NO_CANDIDATES_MESSAGE: &str = "No popular repositories found for this window/mode.";
const NO_EXACT_BASELINE_WARNING: &str =
    "No ranked repository had activity in both windows; deltas reflect new activity only.";

/// One dashboard view, already normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardRequest {
    pub window_days: u32,
    pub mode: TrendMode,
    pub include_network: bool,
}

struct WarehouseBinding {
    client: Arc<dyn Warehouse>,
    tables: WarehouseTables,
    project_id: String,
}

/// Builds dashboard payloads from search and warehouse data, through the cache.
pub struct DashboardService {
    warehouse: Option<WarehouseBinding>,
    search: Arc<dyn RepoSearch>,
    cache: Arc<DashboardCache>,
    limits: DashboardConfig,
}

impl DashboardService {
    /// Wire real clients from configuration.
    ///
    /// A missing project id is not an error here; every load then reports it
    /// as the trend error without calling upstream.
    pub fn from_config(config: &Config) -> Result<Self> {
        let search = GitHubSearchClient::new(
            &config.github.base_url,
            config.github.token.as_deref().map(Token::from),
        )?;

        let cache = DashboardCache::new(
            Duration::from_secs(config.cache.search_ttl_secs),
            Duration::from_secs(config.cache.dashboard_ttl_secs),
        );

        let mut service = Self::new(Arc::new(search), Arc::new(cache), config.dashboard.clone());

        let wh = &config.warehouse;
        match wh.project_id.as_deref() {
            Some(project_id) => {
                let client = BigQueryClient::new(
                    &wh.base_url,
                    project_id,
                    &wh.location,
                    wh.access_token.as_deref().map(Token::from),
                    Duration::from_secs(wh.query_timeout_secs),
                )?;
                let tables = WarehouseTables::from_config(project_id, wh)?;
                service = service.with_warehouse(Arc::new(client), tables, project_id);
            }
            None => {
                warn!("No GCP project id configured; dashboard will report a configuration error");
            }
        }

        Ok(service)
    }

    pub fn new(
        search: Arc<dyn RepoSearch>,
        cache: Arc<DashboardCache>,
        limits: DashboardConfig,
    ) -> Self {
        Self {
            warehouse: None,
            search,
            cache,
            limits,
        }
    }

    pub fn with_warehouse(
        mut self,
        client: Arc<dyn Warehouse>,
        tables: WarehouseTables,
        project_id: &str,
    ) -> Self {
        self.warehouse = Some(WarehouseBinding {
            client,
            tables,
            project_id: project_id.to_string(),
        });
        self
    }

    pub fn cache(&self) -> &DashboardCache {
        &self.cache
    }

    pub fn default_window_days(&self) -> u32 {
        self.limits.default_window_days
    }

    /// Payload for `request`, from cache when a clean one is stored.
    ///
    /// Never fails: upstream problems land in the payload's error fields.
    pub async fn load(&self, request: &DashboardRequest) -> Arc<DashboardPayload> {
        let Some(binding) = &self.warehouse else {
            let mut payload = DashboardPayload::empty(
                PROJECT_NOT_SET,
                request.window_days,
                request.mode,
                request.include_network,
            );
            payload.trend_error = Some(MISSING_PROJECT_ERROR.to_string());
            return Arc::new(payload);
        };

        let key = DashboardKey {
            project_id: binding.project_id.clone(),
            mode: request.mode,
            window_days: request.window_days,
            include_network: request.include_network,
        };
        if let Some(payload) = self.cache.get_dashboard(&key) {
            return payload;
        }

        info!(
            "Building dashboard for {} ({}d, {}, network={})",
            binding.project_id, request.window_days, request.mode, request.include_network
        );

        let today = Utc::now().date_naive();
        let mut payload = DashboardPayload::empty(
            &binding.project_id,
            request.window_days,
            request.mode,
            request.include_network,
        );

        let (pipeline_status, candidates) = tokio::join!(
            self.pipeline_status(binding),
            self.candidates(request, today)
        );
        payload.pipeline_status = pipeline_status;

        if candidates.is_empty() {
            payload.trend_error = Some(NO_CANDIDATES_MESSAGE.to_string());
            return Arc::new(payload);
        }

        let windows = AnalysisWindows::ending_before(today, request.window_days);

        let metrics = match fetch_repo_metrics(
            binding.client.as_ref(),
            &binding.tables,
            &candidates,
            &windows,
        )
        .await
        {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!("Trend section failed: {e}");
                payload.trend_error = Some(format!("Trend query failed: {e}"));
                return Arc::new(payload);
            }
        };

        let trend_rows = rank_trend_rows(
            build_trend_rows(&candidates, &metrics),
            self.limits.top_trend,
        );
        if !trend_rows.is_empty() && !trend_rows.iter().any(|row| row.has_exact_baseline) {
            payload.trend_warning = Some(NO_EXACT_BASELINE_WARNING.to_string());
        }
        payload.user_event_rows = trend_rows.iter().map(UserEventRow::from).collect();

        if request.include_network {
            let repo_names: Vec<String> = trend_rows.iter().map(|r| r.repo_name.clone()).collect();
            match fetch_edges(
                binding.client.as_ref(),
                &binding.tables,
                &repo_names,
                &windows,
                self.limits.min_shared_contributors,
            )
            .await
            {
                Ok(edges) => {
                    payload.degree_rows = degree_rows(&edges, self.limits.degree_top_n);
                    payload.edge_rows = edges;
                }
                Err(e) => {
                    warn!("Network section failed: {e}");
                    payload.edge_error = Some(format!("edge query failed: {e}"));
                }
            }
        }

        payload.trend_rows = trend_rows;
        let payload = Arc::new(payload);

        if !payload.has_errors() {
            self.cache.put_dashboard(key, Arc::clone(&payload));
            let (search_entries, dashboard_entries) = self.cache.len();
            debug!("Cache holds {search_entries} search and {dashboard_entries} dashboard entries");
        }

        payload
    }

    async fn pipeline_status(&self, binding: &WarehouseBinding) -> Option<PipelineStatus> {
        match fetch_pipeline_status(binding.client.as_ref(), &binding.tables).await {
            Ok(status) => status,
            Err(e) => {
                warn!("Pipeline status unavailable: {e}");
                None
            }
        }
    }

    async fn candidates(
        &self,
        request: &DashboardRequest,
        today: NaiveDate,
    ) -> Arc<Vec<Candidate>> {
        let key = SearchKey {
            mode: request.mode,
            window_days: request.window_days,
        };
        if let Some(candidates) = self.cache.get_search(&key) {
            return candidates;
        }

        let candidates = Arc::new(
            discover_candidates(
                self.search.as_ref(),
                request.mode,
                request.window_days,
                today,
                self.limits.trend_limit,
            )
            .await,
        );

        // An empty result is retried on the next request.
        if !candidates.is_empty() {
            self.cache.put_search(key, Arc::clone(&candidates));
        }
        candidates
    }
}
