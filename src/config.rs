use anyhow::{bail, Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::analytics::ALLOWED_WINDOW_DAYS;

/// Configuration for the dashboard service.
///
/// Values come from a config file (optional) and are then overridden by
/// command-line flags, each of which can also be set through the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Warehouse (BigQuery) connection and table names
    #[serde(default)]
    pub warehouse: WarehouseConfig,

    /// GitHub search API settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Dashboard shaping limits
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Cache lifetimes
    #[serde(default)]
    pub cache: CacheConfig,

    /// HTTP listener
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WarehouseConfig {
    /// GCP project that owns the dataset
    pub project_id: Option<String>,

    /// BigQuery job location
    #[serde(default = "default_location")]
    pub location: String,

    /// Dataset holding the mart tables
    #[serde(default = "default_dataset")]
    pub dataset: String,

    /// Per-day event totals per repository
    #[serde(default = "default_daily_activity_table")]
    pub daily_activity_table: String,

    /// Staged events with one contributor per row
    #[serde(default = "default_events_table")]
    pub events_table: String,

    /// External pipeline run log
    #[serde(default = "default_pipeline_runs_table")]
    pub pipeline_runs_table: String,

    /// Static OAuth access token; the metadata server is used when absent
    pub access_token: Option<String>,

    /// BigQuery REST base URL
    #[serde(default = "default_bigquery_base_url")]
    pub base_url: String,

    /// Upper bound on how long a query job may run
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitHubConfig {
    /// GitHub personal access token
    pub token: Option<String>,

    /// GitHub API base URL
    #[serde(default = "default_github_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DashboardConfig {
    /// Maximum candidates kept from search
    #[serde(default = "default_trend_limit")]
    pub trend_limit: usize,

    /// Rows kept after ranking
    #[serde(default = "default_top_trend")]
    pub top_trend: usize,

    /// Window used when the request gives none or an unsupported one
    #[serde(default = "default_window_days")]
    pub default_window_days: u32,

    /// Minimum shared contributors for an edge
    #[serde(default = "default_min_shared_contributors")]
    pub min_shared_contributors: u32,

    /// Rows kept in the degree chart
    #[serde(default = "default_degree_top_n")]
    pub degree_top_n: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CacheConfig {
    #[serde(default = "default_search_ttl_secs")]
    pub search_ttl_secs: u64,

    #[serde(default = "default_dashboard_ttl_secs")]
    pub dashboard_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            location: default_location(),
            dataset: default_dataset(),
            daily_activity_table: default_daily_activity_table(),
            events_table: default_events_table(),
            pipeline_runs_table: default_pipeline_runs_table(),
            access_token: None,
            base_url: default_bigquery_base_url(),
            query_timeout_secs: default_query_timeout_secs(),
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: default_github_base_url(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            trend_limit: default_trend_limit(),
            top_trend: default_top_trend(),
            default_window_days: default_window_days(),
            min_shared_contributors: default_min_shared_contributors(),
            degree_top_n: default_degree_top_n(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            search_ttl_secs: default_search_ttl_secs(),
            dashboard_ttl_secs: default_dashboard_ttl_secs(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_location() -> String {
    "US".to_string()
}

fn default_dataset() -> String {
    "oss_analytics_mart".to_string()
}

fn default_daily_activity_table() -> String {
    "int_repo_daily_activity".to_string()
}

fn default_events_table() -> String {
    "stg_github_events".to_string()
}

fn default_pipeline_runs_table() -> String {
    "pipeline_runs".to_string()
}

fn default_bigquery_base_url() -> String {
    "https://bigquery.googleapis.com".to_string()
}

fn default_query_timeout_secs() -> u64 {
    60
}

fn default_github_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_trend_limit() -> usize {
    120
}

fn default_top_trend() -> usize {
    40
}

fn default_window_days() -> u32 {
    30
}

fn default_min_shared_contributors() -> u32 {
    1
}

fn default_degree_top_n() -> usize {
    15
}

fn default_search_ttl_secs() -> u64 {
    300
}

fn default_dashboard_ttl_secs() -> u64 {
    43_200
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Command-line/environment overrides applied on top of the loaded file.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigOverrides {
    /// GCP project id (also read from PROJECT_ID / GOOGLE_CLOUD_PROJECT)
    #[arg(long, env = "GCP_PROJECT_ID", global = true)]
    pub project_id: Option<String>,

    #[arg(long, env = "BQ_LOCATION", global = true)]
    pub location: Option<String>,

    #[arg(long, env = "MART_DATASET", global = true)]
    pub dataset: Option<String>,

    #[arg(long, env = "INT_REPO_DAILY_ACTIVITY_TABLE", global = true)]
    pub daily_activity_table: Option<String>,

    #[arg(long, env = "STG_GITHUB_EVENTS_TABLE", global = true)]
    pub events_table: Option<String>,

    #[arg(long, env = "PIPELINE_RUNS_TABLE", global = true)]
    pub pipeline_runs_table: Option<String>,

    #[arg(long, env = "BQ_ACCESS_TOKEN", global = true, hide_env_values = true)]
    pub bq_access_token: Option<String>,

    #[arg(long, env = "GITHUB_TOKEN", global = true, hide_env_values = true)]
    pub github_token: Option<String>,

    #[arg(long, env = "TREND_LIMIT", global = true)]
    pub trend_limit: Option<usize>,

    #[arg(long, env = "TOP_TREND", global = true)]
    pub top_trend: Option<usize>,

    #[arg(long, env = "TREND_WINDOW_DAYS", global = true)]
    pub default_window_days: Option<u32>,

    #[arg(long, env = "SEARCH_CACHE_TTL_SECONDS", global = true)]
    pub search_ttl_secs: Option<u64>,

    #[arg(long, env = "DASHBOARD_CACHE_TTL_SECONDS", global = true)]
    pub dashboard_ttl_secs: Option<u64>,
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./repopulse.toml
    /// 3. ./repopulse.json
    /// 4. ./repopulse.yaml
    /// 5. ./repopulse.yml
    /// 6. `<platform config dir>/repopulse/config.toml`
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if path.exists() {
                return Self::load_from_path(path);
            }
            log::warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let candidates = [
            "repopulse.toml",
            "repopulse.json",
            "repopulse.yaml",
            "repopulse.yml",
        ];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        if let Some(path) = user_config_path() {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        let config = match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?,
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?,
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply flag/environment overrides. Unset overrides leave file values alone.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        let project_id = overrides
            .project_id
            .clone()
            .or_else(|| std::env::var("PROJECT_ID").ok())
            .or_else(|| std::env::var("GOOGLE_CLOUD_PROJECT").ok())
            .filter(|p| !p.trim().is_empty());
        if project_id.is_some() {
            self.warehouse.project_id = project_id;
        }

        let wh = &mut self.warehouse;
        override_with(&mut wh.location, &overrides.location);
        override_with(&mut wh.dataset, &overrides.dataset);
        override_with(&mut wh.daily_activity_table, &overrides.daily_activity_table);
        override_with(&mut wh.events_table, &overrides.events_table);
        override_with(&mut wh.pipeline_runs_table, &overrides.pipeline_runs_table);
        if overrides.bq_access_token.is_some() {
            wh.access_token.clone_from(&overrides.bq_access_token);
        }

        if overrides.github_token.is_some() {
            self.github.token.clone_from(&overrides.github_token);
        }

        let dash = &mut self.dashboard;
        override_with(&mut dash.trend_limit, &overrides.trend_limit);
        override_with(&mut dash.top_trend, &overrides.top_trend);
        override_with(&mut dash.default_window_days, &overrides.default_window_days);

        override_with(&mut self.cache.search_ttl_secs, &overrides.search_ttl_secs);
        override_with(&mut self.cache.dashboard_ttl_secs, &overrides.dashboard_ttl_secs);
    }

    /// Reject settings that would otherwise be interpolated into SQL or break
    /// the window allow-list.
    pub fn validate(&self) -> Result<()> {
        let wh = &self.warehouse;
        for (label, value) in [
            ("dataset", &wh.dataset),
            ("daily-activity-table", &wh.daily_activity_table),
            ("events-table", &wh.events_table),
            ("pipeline-runs-table", &wh.pipeline_runs_table),
        ] {
            if !is_valid_identifier(value) {
                bail!("Invalid {label} name: {value:?}");
            }
        }

        if let Some(project) = &wh.project_id {
            if !is_valid_identifier(project) {
                bail!("Invalid project id: {project:?}");
            }
        }

        if !ALLOWED_WINDOW_DAYS.contains(&self.dashboard.default_window_days) {
            bail!(
                "Default window must be one of {:?}, got {}",
                ALLOWED_WINDOW_DAYS,
                self.dashboard.default_window_days
            );
        }

        if self.dashboard.trend_limit == 0 || self.dashboard.top_trend == 0 {
            bail!("trend-limit and top-trend must be positive");
        }

        Ok(())
    }
}

fn override_with<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("repopulse").join("config.toml"))
}

/// Identifiers that are safe to place inside a backticked table path.
pub fn is_valid_identifier(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.warehouse.location, "US");
        assert_eq!(config.warehouse.dataset, "oss_analytics_mart");
        assert_eq!(config.dashboard.trend_limit, 120);
        assert_eq!(config.dashboard.top_trend, 40);
        assert_eq!(config.dashboard.default_window_days, 30);
        assert_eq!(config.cache.search_ttl_secs, 300);
        assert_eq!(config.cache.dashboard_ttl_secs, 43_200);
        assert!(config.warehouse.project_id.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_toml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let toml_content = r#"
[warehouse]
project-id = "oss-proj"
dataset = "mart_v2"

[dashboard]
top-trend = 25
default-window-days = 14

[cache]
dashboard-ttl-secs = 600
"#;
        write!(temp_file, "{}", toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.warehouse.project_id.as_deref(), Some("oss-proj"));
        assert_eq!(config.warehouse.dataset, "mart_v2");
        assert_eq!(config.warehouse.events_table, "stg_github_events");
        assert_eq!(config.dashboard.top_trend, 25);
        assert_eq!(config.dashboard.default_window_days, 14);
        assert_eq!(config.cache.dashboard_ttl_secs, 600);
        assert_eq!(config.cache.search_ttl_secs, 300);
    }

    #[test]
    fn test_load_yaml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        let yaml_content = "github:\n  base-url: https://ghe.example.com/api/v3\nserver:\n  port: 9090\n";
        write!(temp_file, "{}", yaml_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.github.base_url, "https://ghe.example.com/api/v3");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_load_missing_explicit_path_uses_defaults() {
        let config = Config::load(Some(Path::new("does-not-exist.toml"))).unwrap();
        assert_eq!(config.dashboard.trend_limit, 120);
    }

    #[test]
    fn test_overrides_replace_only_set_values() {
        let mut config = Config::default();
        let overrides = ConfigOverrides {
            project_id: Some("from-flag".to_string()),
            top_trend: Some(10),
            github_token: Some("ghp_test".to_string()),
            ..Default::default()
        };

        config.apply_overrides(&overrides);

        assert_eq!(config.warehouse.project_id.as_deref(), Some("from-flag"));
        assert_eq!(config.dashboard.top_trend, 10);
        assert_eq!(config.dashboard.trend_limit, 120);
        assert_eq!(config.github.token.as_deref(), Some("ghp_test"));
        assert_eq!(config.warehouse.dataset, "oss_analytics_mart");
    }

    #[test]
    fn test_validate_rejects_unsafe_table_name() {
        let mut config = Config::default();
        config.warehouse.events_table = "events`; DROP TABLE x; --".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("events-table"));
    }

    #[test]
    fn test_validate_rejects_window_outside_allow_list() {
        let mut config = Config::default();
        config.dashboard.default_window_days = 99;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_is_valid_identifier() {
        assert!(is_valid_identifier("my-project-123"));
        assert!(is_valid_identifier("stg_github_events"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("a.b"));
        assert!(!is_valid_identifier("a`b"));
    }
}
