mod client;
mod query;
mod types;

use async_trait::async_trait;

use crate::config::WarehouseConfig;
use crate::error::Result;

pub use client::BigQueryClient;
pub use query::{AnalyticalQuery, TableRef};
#[cfg(test)]
pub use query::ParamValue;
pub use types::{row_i64, row_string, QueryRow};

/// Read-only analytical query interface over the metrics warehouse.
#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn query(&self, query: &AnalyticalQuery) -> Result<Vec<QueryRow>>;
}

/// The mart tables the dashboard reads from.
#[derive(Debug, Clone)]
pub struct WarehouseTables {
    pub daily_activity: TableRef,
    pub events: TableRef,
    pub pipeline_runs: TableRef,
}

impl WarehouseTables {
    pub fn from_config(project_id: &str, config: &WarehouseConfig) -> Result<Self> {
        Ok(Self {
            daily_activity: TableRef::new(
                project_id,
                &config.dataset,
                &config.daily_activity_table,
            )?,
            events: TableRef::new(project_id, &config.dataset, &config.events_table)?,
            pipeline_runs: TableRef::new(project_id, &config.dataset, &config.pipeline_runs_table)?,
        })
    }
}
