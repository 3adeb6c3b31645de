use crate::error::Result;
use crate::insights::PipelineStatus;
use crate::providers::bigquery::{row_i64, row_string, AnalyticalQuery, Warehouse, WarehouseTables};

/// Most recent run recorded by the ingestion pipeline, if any.
pub async fn fetch_pipeline_status(
    warehouse: &dyn Warehouse,
    tables: &WarehouseTables,
) -> Result<Option<PipelineStatus>> {
    let sql = format!(
        r#"
    SELECT
      run_id,
      dag_id,
      run_started_at,
      executed_for_date,
      status,
      raw_events_rows
    FROM {runs}
    ORDER BY run_started_at DESC
    LIMIT 1
    "#,
        runs = tables.pipeline_runs,
    );

    let rows = warehouse.query(&AnalyticalQuery::new(sql)).await?;

    Ok(rows.first().map(|row| PipelineStatus {
        run_id: row_string(row, "run_id", ""),
        dag_id: row_string(row, "dag_id", ""),
        status: row_string(row, "status", "unknown"),
        executed_for_date: row_string(row, "executed_for_date", ""),
        run_started_at: row_string(row, "run_started_at", ""),
        raw_events_rows: row_i64(row, "raw_events_rows"),
    }))
}
