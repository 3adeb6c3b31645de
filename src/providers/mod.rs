pub mod bigquery;
pub mod github;
