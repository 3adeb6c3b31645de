use chrono::{DateTime, SecondsFormat};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

/// One result row: column name to decoded value, in schema order.
pub type QueryRow = IndexMap<String, Value>;

/// Response of `jobs.query` and `jobs.getQueryResults`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct QueryResponse {
    #[serde(default)]
    pub job_complete: bool,
    pub job_reference: Option<JobReference>,
    pub schema: Option<TableSchema>,
    #[serde(default)]
    pub rows: Vec<TableRow>,
    pub page_token: Option<String>,
    #[serde(default)]
    pub errors: Vec<ErrorProto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct JobReference {
    pub job_id: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct TableSchema {
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct TableRow {
    #[serde(default)]
    pub f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TableCell {
    #[serde(default)]
    pub v: Value,
}

#[derive(Debug, Deserialize)]
pub(super) struct ErrorProto {
    #[serde(default)]
    pub message: String,
}

/// Metadata-server token response.
#[derive(Debug, Deserialize)]
pub(super) struct AccessTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: u64,
}

/// Cells arrive as strings; decode them by the declared column type.
pub(super) fn decode_rows(schema: &TableSchema, rows: Vec<TableRow>) -> Vec<QueryRow> {
    rows.into_iter()
        .map(|row| {
            schema
                .fields
                .iter()
                .zip(row.f)
                .map(|(field, cell)| (field.name.clone(), decode_cell(&field.field_type, cell.v)))
                .collect()
        })
        .collect()
}

fn decode_cell(field_type: &str, value: Value) -> Value {
    let Value::String(raw) = value else {
        return value;
    };

    match field_type {
        "INTEGER" | "INT64" => raw.parse::<i64>().map_or(Value::String(raw), Value::from),
        "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => {
            raw.parse::<f64>().map_or(Value::String(raw), Value::from)
        }
        "BOOLEAN" | "BOOL" => match raw.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(raw),
        },
        "TIMESTAMP" => decode_timestamp(&raw).map_or(Value::String(raw), Value::String),
        _ => Value::String(raw),
    }
}

/// TIMESTAMP cells are epoch seconds in float notation, e.g. `1.7118504E9`.
fn decode_timestamp(raw: &str) -> Option<String> {
    let epoch = raw.parse::<f64>().ok().filter(|f| f.is_finite())?;
    let secs = epoch.floor();
    let nanos = ((epoch - secs) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(secs as i64, nanos)
        .map(|ts| ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

/// Integer column, tolerating string-encoded numbers and nulls.
pub fn row_i64(row: &QueryRow, column: &str) -> i64 {
    match row.get(column) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

/// String column; nulls become `default`.
pub fn row_string(row: &QueryRow, column: &str, default: &str) -> String {
    match row.get(column) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => default.to_string(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_rows_by_type() {
        let response: QueryResponse = serde_json::from_value(json!({
            "jobComplete": true,
            "schema": { "fields": [
                { "name": "repo_name", "type": "STRING" },
                { "name": "curr_events", "type": "INTEGER" },
                { "name": "ratio", "type": "FLOAT" },
                { "name": "flag", "type": "BOOLEAN" },
                { "name": "missing", "type": "INTEGER" }
            ]},
            "rows": [
                { "f": [ {"v": "a/b"}, {"v": "42"}, {"v": "0.5"}, {"v": "true"}, {"v": null} ] }
            ]
        }))
        .unwrap();

        let rows = decode_rows(response.schema.as_ref().unwrap(), response.rows);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row["repo_name"], json!("a/b"));
        assert_eq!(row["curr_events"], json!(42));
        assert_eq!(row["ratio"], json!(0.5));
        assert_eq!(row["flag"], json!(true));
        assert_eq!(row["missing"], Value::Null);
        assert_eq!(row.keys().next().map(String::as_str), Some("repo_name"));
    }

    #[test]
    fn test_decode_timestamp_cells() {
        let schema: TableSchema = serde_json::from_value(json!({ "fields": [
            { "name": "run_started_at", "type": "TIMESTAMP" },
            { "name": "fractional", "type": "TIMESTAMP" },
            { "name": "garbled", "type": "TIMESTAMP" }
        ]}))
        .unwrap();
        let rows: Vec<TableRow> = serde_json::from_value(json!([
            { "f": [ {"v": "1.7118504E9"}, {"v": "1711850400.25"}, {"v": "soon"} ] }
        ]))
        .unwrap();

        let row = &decode_rows(&schema, rows)[0];
        assert_eq!(row_string(row, "run_started_at", ""), "2024-03-31T02:00:00Z");
        assert_eq!(row_string(row, "fractional", ""), "2024-03-31T02:00:00.250Z");
        assert_eq!(row_string(row, "garbled", ""), "soon");
    }

    #[test]
    fn test_row_accessors() {
        let mut row = QueryRow::new();
        row.insert("n".to_string(), json!(7));
        row.insert("s".to_string(), json!("12"));
        row.insert("name".to_string(), json!("x"));
        row.insert("null".to_string(), Value::Null);

        assert_eq!(row_i64(&row, "n"), 7);
        assert_eq!(row_i64(&row, "s"), 12);
        assert_eq!(row_i64(&row, "null"), 0);
        assert_eq!(row_i64(&row, "absent"), 0);
        assert_eq!(row_string(&row, "name", ""), "x");
        assert_eq!(row_string(&row, "null", "unknown"), "unknown");
        assert_eq!(row_string(&row, "n", ""), "7");
    }
}
