use chrono::NaiveDate;
use serde_json::{json, Value};
use std::fmt;

use crate::config::is_valid_identifier;
use crate::error::{PulseError, Result};

/// A typed value bound to a named `@parameter`.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    String(String),
    Int64(i64),
    Date(NaiveDate),
    StringArray(Vec<String>),
}

impl ParamValue {
    fn type_json(&self) -> Value {
        match self {
            Self::String(_) => json!({ "type": "STRING" }),
            Self::Int64(_) => json!({ "type": "INT64" }),
            Self::Date(_) => json!({ "type": "DATE" }),
            Self::StringArray(_) => json!({ "type": "ARRAY", "arrayType": { "type": "STRING" } }),
        }
    }

    fn value_json(&self) -> Value {
        match self {
            Self::String(s) => json!({ "value": s }),
            // INT64 values travel as strings in the REST API
            Self::Int64(n) => json!({ "value": n.to_string() }),
            Self::Date(d) => json!({ "value": d.format("%Y-%m-%d").to_string() }),
            Self::StringArray(items) => json!({
                "arrayValues": items.iter().map(|s| json!({ "value": s })).collect::<Vec<_>>()
            }),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Int64(i64::from(value))
    }
}

impl From<NaiveDate> for ParamValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(value: Vec<String>) -> Self {
        Self::StringArray(value)
    }
}

/// Standard-SQL text plus its named parameters.
///
/// Values never get spliced into the SQL; only [`TableRef`]s are, and those
/// are validated identifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticalQuery {
    pub sql: String,
    params: Vec<(String, ParamValue)>,
}

impl AnalyticalQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Bind `@name`. Re-binding a name replaces the earlier value.
    pub fn bind(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        let value = value.into();
        if let Some(slot) = self.params.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value;
        } else {
            self.params.push((name.to_string(), value));
        }
        self
    }

    #[cfg(test)]
    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    /// `queryParameters` array for the `jobs.query` request body.
    pub fn parameters_json(&self) -> Vec<Value> {
        self.params
            .iter()
            .map(|(name, value)| {
                json!({
                    "name": name,
                    "parameterType": value.type_json(),
                    "parameterValue": value.value_json(),
                })
            })
            .collect()
    }
}

/// Fully-qualified table, rendered as `` `project.dataset.table` ``.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    project: String,
    dataset: String,
    table: String,
}

impl TableRef {
    pub fn new(project: &str, dataset: &str, table: &str) -> Result<Self> {
        for part in [project, dataset, table] {
            if !is_valid_identifier(part) {
                return Err(PulseError::Config(format!(
                    "Invalid table identifier component: {part:?}"
                )));
            }
        }
        Ok(Self {
            project: project.to_string(),
            dataset: dataset.to_string(),
            table: table.to_string(),
        })
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}.{}.{}`", self.project, self.dataset, self.table)
    }
}
