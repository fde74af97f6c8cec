use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One result row, values in column order
pub type Row = Vec<Value>;

/// Timestamp layout the engine accepts for bound parameters
pub const BINDING_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Parameter value supplied by the caller
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Exact decimal in its textual form
    Decimal(String),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl From<DateTime<Utc>> for Binding {
    fn from(value: DateTime<Utc>) -> Self {
        Binding::Timestamp(value.naive_utc())
    }
}

impl From<&str> for Binding {
    fn from(value: &str) -> Self {
        Binding::Text(value.to_string())
    }
}

impl From<i64> for Binding {
    fn from(value: i64) -> Self {
        Binding::Int(value)
    }
}

impl From<f64> for Binding {
    fn from(value: f64) -> Self {
        Binding::Float(value)
    }
}

/// Parameter value as handed to the driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BindValue {
    Null,
    Bool(bool),
    Double(f64),
    Text(String),
}

impl Binding {
    /// Coerce to a primitive the driver can load: numbers become doubles,
    /// timestamps become millisecond text (truncated), the rest passes through
    pub fn normalize(&self) -> BindValue {
        match self {
            Binding::Null => BindValue::Null,
            Binding::Bool(b) => BindValue::Bool(*b),
            Binding::Int(i) => BindValue::Double(*i as f64),
            Binding::Float(f) => BindValue::Double(*f),
            Binding::Decimal(d) => match d.trim().parse::<f64>() {
                Ok(f) => BindValue::Double(f),
                Err(_) => BindValue::Text(d.clone()),
            },
            Binding::Text(s) => BindValue::Text(s.clone()),
            Binding::Timestamp(ts) => BindValue::Text(ts.format(BINDING_TIMESTAMP_FORMAT).to_string()),
        }
    }
}

/// Column entry of a cursor description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescription {
    pub name: String,
    pub type_code: String,
}

/// Outcome summary returned for every successful statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterResponse {
    pub message: String,
    /// The engine does not report affected rows
    pub rows_affected: Option<i64>,
}

impl Default for AdapterResponse {
    fn default() -> Self {
        Self::ok()
    }
}

impl AdapterResponse {
    pub fn ok() -> Self {
        Self {
            message: "OK".to_string(),
            rows_affected: None,
        }
    }
}

/// Result of one executed statement
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub response: AdapterResponse,
    pub columns: Vec<ColumnDescription>,
    pub rows: Vec<Row>,
    pub row_count: usize,
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Value of `column` in `row`, looked up by name
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c.name == column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// First column of every row as a string, for `SHOW ...` style results
    pub fn first_column_strings(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.first())
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }
}
