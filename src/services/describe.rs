// Parsing of `DESCRIBE TABLE EXTENDED` output.
//
// The output is a column section, then a blank or `#`-prefixed separator,
// then `# Detailed Table Information` key/value rows. This is the second way
// a `Relation`'s columns get discovered, next to the catalog API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AdapterError, AdapterResult};
use crate::models::{Column, QueryResult, Relation, TableStats};

const KEY_TABLE_OWNER: &str = "Owner";
const KEY_TABLE_STATISTICS: &str = "Statistics";
const KEY_PROVIDER: &str = "Provider";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeRow {
    pub col_name: String,
    pub data_type: String,
    #[serde(default)]
    pub comment: Option<String>,
}

impl DescribeRow {
    pub fn new(col_name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            col_name: col_name.into(),
            data_type: data_type.into(),
            comment: None,
        }
    }

    fn is_separator(&self) -> bool {
        self.col_name.is_empty() || self.col_name.starts_with('#')
    }
}

/// Convert statement output with `col_name`, `data_type` and optional
/// `comment` columns into describe rows
pub fn rows_from_result(result: &QueryResult) -> AdapterResult<Vec<DescribeRow>> {
    let position = |name: &str| result.columns.iter().position(|c| c.name == name);
    let (name_idx, type_idx) = match (position("col_name"), position("data_type")) {
        (Some(n), Some(t)) => (n, t),
        _ => {
            return Err(AdapterError::Internal(
                "Describe output lacks col_name/data_type columns".to_string(),
            ))
        }
    };
    let comment_idx = position("comment");

    let text = |row: &[Value], idx: usize| -> Option<String> {
        match row.get(idx) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        }
    };

    Ok(result
        .rows
        .iter()
        .map(|row| DescribeRow {
            col_name: text(row, name_idx).unwrap_or_default(),
            data_type: text(row, type_idx).unwrap_or_default(),
            comment: comment_idx.and_then(|idx| text(row, idx)),
        })
        .collect())
}

/// Index of the first separator row, or the row count when there is none
pub fn find_table_information_separator(rows: &[DescribeRow]) -> usize {
    rows.iter()
        .position(DescribeRow::is_separator)
        .unwrap_or(rows.len())
}

/// Index of the last separator row, 0 when there is none
pub fn find_table_metadata_separator(rows: &[DescribeRow]) -> usize {
    rows.iter().rposition(DescribeRow::is_separator).unwrap_or(0)
}

pub fn get_provider(rows: &[DescribeRow]) -> Option<String> {
    rows.iter()
        .find(|row| row.col_name == KEY_PROVIDER)
        .map(|row| row.data_type.clone())
}

/// Columns of `relation` with owner and statistics taken from the metadata
/// section
pub fn parse_describe_extended(relation: &Relation, rows: &[DescribeRow]) -> Vec<Column> {
    let pos = find_table_information_separator(rows);
    let metadata_pos = find_table_metadata_separator(rows);

    let metadata = |key: &str| -> Option<&str> {
        rows.iter()
            .skip(metadata_pos + 1)
            .filter(|row| row.col_name == key)
            .last()
            .map(|row| row.data_type.as_str())
    };

    let owner = metadata(KEY_TABLE_OWNER).map(str::to_string);
    let stats = TableStats::parse(metadata(KEY_TABLE_STATISTICS));

    rows[..pos]
        .iter()
        .filter(|row| !row.col_name.starts_with('#'))
        .enumerate()
        .map(|(index, row)| Column {
            table_database: None,
            table_schema: relation.schema.clone(),
            table_name: relation.identifier.clone(),
            table_type: relation.kind,
            table_owner: owner.clone(),
            table_stats: stats.clone(),
            name: row.col_name.clone(),
            index,
            dtype: row.data_type.clone(),
        })
        .collect()
}
