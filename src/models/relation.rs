use std::fmt;

use serde::{Deserialize, Serialize};

use super::column::Column;

/// Provider value marking Iceberg tables
pub const ICEBERG_PROVIDER: &str = "iceberg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationType {
    Table,
    View,
}

impl RelationType {
    /// Map an engine-reported table type. Anything that isn't a view is a table.
    pub fn from_engine(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_uppercase()) {
            Some(v) if v == "VIEW" || v == "MATERIALIZED_VIEW" => RelationType::View,
            _ => RelationType::Table,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Table => "table",
            RelationType::View => "view",
        }
    }
}

/// Cache key: the rendered (schema, identifier) pair. The database is not
/// part of it, so `spark_catalog.s.t` and `s.t` name the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationKey {
    pub schema: Option<String>,
    pub identifier: String,
}

impl fmt::Display for RelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.identifier),
            None => f.write_str(&self.identifier),
        }
    }
}

/// A table or view with its discovered metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub identifier: String,
    pub kind: RelationType,
    pub provider: Option<String>,
    pub is_iceberg: bool,
    /// `None` until column metadata has been discovered
    pub columns: Option<Vec<Column>>,
}

impl Relation {
    pub fn new(
        database: Option<String>,
        schema: Option<String>,
        identifier: impl Into<String>,
        kind: RelationType,
    ) -> Self {
        Self {
            database,
            schema,
            identifier: identifier.into(),
            kind,
            provider: None,
            is_iceberg: false,
            columns: None,
        }
    }

    pub fn with_provider(mut self, provider: Option<String>) -> Self {
        self.is_iceberg = provider
            .as_deref()
            .map(|p| p.eq_ignore_ascii_case(ICEBERG_PROVIDER))
            .unwrap_or(false);
        self.provider = provider;
        self
    }

    pub fn with_columns(mut self, columns: Vec<Column>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn key(&self) -> RelationKey {
        RelationKey {
            schema: self.schema.clone(),
            identifier: self.identifier.clone(),
        }
    }

    /// Has column metadata been attached
    pub fn has_columns(&self) -> bool {
        self.columns.as_ref().map(|c| !c.is_empty()).unwrap_or(false)
    }

    /// Rendered for SQL: the database part is never included because the
    /// engine resolves it from the session catalog
    pub fn render(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.identifier),
            None => self.identifier.clone(),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
