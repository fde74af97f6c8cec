use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::relation::RelationType;

/// One labeled statistic parsed from a table's `Statistics` line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatFact {
    pub key: String,
    pub label: String,
    pub value: i64,
    pub description: String,
    pub include: bool,
}

/// Table statistics in the order the engine reported them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStats {
    pub facts: Vec<StatFact>,
}

impl TableStats {
    /// Parse `"<int> bytes, <int> rows"`. Segments that don't look like
    /// `<int> <label>` are skipped.
    pub fn parse(raw: Option<&str>) -> Self {
        let mut facts: Vec<StatFact> = Vec::new();
        let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
            return Self { facts };
        };

        for segment in raw.split(", ") {
            let mut parts = segment.trim().split(' ');
            let (Some(number), Some(key)) = (parts.next(), parts.next()) else {
                tracing::debug!("Skipping malformed statistics segment: {:?}", segment);
                continue;
            };
            let Ok(value) = number.parse::<i64>() else {
                tracing::debug!("Skipping non-numeric statistics segment: {:?}", segment);
                continue;
            };

            let fact = StatFact {
                key: key.to_string(),
                label: key.to_string(),
                value,
                description: String::new(),
                include: true,
            };
            // Later segments with the same key win
            match facts.iter_mut().find(|f| f.key == fact.key) {
                Some(existing) => *existing = fact,
                None => facts.push(fact),
            }
        }

        Self { facts }
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&StatFact> {
        self.facts.iter().find(|f| f.key == key)
    }

    /// Flatten to `stats:<key>:label|value|description|include` entries
    pub fn to_flat_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for fact in &self.facts {
            map.insert(format!("stats:{}:label", fact.key), Value::from(fact.label.clone()));
            map.insert(format!("stats:{}:value", fact.key), Value::from(fact.value));
            map.insert(
                format!("stats:{}:description", fact.key),
                Value::from(fact.description.clone()),
            );
            map.insert(format!("stats:{}:include", fact.key), Value::from(fact.include));
        }
        map
    }
}

/// Column of a discovered relation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub table_database: Option<String>,
    pub table_schema: Option<String>,
    pub table_name: String,
    pub table_type: RelationType,
    pub table_owner: Option<String>,
    pub table_stats: TableStats,
    pub name: String,
    /// Ordinal position, zero-based
    pub index: usize,
    pub dtype: String,
}

impl Column {
    /// Flat entry for the host tool's catalog document
    pub fn to_catalog_row(&self) -> Map<String, Value> {
        let mut row = Map::new();
        row.insert("table_database".to_string(), Value::Null);
        row.insert(
            "table_schema".to_string(),
            self.table_schema.clone().map(Value::from).unwrap_or(Value::Null),
        );
        row.insert("table_name".to_string(), Value::from(self.table_name.clone()));
        row.insert("table_type".to_string(), Value::from(self.table_type.as_str()));
        row.insert(
            "table_owner".to_string(),
            self.table_owner.clone().map(Value::from).unwrap_or(Value::Null),
        );
        row.insert("column_name".to_string(), Value::from(self.name.clone()));
        row.insert("column_index".to_string(), Value::from(self.index));
        row.insert("column_type".to_string(), Value::from(self.dtype.clone()));
        row.extend(self.table_stats.to_flat_map());
        row
    }

    /// `(schema, identifier, column name, column type)`, the part that is
    /// identical whichever discovery path produced the column
    pub fn signature(&self) -> (Option<&str>, &str, &str, &str) {
        (
            self.table_schema.as_deref(),
            self.table_name.as_str(),
            self.name.as_str(),
            self.dtype.as_str(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stats() {
        let stats = TableStats::parse(Some("1109049927 bytes, 14093476 rows"));
        assert_eq!(stats.facts.len(), 2);
        assert_eq!(stats.facts[0].key, "bytes");
        assert_eq!(stats.facts[0].value, 1109049927);
        assert!(stats.facts[0].include);
        assert_eq!(stats.facts[1].key, "rows");
        assert_eq!(stats.facts[1].value, 14093476);
        assert!(stats.facts[1].include);
    }

    #[test]
    fn test_parse_stats_empty() {
        assert!(TableStats::parse(None).is_empty());
        assert!(TableStats::parse(Some("")).is_empty());
    }

    #[test]
    fn test_parse_stats_keeps_reported_order() {
        let stats = TableStats::parse(Some("10 rows, 2048 bytes"));
        let keys: Vec<&str> = stats.facts.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["rows", "bytes"]);

        let stats = TableStats::parse(Some("2048 bytes"));
        assert_eq!(stats.facts.len(), 1);
        assert!(stats.get("rows").is_none());
    }

    #[test]
    fn test_parse_stats_skips_garbage() {
        let stats = TableStats::parse(Some("many bytes, 7 rows"));
        assert_eq!(stats.facts.len(), 1);
        assert_eq!(stats.get("rows").map(|f| f.value), Some(7));
    }

    #[test]
    fn test_flat_map() {
        let map = TableStats::parse(Some("1109049927 bytes, 14093476 rows")).to_flat_map();
        assert_eq!(map["stats:bytes:label"], "bytes");
        assert_eq!(map["stats:bytes:value"], 1109049927);
        assert_eq!(map["stats:bytes:description"], "");
        assert_eq!(map["stats:bytes:include"], true);
        assert_eq!(map["stats:rows:value"], 14093476);
        assert_eq!(map.len(), 8);
    }

    #[test]
    fn test_catalog_row() {
        let column = Column {
            table_database: Some("spark_catalog".to_string()),
            table_schema: Some("analytics".to_string()),
            table_name: "orders".to_string(),
            table_type: RelationType::Table,
            table_owner: Some("root".to_string()),
            table_stats: TableStats::parse(Some("10 rows")),
            name: "id".to_string(),
            index: 0,
            dtype: "bigint".to_string(),
        };
        let row = column.to_catalog_row();
        assert_eq!(row["table_database"], Value::Null);
        assert_eq!(row["table_type"], "table");
        assert_eq!(row["column_name"], "id");
        assert_eq!(row["column_type"], "bigint");
        assert_eq!(row["stats:rows:value"], 10);
    }
}
