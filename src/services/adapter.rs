use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::connection_manager::ConnectionManager;
use super::describe;
use super::dialect;
use super::hive::{HiveConnector, StatementPoller};
use super::relation_cache::RelationCache;
use super::schema_service::{CatalogSource, SchemaService};
use crate::config::Config;
use crate::error::{AdapterError, AdapterResult};
use crate::models::{Binding, Column, Connection, Credentials, QueryResult, Relation};
use crate::telemetry::{default_reporter, ErrorReporter};

/// Identifier suffix of session-local temporary views
pub const TEMP_RELATION_SUFFIX: &str = "__dbt_tmp";

/// Error fragments meaning the described relation does not exist
const RELATION_NOT_FOUND_MARKERS: [&str; 3] = [
    "Table or view not found",
    "NoSuchTableException",
    "TABLE_OR_VIEW_NOT_FOUND",
];

/// Catalog rows for every discovered schema, plus the schemas that failed
#[derive(Debug, Default)]
pub struct CatalogResult {
    pub rows: Vec<Map<String, Value>>,
    pub errors: Vec<(String, AdapterError)>,
}

/// Entry point used by the host tool: statements, relation listing and
/// column discovery for one target
pub struct LakehouseAdapter {
    credentials: Arc<Credentials>,
    manager: ConnectionManager,
    catalog: Arc<dyn CatalogSource>,
    cache: RelationCache,
    reporter: Arc<dyn ErrorReporter>,
    concurrency: usize,
}

impl LakehouseAdapter {
    pub fn new(
        credentials: Arc<Credentials>,
        manager: ConnectionManager,
        catalog: Arc<dyn CatalogSource>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            credentials,
            manager,
            catalog,
            cache: RelationCache::new(),
            reporter,
            concurrency: num_cpus::get(),
        }
    }

    /// Wire an adapter from loaded configuration and a statement driver
    pub fn from_config(config: &Config, connector: Arc<dyn HiveConnector>) -> AdapterResult<Self> {
        let credentials = Arc::new(Credentials::new(config.target.clone())?);
        let reporter = default_reporter();
        let manager = ConnectionManager::new(
            connector,
            StatementPoller::new(config.statement.poll_interval()),
            reporter.clone(),
        );
        let catalog = Arc::new(SchemaService::new(&credentials, &config.catalog)?);

        Ok(Self::new(credentials, manager, catalog, reporter).with_concurrency(config.catalog.concurrency))
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn cache(&self) -> &RelationCache {
        &self.cache
    }

    /// New open connection to this adapter's target
    pub async fn acquire_connection(&self, name: Option<String>) -> AdapterResult<Connection> {
        let mut connection = Connection::new(name, self.credentials.clone());
        self.open(&mut connection).await?;
        Ok(connection)
    }

    pub async fn open(&self, connection: &mut Connection) -> AdapterResult<()> {
        self.manager.open(connection).await
    }

    pub async fn execute(
        &self,
        connection: &mut Connection,
        sql: &str,
        bindings: Option<&[Binding]>,
        fetch: bool,
    ) -> AdapterResult<QueryResult> {
        self.manager.execute(connection, sql, bindings, fetch).await
    }

    pub async fn cancel(&self, connection: &Connection) {
        self.manager.cancel(connection).await
    }

    pub async fn close(&self, connection: &mut Connection) -> AdapterResult<()> {
        self.manager.close(connection).await
    }

    /// Relations of a schema: cached when the schema is known, otherwise
    /// listed through the catalog and cached
    pub async fn list_relations(&self, database: Option<&str>, schema: &str) -> AdapterResult<Vec<Relation>> {
        if self.cache.has_schema(schema).await {
            debug!("Listing relations of {} from cache", schema);
            return Ok(self.cache.get_relations(schema).await);
        }

        let database = database.unwrap_or_else(|| self.credentials.catalog());
        let relations = self.catalog.list_relations(database, schema).await?;

        self.cache.add_schema(schema).await;
        for relation in &relations {
            self.cache.add(relation.clone()).await;
        }
        info!("Discovered {} relations in {}", relations.len(), schema);
        Ok(relations)
    }

    /// Columns of `relation`.
    ///
    /// Cached metadata wins. Temporary views live only in the session, so they
    /// are described over `connection`; everything else goes to the catalog.
    pub async fn get_columns_in_relation(
        &self,
        connection: &mut Connection,
        relation: &Relation,
    ) -> AdapterResult<Vec<Column>> {
        if Self::is_temporary(relation) {
            return self.describe_temporary(connection, relation).await;
        }
        self.columns_from_catalog(relation).await
    }

    fn is_temporary(relation: &Relation) -> bool {
        relation.schema.is_none() && relation.identifier.ends_with(TEMP_RELATION_SUFFIX)
    }

    async fn describe_temporary(
        &self,
        connection: &mut Connection,
        relation: &Relation,
    ) -> AdapterResult<Vec<Column>> {
        let sql = format!("describe extended {}", relation.render());
        match self.execute(connection, &sql, None, true).await {
            Ok(result) => {
                let rows = describe::rows_from_result(&result)?;
                Ok(describe::parse_describe_extended(relation, &rows))
            }
            Err(e) if is_relation_not_found(&e) => {
                debug!("{} does not exist, no columns", relation);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    async fn columns_from_catalog(&self, relation: &Relation) -> AdapterResult<Vec<Column>> {
        if let Some(cached) = self.cache.find(relation).await {
            if cached.has_columns() {
                debug!("Using cached columns of {}", relation);
                return Ok(cached.columns.unwrap_or_default());
            }
        }

        let schema = match relation.schema.as_deref() {
            Some(schema) => schema,
            None => return Ok(Vec::new()),
        };
        let database = relation
            .database
            .as_deref()
            .unwrap_or_else(|| self.credentials.catalog());

        match self
            .catalog
            .get_relation(database, schema, &relation.identifier)
            .await?
        {
            Some(found) => {
                let columns = found.columns.clone().unwrap_or_default();
                self.cache.insert(found).await;
                Ok(columns)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Catalog rows for `schemas`, discovered concurrently. A failing schema
    /// is reported in `errors` and does not stop the others.
    pub async fn get_catalog(&self, database: Option<&str>, schemas: &[String]) -> CatalogResult {
        let outcomes: Vec<(String, AdapterResult<Vec<Map<String, Value>>>)> = stream::iter(schemas)
            .map(|schema| async move { (schema.clone(), self.get_one_catalog(database, schema).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut result = CatalogResult::default();
        for (schema, outcome) in outcomes {
            match outcome {
                Ok(rows) => result.rows.extend(rows),
                Err(e) => {
                    self.reporter.report("get_catalog", &e);
                    result.errors.push((schema, e));
                }
            }
        }
        result
    }

    async fn get_one_catalog(
        &self,
        database: Option<&str>,
        schema: &str,
    ) -> AdapterResult<Vec<Map<String, Value>>> {
        let mut rows = Vec::new();
        for relation in self.list_relations(database, schema).await? {
            debug!("Getting table schema for relation {}", relation);
            let columns = self.columns_from_catalog(&relation).await?;
            rows.extend(columns.iter().map(Column::to_catalog_row));
        }
        Ok(rows)
    }

    pub async fn check_schema_exists(
        &self,
        connection: &mut Connection,
        database: &str,
        schema: &str,
    ) -> AdapterResult<bool> {
        let sql = format!("show schemas in {}", database);
        let result = self.execute(connection, &sql, None, true).await?;
        Ok(result.first_column_strings().iter().any(|s| s == schema))
    }

    /// Mark a schema as known so that it is listed from the cache
    pub async fn add_schema_to_cache(&self, schema: Option<&str>) -> AdapterResult<()> {
        match schema {
            Some(schema) => {
                self.cache.add_schema(schema).await;
                Ok(())
            }
            None => Err(AdapterError::Compilation(format!(
                "Attempted to cache a null schema for {}",
                self.credentials.identity()
            ))),
        }
    }

    pub fn quote(&self, identifier: &str) -> String {
        dialect::quote(identifier)
    }

    pub fn date_function(&self) -> &'static str {
        dialect::date_function()
    }

    /// Row-diff query between two relations. Without explicit column names
    /// the columns of `relation_a` are used.
    pub async fn get_rows_different_sql(
        &self,
        connection: &mut Connection,
        relation_a: &Relation,
        relation_b: &Relation,
        column_names: Option<&[String]>,
    ) -> AdapterResult<String> {
        let names = match column_names {
            Some(names) => names.to_vec(),
            None => self
                .get_columns_in_relation(connection, relation_a)
                .await?
                .into_iter()
                .map(|c| c.name)
                .collect(),
        };
        Ok(dialect::rows_different_sql(
            &relation_a.render(),
            &relation_b.render(),
            &names,
        ))
    }
}

fn is_relation_not_found(error: &AdapterError) -> bool {
    let message = error.message();
    RELATION_NOT_FOUND_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CredentialsConfig, OperationState, PollStatus, RelationType};
    use crate::services::hive::testing::{ScriptedConnector, ScriptedCursor};
    use crate::services::schema_service::TableMetadata;
    use crate::telemetry::testing::RecordingReporter;
    use crate::telemetry::NoopReporter;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Catalog answering from fixed table metadata
    #[derive(Default)]
    struct FakeCatalog {
        schemas: HashMap<String, Vec<TableMetadata>>,
        failing: Vec<String>,
        list_calls: AtomicUsize,
        get_calls: AtomicUsize,
    }

    impl FakeCatalog {
        fn with_schema(mut self, schema: &str, tables: serde_json::Value) -> Self {
            self.schemas
                .insert(schema.to_string(), serde_json::from_value(tables).unwrap());
            self
        }

        fn failing(mut self, schema: &str) -> Self {
            self.failing.push(schema.to_string());
            self
        }
    }

    #[async_trait]
    impl CatalogSource for FakeCatalog {
        async fn list_relations(&self, _database: &str, schema: &str) -> AdapterResult<Vec<Relation>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.iter().any(|s| s == schema) {
                return Err(AdapterError::Compilation(format!(
                    "Could not get tables for schema {}",
                    schema
                )));
            }
            Ok(self
                .schemas
                .get(schema)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(|t| t.into_relation(schema))
                .collect())
        }

        async fn get_relation(
            &self,
            _database: &str,
            schema: &str,
            identifier: &str,
        ) -> AdapterResult<Option<Relation>> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .schemas
                .get(schema)
                .and_then(|tables| tables.iter().find(|t| t.name == identifier))
                .cloned()
                .map(|t| t.into_relation(schema)))
        }
    }

    fn credentials() -> Arc<Credentials> {
        Arc::new(
            Credentials::new(CredentialsConfig {
                host: Some("lakehouse.example.com".to_string()),
                dataplane: Some("spark-resource".to_string()),
                lakehouse: Some("dbt".to_string()),
                user: Some("user1".to_string()),
                token: Some("abc123".to_string()),
                schema: Some("analytics".to_string()),
                ..Default::default()
            })
            .unwrap(),
        )
    }

    fn analytics_catalog() -> FakeCatalog {
        FakeCatalog::default().with_schema(
            "analytics",
            json!([
                {
                    "name": "orders",
                    "provider": "iceberg",
                    "columns": [
                        {"name": "id", "fieldType": "bigint"},
                        {"name": "amount", "fieldType": "double"}
                    ]
                },
                {
                    "name": "customers",
                    "type": "VIEW",
                    "columns": [{"name": "name", "fieldType": "string"}]
                }
            ]),
        )
    }

    fn adapter(cursor: Arc<ScriptedCursor>, catalog: Arc<FakeCatalog>) -> LakehouseAdapter {
        let manager = ConnectionManager::new(
            Arc::new(ScriptedConnector::succeeding(cursor)),
            StatementPoller::new(Duration::from_millis(1)),
            Arc::new(NoopReporter),
        );
        LakehouseAdapter::new(credentials(), manager, catalog, Arc::new(NoopReporter))
    }

    #[tokio::test]
    async fn test_list_relations_caches_schema() {
        let catalog = Arc::new(analytics_catalog());
        let adapter = adapter(Arc::new(ScriptedCursor::finished()), catalog.clone());

        let first = adapter.list_relations(None, "analytics").await.unwrap();
        assert_eq!(first.len(), 2);
        assert!(first[0].is_iceberg);

        let second = adapter.list_relations(None, "analytics").await.unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(catalog.list_calls.load(Ordering::SeqCst), 1);
        assert!(adapter.cache().has_schema("analytics").await);
    }

    #[tokio::test]
    async fn test_missing_schema_lists_empty() {
        let catalog = Arc::new(FakeCatalog::default());
        let adapter = adapter(Arc::new(ScriptedCursor::finished()), catalog);

        let relations = adapter.list_relations(None, "ghost_schema").await.unwrap();
        assert!(relations.is_empty());
    }

    #[tokio::test]
    async fn test_columns_from_cache_skip_remote_call() {
        let catalog = Arc::new(analytics_catalog());
        let adapter = adapter(Arc::new(ScriptedCursor::finished()), catalog.clone());
        let mut conn = Connection::new(None, adapter.credentials.clone());

        adapter.list_relations(None, "analytics").await.unwrap();
        let relation = Relation::new(None, Some("analytics".to_string()), "orders", RelationType::Table);
        let columns = adapter.get_columns_in_relation(&mut conn, &relation).await.unwrap();

        assert_eq!(columns.len(), 2);
        assert_eq!(columns[1].name, "amount");
        assert_eq!(catalog.get_calls.load(Ordering::SeqCst), 0);
        assert!(!conn.is_open());
    }

    #[tokio::test]
    async fn test_columns_fetched_on_cache_miss() {
        let catalog = Arc::new(analytics_catalog());
        let adapter = adapter(Arc::new(ScriptedCursor::finished()), catalog.clone());
        let mut conn = Connection::new(None, adapter.credentials.clone());

        let relation = Relation::new(None, Some("analytics".to_string()), "orders", RelationType::Table);
        let columns = adapter.get_columns_in_relation(&mut conn, &relation).await.unwrap();
        assert_eq!(columns.iter().map(|c| c.index).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(catalog.get_calls.load(Ordering::SeqCst), 1);

        // now cached
        adapter.get_columns_in_relation(&mut conn, &relation).await.unwrap();
        assert_eq!(catalog.get_calls.load(Ordering::SeqCst), 1);

        let unknown = Relation::new(None, Some("analytics".to_string()), "nope", RelationType::Table);
        assert!(adapter.get_columns_in_relation(&mut conn, &unknown).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_single_lookup_keeps_schema_unlisted() {
        let catalog = Arc::new(analytics_catalog());
        let adapter = adapter(Arc::new(ScriptedCursor::finished()), catalog.clone());
        let mut conn = Connection::new(None, adapter.credentials.clone());

        let relation = Relation::new(None, Some("analytics".to_string()), "orders", RelationType::Table);
        adapter.get_columns_in_relation(&mut conn, &relation).await.unwrap();
        assert!(!adapter.cache().has_schema("analytics").await);

        let listed = adapter.list_relations(None, "analytics").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(catalog.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_catalog_qualified_relation_hits_cache() {
        let catalog = Arc::new(analytics_catalog());
        let adapter = adapter(Arc::new(ScriptedCursor::finished()), catalog.clone());
        let mut conn = Connection::new(None, adapter.credentials.clone());

        adapter.list_relations(None, "analytics").await.unwrap();
        let relation = Relation::new(
            Some("spark_catalog".to_string()),
            Some("analytics".to_string()),
            "orders",
            RelationType::Table,
        );
        for _ in 0..3 {
            let columns = adapter.get_columns_in_relation(&mut conn, &relation).await.unwrap();
            assert_eq!(columns.len(), 2);
        }
        assert_eq!(catalog.get_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_temporary_view_is_described() {
        let cursor = Arc::new(
            ScriptedCursor::finished()
                .with_columns(&["col_name", "data_type", "comment"])
                .with_rows(vec![
                    vec![json!("id"), json!("bigint"), json!(null)],
                    vec![json!("name"), json!("string"), json!(null)],
                ]),
        );
        let catalog = Arc::new(FakeCatalog::default());
        let adapter = adapter(cursor.clone(), catalog.clone());
        let mut conn = adapter.acquire_connection(None).await.unwrap();

        let relation = Relation::new(None, None, "orders__dbt_tmp", RelationType::View);
        let columns = adapter.get_columns_in_relation(&mut conn, &relation).await.unwrap();

        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].dtype, "bigint");
        assert_eq!(cursor.executed()[0].0, "describe extended orders__dbt_tmp");
        assert_eq!(catalog.get_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_temporary_view_has_no_columns() {
        let cursor = Arc::new(ScriptedCursor::new(vec![PollStatus::new(OperationState::Error)
            .with_error("[TABLE_OR_VIEW_NOT_FOUND] The table or view `orders__dbt_tmp` cannot be found.")]));
        let adapter = adapter(cursor, Arc::new(FakeCatalog::default()));
        let mut conn = adapter.acquire_connection(None).await.unwrap();

        let relation = Relation::new(None, None, "orders__dbt_tmp", RelationType::View);
        let columns = adapter.get_columns_in_relation(&mut conn, &relation).await.unwrap();
        assert!(columns.is_empty());
    }

    #[tokio::test]
    async fn test_other_describe_errors_propagate() {
        let cursor = Arc::new(ScriptedCursor::new(vec![
            PollStatus::new(OperationState::Error).with_error("Permission denied")
        ]));
        let adapter = adapter(cursor, Arc::new(FakeCatalog::default()));
        let mut conn = adapter.acquire_connection(None).await.unwrap();

        let relation = Relation::new(None, None, "orders__dbt_tmp", RelationType::View);
        match adapter.get_columns_in_relation(&mut conn, &relation).await {
            Err(AdapterError::Database(msg)) => assert_eq!(msg, "Permission denied"),
            other => panic!("expected database error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_catalog_collects_rows_and_errors() {
        let catalog = Arc::new(analytics_catalog().failing("broken"));
        let reporter = Arc::new(RecordingReporter::default());
        let manager = ConnectionManager::new(
            Arc::new(ScriptedConnector::succeeding(Arc::new(ScriptedCursor::finished()))),
            StatementPoller::default(),
            Arc::new(NoopReporter),
        );
        let adapter = LakehouseAdapter::new(credentials(), manager, catalog, reporter.clone())
            .with_concurrency(2);

        let result = adapter
            .get_catalog(None, &["analytics".to_string(), "broken".to_string()])
            .await;

        assert_eq!(result.rows.len(), 3);
        assert!(result.rows.iter().all(|r| r["table_database"].is_null()));
        let mut names: Vec<&str> = result
            .rows
            .iter()
            .filter_map(|r| r["column_name"].as_str())
            .collect();
        names.sort();
        assert_eq!(names, vec!["amount", "id", "name"]);

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].0, "broken");
        assert_eq!(reporter.reports.lock().unwrap()[0].1, "COMPILATION_ERROR");
    }

    #[tokio::test]
    async fn test_check_schema_exists() {
        let cursor = Arc::new(
            ScriptedCursor::finished()
                .with_columns(&["namespace"])
                .with_rows(vec![vec![json!("analytics")], vec![json!("staging")]]),
        );
        let adapter = adapter(cursor.clone(), Arc::new(FakeCatalog::default()));
        let mut conn = adapter.acquire_connection(None).await.unwrap();

        assert!(adapter.check_schema_exists(&mut conn, "spark_catalog", "staging").await.unwrap());
        assert!(!adapter.check_schema_exists(&mut conn, "spark_catalog", "raw").await.unwrap());
        assert_eq!(cursor.executed()[0].0, "show schemas in spark_catalog");
    }

    #[tokio::test]
    async fn test_add_schema_to_cache() {
        let catalog = Arc::new(FakeCatalog::default());
        let adapter = adapter(Arc::new(ScriptedCursor::finished()), catalog.clone());

        assert!(matches!(
            adapter.add_schema_to_cache(None).await,
            Err(AdapterError::Compilation(_))
        ));

        adapter.add_schema_to_cache(Some("fresh")).await.unwrap();
        assert!(adapter.list_relations(None, "fresh").await.unwrap().is_empty());
        assert_eq!(catalog.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rows_different_sql_uses_relation_columns() {
        let catalog = Arc::new(analytics_catalog());
        let adapter = adapter(Arc::new(ScriptedCursor::finished()), catalog);
        let mut conn = Connection::new(None, adapter.credentials.clone());

        let a = Relation::new(None, Some("analytics".to_string()), "orders", RelationType::Table);
        let b = Relation::new(None, Some("analytics".to_string()), "orders_copy", RelationType::Table);
        let sql = adapter.get_rows_different_sql(&mut conn, &a, &b, None).await.unwrap();
        assert!(sql.contains("SELECT `amount`, `id` FROM analytics.orders EXCEPT"));
        assert_eq!(adapter.quote("x"), "`x`");
        assert_eq!(adapter.date_function(), "current_timestamp()");
    }
}
