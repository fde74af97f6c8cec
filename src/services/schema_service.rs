use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::endpoint::CatalogEndpoint;
use crate::config::CatalogConfig;
use crate::error::{AdapterError, AdapterResult};
use crate::models::{Column, Credentials, Relation, RelationType, TableStats};

/// Header carrying the control-plane access token
pub const API_TOKEN_HEADER: &str = "X-API-TOKEN";

/// Body fragments the control plane uses for an absent namespace
const SCHEMA_NOT_FOUND_MARKERS: [&str; 4] = [
    "schema_not_found",
    "schema not found",
    "nosuchnamespace",
    "namespace does not exist",
];

/// Column entry as reported by the catalog API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    #[serde(rename = "fieldType")]
    pub field_type: String,
}

/// Table entry as reported by the catalog API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    #[serde(default)]
    pub catalog: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    pub name: String,
    #[serde(rename = "type", default)]
    pub table_type: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnMetadata>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub statistics: Option<String>,
}

impl TableMetadata {
    /// Build a relation with positional columns. `schema` is used when the
    /// payload omits its namespace.
    pub fn into_relation(self, schema: &str) -> Relation {
        let schema = self.namespace.clone().unwrap_or_else(|| schema.to_string());
        let kind = RelationType::from_engine(self.table_type.as_deref());
        let stats = TableStats::parse(self.statistics.as_deref());

        let columns = self
            .columns
            .into_iter()
            .enumerate()
            .map(|(index, column)| Column {
                table_database: None,
                table_schema: Some(schema.clone()),
                table_name: self.name.clone(),
                table_type: kind,
                table_owner: self.owner.clone(),
                table_stats: stats.clone(),
                name: column.name,
                index,
                dtype: column.field_type,
            })
            .collect();

        Relation::new(None, Some(schema), self.name, kind)
            .with_provider(self.provider)
            .with_columns(columns)
    }
}

/// Source of discovered relations, implemented by the REST client
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Relations of a namespace, columns attached. Absent namespace is empty.
    async fn list_relations(&self, database: &str, schema: &str) -> AdapterResult<Vec<Relation>>;

    /// One relation with its columns, `None` when absent
    async fn get_relation(
        &self,
        database: &str,
        schema: &str,
        identifier: &str,
    ) -> AdapterResult<Option<Relation>>;
}

/// Listing payload: either a bare array or one page of a paginated listing
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TablesPayload {
    Plain(Vec<TableMetadata>),
    Paged {
        #[serde(alias = "data")]
        tables: Vec<TableMetadata>,
        #[serde(default, alias = "nextPageToken")]
        next_page_token: Option<String>,
    },
}

/// Retry policy for flaky metadata calls
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base: Duration) -> Self {
        Self {
            max_retries,
            backoff_base,
        }
    }

    pub fn is_retryable(status: StatusCode) -> bool {
        matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
    }

    /// Delay before retry number `attempt` (1-based): base, 2*base, 4*base...
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff_base * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

impl From<&CatalogConfig> for RetryPolicy {
    fn from(config: &CatalogConfig) -> Self {
        Self::new(config.max_retries, config.backoff_base())
    }
}

/// HTTP client for the control-plane catalog API
#[derive(Debug, Clone)]
pub struct SchemaService {
    client: Client,
    endpoint: CatalogEndpoint,
    token: Option<String>,
    retry: RetryPolicy,
}

impl SchemaService {
    pub fn new(creds: &Credentials, config: &CatalogConfig) -> AdapterResult<Self> {
        let endpoint = CatalogEndpoint::from_credentials(creds)?;
        Self::with_endpoint(
            endpoint,
            creds.token().map(str::to_string),
            config.request_timeout(),
            RetryPolicy::from(config),
        )
    }

    pub fn with_endpoint(
        endpoint: CatalogEndpoint,
        token: Option<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> AdapterResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdapterError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            token,
            retry,
        })
    }

    /// All tables of a namespace. An absent namespace yields an empty list.
    pub async fn get_tables_by_namespace(
        &self,
        database: &str,
        schema: &str,
    ) -> AdapterResult<Vec<TableMetadata>> {
        let context = format!("Could not get tables for schema {}", schema);
        let base = self.endpoint.tables_url(database, schema)?;

        let mut tables = Vec::new();
        let mut page_token: Option<String> = None;
        let mut seen_tokens = HashSet::new();
        loop {
            let mut url = base.clone();
            if let Some(token) = &page_token {
                url.query_pairs_mut().append_pair("pageToken", token);
            }

            let payload: TablesPayload = match self.get_json(url, &context).await? {
                Some(payload) => payload,
                None => {
                    debug!("Schema {}.{} not found, treating as empty", database, schema);
                    return Ok(tables);
                }
            };

            match payload {
                TablesPayload::Plain(page) => {
                    tables.extend(page);
                    return Ok(tables);
                }
                TablesPayload::Paged {
                    tables: page,
                    next_page_token,
                } => {
                    tables.extend(page);
                    match next_page_token.filter(|t| !t.is_empty()) {
                        Some(next) if seen_tokens.insert(next.clone()) => page_token = Some(next),
                        Some(next) => {
                            warn!("Page token {} for {} was already served, stopping", next, schema);
                            return Ok(tables);
                        }
                        None => return Ok(tables),
                    }
                }
            }
        }
    }

    /// One table's metadata, `None` when the table or namespace is absent
    pub async fn get_table(
        &self,
        database: &str,
        schema: &str,
        table: &str,
    ) -> AdapterResult<Option<TableMetadata>> {
        let context = format!("Could not get table metadata for {}.{}", schema, table);
        let url = self.endpoint.table_url(database, schema, table)?;
        self.get_json(url, &context).await
    }

    async fn get_json<T>(&self, url: Url, context: &str) -> AdapterResult<Option<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let mut attempt = 0u32;
        loop {
            let mut request = self.client.get(url.clone());
            if let Some(token) = &self.token {
                request = request.header(API_TOKEN_HEADER, token);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) if attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay(attempt);
                    warn!(
                        "Catalog request to {} failed ({}), retry {}/{} in {:?}",
                        url.path(),
                        e,
                        attempt,
                        self.retry.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Err(e) => {
                    return Err(AdapterError::Compilation(format!(
                        "{}. Request failed with error: {}",
                        context, e
                    )));
                }
            };

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }

            if RetryPolicy::is_retryable(status) && attempt < self.retry.max_retries {
                attempt += 1;
                let delay = self.retry.delay(attempt);
                warn!(
                    "Catalog request to {} returned {}, retry {}/{} in {:?}",
                    url.path(),
                    status,
                    attempt,
                    self.retry.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            let body = response.text().await.map_err(|e| {
                AdapterError::Compilation(format!("{}. Failed to read response: {}", context, e))
            })?;

            if status.is_success() {
                return serde_json::from_str(&body).map(Some).map_err(|e| {
                    AdapterError::Compilation(format!("{}. Failed to parse response: {}", context, e))
                });
            }

            if is_schema_not_found(&body) {
                return Ok(None);
            }

            return Err(AdapterError::Compilation(format!(
                "{}. Request failed with status: {} and error message is: {}",
                context,
                status.as_u16(),
                body
            )));
        }
    }
}

#[async_trait]
impl CatalogSource for SchemaService {
    async fn list_relations(&self, database: &str, schema: &str) -> AdapterResult<Vec<Relation>> {
        let tables = self.get_tables_by_namespace(database, schema).await?;
        Ok(tables
            .into_iter()
            .map(|table| table.into_relation(schema))
            .collect())
    }

    async fn get_relation(
        &self,
        database: &str,
        schema: &str,
        identifier: &str,
    ) -> AdapterResult<Option<Relation>> {
        let table = self.get_table(database, schema, identifier).await?;
        Ok(table.map(|t| t.into_relation(schema)))
    }
}

fn is_schema_not_found(body: &str) -> bool {
    let body = body.to_ascii_lowercase();
    SCHEMA_NOT_FOUND_MARKERS
        .iter()
        .any(|marker| body.contains(marker))
}
