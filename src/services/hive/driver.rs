// Driver seam for the Hive-compatible statement protocol.
// This crate ships no thrift-over-HTTP client. Callers supply a
// `HiveConnector` (see `LakehouseAdapter::from_config`); the adapter only
// ever talks to these traits.
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::DriverError;
use crate::models::{BindValue, ColumnDescription, Credentials, PollStatus, Row};

/// Everything the handshake needs, extracted from validated credentials
#[derive(Clone)]
pub struct HandshakeParams {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub lakehouse: Option<String>,
    pub data_plane: Option<String>,
    pub domain: Option<String>,
    pub cluster: Option<String>,
    pub configuration: HashMap<String, String>,
}

impl HandshakeParams {
    pub fn from_credentials(creds: &Credentials) -> Self {
        use crate::models::AddressingMode;

        let (data_plane, domain, cluster) = match creds.addressing_mode() {
            AddressingMode::Workspace { dataplane, .. } => (dataplane.clone(), None, None),
            AddressingMode::Domain { domain, .. } => (None, Some(domain.clone()), None),
            AddressingMode::Cluster { cluster } => (None, None, Some(cluster.clone())),
        };

        Self {
            scheme: creds.scheme().to_string(),
            host: creds.host().unwrap_or_default().to_string(),
            port: creds.port(),
            database: creds.catalog().to_string(),
            username: creds.user().map(str::to_string),
            password: creds.token().map(str::to_string),
            lakehouse: creds.addressing_mode().lakehouse().map(str::to_string),
            data_plane,
            domain,
            cluster,
            configuration: creds.server_side_parameters().clone(),
        }
    }
}

impl std::fmt::Debug for HandshakeParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeParams")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("lakehouse", &self.lakehouse)
            .field("data_plane", &self.data_plane)
            .field("domain", &self.domain)
            .field("cluster", &self.cluster)
            .finish()
    }
}

/// Opens raw sessions against the engine.
///
/// No implementation is bundled: embed a thrift-over-HTTP client behind this
/// trait and hand it to `LakehouseAdapter::from_config` or
/// `ConnectionManager::new`.
#[async_trait::async_trait]
pub trait HiveConnector: Send + Sync {
    async fn connect(&self, params: &HandshakeParams) -> Result<Box<dyn HiveHandle>, DriverError>;
}

/// An open session
#[async_trait::async_trait]
pub trait HiveHandle: Send + Sync {
    async fn cursor(&self) -> Result<Arc<dyn HiveCursor>, DriverError>;

    async fn close(&self) -> Result<(), DriverError>;
}

/// A statement handle within a session
#[async_trait::async_trait]
pub trait HiveCursor: Send + Sync {
    /// Submit without waiting for completion
    async fn execute_async(&self, sql: &str, bindings: Option<&[BindValue]>) -> Result<(), DriverError>;

    async fn poll(&self) -> Result<PollStatus, DriverError>;

    async fn fetch_all(&self) -> Result<Vec<Row>, DriverError>;

    /// Column metadata of the last statement, if it produced a result set
    fn description(&self) -> Option<Vec<ColumnDescription>>;

    async fn cancel(&self) -> Result<(), DriverError>;

    async fn close(&self) -> Result<(), DriverError>;
}
