use url::Url;

use crate::error::{AdapterError, AdapterResult};
use crate::models::{AddressingMode, Credentials};

/// Builds control-plane catalog URLs for one deployment generation.
///
/// The strategy is picked from the credentials' addressing mode, so a single
/// client serves every deployment shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointStrategy {
    /// `/api/v1/sql/schema/catalogs/...`
    Workspace,
    /// `/api/v1/domains/{domain}/sql/schema/catalogs/...`
    Domain { domain: String },
    /// `/api/v1/clusters/{cluster}/catalogs/...`
    DirectCatalog { cluster: String },
}

impl EndpointStrategy {
    pub fn for_credentials(creds: &Credentials) -> Self {
        match creds.addressing_mode() {
            AddressingMode::Workspace { .. } => EndpointStrategy::Workspace,
            AddressingMode::Domain { domain, .. } => EndpointStrategy::Domain {
                domain: domain.clone(),
            },
            AddressingMode::Cluster { cluster } => EndpointStrategy::DirectCatalog {
                cluster: cluster.clone(),
            },
        }
    }

    fn prefix(&self) -> Vec<&str> {
        match self {
            EndpointStrategy::Workspace => vec!["api", "v1", "sql", "schema"],
            EndpointStrategy::Domain { domain } => {
                vec!["api", "v1", "domains", domain.as_str(), "sql", "schema"]
            }
            EndpointStrategy::DirectCatalog { cluster } => {
                vec!["api", "v1", "clusters", cluster.as_str()]
            }
        }
    }
}

/// Resolved base URL plus addressing strategy for the catalog REST API
#[derive(Debug, Clone)]
pub struct CatalogEndpoint {
    base: Url,
    strategy: EndpointStrategy,
}

impl CatalogEndpoint {
    pub fn new(base: Url, strategy: EndpointStrategy) -> Self {
        Self { base, strategy }
    }

    pub fn from_credentials(creds: &Credentials) -> AdapterResult<Self> {
        let host = creds.host().ok_or_else(|| {
            AdapterError::Configuration("host is required to reach the catalog API".to_string())
        })?;
        let raw = format!("{}://{}:{}", creds.scheme(), host, creds.port());
        let base = Url::parse(&raw)
            .map_err(|e| AdapterError::Configuration(format!("Invalid catalog URL '{}': {}", raw, e)))?;
        Ok(Self::new(base, EndpointStrategy::for_credentials(creds)))
    }

    pub fn strategy(&self) -> &EndpointStrategy {
        &self.strategy
    }

    /// `.../catalogs/{catalog}/namespaces/{schema}/tables?includeMetadata=true`
    pub fn tables_url(&self, catalog: &str, schema: &str) -> AdapterResult<Url> {
        let mut url = self.namespace_url(catalog, schema, &["tables"])?;
        url.query_pairs_mut().append_pair("includeMetadata", "true");
        Ok(url)
    }

    /// `.../catalogs/{catalog}/namespaces/{schema}/tables/{table}`
    pub fn table_url(&self, catalog: &str, schema: &str, table: &str) -> AdapterResult<Url> {
        self.namespace_url(catalog, schema, &["tables", table])
    }

    fn namespace_url(&self, catalog: &str, schema: &str, tail: &[&str]) -> AdapterResult<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                AdapterError::Configuration(format!("Catalog URL '{}' cannot be a base", self.base))
            })?;
            segments.pop_if_empty();
            segments.extend(self.strategy.prefix());
            segments.extend(["catalogs", catalog, "namespaces", schema]);
            segments.extend(tail);
        }
        Ok(url)
    }
}
