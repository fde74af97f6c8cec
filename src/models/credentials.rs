use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AdapterError, AdapterResult};

pub const DEFAULT_CATALOG_NAME: &str = "spark_catalog";
pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 120;

/// Connection profile as it arrives from the host tool, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub https: Option<bool>,
    /// Legacy name of `catalog`
    pub database: Option<String>,
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub dataplane: Option<String>,
    pub domain: Option<String>,
    pub lakehouse: Option<String>,
    pub cluster: Option<String>,
    pub user: Option<String>,
    pub token: Option<String>,
    pub connect_retries: Option<u32>,
    pub connect_timeout: Option<u64>,
    #[serde(default)]
    pub server_side_parameters: HashMap<String, String>,
    pub retry_all: Option<bool>,
}

/// Which identifying fields a deployment uses to reach the control plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressingMode {
    /// Direct catalog access through a compute cluster
    Cluster { cluster: String },
    /// Data-plane (workspace) id plus lakehouse name
    Workspace {
        dataplane: Option<String>,
        lakehouse: Option<String>,
    },
    /// Domain plus lakehouse name
    Domain {
        domain: String,
        lakehouse: Option<String>,
    },
}

impl AddressingMode {
    fn select(config: &CredentialsConfig) -> Self {
        if let Some(cluster) = non_blank(&config.cluster) {
            AddressingMode::Cluster { cluster }
        } else if let Some(dataplane) = non_blank(&config.dataplane) {
            AddressingMode::Workspace {
                dataplane: Some(dataplane),
                lakehouse: non_blank(&config.lakehouse),
            }
        } else if let Some(domain) = non_blank(&config.domain) {
            AddressingMode::Domain {
                domain,
                lakehouse: non_blank(&config.lakehouse),
            }
        } else {
            AddressingMode::Workspace {
                dataplane: None,
                lakehouse: non_blank(&config.lakehouse),
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AddressingMode::Cluster { .. } => "cluster",
            AddressingMode::Workspace { .. } => "workspace",
            AddressingMode::Domain { .. } => "domain",
        }
    }

    pub fn lakehouse(&self) -> Option<&str> {
        match self {
            AddressingMode::Cluster { .. } => None,
            AddressingMode::Workspace { lakehouse, .. } | AddressingMode::Domain { lakehouse, .. } => {
                lakehouse.as_deref()
            }
        }
    }
}

/// Validated, immutable connection parameters for one logical target
#[derive(Clone)]
pub struct Credentials {
    host: Option<String>,
    port: u16,
    https: bool,
    catalog: String,
    schema: Option<String>,
    user: Option<String>,
    token: Option<String>,
    mode: AddressingMode,
    // Kept even when another mode wins; the job API is always addressed by domain
    domain: Option<String>,
    connect_retries: u32,
    connect_timeout: u64,
    server_side_parameters: HashMap<String, String>,
    retry_all: bool,
}

impl Credentials {
    /// Validate a raw profile. Fails fast on malformed identifiers.
    pub fn new(config: CredentialsConfig) -> AdapterResult<Self> {
        let catalog = Self::resolve_catalog(&config)?;

        if let Some(schema) = config.schema.as_deref() {
            if schema.contains('.') {
                return Err(AdapterError::Configuration(format!(
                    "The schema should not contain '.': {}\n\
                     If you are trying to set a catalog, please use `catalog` instead.",
                    schema
                )));
            }
        }

        let mode = AddressingMode::select(&config);

        Ok(Self {
            host: non_blank(&config.host),
            port: config.port.unwrap_or(DEFAULT_PORT),
            https: config.https.unwrap_or(true),
            catalog,
            schema: config.schema,
            user: non_blank(&config.user),
            token: non_blank(&config.token),
            mode,
            domain: non_blank(&config.domain),
            connect_retries: config.connect_retries.unwrap_or(0),
            connect_timeout: config.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            server_side_parameters: config.server_side_parameters,
            retry_all: config.retry_all.unwrap_or(false),
        })
    }

    fn resolve_catalog(config: &CredentialsConfig) -> AdapterResult<String> {
        let declared = match (&config.database, &config.catalog) {
            (Some(database), Some(catalog)) if database != catalog => {
                return Err(AdapterError::Configuration(format!(
                    "Both 'database' ({}) and 'catalog' ({}) are set. \
                     'database' is a legacy alias of 'catalog', set only one of them.",
                    database, catalog
                )));
            }
            (_, Some(catalog)) => Some(catalog),
            (Some(database), None) => Some(database),
            (None, None) => None,
        };

        match declared {
            Some(name) if name.trim().is_empty() => Err(AdapterError::Configuration(format!(
                "Invalid catalog name : '{}'.",
                name
            ))),
            Some(name) => Ok(name.clone()),
            None => Ok(DEFAULT_CATALOG_NAME.to_string()),
        }
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn https(&self) -> bool {
        self.https
    }

    pub fn scheme(&self) -> &'static str {
        if self.https {
            "https"
        } else {
            "http"
        }
    }

    /// Resolved catalog name, never empty
    pub fn catalog(&self) -> &str {
        &self.catalog
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn addressing_mode(&self) -> &AddressingMode {
        &self.mode
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn connect_retries(&self) -> u32 {
        self.connect_retries
    }

    pub fn connect_timeout(&self) -> u64 {
        self.connect_timeout
    }

    pub fn server_side_parameters(&self) -> &HashMap<String, String> {
        &self.server_side_parameters
    }

    pub fn retry_all(&self) -> bool {
        self.retry_all
    }

    /// Fields that must be present before a handshake is attempted
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self.mode {
            AddressingMode::Workspace { .. } => &["host", "port", "user", "token", "lakehouse", "dataplane"],
            AddressingMode::Domain { .. } => &["host", "port", "user", "token", "lakehouse", "domain"],
            AddressingMode::Cluster { .. } => &["host", "port", "token", "cluster"],
        }
    }

    /// First required field that is not set
    pub fn missing_field(&self) -> Option<&'static str> {
        self.required_fields()
            .iter()
            .copied()
            .find(|field| !self.has_field(field))
    }

    fn has_field(&self, field: &str) -> bool {
        match field {
            "host" => self.host.is_some(),
            "port" => true,
            "user" => self.user.is_some(),
            "token" => self.token.is_some(),
            "lakehouse" => self.mode.lakehouse().is_some(),
            "dataplane" => matches!(&self.mode, AddressingMode::Workspace { dataplane: Some(_), .. }),
            "domain" => matches!(&self.mode, AddressingMode::Domain { .. }),
            "cluster" => matches!(&self.mode, AddressingMode::Cluster { .. }),
            _ => false,
        }
    }

    /// Canonical key for this target. Equal identities mean the same target.
    pub fn identity(&self) -> String {
        let base = format!(
            "{}://{}:{}",
            self.scheme(),
            self.host.as_deref().unwrap_or(""),
            self.port
        );
        match &self.mode {
            AddressingMode::Workspace { dataplane, lakehouse } => format!(
                "{}/dataplane/{}/lakehouse/{}",
                base,
                dataplane.as_deref().unwrap_or(""),
                lakehouse.as_deref().unwrap_or("")
            ),
            AddressingMode::Domain { domain, lakehouse } => format!(
                "{}/domain/{}/lakehouse/{}",
                base,
                domain,
                lakehouse.as_deref().unwrap_or("")
            ),
            AddressingMode::Cluster { cluster } => format!("{}/cluster/{}", base, cluster),
        }
    }

    /// Non-secret fields shown when the host tool prints connection info
    pub fn connection_keys(&self) -> Vec<(&'static str, String)> {
        let mut keys = vec![
            ("host", self.host.clone().unwrap_or_default()),
            ("port", self.port.to_string()),
        ];
        match &self.mode {
            AddressingMode::Workspace { dataplane, lakehouse } => {
                keys.push(("dataplane", dataplane.clone().unwrap_or_default()));
                keys.push(("lakehouse", lakehouse.clone().unwrap_or_default()));
            }
            AddressingMode::Domain { domain, lakehouse } => {
                keys.push(("domain", domain.clone()));
                keys.push(("lakehouse", lakehouse.clone().unwrap_or_default()));
            }
            AddressingMode::Cluster { cluster } => keys.push(("cluster", cluster.clone())),
        }
        keys.push(("catalog", self.catalog.clone()));
        keys.push(("schema", self.schema.clone().unwrap_or_default()));
        keys
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity())
            .field("catalog", &self.catalog)
            .field("schema", &self.schema)
            .field("user", &self.user)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("connect_retries", &self.connect_retries)
            .field("connect_timeout", &self.connect_timeout)
            .field("retry_all", &self.retry_all)
            .finish()
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
