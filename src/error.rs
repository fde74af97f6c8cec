use thiserror::Error;

/// Result alias used across the adapter
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Adapter error types
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Bad or missing connection profile field. Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Handshake with the engine failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement reached a non-success terminal state or reported an error message
    #[error("Database error: {0}")]
    Database(String),

    /// Catalog metadata request failed
    #[error("Compilation error: {0}")]
    Compilation(String),

    /// Operation invoked without a required precondition
    #[error("State error: {0}")]
    State(String),

    /// Normalized transport failure surfaced from statement execution
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Raw driver failure that has not been normalized yet
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AdapterError {
    /// The message without the category prefix
    pub fn message(&self) -> String {
        match self {
            AdapterError::Configuration(msg)
            | AdapterError::Connection(msg)
            | AdapterError::Database(msg)
            | AdapterError::Compilation(msg)
            | AdapterError::State(msg)
            | AdapterError::Runtime(msg)
            | AdapterError::Internal(msg) => msg.clone(),
            AdapterError::Driver(err) => err.to_string(),
        }
    }

    /// Short machine-readable code, used by error reporters
    pub fn code(&self) -> &'static str {
        match self {
            AdapterError::Configuration(_) => "CONFIGURATION_ERROR",
            AdapterError::Connection(_) => "CONNECTION_ERROR",
            AdapterError::Database(_) => "DATABASE_ERROR",
            AdapterError::Compilation(_) => "COMPILATION_ERROR",
            AdapterError::State(_) => "STATE_ERROR",
            AdapterError::Runtime(_) => "RUNTIME_ERROR",
            AdapterError::Driver(_) => "DRIVER_ERROR",
            AdapterError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Status block attached to a thrift response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseStatus {
    pub status_code: i32,
    pub sql_state: Option<String>,
    pub error_code: Option<i32>,
    pub error_message: Option<String>,
}

/// Errors raised by a statement-execution driver
#[derive(Debug, Clone, Error)]
pub enum DriverError {
    /// The server closed the stream mid-request. During the handshake this
    /// almost always means the credentials were rejected.
    #[error("unexpected end of stream: {0}")]
    EndOfStream(String),

    /// The server answered with an error status
    #[error("{}", .0.error_message.as_deref().unwrap_or("server returned an error status"))]
    Status(ResponseStatus),

    /// Transport failure carrying a message from the server or HTTP layer
    #[error("{0}")]
    Transport(String),

    /// Low-level I/O failure without a server message
    #[error("I/O error: {0}")]
    Io(String),
}

impl DriverError {
    /// Message attached by the remote side, if any
    pub fn message(&self) -> Option<&str> {
        match self {
            DriverError::Status(status) => status.error_message.as_deref(),
            DriverError::Transport(msg) => Some(msg.as_str()),
            DriverError::EndOfStream(_) | DriverError::Io(_) => None,
        }
    }

    /// Structured status carried by the error, if any
    pub fn status(&self) -> Option<&ResponseStatus> {
        match self {
            DriverError::Status(status) => Some(status),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DriverError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            DriverError::EndOfStream(err.to_string())
        } else {
            DriverError::Io(err.to_string())
        }
    }
}

impl From<config::ConfigError> for AdapterError {
    fn from(err: config::ConfigError) -> Self {
        AdapterError::Configuration(err.to_string())
    }
}
