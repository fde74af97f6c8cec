use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::credentials::Credentials;
use crate::error::{AdapterError, AdapterResult};
use crate::services::hive::{ConnectionWrapper, StatementCanceller};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Closed,
    Open,
}

/// One unit of work against a target. Not shared between concurrent callers.
#[derive(Debug)]
pub struct Connection {
    pub id: String,
    pub name: Option<String>,
    pub credentials: Arc<Credentials>,
    pub state: ConnectionState,
    pub created_at: DateTime<Utc>,
    pub last_connected_at: Option<DateTime<Utc>>,
    handle: Option<ConnectionWrapper>,
}

impl Connection {
    pub fn new(name: Option<String>, credentials: Arc<Credentials>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            credentials,
            state: ConnectionState::Closed,
            created_at: Utc::now(),
            last_connected_at: None,
            handle: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub(crate) fn attach(&mut self, handle: ConnectionWrapper) {
        self.handle = Some(handle);
        self.state = ConnectionState::Open;
        self.last_connected_at = Some(Utc::now());
    }

    pub(crate) fn detach(&mut self) -> Option<ConnectionWrapper> {
        self.state = ConnectionState::Closed;
        self.handle.take()
    }

    pub fn handle(&self) -> AdapterResult<&ConnectionWrapper> {
        self.handle
            .as_ref()
            .ok_or_else(|| self.not_open())
    }

    pub fn handle_mut(&mut self) -> AdapterResult<&mut ConnectionWrapper> {
        if self.handle.is_none() {
            return Err(self.not_open());
        }
        self.handle.as_mut().ok_or_else(|| AdapterError::Internal("connection handle vanished".to_string()))
    }

    /// Canceller for statements run on this connection, once it is open
    pub fn canceller(&self) -> Option<StatementCanceller> {
        self.handle.as_ref().map(ConnectionWrapper::canceller)
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    fn not_open(&self) -> AdapterError {
        AdapterError::State(format!("Connection '{}' is not open", self.display_name()))
    }
}
