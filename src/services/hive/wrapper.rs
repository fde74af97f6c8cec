// Uniform execute/fetch/cancel/close surface over a raw Hive session.
// The engine has no transactions, so rollback is a no-op.
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::driver::{HiveCursor, HiveHandle};
use super::poller::StatementPoller;
use crate::error::{AdapterError, AdapterResult};
use crate::models::{Binding, ColumnDescription, PollStatus, Row};

/// Cancels whatever statement is in flight on a wrapper.
/// Clone it before handing the connection to the executing task.
#[derive(Debug, Clone)]
pub struct StatementCanceller {
    current: Arc<Mutex<CancellationToken>>,
}

impl StatementCanceller {
    fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(CancellationToken::new())),
        }
    }

    pub fn cancel(&self) {
        self.lock().cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().is_cancelled()
    }

    /// Token for the next statement. A token that already fired is replaced
    /// so one cancellation does not poison later statements.
    fn arm(&self) -> CancellationToken {
        let mut current = self.lock();
        if current.is_cancelled() {
            *current = CancellationToken::new();
        }
        current.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CancellationToken> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Owns one raw session and at most one live cursor
pub struct ConnectionWrapper {
    handle: Box<dyn HiveHandle>,
    cursor: Option<Arc<dyn HiveCursor>>,
    poller: StatementPoller,
    canceller: StatementCanceller,
}

impl ConnectionWrapper {
    pub fn new(handle: Box<dyn HiveHandle>, poller: StatementPoller) -> Self {
        Self {
            handle,
            cursor: None,
            poller,
            canceller: StatementCanceller::new(),
        }
    }

    /// Bind a fresh cursor. The previous cursor, if any, is dropped without
    /// an explicit close; the driver releases it when the session closes.
    pub async fn cursor(&mut self) -> AdapterResult<&mut Self> {
        let cursor = self.handle.cursor().await?;
        self.cursor = Some(cursor);
        Ok(self)
    }

    pub fn has_cursor(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn canceller(&self) -> StatementCanceller {
        self.canceller.clone()
    }

    /// Run one statement to completion. Resolves once the operation is
    /// terminal; results are then available through `fetch_all`.
    pub async fn execute(&mut self, sql: &str, bindings: Option<&[Binding]>) -> AdapterResult<PollStatus> {
        let cursor = self.active_cursor()?.clone();
        let sql = Self::strip_terminator(sql);
        let bindings: Option<Vec<_>> = bindings.map(|b| b.iter().map(Binding::normalize).collect());

        let token = self.canceller.arm();
        self.poller
            .run(cursor.as_ref(), sql, bindings.as_deref(), &token)
            .await
    }

    /// Best effort: driver errors are logged and swallowed
    pub async fn cancel(&self) {
        self.canceller.cancel();
        if let Some(cursor) = &self.cursor {
            if let Err(e) = cursor.cancel().await {
                debug!("Exception while cancelling query: {}", e);
            }
        }
    }

    /// Close the cursor (best effort), then the session. A failure closing
    /// the session is returned.
    pub async fn close(&mut self) -> AdapterResult<()> {
        if let Some(cursor) = self.cursor.take() {
            if let Err(e) = cursor.close().await {
                debug!("Exception while closing cursor: {}", e);
            }
        }
        self.handle.close().await?;
        Ok(())
    }

    pub fn rollback(&self) {}

    pub async fn fetch_all(&self) -> AdapterResult<Vec<Row>> {
        Ok(self.active_cursor()?.fetch_all().await?)
    }

    pub fn description(&self) -> AdapterResult<Option<Vec<ColumnDescription>>> {
        Ok(self.active_cursor()?.description())
    }

    fn active_cursor(&self) -> AdapterResult<&Arc<dyn HiveCursor>> {
        self.cursor
            .as_ref()
            .ok_or_else(|| AdapterError::State("No active cursor, call cursor() first".to_string()))
    }

    fn strip_terminator(sql: &str) -> &str {
        let trimmed = sql.trim();
        trimmed.strip_suffix(';').unwrap_or(trimmed)
    }
}

impl std::fmt::Debug for ConnectionWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionWrapper")
            .field("has_cursor", &self.cursor.is_some())
            .field("poller", &self.poller)
            .finish()
    }
}
