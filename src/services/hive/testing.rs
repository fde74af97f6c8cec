// Scripted in-memory driver used by unit tests in place of a thrift server.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::driver::{HandshakeParams, HiveConnector, HiveCursor, HiveHandle};
use crate::error::DriverError;
use crate::models::{BindValue, ColumnDescription, OperationState, PollStatus, Row};

type Executed = (String, Option<Vec<BindValue>>);

/// Cursor that replays a fixed sequence of poll responses
pub struct ScriptedCursor {
    script: Mutex<VecDeque<PollStatus>>,
    // Returned once the script runs out
    fallback: PollStatus,
    rows: Vec<Row>,
    columns: Vec<ColumnDescription>,
    executed: Mutex<Vec<Executed>>,
    execute_error: Option<DriverError>,
    polls: AtomicUsize,
    cancels: AtomicUsize,
    closes: AtomicUsize,
    fail_cancel: bool,
    fail_close: bool,
}

impl ScriptedCursor {
    pub fn new(script: Vec<PollStatus>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: PollStatus::new(OperationState::Finished),
            rows: Vec::new(),
            columns: vec![ColumnDescription {
                name: "col".to_string(),
                type_code: "STRING_TYPE".to_string(),
            }],
            executed: Mutex::new(Vec::new()),
            execute_error: None,
            polls: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            fail_cancel: false,
            fail_close: false,
        }
    }

    pub fn finished() -> Self {
        Self::new(Vec::new())
    }

    pub fn running_forever() -> Self {
        let mut cursor = Self::new(Vec::new());
        cursor.fallback = PollStatus::new(OperationState::Running);
        cursor
    }

    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    pub fn with_columns(mut self, names: &[&str]) -> Self {
        self.columns = names
            .iter()
            .map(|n| ColumnDescription {
                name: n.to_string(),
                type_code: "STRING_TYPE".to_string(),
            })
            .collect();
        self
    }

    pub fn failing_execute(mut self, message: &str) -> Self {
        self.execute_error = Some(DriverError::Transport(message.to_string()));
        self
    }

    pub fn failing_execute_with(mut self, error: DriverError) -> Self {
        self.execute_error = Some(error);
        self
    }

    pub fn failing_cancel(mut self) -> Self {
        self.fail_cancel = true;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn executed(&self) -> Vec<Executed> {
        self.executed.lock().unwrap().clone()
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl HiveCursor for ScriptedCursor {
    async fn execute_async(&self, sql: &str, bindings: Option<&[BindValue]>) -> Result<(), DriverError> {
        self.executed
            .lock()
            .unwrap()
            .push((sql.to_string(), bindings.map(|b| b.to_vec())));
        match &self.execute_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn poll(&self) -> Result<PollStatus, DriverError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }

    async fn fetch_all(&self) -> Result<Vec<Row>, DriverError> {
        Ok(self.rows.clone())
    }

    fn description(&self) -> Option<Vec<ColumnDescription>> {
        Some(self.columns.clone())
    }

    async fn cancel(&self) -> Result<(), DriverError> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        if self.fail_cancel {
            return Err(DriverError::Io("broken pipe".to_string()));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(DriverError::Io("broken pipe".to_string()));
        }
        Ok(())
    }
}

/// Session that hands out one shared scripted cursor
pub struct ScriptedHandle {
    cursor: Arc<ScriptedCursor>,
    cursors_opened: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    fail_close: bool,
}

impl ScriptedHandle {
    pub fn new(cursor: ScriptedCursor) -> Self {
        Self::with_cursor(Arc::new(cursor))
    }

    pub fn with_cursor(cursor: Arc<ScriptedCursor>) -> Self {
        Self {
            cursor,
            cursors_opened: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
            fail_close: false,
        }
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn cursor_count_handle(&self) -> Arc<AtomicUsize> {
        self.cursors_opened.clone()
    }

    pub fn close_count_handle(&self) -> Arc<AtomicUsize> {
        self.closes.clone()
    }
}

#[async_trait::async_trait]
impl HiveHandle for ScriptedHandle {
    async fn cursor(&self) -> Result<Arc<dyn HiveCursor>, DriverError> {
        self.cursors_opened.fetch_add(1, Ordering::SeqCst);
        Ok(self.cursor.clone())
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(DriverError::Transport("session already closed".to_string()));
        }
        Ok(())
    }
}

/// Connector replaying a fixed list of handshake outcomes. Once the list is
/// exhausted every attempt succeeds with the shared cursor.
pub struct ScriptedConnector {
    outcomes: Mutex<VecDeque<DriverError>>,
    fail_forever: Option<DriverError>,
    cursor: Arc<ScriptedCursor>,
    attempts: AtomicUsize,
    last_params: Mutex<Option<HandshakeParams>>,
}

impl ScriptedConnector {
    pub fn succeeding(cursor: Arc<ScriptedCursor>) -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            fail_forever: None,
            cursor,
            attempts: AtomicUsize::new(0),
            last_params: Mutex::new(None),
        }
    }

    pub fn failing_then_succeeding(failures: Vec<DriverError>, cursor: Arc<ScriptedCursor>) -> Self {
        let connector = Self::succeeding(cursor);
        *connector.outcomes.lock().unwrap() = failures.into();
        connector
    }

    pub fn always_failing(error: DriverError) -> Self {
        let mut connector = Self::succeeding(Arc::new(ScriptedCursor::finished()));
        connector.fail_forever = Some(error);
        connector
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn last_params(&self) -> Option<HandshakeParams> {
        self.last_params.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl HiveConnector for ScriptedConnector {
    async fn connect(&self, params: &HandshakeParams) -> Result<Box<dyn HiveHandle>, DriverError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        *self.last_params.lock().unwrap() = Some(params.clone());

        if let Some(err) = &self.fail_forever {
            return Err(err.clone());
        }
        if let Some(err) = self.outcomes.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(Box::new(ScriptedHandle::with_cursor(self.cursor.clone())))
    }
}
