// Async submit-then-poll execution.
// The thrift server drops synchronous requests after a fixed timeout, so
// statements are submitted asynchronously and their operation state polled.
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::driver::HiveCursor;
use crate::error::{AdapterError, AdapterResult};
use crate::models::{BindValue, OperationState, PollStatus};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Drives one statement to a terminal state
#[derive(Debug, Clone, Copy)]
pub struct StatementPoller {
    interval: Duration,
}

impl StatementPoller {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Submit `sql` and poll until the operation leaves the pending family.
    ///
    /// There is no iteration limit: the engine may run for as long as it
    /// likes. `cancel` is checked between polls; when it fires the cursor is
    /// cancelled (best effort) and the statement reported as canceled.
    pub async fn run(
        &self,
        cursor: &dyn HiveCursor,
        sql: &str,
        bindings: Option<&[BindValue]>,
        cancel: &CancellationToken,
    ) -> AdapterResult<PollStatus> {
        cursor.execute_async(sql, bindings).await?;

        let mut status = cursor.poll().await?;
        while status.operation_state.is_pending() {
            debug!("Poll status: {}, sleeping", status.operation_state);

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Cancellation requested, cancelling operation");
                    if let Err(e) = cursor.cancel().await {
                        debug!("Exception while cancelling query: {}", e);
                    }
                    return Err(AdapterError::Database(format!(
                        "Query failed with status: {}",
                        OperationState::Canceled
                    )));
                }
                _ = tokio::time::sleep(self.interval) => {}
            }

            status = cursor.poll().await?;
        }

        Self::check_terminal(status)
    }

    /// An explicit error message wins; otherwise only FINISHED is success.
    /// Canceled statements report no message, so the state check stops them
    /// from passing as OK.
    fn check_terminal(status: PollStatus) -> AdapterResult<PollStatus> {
        if let Some(message) = status.error() {
            debug!("Poll response: {:?}", status);
            debug!("Poll status: {}", status.operation_state);
            return Err(AdapterError::Database(message.to_string()));
        }

        if !status.operation_state.is_success() {
            return Err(AdapterError::Database(format!(
                "Query failed with status: {}",
                status.operation_state
            )));
        }

        debug!("Poll status: {}, query complete", status.operation_state);
        Ok(status)
    }
}

impl Default for StatementPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}
