use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn, Instrument};

use crate::error::{AdapterError, AdapterResult, DriverError};
use crate::models::{AdapterResponse, Binding, Connection, Credentials, QueryResult};
use crate::services::hive::{ConnectionWrapper, HandshakeParams, HiveConnector, StatementPoller};
use crate::telemetry::ErrorReporter;

/// Substrings (lowercase) marking a handshake failure worth retrying
const RETRYABLE_MARKERS: [&str; 2] = ["pending", "temporarily_unavailable"];

/// Opens connections with retry and runs statements behind a single
/// error-normalization boundary
pub struct ConnectionManager {
    connector: Arc<dyn HiveConnector>,
    poller: StatementPoller,
    reporter: Arc<dyn ErrorReporter>,
}

impl ConnectionManager {
    pub fn new(
        connector: Arc<dyn HiveConnector>,
        poller: StatementPoller,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            connector,
            poller,
            reporter,
        }
    }

    /// Open `connection` unless it is already open.
    ///
    /// Up to `connect_retries + 1` handshakes are attempted. Missing required
    /// fields and end-of-stream failures are fatal on the first attempt.
    pub async fn open(&self, connection: &mut Connection) -> AdapterResult<()> {
        if connection.is_open() {
            debug!("Connection is already open, skipping open.");
            return Ok(());
        }

        let creds = connection.credentials.clone();
        let span = tracing::info_span!("open", connection = %connection.display_name(), target = %creds.identity());

        let handle = self.open_with_retry(&creds).instrument(span).await.map_err(|e| {
            self.reporter.report("open", &e);
            e
        })?;

        connection.attach(handle);
        info!("Opened connection '{}'", connection.display_name());
        Ok(())
    }

    async fn open_with_retry(&self, creds: &Credentials) -> AdapterResult<ConnectionWrapper> {
        let retries = creds.connect_retries();
        let mut last_error: Option<DriverError> = None;

        for attempt in 0..=retries {
            Self::validate_creds(creds)?;
            let params = HandshakeParams::from_credentials(creds);

            let err = match self.connector.connect(&params).await {
                Ok(raw) => return Ok(ConnectionWrapper::new(raw, self.poller)),
                Err(err) => err,
            };

            if let DriverError::EndOfStream(_) = err {
                // The server hung up on the handshake: bad credentials or a
                // terminated lakehouse. Retrying cannot help.
                return Err(AdapterError::Connection(format!(
                    "Failed to connect to {}. Make sure lakehouse is in non-terminated state \
                     and credentials (user/password) are correct: {}",
                    creds.identity(),
                    err
                )));
            }

            if let Some(message) = Self::retryable_message(&err).filter(|_| retries > 0) {
                warn!(
                    "Warning: {}\n\tRetrying in {} seconds ({} of {})",
                    message,
                    creds.connect_timeout(),
                    attempt,
                    retries
                );
            } else if creds.retry_all() && retries > 0 {
                warn!(
                    "Warning: {}, retrying due to 'retry_all' configuration set to true.\n\t\
                     Retrying in {} seconds ({} of {})",
                    err.message().unwrap_or("No message"),
                    creds.connect_timeout(),
                    attempt,
                    retries
                );
            } else {
                return Err(AdapterError::Connection(format!(
                    "Failed to connect to {}! Make sure host, port, protocol (https/http) is correct! ({})",
                    creds.identity(),
                    err
                )));
            }

            last_error = Some(err);
            // No sleep after the final attempt; the loop is about to give up
            if attempt < retries {
                tokio::time::sleep(Duration::from_secs(creds.connect_timeout())).await;
            }
        }

        match last_error {
            Some(err) => Err(AdapterError::Driver(err)),
            None => Err(AdapterError::Internal("connection retry loop exited without an error".to_string())),
        }
    }

    /// Deterministic check, never retried
    fn validate_creds(creds: &Credentials) -> AdapterResult<()> {
        match creds.missing_field() {
            Some(field) => Err(AdapterError::Configuration(format!(
                "The config '{}' is required to connect to the lakehouse",
                field
            ))),
            None => Ok(()),
        }
    }

    fn retryable_message(err: &DriverError) -> Option<&str> {
        let message = err.message()?;
        let lowered = message.to_lowercase();
        RETRYABLE_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
            .then_some(message)
    }

    /// Run `sql` on an open connection and optionally fetch its rows
    pub async fn execute(
        &self,
        connection: &mut Connection,
        sql: &str,
        bindings: Option<&[Binding]>,
        fetch: bool,
    ) -> AdapterResult<QueryResult> {
        debug!("On {}: {}", connection.display_name(), sql);
        let start = Instant::now();

        let result = self
            .exception_handler(sql, async {
                let handle = connection.handle_mut()?;
                handle.cursor().await?;
                handle.execute(sql, bindings).await?;

                let columns = handle.description()?.unwrap_or_default();
                let rows = if fetch { handle.fetch_all().await? } else { Vec::new() };
                Ok::<_, AdapterError>((columns, rows))
            })
            .await;

        let (columns, rows) = result.map_err(|e| {
            self.reporter.report("execute", &e);
            e
        })?;

        let execution_time_ms = start.elapsed().as_millis() as u64;
        debug!("SQL status: OK in {} ms", execution_time_ms);

        Ok(QueryResult {
            response: Self::get_response(),
            row_count: rows.len(),
            columns,
            rows,
            execution_time_ms,
        })
    }

    /// Normalize raw driver failures into `Runtime` errors carrying the
    /// server's message. Typed adapter errors pass through untouched.
    pub async fn exception_handler<T, F>(&self, sql: &str, fut: F) -> AdapterResult<T>
    where
        F: Future<Output = AdapterResult<T>>,
    {
        match fut.await {
            Ok(value) => Ok(value),
            Err(AdapterError::Driver(err)) => {
                debug!("Error while running:\n{}", sql);
                debug!("{}", err);
                let message = match err.status().and_then(|s| s.error_message.clone()) {
                    Some(msg) => msg,
                    None => err.to_string(),
                };
                Err(AdapterError::Runtime(message))
            }
            Err(other) => {
                debug!("Error while running:\n{}", sql);
                Err(other)
            }
        }
    }

    /// Best effort, never fails
    pub async fn cancel(&self, connection: &Connection) {
        match connection.handle() {
            Ok(handle) => handle.cancel().await,
            Err(_) => debug!("Cancel requested on closed connection '{}'", connection.display_name()),
        }
    }

    /// Close and detach the session. Closing an already-closed connection is a no-op.
    pub async fn close(&self, connection: &mut Connection) -> AdapterResult<()> {
        if let Some(mut handle) = connection.detach() {
            handle.close().await?;
            info!("Closed connection '{}'", connection.display_name());
        }
        Ok(())
    }

    pub fn get_response() -> AdapterResponse {
        AdapterResponse::ok()
    }

    // The engine has no transactions
    pub fn begin(&self, _connection: &Connection) {}

    pub fn commit(&self, _connection: &Connection) {}

    pub fn rollback(&self, _connection: &Connection) {}
}
