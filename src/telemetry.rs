// Error reporting handle injected into the components that need it.
//
// Nothing here is initialised at load time; the process owner builds a
// reporter once and passes it down.

use std::sync::Arc;

use crate::error::AdapterError;

pub trait ErrorReporter: Send + Sync {
    /// Record a failure that is about to be surfaced to the caller
    fn report(&self, context: &str, error: &AdapterError);
}

/// Emits reports as structured `tracing` events
#[derive(Debug, Default, Clone)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, context: &str, error: &AdapterError) {
        tracing::error!(code = error.code(), context, "{}", error.message());
    }
}

#[derive(Debug, Default, Clone)]
pub struct NoopReporter;

impl ErrorReporter for NoopReporter {
    fn report(&self, _context: &str, _error: &AdapterError) {}
}

pub fn default_reporter() -> Arc<dyn ErrorReporter> {
    Arc::new(TracingReporter)
}
