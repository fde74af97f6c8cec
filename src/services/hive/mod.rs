// Statement execution over the Hive-compatible protocol
pub mod driver;
pub mod poller;
pub mod wrapper;

#[cfg(test)]
pub(crate) mod testing;

pub use driver::{HandshakeParams, HiveConnector, HiveCursor, HiveHandle};
pub use poller::{StatementPoller, DEFAULT_POLL_INTERVAL};
pub use wrapper::{ConnectionWrapper, StatementCanceller};
