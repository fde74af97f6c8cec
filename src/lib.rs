pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod telemetry;

pub use error::{AdapterError, AdapterResult};
pub use models::*;
pub use services::*;
