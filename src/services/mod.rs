pub mod adapter;
pub mod connection_manager;
pub mod describe;
pub mod dialect;
pub mod endpoint;
pub mod hive; // Hive-protocol statement execution
pub mod relation_cache;
pub mod schema_service;
pub mod spark_job; // Python models as Spark job runs

pub use adapter::*;
pub use connection_manager::*;
pub use endpoint::*;
pub use relation_cache::*;
pub use schema_service::*;
pub use spark_job::*;
