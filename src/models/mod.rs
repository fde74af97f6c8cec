pub mod column;
pub mod connection;
pub mod credentials;
pub mod operation;
pub mod query;
pub mod relation;

pub use column::*;
pub use connection::*;
pub use credentials::*;
pub use operation::*;
pub use query::*;
pub use relation::*;
