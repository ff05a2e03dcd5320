//! Persistence layer — libSQL-backed storage for domain records and
//! export status records.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::Database;
