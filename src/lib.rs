//! # Buoy
//!
//! Active-record table layer for PostgreSQL on the `may` runtime.
//!
//! A struct deriving [`BuoyRecord`] and embedding a [`TableRecord`] becomes a
//! persistable entity: [`save`], [`load_by_id`], [`delete`], [`all`] and
//! [`exec_query`] work against any such type without per-entity SQL.
//!
//! See [README on GitHub](https://github.com/microscaler/buoy) for full
//! architecture.

pub mod config;
pub mod connection;
pub mod executor;
pub mod fields;
#[cfg(any(feature = "metrics", feature = "tracing"))]
pub mod metrics;
pub mod query;
pub mod record;

#[cfg(test)]
mod tests_cfg;

pub use buoy_derive::BuoyRecord;
pub use config::DatabaseConfig;
pub use connection::{connect, ConnectionError};
pub use executor::{BuoyError, BuoyExecutor, MayPostgresExecutor, SharedExecutor};
pub use fields::{FieldError, FieldMap};
pub use query::QueryBuilder;
pub use record::{
    all, delete, exec_query, load_by_id, load_from_row, save, RecordError, TableRecord,
    TableRecordTrait,
};
