//! SQLite backend for the Matricula enrollment store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Implements the
//! [`Datastore`](matricula_core::store::Datastore) traits with explicit
//! `BEGIN IMMEDIATE` / `COMMIT` / `ROLLBACK` statements.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use schema::SCHEMA_VERSION;
pub use store::{SqliteStore, SqliteTransaction};
