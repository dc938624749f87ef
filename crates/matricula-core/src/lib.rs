//! Core types and trait definitions for the Matrícula enrollment records
//! service.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! The store, coordinator and API crates all depend on it.

pub mod enrollment;
pub mod error;
pub mod family;
pub mod field;
pub mod flag;
pub mod guardian;
pub mod person;
pub mod rut;
pub mod store;
pub mod student;

pub use error::{Error, Result, ValidationError};
pub use field::Field;
