//! The enrollment record coordinator.
//!
//! Sequences the dependent writes of an enrollment (student, guardian,
//! family members) through any [`Datastore`](matricula_core::store::Datastore)
//! inside one transaction, and provides the read-side record queries.
//!
//! Layers, leaves first:
//!
//! - [`resolver`]: find an existing person by national ID.
//! - [`writer`]: create or update one entity's rows.
//! - [`link`]: wire a guardian to a student.
//! - [`orchestrator`]: the transactional [`Coordinator`].
//! - [`mapping`]: flat request field maps into role-scoped input.

pub mod error;
pub mod link;
pub mod mapping;
pub mod orchestrator;
pub mod outcome;
pub mod records;
pub mod resolver;
pub mod writer;

mod sql;

pub use error::{Error, Result, Step, StoreError, TxStage, WriteError};
pub use orchestrator::{Coordinator, EnrollmentReceipt};
pub use outcome::EnrollmentOutcome;

#[cfg(test)]
mod tests;
