//! Error types for `matricula-coordinator`.

use std::{fmt, time::Duration};

use matricula_core::ValidationError;
use thiserror::Error;

/// A datastore error with its concrete type erased.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// The orchestrator step an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
  GuardianPerson,
  Student,
  GuardianProfile,
  Link,
  /// 1-based position in the submitted family list.
  FamilyMember(usize),
  StudentUpdate,
  GuardianUpdate,
  FamilyUpdate,
  RemoveFamilyMember,
}

impl fmt::Display for Step {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::GuardianPerson => f.write_str("guardian person creation"),
      Self::Student => f.write_str("student creation"),
      Self::GuardianProfile => f.write_str("guardian profile creation"),
      Self::Link => f.write_str("link"),
      Self::FamilyMember(n) => write!(f, "family member {n}"),
      Self::StudentUpdate => f.write_str("student update"),
      Self::GuardianUpdate => f.write_str("guardian update"),
      Self::FamilyUpdate => f.write_str("family update"),
      Self::RemoveFamilyMember => f.write_str("family member removal"),
    }
  }
}

/// Transaction control statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStage {
  Begin,
  Commit,
}

impl fmt::Display for TxStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Begin => f.write_str("begin"),
      Self::Commit => f.write_str("commit"),
    }
  }
}

/// Failure of a single resolver, writer or link call.
#[derive(Debug, Error)]
pub enum WriteError {
  #[error("{entity} {key} not found")]
  NotFound { entity: &'static str, key: i64 },

  #[error("datastore error: {0}")]
  Store(#[source] StoreError),

  #[error("datastore call exceeded {0:?}")]
  Timeout(Duration),

  #[error("incomplete data: {0}")]
  Incomplete(&'static str),

  #[error("unreadable row: {0}")]
  Decode(#[from] matricula_core::Error),
}

impl WriteError {
  pub fn store(error: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(error))
  }
}

#[derive(Debug, Error)]
pub enum Error {
  /// Rejected before a transaction was opened.
  #[error(transparent)]
  Validation(#[from] ValidationError),

  /// A step failed and every write of the operation was rolled back.
  #[error("{step} failed: {source}")]
  Step { step: Step, source: WriteError },

  /// A step failed and so did the rollback; the store state is unknown.
  #[error("{step} failed: {source}; rollback also failed: {rollback}")]
  RollbackFailed {
    step:     Step,
    source:   WriteError,
    rollback: StoreError,
  },

  #[error("transaction {stage} failed: {source}")]
  Transaction { stage: TxStage, source: StoreError },

  /// A read-side query failed.
  #[error("query failed: {0}")]
  Query(#[source] WriteError),
}

impl Error {
  pub fn is_validation(&self) -> bool { matches!(self, Self::Validation(_)) }

  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::Step { source: WriteError::NotFound { .. }, .. }
        | Self::RollbackFailed { source: WriteError::NotFound { .. }, .. }
        | Self::Query(WriteError::NotFound { .. })
    )
  }

  /// The failed step, if the error came from one.
  pub fn step(&self) -> Option<Step> {
    match self {
      Self::Step { step, .. } | Self::RollbackFailed { step, .. } => Some(*step),
      Self::Validation(_) | Self::Transaction { .. } | Self::Query(_) => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn step_messages_name_the_step() {
    let err = Error::Step {
      step:   Step::FamilyMember(2),
      source: WriteError::Incomplete("relationship"),
    };
    assert!(err.to_string().starts_with("family member 2 failed"));
    assert_eq!(err.step(), Some(Step::FamilyMember(2)));
  }

  #[test]
  fn not_found_is_detected_through_rollback_failure() {
    let err = Error::RollbackFailed {
      step:     Step::StudentUpdate,
      source:   WriteError::NotFound { entity: "student", key: 9 },
      rollback: "disk gone".into(),
    };
    assert!(err.is_not_found());
    assert!(err.to_string().contains("rollback also failed: disk gone"));
  }
}
