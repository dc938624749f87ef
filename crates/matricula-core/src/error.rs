//! Error types for `matricula-core`.

use thiserror::Error;

use crate::person::Role;

/// Errors raised while reading typed values back out of a datastore row.
#[derive(Debug, Error)]
pub enum Error {
  #[error("column not found: {0}")]
  MissingColumn(String),

  #[error("column {column} holds {found}, expected {expected}")]
  ColumnType {
    column:   String,
    expected: &'static str,
    found:    &'static str,
  },

  #[error("column {column} holds an unparseable date: {value:?}")]
  ColumnDate { column: String, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A request rejected before any write was attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("{role}: missing required field `{field}`")]
  MissingField { role: Role, field: &'static str },

  #[error("{role}: field `{field}` cannot be cleared")]
  ClearedField { role: Role, field: &'static str },

  #[error("{role}: invalid RUT {value:?}")]
  InvalidRut { role: Role, value: String },

  #[error("{role}: invalid value {value:?} for `{field}`")]
  InvalidValue {
    role:  Role,
    field: &'static str,
    value: String,
  },

  /// A RUT submitted on its own, outside any role.
  #[error("invalid RUT {0:?}")]
  MalformedRut(String),

  #[error("student: a course assignment requires an academic year")]
  CourseWithoutYear,

  #[error("relationship code {0} appears more than once in the request")]
  DuplicateRelationship(i64),

  #[error("payload section `{0}` must be a JSON object")]
  MalformedSection(String),
}
