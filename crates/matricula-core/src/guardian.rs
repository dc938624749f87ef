//! Guardian ("apoderado") profile: the adult responsible for a student.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Field;

/// Primary key of a `guardians` row. Distinct from the guardian's
/// [`PersonKey`](crate::person::PersonKey); one guardian may be linked to
/// several students.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GuardianKey(pub i64);

impl fmt::Display for GuardianKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuardianProfile {
  /// Relationship to the student (a `relationships` code).
  pub relationship_id:  Field<i64>,
  pub employer_name:    Field<String>,
  pub job_title:        Field<String>,
  pub employer_address: Field<String>,
  pub employer_phone:   Field<String>,
}
