//! Family members: additional contacts of a student.
//!
//! Unlike students and guardians, family members carry their identity
//! columns by value instead of referencing a person row. A student has at
//! most one family member per relationship code.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  Field, ValidationError,
  person::{Role, require},
  rut::NationalId,
};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FamilyMemberKey(pub i64);

impl fmt::Display for FamilyMemberKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FamilyMemberFields {
  /// Relationship to the student; together with the student this is the
  /// upsert key.
  pub relationship_id:    Field<i64>,
  pub national_id:        Field<NationalId>,
  pub given_names:        Field<String>,
  pub first_surname:      Field<String>,
  pub second_surname:     Field<String>,
  pub birth_date:         Field<NaiveDate>,
  pub sex:                Field<String>,
  pub phone:              Field<String>,
  pub employer_name:      Field<String>,
  pub job_title:          Field<String>,
  pub employer_address:   Field<String>,
  pub employer_phone:     Field<String>,
  /// Acts as guardian when the primary guardian is unavailable.
  pub alternate_guardian: Field<bool>,
}

impl FamilyMemberFields {
  pub fn validate(&self, role: Role) -> Result<(), ValidationError> {
    require(role, "parentesco", &self.relationship_id)?;
    require(role, "nombres", &self.given_names)?;
    require(role, "apellidoPaterno", &self.first_surname)
  }
}
