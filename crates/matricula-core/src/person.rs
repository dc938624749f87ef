//! Person: the identity row shared by students, guardians and (by value)
//! family members.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{Field, ValidationError, rut::NationalId};

/// Primary key of a `persons` row. A student is keyed by its person.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PersonKey(pub i64);

impl fmt::Display for PersonKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

/// The role a person appears in within one request.
///
/// Used to label validation errors and log lines; identity itself is global
/// across roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
  Student,
  Guardian,
  /// 1-based position in the submitted family list.
  FamilyMember(usize),
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Student => f.write_str("student"),
      Self::Guardian => f.write_str("guardian"),
      Self::FamilyMember(n) => write!(f, "family member {n}"),
    }
  }
}

/// Identity and contact attributes of a person, as submitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonFields {
  pub national_id:    Field<NationalId>,
  pub given_names:    Field<String>,
  pub first_surname:  Field<String>,
  /// Stored as an empty string, never `NULL`, when absent.
  pub second_surname: Field<String>,
  pub sex:            Field<String>,
  pub birth_date:     Field<NaiveDate>,
  pub street:         Field<String>,
  pub house_number:   Field<String>,
  pub neighborhood:   Field<String>,
  pub unit:           Field<String>,
  pub phone:          Field<String>,
  pub email:          Field<String>,
  pub comuna_id:      Field<i64>,
  pub nationality_id: Field<i64>,
}

impl PersonFields {
  /// Require the attributes every new person row needs.
  pub fn validate_new(&self, role: Role) -> Result<(), ValidationError> {
    require(role, "rut", &self.national_id)?;
    require(role, "nombres", &self.given_names)?;
    require(role, "apellidoPaterno", &self.first_surname)
  }

  /// Updates may omit anything but may not blank out the identity columns.
  pub fn validate_patch(&self, role: Role) -> Result<(), ValidationError> {
    forbid_clear(role, "rut", &self.national_id)?;
    forbid_clear(role, "nombres", &self.given_names)?;
    forbid_clear(role, "apellidoPaterno", &self.first_surname)
  }
}

/// Upper-case a name for storage; names are displayed and sorted upper-case.
pub fn upper(name: &str) -> String { name.trim().to_uppercase() }

/// Display name in roster order: surnames first.
pub fn full_name(given: &str, first_surname: &str, second_surname: &str) -> String {
  [first_surname, second_surname, given]
    .iter()
    .filter(|part| !part.is_empty())
    .copied()
    .collect::<Vec<_>>()
    .join(" ")
}

pub(crate) fn require<T>(
  role: Role,
  field: &'static str,
  value: &Field<T>,
) -> Result<(), ValidationError> {
  match value {
    Field::Value(_) => Ok(()),
    Field::Missing | Field::Null => Err(ValidationError::MissingField { role, field }),
  }
}

pub(crate) fn forbid_clear<T>(
  role: Role,
  field: &'static str,
  value: &Field<T>,
) -> Result<(), ValidationError> {
  match value {
    Field::Null => Err(ValidationError::ClearedField { role, field }),
    Field::Missing | Field::Value(_) => Ok(()),
  }
}
