//! Enrollment requests: the input to the two coordinator operations.
//!
//! Both requests are validated as a whole before any write happens; a
//! request that fails [`NewEnrollment::validate`] or
//! [`EnrollmentUpdate::validate`] never opens a transaction.

use std::collections::HashSet;

use crate::{
  Field, ValidationError,
  family::FamilyMemberFields,
  guardian::GuardianProfile,
  person::{PersonFields, Role},
  student::StudentProfile,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentSection {
  pub person:  PersonFields,
  pub profile: StudentProfile,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuardianSection {
  pub person:  PersonFields,
  pub profile: GuardianProfile,
}

/// Create Full Enrollment: a new student, optionally a guardian (found or
/// created by national ID) and any number of family members.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewEnrollment {
  pub student:  StudentSection,
  pub guardian: Option<GuardianSection>,
  pub family:   Vec<FamilyMemberFields>,
}

impl NewEnrollment {
  pub fn validate(&self) -> Result<(), ValidationError> {
    self.student.person.validate_new(Role::Student)?;
    let profile = &self.student.profile;
    if profile.course_id.as_value().is_some() && profile.year_id.as_value().is_none() {
      return Err(ValidationError::CourseWithoutYear);
    }
    if let Some(guardian) = &self.guardian {
      guardian.person.validate_new(Role::Guardian)?;
    }
    validate_family(&self.family)
  }
}

/// Update Existing Enrollment: revise a student and optionally attach or
/// revise the guardian and family members.
///
/// The student section is a patch: [`Field::Missing`] attributes are left
/// untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrollmentUpdate {
  pub student:  StudentSection,
  pub guardian: Option<GuardianSection>,
  pub family:   Vec<FamilyMemberFields>,
}

impl EnrollmentUpdate {
  pub fn validate(&self) -> Result<(), ValidationError> {
    self.student.person.validate_patch(Role::Student)?;
    let profile = &self.student.profile;
    if profile.course_id.as_value().is_some() && profile.year_id.is_null() {
      return Err(ValidationError::CourseWithoutYear);
    }
    // The guardian is resolved by national ID and may have to be created,
    // so it needs the same attributes as on enrollment.
    if let Some(guardian) = &self.guardian {
      guardian.person.validate_new(Role::Guardian)?;
    }
    validate_family(&self.family)
  }
}

fn validate_family(family: &[FamilyMemberFields]) -> Result<(), ValidationError> {
  let mut seen = HashSet::new();
  for (i, member) in family.iter().enumerate() {
    member.validate(Role::FamilyMember(i + 1))?;
    if let Field::Value(code) = member.relationship_id
      && !seen.insert(code)
    {
      return Err(ValidationError::DuplicateRelationship(code));
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::rut::NationalId;

  fn person(rut: &str) -> PersonFields {
    PersonFields {
      national_id: Field::Value(rut.parse::<NationalId>().unwrap()),
      given_names: Field::Value("ANA".into()),
      first_surname: Field::Value("PEREZ".into()),
      ..Default::default()
    }
  }

  fn relative(code: i64) -> FamilyMemberFields {
    FamilyMemberFields {
      relationship_id: Field::Value(code),
      given_names: Field::Value("ROSA".into()),
      first_surname: Field::Value("SOTO".into()),
      ..Default::default()
    }
  }

  #[test]
  fn minimal_enrollment_is_valid() {
    let request = NewEnrollment {
      student: StudentSection { person: person("12345678-5"), ..Default::default() },
      ..Default::default()
    };
    assert!(request.validate().is_ok());
  }

  #[test]
  fn course_without_year_is_rejected() {
    let mut request = NewEnrollment {
      student: StudentSection { person: person("12345678-5"), ..Default::default() },
      ..Default::default()
    };
    request.student.profile.course_id = Field::Value(3);
    assert_eq!(request.validate(), Err(ValidationError::CourseWithoutYear));
    request.student.profile.year_id = Field::Value(2025);
    assert!(request.validate().is_ok());
  }

  #[test]
  fn guardian_needs_a_rut() {
    let mut guardian = person("11111111-1");
    guardian.national_id = Field::Missing;
    let request = NewEnrollment {
      student: StudentSection { person: person("12345678-5"), ..Default::default() },
      guardian: Some(GuardianSection { person: guardian, ..Default::default() }),
      ..Default::default()
    };
    assert_eq!(
      request.validate(),
      Err(ValidationError::MissingField { role: Role::Guardian, field: "rut" })
    );
  }

  #[test]
  fn duplicate_relationships_are_rejected() {
    let request = EnrollmentUpdate {
      family: vec![relative(1), relative(2), relative(1)],
      ..Default::default()
    };
    assert_eq!(request.validate(), Err(ValidationError::DuplicateRelationship(1)));
  }

  #[test]
  fn family_member_position_is_one_based() {
    let mut second = relative(2);
    second.given_names = Field::Null;
    let request = EnrollmentUpdate { family: vec![relative(1), second], ..Default::default() };
    assert_eq!(
      request.validate(),
      Err(ValidationError::MissingField { role: Role::FamilyMember(2), field: "nombres" })
    );
  }

  #[test]
  fn update_may_reuse_the_stored_year() {
    let mut request = EnrollmentUpdate::default();
    request.student.profile.course_id = Field::Value(3);
    assert!(request.validate().is_ok());
    request.student.profile.year_id = Field::Null;
    assert_eq!(request.validate(), Err(ValidationError::CourseWithoutYear));
  }
}
