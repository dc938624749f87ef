//! Student profile: the role-specific row attached 1:1 to a person.

use serde::{Deserialize, Serialize};

use crate::Field;

/// The school a student attended before enrolling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i64", from = "i64")]
pub enum PriorSchool {
  School(i64),
  /// Explicitly recorded as unknown; stored as [`PriorSchool::NO_INFORMATION`].
  NoInformation,
}

impl PriorSchool {
  /// Reserved `prior_schools` key meaning "SIN INFORMACIÓN".
  pub const NO_INFORMATION: i64 = -1;

  pub fn id(self) -> i64 {
    match self {
      Self::School(id) => id,
      Self::NoInformation => Self::NO_INFORMATION,
    }
  }
}

impl From<i64> for PriorSchool {
  fn from(id: i64) -> Self {
    if id == Self::NO_INFORMATION { Self::NoInformation } else { Self::School(id) }
  }
}

impl From<PriorSchool> for i64 {
  fn from(school: PriorSchool) -> Self { school.id() }
}

/// Yes/no attributes of a student. Stored as `0`/`1`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentFlags {
  pub indigenous_origin:      Field<bool>,
  /// Participates in the special-education programme (PIE).
  pub special_education:      Field<bool>,
  pub physical_education:     Field<bool>,
  pub allergic:               Field<bool>,
  pub birth_certificate:      Field<bool>,
  pub personality_report:     Field<bool>,
  pub grades_report:          Field<bool>,
  pub annual_study_cert:      Field<bool>,
  pub signed_enrollment_form: Field<bool>,
}

/// Student profile attributes, as submitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentProfile {
  /// Cohort / academic year reference.
  pub year_id:           Field<i64>,
  pub plan_id:           Field<i64>,
  pub prior_average:     Field<f64>,
  pub prior_school:      Field<PriorSchool>,
  pub flags:             StudentFlags,
  pub allergy_detail:    Field<String>,
  pub current_illness:   Field<String>,
  pub medication:        Field<String>,
  pub observations:      Field<String>,
  /// Person authorised to collect the student from school.
  pub authorized_pickup: Field<String>,
  /// Course for the student-year assignment of `year_id`.
  pub course_id:         Field<i64>,
}
