//! The success/failure body returned to callers of enrollment operations.

use matricula_core::{family::FamilyMemberKey, guardian::GuardianKey, person::PersonKey};
use serde::Serialize;

use crate::{EnrollmentReceipt, Error};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentOutcome {
  pub success:           bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub message:           Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub student_id:        Option<PersonKey>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub guardian_id:       Option<GuardianKey>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub family_member_ids: Vec<FamilyMemberKey>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error:             Option<String>,
}

impl EnrollmentOutcome {
  pub fn succeeded(message: impl Into<String>, receipt: &EnrollmentReceipt) -> Self {
    Self {
      success:           true,
      message:           Some(message.into()),
      student_id:        Some(receipt.student),
      guardian_id:       receipt.guardian,
      family_member_ids: receipt.family_members.clone(),
      error:             None,
    }
  }

  /// A success without entity keys, e.g. after a deletion.
  pub fn done(message: impl Into<String>) -> Self {
    Self {
      success:           true,
      message:           Some(message.into()),
      student_id:        None,
      guardian_id:       None,
      family_member_ids: Vec::new(),
      error:             None,
    }
  }

  pub fn failed(error: &Error) -> Self { Self::rejected(error.to_string()) }

  /// A failure described by `error` alone.
  pub fn rejected(error: impl Into<String>) -> Self {
    Self {
      success:           false,
      message:           None,
      student_id:        None,
      guardian_id:       None,
      family_member_ids: Vec::new(),
      error:             Some(error.into()),
    }
  }
}
