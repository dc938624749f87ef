//! Guardian links.
//!
//! A student has at most one guardian at a time; a guardian may be linked
//! to any number of students. Re-linking overwrites the previous link.

use matricula_core::{guardian::GuardianKey, person::PersonKey, store::Transaction};

use crate::{WriteError, sql};

pub async fn link_guardian_to_student<T: Transaction>(
  tx: &mut T,
  student: PersonKey,
  guardian: GuardianKey,
) -> Result<(), WriteError> {
  let execution = sql::execute(
    tx,
    "UPDATE students SET guardian_id = ? WHERE person_id = ?",
    vec![guardian.0.into(), student.0.into()],
  )
  .await?;
  if execution.rows_affected == 0 {
    return Err(WriteError::NotFound { entity: "student", key: student.0 });
  }
  Ok(())
}
