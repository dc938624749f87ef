//! Entity writers: create or update one entity's rows.
//!
//! Writers are not transactional; the orchestrator owns the transaction and
//! decides when to roll back. Each upsert inserts when no row exists for its
//! key and otherwise updates only the attributes the caller provided.
//!
//! Storage conventions applied here:
//!
//! - names, employer names and job titles are stored upper-case;
//! - an absent second surname is stored as `''`, never `NULL`;
//! - other absent optional attributes are stored as `NULL`;
//! - flags are stored as `0`/`1`, defaulting to `0`.

use matricula_core::{
  family::{FamilyMemberFields, FamilyMemberKey},
  flag,
  guardian::{GuardianKey, GuardianProfile},
  person::{PersonFields, PersonKey, upper},
  store::Transaction,
  student::StudentProfile,
};

use crate::{
  WriteError,
  sql::{self, Columns, Mode},
};

// ─── Persons ─────────────────────────────────────────────────────────────────

fn person_columns(fields: &PersonFields, mode: Mode) -> Columns {
  let mut c = Columns::new(mode);
  c.field("rut", &fields.national_id, |id| id.to_string());
  c.field("given_names", &fields.given_names, |s| upper(s));
  c.field("first_surname", &fields.first_surname, |s| upper(s));
  c.field_or("second_surname", &fields.second_surname, |s| upper(s), "");
  c.field("sex", &fields.sex, |s| s.clone());
  c.field("birth_date", &fields.birth_date, |d| *d);
  c.field("street", &fields.street, |s| s.clone());
  c.field("house_number", &fields.house_number, |s| s.clone());
  c.field("neighborhood", &fields.neighborhood, |s| s.clone());
  c.field("unit", &fields.unit, |s| s.clone());
  c.field("phone", &fields.phone, |s| s.clone());
  c.field("email", &fields.email, |s| s.clone());
  c.field("comuna_id", &fields.comuna_id, |id| *id);
  c.field("nationality_id", &fields.nationality_id, |id| *id);
  c
}

/// Insert a person when `key` is `None`, otherwise patch person `key`.
pub async fn upsert_person<T: Transaction>(
  tx: &mut T,
  key: Option<PersonKey>,
  fields: &PersonFields,
) -> Result<PersonKey, WriteError> {
  let Some(key) = key else {
    let (stmt, params) = person_columns(fields, Mode::Insert).insert("persons");
    let execution = sql::execute(tx, &stmt, params).await?;
    return sql::inserted(execution, "persons").map(PersonKey);
  };

  let columns = person_columns(fields, Mode::Update);
  if columns.is_empty() {
    sql::ensure_exists(tx, "person", "SELECT id FROM persons WHERE id = ?", key.0).await?;
    return Ok(key);
  }
  let (stmt, params) = columns.update("persons", "id", key.0);
  let execution = sql::execute(tx, &stmt, params).await?;
  if execution.rows_affected == 0 {
    return Err(WriteError::NotFound { entity: "person", key: key.0 });
  }
  Ok(key)
}

// ─── Students ────────────────────────────────────────────────────────────────

fn student_columns(profile: &StudentProfile, mode: Mode) -> Columns {
  let flags = &profile.flags;
  let mut c = Columns::new(mode);
  c.field("year_id", &profile.year_id, |id| *id);
  c.field("plan_id", &profile.plan_id, |id| *id);
  c.field("prior_average", &profile.prior_average, |avg| *avg);
  c.field("prior_school_id", &profile.prior_school, |school| school.id());
  for (name, value) in [
    ("indigenous_origin", &flags.indigenous_origin),
    ("special_education", &flags.special_education),
    ("physical_education", &flags.physical_education),
    ("allergic", &flags.allergic),
    ("birth_certificate", &flags.birth_certificate),
    ("personality_report", &flags.personality_report),
    ("grades_report", &flags.grades_report),
    ("annual_study_cert", &flags.annual_study_cert),
    ("signed_enrollment_form", &flags.signed_enrollment_form),
  ] {
    c.field_or(name, value, |b| flag::stored(*b), flag::stored(false));
  }
  c.field("allergy_detail", &profile.allergy_detail, |s| s.clone());
  c.field("current_illness", &profile.current_illness, |s| s.clone());
  c.field("medication", &profile.medication, |s| s.clone());
  c.field("observations", &profile.observations, |s| s.clone());
  c.field("authorized_pickup", &profile.authorized_pickup, |s| s.clone());
  c
}

/// Whether `student` has a profile row.
pub async fn student_exists<T: Transaction>(
  tx: &mut T,
  student: PersonKey,
) -> Result<bool, WriteError> {
  let rows = sql::query(
    tx,
    "SELECT person_id FROM students WHERE person_id = ?",
    vec![student.0.into()],
  )
  .await?;
  Ok(!rows.is_empty())
}

/// Create or patch the student profile attached to `person`.
pub async fn upsert_student_profile<T: Transaction>(
  tx: &mut T,
  person: PersonKey,
  profile: &StudentProfile,
) -> Result<(), WriteError> {
  if student_exists(tx, person).await? {
    let columns = student_columns(profile, Mode::Update);
    if !columns.is_empty() {
      let (stmt, params) = columns.update("students", "person_id", person.0);
      sql::execute(tx, &stmt, params).await?;
    }
  } else {
    let mut columns = student_columns(profile, Mode::Insert);
    columns.set("person_id", person.0);
    let (stmt, params) = columns.insert("students");
    sql::execute(tx, &stmt, params).await?;
  }
  Ok(())
}

/// Record the course of `student` for an academic year; at most one
/// assignment per (student, year).
///
/// The year is the one in `profile`, or the student's stored year when the
/// profile omits it. Does nothing unless `profile` mentions a course.
pub async fn assign_course<T: Transaction>(
  tx: &mut T,
  student: PersonKey,
  profile: &StudentProfile,
) -> Result<(), WriteError> {
  if profile.course_id.is_missing() {
    return Ok(());
  }
  let course = profile.course_id.as_value().copied();

  let year = match profile.year_id.as_value() {
    Some(year) => Some(*year),
    None => {
      let rows = sql::query(
        tx,
        "SELECT year_id FROM students WHERE person_id = ?",
        vec![student.0.into()],
      )
      .await?;
      match rows.first() {
        Some(row) => row.get::<Option<i64>>("year_id")?,
        None => return Err(WriteError::NotFound { entity: "student", key: student.0 }),
      }
    }
  };
  let year = year.ok_or(WriteError::Incomplete("course assignment needs an academic year"))?;

  let rows = sql::query(
    tx,
    "SELECT id FROM student_years WHERE student_id = ? AND year_id = ?",
    vec![student.0.into(), year.into()],
  )
  .await?;
  match sql::first_key(&rows, "id")? {
    Some(id) => {
      sql::execute(
        tx,
        "UPDATE student_years SET course_id = ? WHERE id = ?",
        vec![course.into(), id.into()],
      )
      .await?;
    }
    None => {
      sql::execute(
        tx,
        "INSERT INTO student_years (student_id, year_id, course_id) VALUES (?, ?, ?)",
        vec![student.0.into(), year.into(), course.into()],
      )
      .await?;
    }
  }
  Ok(())
}

// ─── Guardians ───────────────────────────────────────────────────────────────

fn guardian_columns(profile: &GuardianProfile, mode: Mode) -> Columns {
  let mut c = Columns::new(mode);
  c.field("relationship_id", &profile.relationship_id, |id| *id);
  c.field("employer_name", &profile.employer_name, |s| upper(s));
  c.field("job_title", &profile.job_title, |s| upper(s));
  c.field("employer_address", &profile.employer_address, |s| s.clone());
  c.field("employer_phone", &profile.employer_phone, |s| s.clone());
  c
}

/// Create or patch the guardian profile attached to `person` and return its
/// key.
pub async fn upsert_guardian_profile<T: Transaction>(
  tx: &mut T,
  person: PersonKey,
  profile: &GuardianProfile,
) -> Result<GuardianKey, WriteError> {
  let rows = sql::query(
    tx,
    "SELECT id FROM guardians WHERE person_id = ?",
    vec![person.0.into()],
  )
  .await?;

  if let Some(id) = sql::first_key(&rows, "id")? {
    let columns = guardian_columns(profile, Mode::Update);
    if !columns.is_empty() {
      let (stmt, params) = columns.update("guardians", "id", id);
      sql::execute(tx, &stmt, params).await?;
    }
    return Ok(GuardianKey(id));
  }

  let mut columns = guardian_columns(profile, Mode::Insert);
  columns.set("person_id", person.0);
  let (stmt, params) = columns.insert("guardians");
  let execution = sql::execute(tx, &stmt, params).await?;
  sql::inserted(execution, "guardians").map(GuardianKey)
}

// ─── Family members ──────────────────────────────────────────────────────────

fn family_columns(fields: &FamilyMemberFields, mode: Mode) -> Columns {
  let mut c = Columns::new(mode);
  c.field("rut", &fields.national_id, |id| id.to_string());
  c.field("given_names", &fields.given_names, |s| upper(s));
  c.field("first_surname", &fields.first_surname, |s| upper(s));
  c.field_or("second_surname", &fields.second_surname, |s| upper(s), "");
  c.field("birth_date", &fields.birth_date, |d| *d);
  c.field("sex", &fields.sex, |s| s.clone());
  c.field("phone", &fields.phone, |s| s.clone());
  c.field("employer_name", &fields.employer_name, |s| upper(s));
  c.field("job_title", &fields.job_title, |s| upper(s));
  c.field("employer_address", &fields.employer_address, |s| s.clone());
  c.field("employer_phone", &fields.employer_phone, |s| s.clone());
  c.field_or(
    "alternate_guardian",
    &fields.alternate_guardian,
    |b| flag::stored(*b),
    flag::stored(false),
  );
  c
}

/// Create or update the family member of `student` with the relationship
/// code in `fields`. A second submission for the same relationship updates
/// the existing row.
pub async fn upsert_family_member<T: Transaction>(
  tx: &mut T,
  student: PersonKey,
  fields: &FamilyMemberFields,
) -> Result<FamilyMemberKey, WriteError> {
  let relationship = *fields
    .relationship_id
    .as_value()
    .ok_or(WriteError::Incomplete("family member needs a relationship code"))?;

  let rows = sql::query(
    tx,
    "SELECT id FROM family_members WHERE student_id = ? AND relationship_id = ?",
    vec![student.0.into(), relationship.into()],
  )
  .await?;

  if let Some(id) = sql::first_key(&rows, "id")? {
    let columns = family_columns(fields, Mode::Update);
    if !columns.is_empty() {
      let (stmt, params) = columns.update("family_members", "id", id);
      sql::execute(tx, &stmt, params).await?;
    }
    return Ok(FamilyMemberKey(id));
  }

  let mut columns = family_columns(fields, Mode::Insert);
  columns.set("student_id", student.0);
  columns.set("relationship_id", relationship);
  let (stmt, params) = columns.insert("family_members");
  let execution = sql::execute(tx, &stmt, params).await?;
  sql::inserted(execution, "family_members").map(FamilyMemberKey)
}

pub async fn delete_family_member<T: Transaction>(
  tx: &mut T,
  key: FamilyMemberKey,
) -> Result<(), WriteError> {
  let execution =
    sql::execute(tx, "DELETE FROM family_members WHERE id = ?", vec![key.0.into()]).await?;
  if execution.rows_affected == 0 {
    return Err(WriteError::NotFound { entity: "family member", key: key.0 });
  }
  Ok(())
}
