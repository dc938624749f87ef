//! Read-side record queries.
//!
//! These run as autocommit reads through [`Datastore::query`], so they never
//! observe an enrollment that has not committed. Records serialise with the
//! same Spanish camelCase names that requests use.

use chrono::NaiveDate;
use matricula_core::{
  ValidationError,
  family::FamilyMemberKey,
  guardian::GuardianKey,
  person::{PersonKey, full_name, upper},
  rut::{self, NationalId},
  store::{Datastore, Row, SqlValue},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, WriteError, resolver::FIND_BY_RUT};

async fn rows<D: Datastore>(store: &D, sql: &str, params: Vec<SqlValue>) -> Result<Vec<Row>> {
  store
    .query(sql, params)
    .await
    .map_err(|e| Error::Query(WriteError::store(e)))
}

fn decode(e: matricula_core::Error) -> Error { Error::Query(WriteError::Decode(e)) }

async fn require_student<D: Datastore>(store: &D, student: PersonKey) -> Result<()> {
  let found = rows(
    store,
    "SELECT person_id FROM students WHERE person_id = ?",
    vec![student.0.into()],
  )
  .await?;
  if found.is_empty() {
    return Err(Error::Query(WriteError::NotFound { entity: "student", key: student.0 }));
  }
  Ok(())
}

// ─── Persons ─────────────────────────────────────────────────────────────────

const PERSON_COLUMNS: &str = "p.id AS person_id, p.rut AS rut, \
   p.given_names AS given_names, p.first_surname AS first_surname, \
   p.second_surname AS second_surname, p.sex AS sex, p.birth_date AS birth_date, \
   p.street AS street, p.house_number AS house_number, \
   p.neighborhood AS neighborhood, p.unit AS unit, p.phone AS phone, \
   p.email AS email, p.comuna_id AS comuna_id, p.nationality_id AS nationality_id";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonRecord {
  #[serde(rename = "idUsuario")]
  pub id:             PersonKey,
  pub rut:            Option<String>,
  #[serde(rename = "nombres")]
  pub given_names:    String,
  #[serde(rename = "apellidoPaterno")]
  pub first_surname:  String,
  #[serde(rename = "apellidoMaterno")]
  pub second_surname: String,
  #[serde(rename = "nombreCompleto")]
  pub full_name:      String,
  #[serde(rename = "genero")]
  pub sex:            Option<String>,
  #[serde(rename = "fechaNacimiento")]
  pub birth_date:     Option<NaiveDate>,
  #[serde(rename = "direccion")]
  pub street:         Option<String>,
  #[serde(rename = "numero")]
  pub house_number:   Option<String>,
  #[serde(rename = "villa")]
  pub neighborhood:   Option<String>,
  #[serde(rename = "departamento")]
  pub unit:           Option<String>,
  #[serde(rename = "telefono")]
  pub phone:          Option<String>,
  pub email:          Option<String>,
  #[serde(rename = "idComuna")]
  pub comuna_id:      Option<i64>,
  #[serde(rename = "idNacionalidad")]
  pub nationality_id: Option<i64>,
}

impl PersonRecord {
  fn from_row(row: &Row) -> matricula_core::Result<Self> {
    let given_names: String = row.get("given_names")?;
    let first_surname: String = row.get("first_surname")?;
    let second_surname: String = row.get("second_surname")?;
    Ok(Self {
      id: PersonKey(row.get("person_id")?),
      rut: row.get("rut")?,
      full_name: full_name(&given_names, &first_surname, &second_surname),
      given_names,
      first_surname,
      second_surname,
      sex: row.get("sex")?,
      birth_date: row.get("birth_date")?,
      street: row.get("street")?,
      house_number: row.get("house_number")?,
      neighborhood: row.get("neighborhood")?,
      unit: row.get("unit")?,
      phone: row.get("phone")?,
      email: row.get("email")?,
      comuna_id: row.get("comuna_id")?,
      nationality_id: row.get("nationality_id")?,
    })
  }
}

// ─── Students ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentRecord {
  #[serde(flatten)]
  pub person:                 PersonRecord,
  #[serde(rename = "idAno")]
  pub year_id:                Option<i64>,
  #[serde(rename = "ano")]
  pub year:                   Option<String>,
  #[serde(rename = "idCurso")]
  pub course_id:              Option<i64>,
  #[serde(rename = "curso")]
  pub course:                 Option<String>,
  #[serde(rename = "idPlan")]
  pub plan_id:                Option<i64>,
  #[serde(rename = "promedioAnterior")]
  pub prior_average:          Option<f64>,
  #[serde(rename = "idEstablecimiento")]
  pub prior_school_id:        Option<i64>,
  #[serde(rename = "idApoderado")]
  pub guardian:               Option<GuardianKey>,
  #[serde(rename = "origenIndigena")]
  pub indigenous_origin:      bool,
  #[serde(rename = "programaPIE")]
  pub special_education:      bool,
  #[serde(rename = "realizaEducacionFisica")]
  pub physical_education:     bool,
  #[serde(rename = "alergicoMedicamento")]
  pub allergic:               bool,
  #[serde(rename = "certificadoNacimiento")]
  pub birth_certificate:      bool,
  #[serde(rename = "informePersonalidad")]
  pub personality_report:     bool,
  #[serde(rename = "informeNotas")]
  pub grades_report:          bool,
  #[serde(rename = "certificadoEstudios")]
  pub annual_study_cert:      bool,
  #[serde(rename = "fichaFirmada")]
  pub signed_enrollment_form: bool,
  #[serde(rename = "especificarAlergia")]
  pub allergy_detail:         Option<String>,
  #[serde(rename = "enfermedadActual")]
  pub current_illness:        Option<String>,
  #[serde(rename = "medicamentoConsumo")]
  pub medication:             Option<String>,
  #[serde(rename = "observaciones")]
  pub observations:           Option<String>,
  #[serde(rename = "personaRetiro")]
  pub authorized_pickup:      Option<String>,
}

impl StudentRecord {
  fn from_row(row: &Row) -> matricula_core::Result<Self> {
    Ok(Self {
      person:                 PersonRecord::from_row(row)?,
      year_id:                row.get("year_id")?,
      year:                   row.get("year_name")?,
      course_id:              row.get("course_id")?,
      course:                 row.get("course_name")?,
      plan_id:                row.get("plan_id")?,
      prior_average:          row.get("prior_average")?,
      prior_school_id:        row.get("prior_school_id")?,
      guardian:               row.get::<Option<i64>>("guardian_id")?.map(GuardianKey),
      indigenous_origin:      row.get("indigenous_origin")?,
      special_education:      row.get("special_education")?,
      physical_education:     row.get("physical_education")?,
      allergic:               row.get("allergic")?,
      birth_certificate:      row.get("birth_certificate")?,
      personality_report:     row.get("personality_report")?,
      grades_report:          row.get("grades_report")?,
      annual_study_cert:      row.get("annual_study_cert")?,
      signed_enrollment_form: row.get("signed_enrollment_form")?,
      allergy_detail:         row.get("allergy_detail")?,
      current_illness:        row.get("current_illness")?,
      medication:             row.get("medication")?,
      observations:           row.get("observations")?,
      authorized_pickup:      row.get("authorized_pickup")?,
    })
  }
}

/// The student, its profile and its course for the student's current year.
pub async fn student_detail<D: Datastore>(
  store: &D,
  student: PersonKey,
) -> Result<Option<StudentRecord>> {
  let sql = format!(
    "SELECT {PERSON_COLUMNS}, s.year_id, s.plan_id, s.prior_average, \
       s.prior_school_id, s.guardian_id, s.indigenous_origin, s.special_education, \
       s.physical_education, s.allergic, s.birth_certificate, s.personality_report, \
       s.grades_report, s.annual_study_cert, s.signed_enrollment_form, \
       s.allergy_detail, s.current_illness, s.medication, s.observations, \
       s.authorized_pickup, sy.course_id AS course_id, c.name AS course_name, \
       y.name AS year_name
     FROM students s
     JOIN persons p ON p.id = s.person_id
     LEFT JOIN student_years sy ON sy.student_id = s.person_id AND sy.year_id = s.year_id
     LEFT JOIN courses c ON c.id = sy.course_id
     LEFT JOIN academic_years y ON y.id = s.year_id
     WHERE s.person_id = ?"
  );
  let found = rows(store, &sql, vec![student.0.into()]).await?;
  found.first().map(StudentRecord::from_row).transpose().map_err(decode)
}

// ─── Guardians ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardianRecord {
  #[serde(flatten)]
  pub person:           PersonRecord,
  #[serde(rename = "idApoderado")]
  pub id:               GuardianKey,
  #[serde(rename = "tipoApoderado")]
  pub relationship_id:  Option<i64>,
  #[serde(rename = "empresaTrabajo")]
  pub employer_name:    Option<String>,
  #[serde(rename = "cargoEmpresa")]
  pub job_title:        Option<String>,
  #[serde(rename = "direccionTrabajo")]
  pub employer_address: Option<String>,
  #[serde(rename = "telefonoTrabajo")]
  pub employer_phone:   Option<String>,
}

/// The guardian linked to `student`, if any. Fails with not-found when the
/// student does not exist.
pub async fn guardian_of<D: Datastore>(
  store: &D,
  student: PersonKey,
) -> Result<Option<GuardianRecord>> {
  require_student(store, student).await?;
  let sql = format!(
    "SELECT {PERSON_COLUMNS}, g.id AS guardian_id, g.relationship_id, \
       g.employer_name, g.job_title, g.employer_address, g.employer_phone
     FROM students s
     JOIN guardians g ON g.id = s.guardian_id
     JOIN persons p ON p.id = g.person_id
     WHERE s.person_id = ?"
  );
  let found = rows(store, &sql, vec![student.0.into()]).await?;
  found
    .first()
    .map(|row| -> matricula_core::Result<GuardianRecord> {
      Ok(GuardianRecord {
        person:           PersonRecord::from_row(row)?,
        id:               GuardianKey(row.get("guardian_id")?),
        relationship_id:  row.get("relationship_id")?,
        employer_name:    row.get("employer_name")?,
        job_title:        row.get("job_title")?,
        employer_address: row.get("employer_address")?,
        employer_phone:   row.get("employer_phone")?,
      })
    })
    .transpose()
    .map_err(decode)
}

// ─── Family members ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilyMemberRecord {
  #[serde(rename = "idFamiliar")]
  pub id:                 FamilyMemberKey,
  #[serde(rename = "idAlumno")]
  pub student:            PersonKey,
  #[serde(rename = "parentesco")]
  pub relationship_id:    i64,
  #[serde(rename = "nombreParentesco")]
  pub relationship:       Option<String>,
  pub rut:                Option<String>,
  #[serde(rename = "nombres")]
  pub given_names:        String,
  #[serde(rename = "apellidoPaterno")]
  pub first_surname:      String,
  #[serde(rename = "apellidoMaterno")]
  pub second_surname:     String,
  #[serde(rename = "fechaNacimiento")]
  pub birth_date:         Option<NaiveDate>,
  #[serde(rename = "genero")]
  pub sex:                Option<String>,
  #[serde(rename = "telefono")]
  pub phone:              Option<String>,
  #[serde(rename = "empresa")]
  pub employer_name:      Option<String>,
  #[serde(rename = "cargo")]
  pub job_title:          Option<String>,
  #[serde(rename = "direccionTrabajo")]
  pub employer_address:   Option<String>,
  #[serde(rename = "telefonoTrabajo")]
  pub employer_phone:     Option<String>,
  #[serde(rename = "esApoderadoSuplente")]
  pub alternate_guardian: bool,
}

impl FamilyMemberRecord {
  fn from_row(row: &Row) -> matricula_core::Result<Self> {
    Ok(Self {
      id:                 FamilyMemberKey(row.get("id")?),
      student:            PersonKey(row.get("student_id")?),
      relationship_id:    row.get("relationship_id")?,
      relationship:       row.get("relationship_name")?,
      rut:                row.get("rut")?,
      given_names:        row.get("given_names")?,
      first_surname:      row.get("first_surname")?,
      second_surname:     row.get("second_surname")?,
      birth_date:         row.get("birth_date")?,
      sex:                row.get("sex")?,
      phone:              row.get("phone")?,
      employer_name:      row.get("employer_name")?,
      job_title:          row.get("job_title")?,
      employer_address:   row.get("employer_address")?,
      employer_phone:     row.get("employer_phone")?,
      alternate_guardian: row.get("alternate_guardian")?,
    })
  }
}

const FAMILY_SELECT: &str = "SELECT f.id, f.student_id, f.relationship_id, \
     r.name AS relationship_name, f.rut, f.given_names, f.first_surname, \
     f.second_surname, f.birth_date, f.sex, f.phone, f.employer_name, f.job_title, \
     f.employer_address, f.employer_phone, f.alternate_guardian
   FROM family_members f
   LEFT JOIN relationships r ON r.id = f.relationship_id";

/// Every family member of `student`, ordered by relationship code.
pub async fn family_of<D: Datastore>(
  store: &D,
  student: PersonKey,
) -> Result<Vec<FamilyMemberRecord>> {
  require_student(store, student).await?;
  let sql = format!("{FAMILY_SELECT} WHERE f.student_id = ? ORDER BY f.relationship_id");
  rows(store, &sql, vec![student.0.into()])
    .await?
    .iter()
    .map(FamilyMemberRecord::from_row)
    .collect::<matricula_core::Result<_>>()
    .map_err(decode)
}

/// The family member of `student` with `relationship`, if any.
pub async fn family_member<D: Datastore>(
  store: &D,
  student: PersonKey,
  relationship: i64,
) -> Result<Option<FamilyMemberRecord>> {
  let sql = format!("{FAMILY_SELECT} WHERE f.student_id = ? AND f.relationship_id = ?");
  let found = rows(store, &sql, vec![student.0.into(), relationship.into()]).await?;
  found.first().map(FamilyMemberRecord::from_row).transpose().map_err(decode)
}

// ─── Roster ──────────────────────────────────────────────────────────────────

/// Roster filters; every one is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RosterQuery {
  /// Academic year key.
  pub ano:    Option<i64>,
  /// Course key.
  pub curso:  Option<i64>,
  /// RUT fragment, with or without separators.
  pub rut:    Option<String>,
  /// Fragment of the given names or either surname.
  pub nombre: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterEntry {
  #[serde(rename = "idAlumno")]
  pub student:   PersonKey,
  pub rut:       Option<String>,
  #[serde(rename = "nombreCompleto")]
  pub full_name: String,
  #[serde(rename = "idAno")]
  pub year_id:   Option<i64>,
  #[serde(rename = "ano")]
  pub year:      Option<String>,
  #[serde(rename = "idCurso")]
  pub course_id: Option<i64>,
  #[serde(rename = "curso")]
  pub course:    Option<String>,
  #[serde(rename = "idApoderado")]
  pub guardian:  Option<GuardianKey>,
}

/// `%fragment%` with LIKE wildcards in `fragment` escaped by `\`.
fn contains_pattern(fragment: &str) -> String {
  let mut pattern = String::from("%");
  for c in fragment.chars() {
    if matches!(c, '%' | '_' | '\\') {
      pattern.push('\\');
    }
    pattern.push(c);
  }
  pattern.push('%');
  pattern
}

fn non_blank(s: &Option<String>) -> Option<&str> {
  s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Students matching `filter`, ordered by first surname, second surname and
/// given names.
///
/// With a year filter the course is the one assigned for that year;
/// otherwise it is the one for the student's current year.
pub async fn search_students<D: Datastore>(
  store: &D,
  filter: &RosterQuery,
) -> Result<Vec<RosterEntry>> {
  let mut sql = String::from(
    "SELECT p.id, p.rut, p.given_names, p.first_surname, p.second_surname, \
       s.guardian_id, sy.year_id, y.name AS year_name, sy.course_id, c.name AS course_name
     FROM students s
     JOIN persons p ON p.id = s.person_id",
  );
  let mut params: Vec<SqlValue> = Vec::new();

  match filter.ano {
    Some(year) => {
      sql.push_str(" JOIN student_years sy ON sy.student_id = s.person_id AND sy.year_id = ?");
      params.push(year.into());
    }
    None => sql.push_str(
      " LEFT JOIN student_years sy ON sy.student_id = s.person_id AND sy.year_id = s.year_id",
    ),
  }
  sql.push_str(
    " LEFT JOIN courses c ON c.id = sy.course_id \
     LEFT JOIN academic_years y ON y.id = sy.year_id WHERE 1 = 1",
  );

  if let Some(course) = filter.curso {
    sql.push_str(" AND sy.course_id = ?");
    params.push(course.into());
  }
  if let Some(fragment) = non_blank(&filter.rut) {
    let digits: String = fragment
      .chars()
      .filter(|c| !matches!(c, '.' | '-'))
      .collect::<String>()
      .to_uppercase();
    sql.push_str(
      " AND REPLACE(REPLACE(UPPER(COALESCE(p.rut, '')), '.', ''), '-', '') LIKE ? ESCAPE '\\'",
    );
    params.push(contains_pattern(&digits).into());
  }
  if let Some(fragment) = non_blank(&filter.nombre) {
    let pattern = contains_pattern(&upper(fragment));
    sql.push_str(
      " AND (p.given_names LIKE ? ESCAPE '\\' OR p.first_surname LIKE ? ESCAPE '\\' \
       OR p.second_surname LIKE ? ESCAPE '\\')",
    );
    params.extend([pattern.clone().into(), pattern.clone().into(), pattern.into()]);
  }
  sql.push_str(" ORDER BY p.first_surname, p.second_surname, p.given_names, p.id");

  rows(store, &sql, params)
    .await?
    .iter()
    .map(|row| -> matricula_core::Result<RosterEntry> {
      let given: String = row.get("given_names")?;
      let first: String = row.get("first_surname")?;
      let second: String = row.get("second_surname")?;
      Ok(RosterEntry {
        student:   PersonKey(row.get("id")?),
        rut:       row.get("rut")?,
        full_name: full_name(&given, &first, &second),
        year_id:   row.get("year_id")?,
        year:      row.get("year_name")?,
        course_id: row.get("course_id")?,
        course:    row.get("course_name")?,
        guardian:  row.get::<Option<i64>>("guardian_id")?.map(GuardianKey),
      })
    })
    .collect::<matricula_core::Result<_>>()
    .map_err(decode)
}

// ─── RUT lookup ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RutLookup {
  /// `12.345.678-5`, or the sentinel as submitted.
  #[serde(rename = "rutFormateado")]
  pub formatted: String,
  #[serde(rename = "existe")]
  pub exists:    bool,
  #[serde(rename = "idUsuario", skip_serializing_if = "Option::is_none")]
  pub person:    Option<PersonKey>,
}

/// Validate `input` and report whether a person holds it. Sentinels never
/// exist.
pub async fn lookup_rut<D: Datastore>(store: &D, input: &str) -> Result<RutLookup> {
  let id: NationalId = input
    .parse()
    .map_err(|_| ValidationError::MalformedRut(input.to_owned()))?;
  let formatted = rut::format(input.trim());

  let Some(rut) = id.as_rut() else {
    return Ok(RutLookup { formatted, exists: false, person: None });
  };
  let found = rows(store, FIND_BY_RUT, vec![rut.digits().into()]).await?;
  let person = found
    .first()
    .map(|row| row.get::<i64>("id").map(PersonKey))
    .transpose()
    .map_err(decode)?;
  Ok(RutLookup { formatted, exists: person.is_some(), person })
}

// ─── Reference tables ────────────────────────────────────────────────────────

/// The read-only lookup tables request payloads reference by key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceTable {
  Regions,
  Comunas,
  Nationalities,
  AcademicYears,
  Courses,
  StudyPlans,
  PriorSchools,
  Relationships,
}

impl ReferenceTable {
  /// Parse the URL segment naming a table (`academic-years`, ...).
  pub fn from_slug(slug: &str) -> Option<Self> {
    Some(match slug {
      "regions" => Self::Regions,
      "comunas" => Self::Comunas,
      "nationalities" => Self::Nationalities,
      "academic-years" => Self::AcademicYears,
      "courses" => Self::Courses,
      "study-plans" => Self::StudyPlans,
      "prior-schools" => Self::PriorSchools,
      "relationships" => Self::Relationships,
      _ => return None,
    })
  }

  fn sql(self) -> &'static str {
    match self {
      Self::Regions => "SELECT id, name FROM regions ORDER BY id",
      Self::Comunas => "SELECT id, name FROM comunas ORDER BY name",
      Self::Nationalities => "SELECT id, name FROM nationalities WHERE active = 1 ORDER BY name",
      Self::AcademicYears => "SELECT id, name FROM academic_years ORDER BY name DESC, id DESC",
      Self::Courses => "SELECT id, name FROM courses ORDER BY id",
      Self::StudyPlans => "SELECT id, name FROM study_plans ORDER BY id",
      Self::PriorSchools => {
        "SELECT id, name FROM prior_schools ORDER BY id = -1 DESC, name, id"
      }
      Self::Relationships => "SELECT id, name FROM relationships ORDER BY id",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceEntry {
  pub id:     i64,
  #[serde(rename = "nombre")]
  pub name:   String,
}

pub async fn reference_table<D: Datastore>(
  store: &D,
  table: ReferenceTable,
) -> Result<Vec<ReferenceEntry>> {
  rows(store, table.sql(), Vec::new())
    .await?
    .iter()
    .map(|row| -> matricula_core::Result<ReferenceEntry> {
      Ok(ReferenceEntry { id: row.get("id")?, name: row.get("name")? })
    })
    .collect::<matricula_core::Result<_>>()
    .map_err(decode)
}
