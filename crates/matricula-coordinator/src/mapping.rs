//! Request field mapping.
//!
//! Forms submit flat JSON objects using Spanish camelCase field names. The
//! same concept appears once per role, distinguished by a suffix:
//! `telefono` (student), `telefonoApoderado` (guardian), `telefonoFamiliar`
//! or `telefono_2` (family member 2). This module splits such objects into
//! role sections and parses each section into the typed input of
//! [`matricula_core::enrollment`].
//!
//! Values are interpreted as follows:
//!
//! | JSON                         | Result                |
//! |------------------------------|-----------------------|
//! | key absent                   | [`Field::Missing`]    |
//! | `null`, `""`, whitespace     | [`Field::Null`]       |
//! | any other scalar             | [`Field::Value`]      |
//!
//! Flags are the exception: a present flag is always a value, with `null`
//! meaning "no".

use std::collections::BTreeMap;

use chrono::NaiveDate;
use matricula_core::{
  Field, ValidationError,
  enrollment::{EnrollmentUpdate, GuardianSection, NewEnrollment, StudentSection},
  family::FamilyMemberFields,
  flag,
  guardian::GuardianProfile,
  person::{PersonFields, Role},
  rut::NationalId,
  student::{PriorSchool, StudentFlags, StudentProfile},
};
use serde_json::{Map, Value};

// ─── FieldMap ────────────────────────────────────────────────────────────────

/// One role's flat field-name → value map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
  fields: BTreeMap<String, Value>,
}

impl FieldMap {
  pub fn new(fields: Map<String, Value>) -> Self { Self { fields: fields.into_iter().collect() } }

  /// Accept `value` if it is a JSON object; `section` names it in errors.
  pub fn from_value(value: Value, section: &str) -> Result<Self, ValidationError> {
    match value {
      Value::Object(fields) => Ok(Self::new(fields)),
      _ => Err(ValidationError::MalformedSection(section.to_owned())),
    }
  }

  pub fn insert(&mut self, key: impl Into<String>, value: Value) {
    self.fields.insert(key.into(), value);
  }

  pub fn contains(&self, key: &str) -> bool { self.fields.contains_key(key) }

  /// Whether any field carries a non-blank value. Unchecked boxes (`false`,
  /// `0`) are blank.
  pub fn has_content(&self) -> bool {
    self.fields.values().any(|value| match value {
      Value::Null | Value::Bool(false) => false,
      Value::Number(n) => n.as_f64() != Some(0.0),
      Value::String(s) => !s.trim().is_empty(),
      _ => true,
    })
  }

  /// The first of `keys` present in the map, or the first key.
  fn alias<'k>(&self, keys: &[&'k str]) -> &'k str {
    keys
      .iter()
      .copied()
      .find(|key| self.contains(key))
      .unwrap_or(keys[0])
  }

  pub fn text(&self, key: &str) -> Field<String> {
    match self.fields.get(key) {
      None => Field::Missing,
      Some(Value::Null) => Field::Null,
      Some(Value::String(s)) => {
        let s = s.trim();
        if s.is_empty() { Field::Null } else { Field::Value(s.to_owned()) }
      }
      Some(other) => Field::Value(other.to_string()),
    }
  }

  pub fn flag(&self, key: &str) -> Field<bool> {
    match self.fields.get(key) {
      None => Field::Missing,
      Some(value) => Field::Value(flag::normalize(value)),
    }
  }

  pub fn integer(&self, role: Role, key: &'static str) -> Result<Field<i64>, ValidationError> {
    if let Some(Value::Number(n)) = self.fields.get(key) {
      let whole = n.as_i64().or_else(|| {
        n.as_f64()
          .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
          .map(|f| f as i64)
      });
      return whole
        .map(Field::Value)
        .ok_or_else(|| invalid(role, key, n.to_string()));
    }
    self.parsed(role, key, |s| s.parse().ok())
  }

  /// Decimal numbers; `,` is accepted as the decimal separator.
  pub fn decimal(&self, role: Role, key: &'static str) -> Result<Field<f64>, ValidationError> {
    if let Some(Value::Number(n)) = self.fields.get(key) {
      return n
        .as_f64()
        .map(Field::Value)
        .ok_or_else(|| invalid(role, key, n.to_string()));
    }
    self.parsed(role, key, |s| {
      s.replace(',', ".").parse::<f64>().ok().filter(|f| f.is_finite())
    })
  }

  /// `YYYY-MM-DD`, optionally followed by a time (`2015-03-09T00:00:00Z`).
  pub fn date(&self, role: Role, key: &'static str) -> Result<Field<NaiveDate>, ValidationError> {
    self.parsed(role, key, |s| {
      let day = match s.split_once('T') {
        Some((day, _)) => day,
        None => s,
      };
      NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    })
  }

  pub fn national_id(
    &self,
    role: Role,
    key: &'static str,
  ) -> Result<Field<NationalId>, ValidationError> {
    match self.text(key) {
      Field::Value(s) => s
        .parse()
        .map(Field::Value)
        .map_err(|_| ValidationError::InvalidRut { role, value: s }),
      Field::Null => Ok(Field::Null),
      Field::Missing => Ok(Field::Missing),
    }
  }

  fn parsed<T>(
    &self,
    role: Role,
    key: &'static str,
    parse: impl FnOnce(&str) -> Option<T>,
  ) -> Result<Field<T>, ValidationError> {
    match self.text(key) {
      Field::Value(s) => parse(&s).map(Field::Value).ok_or_else(|| invalid(role, key, s)),
      Field::Null => Ok(Field::Null),
      Field::Missing => Ok(Field::Missing),
    }
  }
}

fn invalid(role: Role, field: &'static str, value: String) -> ValidationError {
  ValidationError::InvalidValue { role, field, value }
}

// ─── Role builders ───────────────────────────────────────────────────────────

pub fn person_fields(map: &FieldMap, role: Role) -> Result<PersonFields, ValidationError> {
  Ok(PersonFields {
    national_id:    map.national_id(role, "rut")?,
    given_names:    map.text("nombres"),
    first_surname:  map.text("apellidoPaterno"),
    second_surname: map.text("apellidoMaterno"),
    sex:            map.text("genero"),
    birth_date:     map.date(role, "fechaNacimiento")?,
    street:         map.text("direccion"),
    house_number:   map.text("numero"),
    neighborhood:   map.text("villa"),
    unit:           map.text("departamento"),
    phone:          map.text("telefono"),
    email:          map.text("email"),
    comuna_id:      map.integer(role, "idComuna")?,
    nationality_id: map.integer(role, "idNacionalidad")?,
  })
}

pub fn student_section(map: &FieldMap) -> Result<StudentSection, ValidationError> {
  let role = Role::Student;
  let profile = StudentProfile {
    year_id:           map.integer(role, "idAno")?,
    plan_id:           map.integer(role, "idPlan")?,
    prior_average:     map.decimal(role, "promedioAnterior")?,
    prior_school:      map.integer(role, "idEstablecimiento")?.map(PriorSchool::from),
    flags:             StudentFlags {
      indigenous_origin:      map.flag("origenIndigena"),
      special_education:      map.flag("programaPIE"),
      physical_education:     map.flag("realizaEducacionFisica"),
      allergic:               map.flag("alergicoMedicamento"),
      birth_certificate:      map.flag("certificadoNacimiento"),
      personality_report:     map.flag("informePersonalidad"),
      grades_report:          map.flag("informeNotas"),
      annual_study_cert:      map.flag("certificadoEstudios"),
      signed_enrollment_form: map.flag("fichaFirmada"),
    },
    allergy_detail:    map.text("especificarAlergia"),
    current_illness:   map.text("enfermedadActual"),
    medication:        map.text("medicamentoConsumo"),
    observations:      map.text("observaciones"),
    authorized_pickup: map.text("personaRetiro"),
    course_id:         map.integer(role, "idCurso")?,
  };
  Ok(StudentSection { person: person_fields(map, role)?, profile })
}

pub fn guardian_section(map: &FieldMap) -> Result<GuardianSection, ValidationError> {
  let role = Role::Guardian;
  let profile = GuardianProfile {
    relationship_id:  map.integer(role, "tipoApoderado")?,
    employer_name:    map.text(map.alias(&["empresaTrabajo", "empresa"])),
    job_title:        map.text(map.alias(&["cargoEmpresa", "cargo"])),
    employer_address: map.text("direccionTrabajo"),
    employer_phone:   map.text("telefonoTrabajo"),
  };
  Ok(GuardianSection { person: person_fields(map, role)?, profile })
}

/// Family member at 1-based `position` in the request.
pub fn family_member(map: &FieldMap, position: usize) -> Result<FamilyMemberFields, ValidationError> {
  let role = Role::FamilyMember(position);
  Ok(FamilyMemberFields {
    relationship_id:    map.integer(role, "parentesco")?,
    national_id:        map.national_id(role, "rut")?,
    given_names:        map.text("nombres"),
    first_surname:      map.text("apellidoPaterno"),
    second_surname:     map.text("apellidoMaterno"),
    birth_date:         map.date(role, "fechaNacimiento")?,
    sex:                map.text("genero"),
    phone:              map.text("telefono"),
    employer_name:      map.text(map.alias(&["empresa", "empresaTrabajo"])),
    job_title:          map.text(map.alias(&["cargo", "cargoEmpresa"])),
    employer_address:   map.text("direccionTrabajo"),
    employer_phone:     map.text("telefonoTrabajo"),
    alternate_guardian: map.flag(map.alias(&["esApoderadoSuplente", "apoderadoSuplente"])),
  })
}

// ─── Sections ────────────────────────────────────────────────────────────────

/// A request split into role sections, not yet parsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sections {
  pub student:  FieldMap,
  pub guardian: Option<FieldMap>,
  pub family:   Vec<FieldMap>,
}

const GUARDIAN_SUFFIX: &str = "Apoderado";
const FAMILY_SUFFIX: &str = "Familiar";

/// Names only family members carry; unnumbered they belong to member 1.
const FAMILY_ONLY: [&str; 3] = ["parentesco", "esApoderadoSuplente", "apoderadoSuplente"];

enum Owner {
  Student,
  Guardian,
  Family(u32),
}

/// Classify one flat key, returning its owner and unprefixed name.
fn classify(key: &str) -> (Owner, &str) {
  if key == "tipoApoderado" {
    return (Owner::Guardian, key);
  }
  if let Some(base) = key.strip_suffix(GUARDIAN_SUFFIX)
    && !base.is_empty()
  {
    return (Owner::Guardian, base);
  }

  // `nombres_2`, `nombresFamiliar_2`
  if let Some((head, n)) = key.rsplit_once('_')
    && let Ok(n) = n.parse::<u32>()
    && n > 0
  {
    let base = head.strip_suffix(FAMILY_SUFFIX).unwrap_or(head);
    if !base.is_empty() {
      return (Owner::Family(n), base);
    }
  }
  // `nombresFamiliar`, `parentesco`
  if FAMILY_ONLY.contains(&key) {
    return (Owner::Family(1), key);
  }
  if let Some(base) = key.strip_suffix(FAMILY_SUFFIX)
    && !base.is_empty()
  {
    return (Owner::Family(1), base);
  }

  (Owner::Student, key)
}

impl Sections {
  /// Split a role-prefixed flat form.
  ///
  /// Guardian and family sections without any non-blank value are dropped;
  /// family members keep the order of their numbers.
  pub fn from_flat(flat: Map<String, Value>) -> Self {
    let mut student = FieldMap::default();
    let mut guardian = FieldMap::default();
    let mut family: BTreeMap<u32, FieldMap> = BTreeMap::new();

    for (key, value) in flat {
      match classify(&key) {
        (Owner::Student, name) => student.insert(name, value),
        (Owner::Guardian, name) => guardian.insert(name, value),
        (Owner::Family(n), name) => family.entry(n).or_default().insert(name, value),
      }
    }

    Self {
      student,
      guardian: guardian.has_content().then_some(guardian),
      family: family.into_values().filter(FieldMap::has_content).collect(),
    }
  }

  /// Split a sectioned payload:
  /// `{ "student": {..}, "guardian": {..}, "familyMembers": [{..}] }`.
  pub fn from_sectioned(payload: Value) -> Result<Self, ValidationError> {
    let Value::Object(mut payload) = payload else {
      return Err(ValidationError::MalformedSection("request".to_owned()));
    };

    let student = match payload.remove("student") {
      Some(value) => FieldMap::from_value(value, "student")?,
      None => FieldMap::default(),
    };

    let guardian = match payload.remove("guardian") {
      None | Some(Value::Null) => None,
      Some(value) => Some(FieldMap::from_value(value, "guardian")?).filter(FieldMap::has_content),
    };

    let family = match payload.remove("familyMembers") {
      None | Some(Value::Null) => Vec::new(),
      Some(Value::Array(members)) => members
        .into_iter()
        .map(|member| FieldMap::from_value(member, "familyMembers"))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(FieldMap::has_content)
        .collect(),
      Some(_) => return Err(ValidationError::MalformedSection("familyMembers".to_owned())),
    };

    Ok(Self { student, guardian, family })
  }

  pub fn into_new_enrollment(self) -> Result<NewEnrollment, ValidationError> {
    let (student, guardian, family) = self.parse()?;
    Ok(NewEnrollment { student, guardian, family })
  }

  pub fn into_update(self) -> Result<EnrollmentUpdate, ValidationError> {
    let (student, guardian, family) = self.parse()?;
    Ok(EnrollmentUpdate { student, guardian, family })
  }

  fn parse(
    &self,
  ) -> Result<(StudentSection, Option<GuardianSection>, Vec<FamilyMemberFields>), ValidationError> {
    let student = student_section(&self.student)?;
    let guardian = self.guardian.as_ref().map(guardian_section).transpose()?;
    let family = self
      .family
      .iter()
      .enumerate()
      .map(|(i, map)| family_member(map, i + 1))
      .collect::<Result<Vec<_>, _>>()?;
    Ok((student, guardian, family))
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn map(value: Value) -> FieldMap { FieldMap::from_value(value, "test").unwrap() }

  fn flat(value: Value) -> Map<String, Value> {
    match value {
      Value::Object(m) => m,
      _ => unreachable!(),
    }
  }

  #[test]
  fn text_tri_state() {
    let m = map(json!({ "a": "  x ", "b": "", "c": null, "d": 12 }));
    assert_eq!(m.text("a"), Field::Value("x".into()));
    assert_eq!(m.text("b"), Field::Null);
    assert_eq!(m.text("c"), Field::Null);
    assert_eq!(m.text("d"), Field::Value("12".into()));
    assert_eq!(m.text("e"), Field::Missing);
  }

  #[test]
  fn flags_normalize_and_null_means_no() {
    let m = map(json!({ "a": "Si", "b": 1, "c": null, "d": "no" }));
    assert_eq!(m.flag("a"), Field::Value(true));
    assert_eq!(m.flag("b"), Field::Value(true));
    assert_eq!(m.flag("c"), Field::Value(false));
    assert_eq!(m.flag("d"), Field::Value(false));
    assert_eq!(m.flag("e"), Field::Missing);
  }

  #[test]
  fn numbers_and_dates() {
    let role = Role::Student;
    let m = map(json!({
      "n": "42", "f": 3.0, "avg": "5,8", "day": "2015-03-09", "stamp": "2015-03-09T03:00:00.000Z",
      "bad": "abc",
    }));
    assert_eq!(m.integer(role, "n").unwrap(), Field::Value(42));
    assert_eq!(m.integer(role, "f").unwrap(), Field::Value(3));
    assert_eq!(m.decimal(role, "avg").unwrap(), Field::Value(5.8));
    let day = NaiveDate::from_ymd_opt(2015, 3, 9).unwrap();
    assert_eq!(m.date(role, "day").unwrap(), Field::Value(day));
    assert_eq!(m.date(role, "stamp").unwrap(), Field::Value(day));
    assert_eq!(
      m.integer(role, "bad"),
      Err(ValidationError::InvalidValue { role, field: "bad", value: "abc".into() })
    );
  }

  #[test]
  fn invalid_rut_names_the_role() {
    let m = map(json!({ "rut": "12.345.678-9" }));
    assert_eq!(
      m.national_id(Role::Guardian, "rut"),
      Err(ValidationError::InvalidRut { role: Role::Guardian, value: "12.345.678-9".into() })
    );
    let m = map(json!({ "rut": "sin rut" }));
    assert_eq!(m.national_id(Role::Guardian, "rut").unwrap(), Field::Value(NationalId::Unknown));
  }

  #[test]
  fn flat_form_is_split_by_suffix() {
    let sections = Sections::from_flat(flat(json!({
      "nombres": "ana",
      "rut": "12345678-5",
      "nombresApoderado": "luis",
      "rutApoderado": "11111111-1",
      "tipoApoderado": 2,
      "parentescoFamiliar": 1,
      "nombresFamiliar": "rosa",
      "parentesco_2": 5,
      "nombresFamiliar_2": "juan",
      "nombres_3": "",
    })));

    assert_eq!(sections.student.text("nombres"), Field::Value("ana".into()));
    assert_eq!(sections.student.text("rut"), Field::Value("12345678-5".into()));

    let guardian = sections.guardian.as_ref().unwrap();
    assert_eq!(guardian.text("nombres"), Field::Value("luis".into()));
    assert_eq!(guardian.integer(Role::Guardian, "tipoApoderado").unwrap(), Field::Value(2));

    assert_eq!(sections.family.len(), 2);
    assert_eq!(sections.family[0].text("nombres"), Field::Value("rosa".into()));
    assert_eq!(sections.family[1].text("nombres"), Field::Value("juan".into()));
  }

  #[test]
  fn unnumbered_family_only_names_belong_to_the_first_member() {
    let request = Sections::from_flat(flat(json!({
      "nombres": "ana",
      "apellidoPaterno": "perez",
      "rut": "12345678-5",
      "parentesco": 1,
      "nombresFamiliar": "rosa",
      "apellidoPaternoFamiliar": "soto",
      "apoderadoSuplente": "Si",
      "parentesco_2": 2,
      "nombres_2": "juan",
      "apellidoPaterno_2": "perez",
      "apoderadoSuplente_2": false,
    })))
    .into_new_enrollment()
    .unwrap();

    assert!(request.validate().is_ok());
    assert_eq!(request.family.len(), 2);
    assert_eq!(request.family[0].relationship_id, Field::Value(1));
    assert_eq!(request.family[0].alternate_guardian, Field::Value(true));
    assert_eq!(request.family[1].alternate_guardian, Field::Value(false));
  }

  #[test]
  fn unchecked_boxes_do_not_open_a_section() {
    let request = Sections::from_flat(flat(json!({
      "nombres": "ana",
      "apellidoPaterno": "perez",
      "rut": "12345678-5",
      "esApoderadoSuplente_2": false,
      "parentesco_3": 0,
    })))
    .into_new_enrollment()
    .unwrap();

    assert!(request.family.is_empty());
    assert!(request.guardian.is_none());
    assert!(request.validate().is_ok());
  }

  #[test]
  fn blank_guardian_section_is_dropped() {
    let sections = Sections::from_flat(flat(json!({
      "nombres": "ana",
      "nombresApoderado": "",
      "rutApoderado": null,
    })));
    assert!(sections.guardian.is_none());
  }

  #[test]
  fn sectioned_payload() {
    let request = Sections::from_sectioned(json!({
      "student": { "nombres": "ana", "apellidoPaterno": "perez", "rut": "12345678-5", "programaPIE": "Si" },
      "guardian": { "nombres": "luis", "apellidoPaterno": "perez", "rut": "11111111-1", "empresa": "acme" },
      "familyMembers": [{ "parentesco": 1, "nombres": "rosa", "apellidoPaterno": "soto" }],
    }))
    .unwrap()
    .into_new_enrollment()
    .unwrap();

    assert_eq!(request.student.profile.flags.special_education, Field::Value(true));
    let guardian = request.guardian.unwrap();
    assert_eq!(guardian.profile.employer_name, Field::Value("acme".into()));
    assert_eq!(request.family[0].relationship_id, Field::Value(1));
    assert!(request.family[0].national_id.is_missing());
  }

  #[test]
  fn malformed_sections_are_rejected() {
    assert_eq!(
      Sections::from_sectioned(json!({ "student": [] })),
      Err(ValidationError::MalformedSection("student".into()))
    );
    assert_eq!(
      Sections::from_sectioned(json!({ "familyMembers": {} })),
      Err(ValidationError::MalformedSection("familyMembers".into()))
    );
  }

  #[test]
  fn prior_school_sentinel() {
    let section = student_section(&map(json!({ "idEstablecimiento": -1 }))).unwrap();
    assert_eq!(section.profile.prior_school, Field::Value(PriorSchool::NoInformation));
  }
}
