//! Coordinator tests against an in-memory `SqliteStore`, plus a wrapper
//! store that injects failures and delays.

use std::{sync::Arc, time::Duration};

use matricula_core::{
  Field, ValidationError,
  enrollment::{EnrollmentUpdate, NewEnrollment},
  family::FamilyMemberKey,
  person::{PersonKey, Role},
  store::{Datastore, Execution, Row, SqlValue, Transaction},
};
use matricula_store_sqlite::{SqliteStore, SqliteTransaction};
use serde_json::{Value, json};

use crate::{
  Coordinator, Error, Step, WriteError,
  mapping::Sections,
  records::{self, RosterQuery},
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn coordinator() -> Coordinator<SqliteStore> { Coordinator::new(store().await) }

fn enrollment(payload: Value) -> NewEnrollment {
  Sections::from_sectioned(payload)
    .unwrap()
    .into_new_enrollment()
    .unwrap()
}

fn update(payload: Value) -> EnrollmentUpdate {
  Sections::from_sectioned(payload).unwrap().into_update().unwrap()
}

fn ana_with_luis() -> Value {
  json!({
    "student":  { "nombres": "ANA", "apellidoPaterno": "PEREZ", "rut": "12345678-5" },
    "guardian": { "nombres": "LUIS", "apellidoPaterno": "PEREZ", "rut": "11111111-1" },
  })
}

async fn count<D: Datastore>(store: &D, table: &str) -> i64 {
  let sql = format!("SELECT COUNT(*) AS n FROM {table}");
  let rows = store.query(&sql, vec![]).await.unwrap();
  rows[0].get("n").unwrap()
}

async fn seed(store: &SqliteStore, statements: &[&str]) {
  let mut tx = store.begin().await.unwrap();
  for sql in statements {
    tx.execute(sql, vec![]).await.unwrap();
  }
  tx.commit().await.unwrap();
}

async fn person_row(store: &SqliteStore, key: PersonKey) -> Row {
  let rows = store
    .query("SELECT * FROM persons WHERE id = ?", vec![key.0.into()])
    .await
    .unwrap();
  rows.into_iter().next().expect("person row")
}

// ─── Fault injection ─────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
enum FaultError {
  #[error(transparent)]
  Store(#[from] matricula_store_sqlite::Error),
  #[error("injected failure")]
  Injected,
}

#[derive(Debug, Clone, Default)]
struct Faults {
  /// Fail any statement containing this text.
  fail_on:       Option<&'static str>,
  /// Delay any statement containing this text.
  delay_on:      Option<(&'static str, Duration)>,
  fail_rollback: bool,
}

impl Faults {
  async fn before(&self, sql: &str) -> Result<(), FaultError> {
    if let Some((needle, delay)) = self.delay_on
      && sql.contains(needle)
    {
      tokio::time::sleep(delay).await;
    }
    match self.fail_on {
      Some(needle) if sql.contains(needle) => Err(FaultError::Injected),
      _ => Ok(()),
    }
  }
}

struct FaultyStore {
  inner:  SqliteStore,
  faults: Faults,
}

struct FaultyTx {
  inner:  SqliteTransaction,
  faults: Faults,
}

impl Datastore for FaultyStore {
  type Error = FaultError;
  type Tx = FaultyTx;

  async fn begin(&self) -> Result<FaultyTx, FaultError> {
    let inner = self.inner.begin().await?;
    Ok(FaultyTx { inner, faults: self.faults.clone() })
  }

  async fn query<'a>(
    &'a self,
    sql: &'a str,
    params: Vec<SqlValue>,
  ) -> Result<Vec<Row>, FaultError> {
    Ok(self.inner.query(sql, params).await?)
  }
}

impl Transaction for FaultyTx {
  type Error = FaultError;

  async fn query<'a>(
    &'a mut self,
    sql: &'a str,
    params: Vec<SqlValue>,
  ) -> Result<Vec<Row>, FaultError> {
    self.faults.before(sql).await?;
    Ok(self.inner.query(sql, params).await?)
  }

  async fn execute<'a>(
    &'a mut self,
    sql: &'a str,
    params: Vec<SqlValue>,
  ) -> Result<Execution, FaultError> {
    self.faults.before(sql).await?;
    Ok(self.inner.execute(sql, params).await?)
  }

  async fn commit(self) -> Result<(), FaultError> { Ok(self.inner.commit().await?) }

  async fn rollback(self) -> Result<(), FaultError> {
    if self.faults.fail_rollback {
      // Dropping the open transaction still rolls it back in the store.
      drop(self.inner);
      return Err(FaultError::Injected);
    }
    Ok(self.inner.rollback().await?)
  }
}

async fn faulty(faults: Faults) -> Coordinator<FaultyStore> {
  Coordinator::new(FaultyStore { inner: store().await, faults })
}

fn with_family(mut payload: Value, family: Value) -> Value {
  payload["familyMembers"] = family;
  payload
}

// ─── Create Full Enrollment ──────────────────────────────────────────────────

#[tokio::test]
async fn new_enrollment_creates_and_links_guardian() {
  let c = coordinator().await;
  let receipt = c.create_enrollment(enrollment(ana_with_luis())).await.unwrap();

  let guardian = receipt.guardian.expect("guardian key");
  assert!(!receipt.guardian_reused);
  assert_eq!(count(c.store(), "persons").await, 2);
  assert_eq!(count(c.store(), "guardians").await, 1);

  let student = records::student_detail(c.store(), receipt.student).await.unwrap().unwrap();
  assert_eq!(student.guardian, Some(guardian));
  assert_eq!(student.person.rut.as_deref(), Some("12345678-5"));

  let linked = records::guardian_of(c.store(), receipt.student).await.unwrap().unwrap();
  assert_eq!(linked.id, guardian);
  assert_eq!(linked.person.id, receipt.guardian_person.unwrap());
}

#[tokio::test]
async fn existing_guardian_person_is_reused() {
  let c = coordinator().await;
  // Stored in the legacy dotted format.
  seed(
    c.store(),
    &["INSERT INTO persons (id, rut, given_names, first_surname) \
       VALUES (40, '11.111.111-1', 'LUIS', 'PEREZ')"],
  )
  .await;

  let receipt = c.create_enrollment(enrollment(ana_with_luis())).await.unwrap();
  assert!(receipt.guardian_reused);
  assert_eq!(receipt.guardian_person, Some(PersonKey(40)));
  assert_eq!(count(c.store(), "persons").await, 2);

  let guardian = records::guardian_of(c.store(), receipt.student).await.unwrap().unwrap();
  assert_eq!(guardian.person.id, PersonKey(40));
  assert_eq!(guardian.person.rut.as_deref(), Some("11111111-1"));
}

#[tokio::test]
async fn siblings_share_one_guardian() {
  let c = coordinator().await;
  let first = c.create_enrollment(enrollment(ana_with_luis())).await.unwrap();

  let mut sibling = ana_with_luis();
  sibling["student"] = json!({ "nombres": "PEDRO", "apellidoPaterno": "PEREZ", "rut": "22222222-2" });
  let second = c.create_enrollment(enrollment(sibling)).await.unwrap();

  assert!(second.guardian_reused);
  assert_eq!(first.guardian, second.guardian);
  assert_eq!(count(c.store(), "guardians").await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_enrollments_share_one_guardian() {
  let c = Arc::new(coordinator().await);
  let mut sibling = ana_with_luis();
  sibling["student"] = json!({ "nombres": "PEDRO", "apellidoPaterno": "PEREZ", "rut": "22222222-2" });

  let spawn = |payload: Value| {
    let c = Arc::clone(&c);
    tokio::spawn(async move { c.create_enrollment(enrollment(payload)).await })
  };
  let (first, second) = tokio::join!(spawn(ana_with_luis()), spawn(sibling));
  let first = first.unwrap().unwrap();
  let second = second.unwrap().unwrap();

  assert!(first.guardian.is_some());
  assert_eq!(first.guardian, second.guardian);
  assert!(first.guardian_reused != second.guardian_reused);
  assert_eq!(count(c.store(), "persons").await, 3);
  assert_eq!(count(c.store(), "guardians").await, 1);
}

#[tokio::test]
async fn sentinel_guardians_are_never_reused() {
  let c = coordinator().await;
  let mut payload = ana_with_luis();
  payload["guardian"]["rut"] = json!("EXTRANJERO");
  let first = c.create_enrollment(enrollment(payload.clone())).await.unwrap();

  payload["student"]["rut"] = json!("SIN RUT");
  let second = c.create_enrollment(enrollment(payload)).await.unwrap();

  assert!(!second.guardian_reused);
  assert_ne!(first.guardian_person, second.guardian_person);
  assert_eq!(count(c.store(), "persons").await, 4);
}

#[tokio::test]
async fn enrollment_without_guardian() {
  let c = coordinator().await;
  let receipt = c
    .create_enrollment(enrollment(json!({
      "student": { "nombres": "ANA", "apellidoPaterno": "PEREZ", "rut": "12345678-5" },
    })))
    .await
    .unwrap();
  assert_eq!(receipt.guardian, None);
  assert!(records::guardian_of(c.store(), receipt.student).await.unwrap().is_none());
}

#[tokio::test]
async fn names_are_upper_cased_and_absent_fields_stored_as_null() {
  let c = coordinator().await;
  let receipt = c
    .create_enrollment(enrollment(json!({
      "student": {
        "nombres": "ana maría", "apellidoPaterno": "pérez", "rut": "12.345.678-5",
        "telefono": "", "programaPIE": "Si", "origenIndigena": null,
      },
    })))
    .await
    .unwrap();

  let row = person_row(c.store(), receipt.student).await;
  assert_eq!(row.get::<String>("given_names").unwrap(), "ANA MARÍA");
  assert_eq!(row.get::<String>("first_surname").unwrap(), "PÉREZ");
  assert_eq!(row.get::<String>("second_surname").unwrap(), "");
  assert_eq!(row.get::<String>("rut").unwrap(), "12345678-5");
  assert_eq!(row.get::<Option<String>>("phone").unwrap(), None);
  assert_eq!(row.get::<Option<String>>("email").unwrap(), None);

  let student = records::student_detail(c.store(), receipt.student).await.unwrap().unwrap();
  assert!(student.special_education);
  assert!(!student.indigenous_origin);
  assert!(!student.allergic);
  assert_eq!(student.person.full_name, "PÉREZ ANA MARÍA");
}

#[tokio::test]
async fn family_failure_rolls_back_everything() {
  let c = coordinator().await;
  let payload = with_family(
    ana_with_luis(),
    json!([
      { "parentesco": 1, "nombres": "ROSA", "apellidoPaterno": "SOTO" },
      { "parentesco": 999, "nombres": "X", "apellidoPaterno": "Y" },
    ]),
  );

  let err = c.create_enrollment(enrollment(payload)).await.unwrap_err();
  assert_eq!(err.step(), Some(Step::FamilyMember(2)));
  assert!(err.to_string().starts_with("family member 2 failed"));

  for table in ["persons", "students", "guardians", "family_members", "student_years"] {
    assert_eq!(count(c.store(), table).await, 0, "{table} must be empty");
  }
}

#[tokio::test]
async fn invalid_reference_fails_the_student_step() {
  let c = coordinator().await;
  let mut payload = ana_with_luis();
  payload["student"]["idComuna"] = json!(777);

  let err = c.create_enrollment(enrollment(payload)).await.unwrap_err();
  assert!(matches!(err, Error::Step { step: Step::Student, source: WriteError::Store(_) }));
  assert_eq!(count(c.store(), "persons").await, 0);
}

#[tokio::test]
async fn invalid_request_never_opens_a_transaction() {
  let c = faulty(Faults { fail_on: Some("persons"), ..Default::default() }).await;
  let mut request = enrollment(ana_with_luis());
  request.student.person.given_names = Field::Null;

  let err = c.create_enrollment(request).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Validation(ValidationError::MissingField { role: Role::Student, field: "nombres" })
  ));
}

#[tokio::test]
async fn course_is_assigned_for_the_year() {
  let c = coordinator().await;
  seed(
    c.store(),
    &[
      "INSERT INTO academic_years (id, name) VALUES (1, '2025')",
      "INSERT INTO courses (id, name) VALUES (3, '1° BÁSICO A'), (4, '1° BÁSICO B')",
    ],
  )
  .await;

  let mut payload = ana_with_luis();
  payload["student"]["idAno"] = json!(1);
  payload["student"]["idCurso"] = json!("3");
  let receipt = c.create_enrollment(enrollment(payload)).await.unwrap();

  let student = records::student_detail(c.store(), receipt.student).await.unwrap().unwrap();
  assert_eq!(student.course.as_deref(), Some("1° BÁSICO A"));
  assert_eq!(student.year.as_deref(), Some("2025"));

  // The stored year is reused when the update names only the course.
  c.update_enrollment(receipt.student, update(json!({ "student": { "idCurso": 4 } })))
    .await
    .unwrap();
  let student = records::student_detail(c.store(), receipt.student).await.unwrap().unwrap();
  assert_eq!(student.course_id, Some(4));
  assert_eq!(count(c.store(), "student_years").await, 1);
}

// ─── Update Existing Enrollment ──────────────────────────────────────────────

#[tokio::test]
async fn update_touches_only_provided_fields() {
  let c = coordinator().await;
  let mut payload = ana_with_luis();
  payload["student"]["email"] = json!("ana@example.cl");
  payload["student"]["telefono"] = json!("555");
  let receipt = c.create_enrollment(enrollment(payload)).await.unwrap();

  c.update_enrollment(
    receipt.student,
    update(json!({ "student": { "telefono": "999", "email": null, "informeNotas": 1 } })),
  )
  .await
  .unwrap();

  let row = person_row(c.store(), receipt.student).await;
  assert_eq!(row.get::<String>("given_names").unwrap(), "ANA");
  assert_eq!(row.get::<String>("phone").unwrap(), "999");
  assert_eq!(row.get::<Option<String>>("email").unwrap(), None);
  let student = records::student_detail(c.store(), receipt.student).await.unwrap().unwrap();
  assert!(student.grades_report);
  assert_eq!(student.guardian, receipt.guardian);
}

#[tokio::test]
async fn update_with_invalid_guardian_rut_is_rejected() {
  let c = coordinator().await;
  let receipt = c.create_enrollment(enrollment(ana_with_luis())).await.unwrap();

  let rejected = Sections::from_sectioned(json!({
    "student":  { "nombres": "ANITA" },
    "guardian": { "nombres": "JOSE", "apellidoPaterno": "ROJAS", "rut": "11.111.111-2" },
  }))
  .and_then(Sections::into_update);
  assert!(matches!(
    rejected,
    Err(ValidationError::InvalidRut { role: Role::Guardian, .. })
  ));

  let student = records::student_detail(c.store(), receipt.student).await.unwrap().unwrap();
  assert_eq!(student.person.given_names, "ANA");
  assert_eq!(student.guardian, receipt.guardian);
}

#[tokio::test]
async fn update_attaches_a_new_guardian() {
  let c = coordinator().await;
  let receipt = c
    .create_enrollment(enrollment(json!({
      "student": { "nombres": "ANA", "apellidoPaterno": "PEREZ", "rut": "12345678-5" },
    })))
    .await
    .unwrap();

  let revised = c
    .update_enrollment(
      receipt.student,
      update(json!({
        "student":  {},
        "guardian": {
          "nombres": "Marta", "apellidoPaterno": "Diaz", "rut": "10000013-K",
          "tipoApoderado": 1, "empresa": "acme ltda", "cargo": "contadora",
        },
      })),
    )
    .await
    .unwrap();

  let guardian = records::guardian_of(c.store(), receipt.student).await.unwrap().unwrap();
  assert_eq!(Some(guardian.id), revised.guardian);
  assert_eq!(guardian.person.given_names, "MARTA");
  assert_eq!(guardian.employer_name.as_deref(), Some("ACME LTDA"));
  assert_eq!(guardian.job_title.as_deref(), Some("CONTADORA"));
  assert_eq!(guardian.relationship_id, Some(1));
}

#[tokio::test]
async fn update_of_missing_student_is_not_found() {
  let c = coordinator().await;
  let err = c
    .update_enrollment(PersonKey(404), update(json!({ "student": { "telefono": "1" } })))
    .await
    .unwrap_err();
  assert!(err.is_not_found());
  assert_eq!(err.step(), Some(Step::StudentUpdate));
}

#[tokio::test]
async fn family_upsert_is_keyed_by_relationship() {
  let c = coordinator().await;
  let receipt = c.create_enrollment(enrollment(ana_with_luis())).await.unwrap();
  let mother = |phone: &str| {
    update(json!({
      "student": {},
      "familyMembers": [{
        "parentesco": 1, "nombres": "rosa", "apellidoPaterno": "soto", "telefono": phone,
        "esApoderadoSuplente": "S",
      }],
    }))
  };

  let first = c.update_enrollment(receipt.student, mother("111")).await.unwrap();
  let again = c.update_enrollment(receipt.student, mother("111")).await.unwrap();
  let last = c.update_enrollment(receipt.student, mother("222")).await.unwrap();
  assert_eq!(first.family_members, again.family_members);
  assert_eq!(first.family_members, last.family_members);

  let family = records::family_of(c.store(), receipt.student).await.unwrap();
  assert_eq!(family.len(), 1);
  assert_eq!(family[0].phone.as_deref(), Some("222"));
  assert_eq!(family[0].given_names, "ROSA");
  assert_eq!(family[0].relationship.as_deref(), Some("MADRE"));
  assert!(family[0].alternate_guardian);

  let mother = records::family_member(c.store(), receipt.student, 1).await.unwrap();
  assert_eq!(mother.map(|m| m.id), Some(family[0].id));
}

#[tokio::test]
async fn remove_family_member() {
  let c = coordinator().await;
  let payload = with_family(
    ana_with_luis(),
    json!([{ "parentesco": 2, "nombres": "JUAN", "apellidoPaterno": "PEREZ" }]),
  );
  let receipt = c.create_enrollment(enrollment(payload)).await.unwrap();
  let key = receipt.family_members[0];

  c.remove_family_member(key).await.unwrap();
  assert!(records::family_of(c.store(), receipt.student).await.unwrap().is_empty());

  let err = c.remove_family_member(key).await.unwrap_err();
  assert!(err.is_not_found());
  assert!(c.remove_family_member(FamilyMemberKey(-5)).await.unwrap_err().is_not_found());
}

// ─── Failure handling ────────────────────────────────────────────────────────

#[tokio::test]
async fn slow_step_times_out_and_rolls_back() {
  let c = faulty(Faults {
    delay_on: Some(("INSERT INTO family_members", Duration::from_millis(500))),
    ..Default::default()
  })
  .await
  .with_step_timeout(Some(Duration::from_millis(50)));

  let payload = with_family(
    ana_with_luis(),
    json!([{ "parentesco": 1, "nombres": "ROSA", "apellidoPaterno": "SOTO" }]),
  );
  let err = c.create_enrollment(enrollment(payload)).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Step { step: Step::FamilyMember(1), source: WriteError::Timeout(_) }
  ));
  assert_eq!(count(c.store(), "persons").await, 0);
  assert_eq!(count(c.store(), "students").await, 0);
}

#[tokio::test]
async fn failed_rollback_reports_both_errors() {
  let c = faulty(Faults {
    fail_on: Some("UPDATE students SET guardian_id"),
    fail_rollback: true,
    ..Default::default()
  })
  .await;

  let err = c.create_enrollment(enrollment(ana_with_luis())).await.unwrap_err();
  match &err {
    Error::RollbackFailed { step, source, rollback } => {
      assert_eq!(*step, Step::Link);
      assert!(matches!(source, WriteError::Store(_)));
      assert_eq!(rollback.to_string(), "injected failure");
    }
    other => panic!("expected rollback failure, got {other:?}"),
  }
  // The abandoned transaction is still rolled back by the store.
  assert_eq!(count(c.store(), "persons").await, 0);
}

#[tokio::test]
async fn guardian_update_failure_keeps_student_changes_out() {
  let c = faulty(Faults { fail_on: Some("INSERT INTO guardians"), ..Default::default() }).await;
  let receipt = c
    .create_enrollment(enrollment(json!({
      "student": { "nombres": "ANA", "apellidoPaterno": "PEREZ", "rut": "12345678-5" },
    })))
    .await
    .unwrap();

  let err = c
    .update_enrollment(
      receipt.student,
      update(json!({
        "student":  { "nombres": "ANITA" },
        "guardian": { "nombres": "LUIS", "apellidoPaterno": "PEREZ", "rut": "11111111-1" },
      })),
    )
    .await
    .unwrap_err();
  assert_eq!(err.step(), Some(Step::GuardianUpdate));

  let student = records::student_detail(c.store(), receipt.student).await.unwrap().unwrap();
  assert_eq!(student.person.given_names, "ANA");
  assert_eq!(count(c.store(), "persons").await, 1);
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn roster_search_filters_and_orders() {
  let c = coordinator().await;
  for (names, surname, rut) in [
    ("ANA", "ZUÑIGA", "12345678-5"),
    ("PEDRO", "ARAYA", "22222222-2"),
    ("JUANA", "ARAYA", "10000013-K"),
  ] {
    c.create_enrollment(enrollment(json!({
      "student": { "nombres": names, "apellidoPaterno": surname, "rut": rut },
    })))
    .await
    .unwrap();
  }

  let all = records::search_students(c.store(), &RosterQuery::default()).await.unwrap();
  let names: Vec<_> = all.iter().map(|e| e.full_name.as_str()).collect();
  assert_eq!(names, ["ARAYA JUANA", "ARAYA PEDRO", "ZUÑIGA ANA"]);

  let by_name = RosterQuery { nombre: Some("araya".into()), ..Default::default() };
  assert_eq!(records::search_students(c.store(), &by_name).await.unwrap().len(), 2);

  let by_rut = RosterQuery { rut: Some("10.000.013".into()), ..Default::default() };
  let found = records::search_students(c.store(), &by_rut).await.unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].full_name, "ARAYA JUANA");
}

#[tokio::test]
async fn rut_lookup() {
  let c = coordinator().await;
  let receipt = c.create_enrollment(enrollment(ana_with_luis())).await.unwrap();

  let found = records::lookup_rut(c.store(), "12.345.678-5").await.unwrap();
  assert!(found.exists);
  assert_eq!(found.person, Some(receipt.student));
  assert_eq!(found.formatted, "12.345.678-5");

  let missing = records::lookup_rut(c.store(), "10000013-k").await.unwrap();
  assert!(!missing.exists);

  let sentinel = records::lookup_rut(c.store(), "EXTRANJERO").await.unwrap();
  assert!(!sentinel.exists);

  let err = records::lookup_rut(c.store(), "12345678-0").await.unwrap_err();
  assert!(err.is_validation());
}

#[tokio::test]
async fn reference_tables_are_listed() {
  let c = coordinator().await;
  seed(
    c.store(),
    &[
      "INSERT INTO academic_years (id, name) VALUES (1, '2024'), (2, '2025')",
      "INSERT INTO prior_schools (id, name) VALUES (1, 'LICEO B'), (2, 'ESCUELA A')",
    ],
  )
  .await;

  let years = records::reference_table(c.store(), records::ReferenceTable::AcademicYears)
    .await
    .unwrap();
  assert_eq!(years[0].name, "2025");

  let schools = records::reference_table(c.store(), records::ReferenceTable::PriorSchools)
    .await
    .unwrap();
  let names: Vec<_> = schools.iter().map(|s| s.name.as_str()).collect();
  assert_eq!(names, ["SIN INFORMACIÓN", "ESCUELA A", "LICEO B"]);
  assert_eq!(schools[0].id, -1);
}
