//! The transaction orchestrator.
//!
//! [`Coordinator`] runs each enrollment operation as one all-or-nothing
//! transaction: requests are validated up front, then every resolver,
//! writer and link call runs in order inside a single [`Transaction`]. The
//! first failing step stops the pipeline, the transaction is rolled back,
//! and the error names the step.
//!
//! ```text
//! create:  begin → guardian person → student → guardian profile → link
//!                → family member 1..N → commit
//! update:  begin → student → (guardian: resolve, write, link)?
//!                → (family)? → commit
//! ```

use std::{future::Future, time::Duration};

use matricula_core::{
  enrollment::{EnrollmentUpdate, GuardianSection, NewEnrollment, StudentSection},
  family::{FamilyMemberFields, FamilyMemberKey},
  guardian::GuardianKey,
  person::{PersonFields, PersonKey, Role},
  store::{Datastore, Transaction},
};
use tracing::{Span, error, field, info, instrument, warn};
use uuid::Uuid;

use crate::{
  Error, Result, Step, TxStage, WriteError, link, resolver, writer,
};

type StepResult<T> = std::result::Result<T, (Step, WriteError)>;

/// Keys produced or touched by a committed enrollment operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentReceipt {
  /// Correlates the operation's log lines.
  pub operation_id:    Uuid,
  pub student:         PersonKey,
  pub guardian:        Option<GuardianKey>,
  pub guardian_person: Option<PersonKey>,
  /// The guardian's person record already existed and was reused.
  pub guardian_reused: bool,
  pub family_members:  Vec<FamilyMemberKey>,
}

// ─── Coordinator ─────────────────────────────────────────────────────────────

/// Runs enrollment operations against an injected datastore.
pub struct Coordinator<D> {
  store:        D,
  step_timeout: Option<Duration>,
}

impl<D: Datastore> Coordinator<D> {
  pub fn new(store: D) -> Self { Self { store, step_timeout: None } }

  /// Fail any step (and `begin`/`commit`) that takes longer than `limit`.
  pub fn with_step_timeout(mut self, limit: Option<Duration>) -> Self {
    self.step_timeout = limit;
    self
  }

  pub fn store(&self) -> &D { &self.store }

  /// Create Full Enrollment.
  ///
  /// The student is always a new person. The guardian, when present, is
  /// found by national ID and reused, or created. Family members are
  /// upserted by relationship.
  #[instrument(skip_all, fields(operation_id = field::Empty))]
  pub async fn create_enrollment(&self, request: NewEnrollment) -> Result<EnrollmentReceipt> {
    if let Err(error) = request.validate() {
      info!(%error, "enrollment rejected");
      return Err(error.into());
    }

    let operation_id = operation_id();
    let mut tx = self.begin().await?;
    let written = self.write_enrollment(&mut tx, &request, operation_id).await;
    let receipt = self.conclude(tx, written).await?;
    info!(
      student = %receipt.student,
      guardian = ?receipt.guardian,
      family = receipt.family_members.len(),
      "enrollment committed"
    );
    Ok(receipt)
  }

  /// Update Existing Enrollment of `student`.
  ///
  /// Guardian and family sections are optional; once supplied they must be
  /// written completely or the whole update rolls back.
  #[instrument(skip(self, request), fields(operation_id = field::Empty))]
  pub async fn update_enrollment(
    &self,
    student: PersonKey,
    request: EnrollmentUpdate,
  ) -> Result<EnrollmentReceipt> {
    if let Err(error) = request.validate() {
      info!(%error, "enrollment update rejected");
      return Err(error.into());
    }

    let operation_id = operation_id();
    let mut tx = self.begin().await?;
    let written = self.revise_enrollment(&mut tx, student, &request, operation_id).await;
    let receipt = self.conclude(tx, written).await?;
    info!(guardian = ?receipt.guardian, "enrollment update committed");
    Ok(receipt)
  }

  /// Delete one family member row.
  #[instrument(skip(self), fields(operation_id = field::Empty))]
  pub async fn remove_family_member(&self, key: FamilyMemberKey) -> Result<()> {
    operation_id();
    let mut tx = self.begin().await?;
    let written = self
      .step(Step::RemoveFamilyMember, writer::delete_family_member(&mut tx, key))
      .await;
    self.conclude(tx, written).await?;
    info!("family member removed");
    Ok(())
  }

  // ── Pipelines ─────────────────────────────────────────────────────────────

  async fn write_enrollment(
    &self,
    tx: &mut D::Tx,
    request: &NewEnrollment,
    operation_id: Uuid,
  ) -> StepResult<EnrollmentReceipt> {
    let guardian_person = match &request.guardian {
      Some(section) => Some(
        self
          .step(Step::GuardianPerson, find_or_create(tx, &section.person, Role::Guardian))
          .await?,
      ),
      None => None,
    };

    let student = self.step(Step::Student, create_student(tx, &request.student)).await?;

    let guardian = match (&request.guardian, guardian_person) {
      (Some(section), Some((person, _))) => Some(
        self
          .step(
            Step::GuardianProfile,
            writer::upsert_guardian_profile(tx, person, &section.profile),
          )
          .await?,
      ),
      _ => None,
    };

    if let Some(guardian) = guardian {
      self
        .step(Step::Link, link::link_guardian_to_student(tx, student, guardian))
        .await?;
    }

    let mut family_members = Vec::with_capacity(request.family.len());
    for (i, member) in request.family.iter().enumerate() {
      let key = self
        .step(Step::FamilyMember(i + 1), writer::upsert_family_member(tx, student, member))
        .await?;
      family_members.push(key);
    }

    Ok(EnrollmentReceipt {
      operation_id,
      student,
      guardian,
      guardian_person: guardian_person.map(|(person, _)| person),
      guardian_reused: guardian_person.is_some_and(|(_, reused)| reused),
      family_members,
    })
  }

  async fn revise_enrollment(
    &self,
    tx: &mut D::Tx,
    student: PersonKey,
    request: &EnrollmentUpdate,
    operation_id: Uuid,
  ) -> StepResult<EnrollmentReceipt> {
    self
      .step(Step::StudentUpdate, update_student(tx, student, &request.student))
      .await?;

    let attached = match &request.guardian {
      Some(section) => Some(
        self
          .step(Step::GuardianUpdate, attach_guardian(tx, student, section))
          .await?,
      ),
      None => None,
    };

    let family_members = if request.family.is_empty() {
      Vec::new()
    } else {
      self
        .step(Step::FamilyUpdate, upsert_family(tx, student, &request.family))
        .await?
    };

    Ok(EnrollmentReceipt {
      operation_id,
      student,
      guardian: attached.map(|(guardian, _, _)| guardian),
      guardian_person: attached.map(|(_, person, _)| person),
      guardian_reused: attached.is_some_and(|(_, _, reused)| reused),
      family_members,
    })
  }

  // ── Transaction control ───────────────────────────────────────────────────

  async fn within<F: Future>(&self, work: F) -> std::result::Result<F::Output, Duration> {
    match self.step_timeout {
      Some(limit) => tokio::time::timeout(limit, work).await.map_err(|_| limit),
      None => Ok(work.await),
    }
  }

  async fn step<T>(
    &self,
    step: Step,
    work: impl Future<Output = std::result::Result<T, WriteError>>,
  ) -> StepResult<T> {
    match self.within(work).await {
      Ok(result) => result.map_err(|error| (step, error)),
      Err(limit) => Err((step, WriteError::Timeout(limit))),
    }
  }

  async fn begin(&self) -> Result<D::Tx> {
    let stage = TxStage::Begin;
    match self.within(self.store.begin()).await {
      Ok(Ok(tx)) => Ok(tx),
      Ok(Err(source)) => Err(Error::Transaction { stage, source: Box::new(source) }),
      Err(limit) => Err(Error::Transaction {
        stage,
        source: Box::new(WriteError::Timeout(limit)),
      }),
    }
  }

  /// Commit on success, otherwise roll back and report the failed step.
  async fn conclude<T>(&self, tx: D::Tx, written: StepResult<T>) -> Result<T> {
    let stage = TxStage::Commit;
    match written {
      Ok(value) => match self.within(tx.commit()).await {
        Ok(Ok(())) => Ok(value),
        Ok(Err(source)) => Err(Error::Transaction { stage, source: Box::new(source) }),
        // The dropped commit future took the transaction with it; the store
        // rolls back whatever it left open.
        Err(limit) => Err(Error::Transaction {
          stage,
          source: Box::new(WriteError::Timeout(limit)),
        }),
      },
      Err((step, source)) => {
        warn!(%step, error = %source, "step failed; rolling back");
        match tx.rollback().await {
          Ok(()) => Err(Error::Step { step, source }),
          Err(rollback) => {
            error!(%step, %rollback, "rollback failed");
            Err(Error::RollbackFailed { step, source, rollback: Box::new(rollback) })
          }
        }
      }
    }
  }
}

/// A fresh id for the current operation, recorded on its span.
fn operation_id() -> Uuid {
  let id = Uuid::new_v4();
  Span::current().record("operation_id", field::display(id));
  id
}

// ─── Steps ───────────────────────────────────────────────────────────────────

/// Resolve `person` by national ID and update it, or create it. Returns the
/// key and whether it already existed.
async fn find_or_create<T: Transaction>(
  tx: &mut T,
  person: &PersonFields,
  role: Role,
) -> std::result::Result<(PersonKey, bool), WriteError> {
  let existing = match person.national_id.as_value() {
    Some(id) => resolver::resolve(tx, id, role).await?,
    None => None,
  };
  if let Some(key) = existing {
    info!(person = %key, %role, "reusing existing person");
  }
  let key = writer::upsert_person(tx, existing, person).await?;
  Ok((key, existing.is_some()))
}

async fn create_student<T: Transaction>(
  tx: &mut T,
  section: &StudentSection,
) -> std::result::Result<PersonKey, WriteError> {
  if let Some(id) = section.person.national_id.as_value() {
    if let Some(existing) = resolver::resolve(tx, id, Role::Student).await? {
      warn!(%existing, rut = %id, "student national ID already on file; enrolling as a new person");
    }
  }
  let key = writer::upsert_person(tx, None, &section.person).await?;
  writer::upsert_student_profile(tx, key, &section.profile).await?;
  writer::assign_course(tx, key, &section.profile).await?;
  Ok(key)
}

async fn update_student<T: Transaction>(
  tx: &mut T,
  student: PersonKey,
  section: &StudentSection,
) -> std::result::Result<(), WriteError> {
  if !writer::student_exists(tx, student).await? {
    return Err(WriteError::NotFound { entity: "student", key: student.0 });
  }
  writer::upsert_person(tx, Some(student), &section.person).await?;
  writer::upsert_student_profile(tx, student, &section.profile).await?;
  writer::assign_course(tx, student, &section.profile).await
}

async fn attach_guardian<T: Transaction>(
  tx: &mut T,
  student: PersonKey,
  section: &GuardianSection,
) -> std::result::Result<(GuardianKey, PersonKey, bool), WriteError> {
  let (person, reused) = find_or_create(tx, &section.person, Role::Guardian).await?;
  let guardian = writer::upsert_guardian_profile(tx, person, &section.profile).await?;
  link::link_guardian_to_student(tx, student, guardian).await?;
  Ok((guardian, person, reused))
}

async fn upsert_family<T: Transaction>(
  tx: &mut T,
  student: PersonKey,
  family: &[FamilyMemberFields],
) -> std::result::Result<Vec<FamilyMemberKey>, WriteError> {
  let mut keys = Vec::with_capacity(family.len());
  for member in family {
    keys.push(writer::upsert_family_member(tx, student, member).await?);
  }
  Ok(keys)
}
