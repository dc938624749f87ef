//! Handlers for family members.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use matricula_coordinator::{
  Coordinator, EnrollmentOutcome,
  records::{self, FamilyMemberRecord},
};
use matricula_core::{family::FamilyMemberKey, person::PersonKey, store::Datastore};

use crate::error::ApiError;

/// `GET /students/{id}/family`
pub async fn list<D: Datastore>(
  State(coordinator): State<Arc<Coordinator<D>>>,
  Path(id): Path<i64>,
) -> Result<Json<Vec<FamilyMemberRecord>>, ApiError> {
  let family = records::family_of(coordinator.store(), PersonKey(id)).await?;
  Ok(Json(family))
}

/// `GET /students/{id}/family/{relationship}`
pub async fn get_one<D: Datastore>(
  State(coordinator): State<Arc<Coordinator<D>>>,
  Path((id, relationship)): Path<(i64, i64)>,
) -> Result<Json<FamilyMemberRecord>, ApiError> {
  let member = records::family_member(coordinator.store(), PersonKey(id), relationship)
    .await?
    .ok_or_else(|| {
      ApiError::NotFound(format!("student {id} has no family member with relationship {relationship}"))
    })?;
  Ok(Json(member))
}

/// `DELETE /family-members/{id}`
pub async fn remove<D: Datastore>(
  State(coordinator): State<Arc<Coordinator<D>>>,
  Path(id): Path<i64>,
) -> Result<Json<EnrollmentOutcome>, ApiError> {
  coordinator.remove_family_member(FamilyMemberKey(id)).await?;
  Ok(Json(EnrollmentOutcome::done("Familiar eliminado correctamente")))
}
