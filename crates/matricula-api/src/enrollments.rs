//! Handlers for the enrollment write endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/enrollments` | Sectioned body; 201 |
//! | `POST` | `/enrollments/form` | Flat role-suffixed form body; 201 |
//! | `PUT`  | `/students/{id}/enrollment` | Sectioned body |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State, rejection::JsonRejection},
  http::StatusCode,
};
use matricula_coordinator::{Coordinator, EnrollmentOutcome, mapping::Sections};
use matricula_core::{person::PersonKey, store::Datastore};
use serde_json::Value;

use crate::error::ApiError;

fn payload(body: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
  body
    .map(|Json(value)| value)
    .map_err(|e| ApiError::BadRequest(e.body_text()))
}

/// `POST /enrollments`
///
/// Body: `{"student": {..}, "guardian": {..}, "familyMembers": [{..}]}`.
pub async fn create<D: Datastore>(
  State(coordinator): State<Arc<Coordinator<D>>>,
  body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<EnrollmentOutcome>), ApiError> {
  let request = Sections::from_sectioned(payload(body)?)?.into_new_enrollment()?;
  let receipt = coordinator.create_enrollment(request).await?;
  Ok((
    StatusCode::CREATED,
    Json(EnrollmentOutcome::succeeded("Alumno registrado correctamente", &receipt)),
  ))
}

/// `POST /enrollments/form`
///
/// Body: one flat object, e.g. `{"rut": .., "rutApoderado": .., "rut_1": ..}`.
pub async fn create_from_form<D: Datastore>(
  State(coordinator): State<Arc<Coordinator<D>>>,
  body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<EnrollmentOutcome>), ApiError> {
  let Value::Object(flat) = payload(body)? else {
    return Err(ApiError::BadRequest("form body must be a JSON object".into()));
  };
  let request = Sections::from_flat(flat).into_new_enrollment()?;
  let receipt = coordinator.create_enrollment(request).await?;
  Ok((
    StatusCode::CREATED,
    Json(EnrollmentOutcome::succeeded("Alumno registrado correctamente", &receipt)),
  ))
}

/// `PUT /students/{id}/enrollment`
pub async fn update<D: Datastore>(
  State(coordinator): State<Arc<Coordinator<D>>>,
  Path(id): Path<i64>,
  body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<EnrollmentOutcome>, ApiError> {
  let request = Sections::from_sectioned(payload(body)?)?.into_update()?;
  let receipt = coordinator.update_enrollment(PersonKey(id), request).await?;
  Ok(Json(EnrollmentOutcome::succeeded(
    "Datos del alumno actualizados correctamente",
    &receipt,
  )))
}
