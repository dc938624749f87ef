//! Handlers for `/students` read endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/students` | Optional `?ano=&curso=&rut=&nombre=` |
//! | `GET`  | `/students/{id}` | 404 if not found |
//! | `GET`  | `/students/{id}/guardian` | 404 if no guardian is linked |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use matricula_coordinator::{
  Coordinator,
  records::{self, GuardianRecord, RosterEntry, RosterQuery, StudentRecord},
};
use matricula_core::{person::PersonKey, store::Datastore};

use crate::error::ApiError;

/// `GET /students[?ano=<year>&curso=<course>&rut=<fragment>&nombre=<fragment>]`
pub async fn list<D: Datastore>(
  State(coordinator): State<Arc<Coordinator<D>>>,
  Query(filter): Query<RosterQuery>,
) -> Result<Json<Vec<RosterEntry>>, ApiError> {
  let roster = records::search_students(coordinator.store(), &filter).await?;
  Ok(Json(roster))
}

/// `GET /students/{id}`
pub async fn get_one<D: Datastore>(
  State(coordinator): State<Arc<Coordinator<D>>>,
  Path(id): Path<i64>,
) -> Result<Json<StudentRecord>, ApiError> {
  let student = records::student_detail(coordinator.store(), PersonKey(id))
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("student {id} not found")))?;
  Ok(Json(student))
}

/// `GET /students/{id}/guardian`
pub async fn guardian<D: Datastore>(
  State(coordinator): State<Arc<Coordinator<D>>>,
  Path(id): Path<i64>,
) -> Result<Json<GuardianRecord>, ApiError> {
  let guardian = records::guardian_of(coordinator.store(), PersonKey(id))
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("student {id} has no guardian")))?;
  Ok(Json(guardian))
}
