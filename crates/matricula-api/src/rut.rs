//! `GET /rut/{rut}`: validate a RUT and report whether anybody holds it.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use matricula_coordinator::{
  Coordinator,
  records::{self, RutLookup},
};
use matricula_core::store::Datastore;

use crate::error::ApiError;

/// 400 for a malformed RUT; sentinels are valid and never exist.
pub async fn lookup<D: Datastore>(
  State(coordinator): State<Arc<Coordinator<D>>>,
  Path(rut): Path<String>,
) -> Result<Json<RutLookup>, ApiError> {
  Ok(Json(records::lookup_rut(coordinator.store(), &rut).await?))
}
