//! `GET /references/{table}`: the lookup tables forms build their selects
//! from (`regions`, `comunas`, `nationalities`, `academic-years`, `courses`,
//! `study-plans`, `prior-schools`, `relationships`).

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use matricula_coordinator::{
  Coordinator,
  records::{self, ReferenceEntry, ReferenceTable},
};
use matricula_core::store::Datastore;

use crate::error::ApiError;

pub async fn list<D: Datastore>(
  State(coordinator): State<Arc<Coordinator<D>>>,
  Path(table): Path<String>,
) -> Result<Json<Vec<ReferenceEntry>>, ApiError> {
  let table = ReferenceTable::from_slug(&table)
    .ok_or_else(|| ApiError::NotFound(format!("unknown reference table {table:?}")))?;
  Ok(Json(records::reference_table(coordinator.store(), table).await?))
}
