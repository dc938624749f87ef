//! JSON REST API for Matricula.
//!
//! Exposes an axum [`Router`] backed by a [`Coordinator`] over any
//! [`Datastore`]. Auth, TLS and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", matricula_api::api_router(coordinator.clone()))
//! ```

pub mod enrollments;
pub mod error;
pub mod family;
pub mod references;
pub mod rut;
pub mod students;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post, put},
};
use matricula_coordinator::Coordinator;
use matricula_core::store::Datastore;

pub use error::ApiError;

/// Build a fully-materialised API router for `coordinator`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<D>(coordinator: Arc<Coordinator<D>>) -> Router<()>
where
  D: Datastore + 'static,
{
  Router::new()
    // Enrollment writes
    .route("/enrollments", post(enrollments::create::<D>))
    .route("/enrollments/form", post(enrollments::create_from_form::<D>))
    .route("/students/{id}/enrollment", put(enrollments::update::<D>))
    // Student records
    .route("/students", get(students::list::<D>))
    .route("/students/{id}", get(students::get_one::<D>))
    .route("/students/{id}/guardian", get(students::guardian::<D>))
    .route("/students/{id}/family", get(family::list::<D>))
    .route("/students/{id}/family/{relationship}", get(family::get_one::<D>))
    .route("/family-members/{id}", delete(family::remove::<D>))
    // Lookups
    .route("/rut/{rut}", get(rut::lookup::<D>))
    .route("/references/{table}", get(references::list::<D>))
    .with_state(coordinator)
}
