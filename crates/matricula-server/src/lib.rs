//! HTTP server assembly for Matricula.
//!
//! Wires a [`Coordinator`] into the JSON API under `/api` and wraps it in
//! request tracing.

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::Router;
use matricula_coordinator::Coordinator;
use matricula_core::store::Datastore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `matricula.toml` and
/// `MATRICULA_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:            String,
  pub port:            u16,
  pub store_path:      PathBuf,
  /// Per-step datastore timeout; unset means steps may run indefinitely.
  #[serde(default)]
  pub step_timeout_ms: Option<u64>,
}

impl ServerConfig {
  pub fn step_timeout(&self) -> Option<Duration> {
    self.step_timeout_ms.map(Duration::from_millis)
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the application router: the API nested under `/api`.
pub fn app<D>(coordinator: Arc<Coordinator<D>>) -> Router
where
  D: Datastore + 'static,
{
  Router::new()
    .nest("/api", matricula_api::api_router(coordinator))
    .layer(TraceLayer::new_for_http())
}
