//! [`SqliteStore`]: the SQLite implementation of [`Datastore`].

use std::{path::Path, sync::Arc};

use matricula_core::store::{Datastore, Execution, Row, SqlValue, Transaction};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::{
  Error, Result,
  encode::{encode_params, is_insert, query_rows},
  schema::{SCHEMA, SCHEMA_VERSION},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An enrollment store backed by a single SQLite connection.
///
/// Cloning is cheap; clones share the connection. At most one
/// [`SqliteTransaction`] is open at a time: [`begin`](Datastore::begin) waits
/// for the previous one to finish, and so do autocommit reads.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
  gate: Arc<Mutex<()>>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    let found: i64 = conn
      .call(|conn| Ok(conn.query_row("PRAGMA user_version", [], |r| r.get(0))?))
      .await?;
    if found > SCHEMA_VERSION {
      return Err(Error::SchemaVersion { found, supported: SCHEMA_VERSION });
    }

    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    debug!(version = SCHEMA_VERSION, "sqlite schema ready");

    Ok(Self { conn, gate: Arc::new(Mutex::new(())) })
  }
}

/// Roll back a transaction left open by a handle that was dropped without a
/// runtime to schedule its rollback.
fn recover(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
  if !conn.is_autocommit() {
    warn!("rolling back a transaction abandoned by a previous caller");
    conn.execute_batch("ROLLBACK")?;
  }
  Ok(())
}

async fn run_batch(conn: &tokio_rusqlite::Connection, sql: &'static str) -> Result<()> {
  conn
    .call(move |conn| {
      conn.execute_batch(sql)?;
      Ok(())
    })
    .await?;
  Ok(())
}

// ─── Datastore impl ──────────────────────────────────────────────────────────

impl Datastore for SqliteStore {
  type Error = Error;
  type Tx = SqliteTransaction;

  async fn begin(&self) -> Result<SqliteTransaction> {
    let guard = Arc::clone(&self.gate).lock_owned().await;
    self
      .conn
      .call(|conn| {
        recover(conn)?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
      })
      .await?;
    Ok(SqliteTransaction { conn: self.conn.clone(), guard: Some(guard) })
  }

  async fn query<'a>(&'a self, sql: &'a str, params: Vec<SqlValue>) -> Result<Vec<Row>> {
    let _guard = self.gate.lock().await;
    let sql = sql.to_owned();
    let params = encode_params(params);
    let rows = self
      .conn
      .call(move |conn| {
        recover(conn)?;
        Ok(query_rows(conn, &sql, params)?)
      })
      .await?;
    Ok(rows)
  }
}

// ─── Transaction ─────────────────────────────────────────────────────────────

/// An open `BEGIN IMMEDIATE` transaction.
///
/// Holds the store's gate until it is committed or rolled back. Dropping it
/// while open schedules a `ROLLBACK` on the current tokio runtime and keeps
/// the gate locked until that rollback has run.
pub struct SqliteTransaction {
  conn:  tokio_rusqlite::Connection,
  guard: Option<OwnedMutexGuard<()>>,
}

impl SqliteTransaction {
  fn finish(&mut self) { self.guard.take(); }
}

impl Transaction for SqliteTransaction {
  type Error = Error;

  async fn query<'a>(
    &'a mut self,
    sql: &'a str,
    params: Vec<SqlValue>,
  ) -> Result<Vec<Row>> {
    let sql = sql.to_owned();
    let params = encode_params(params);
    let rows = self
      .conn
      .call(move |conn| Ok(query_rows(conn, &sql, params)?))
      .await?;
    Ok(rows)
  }

  async fn execute<'a>(
    &'a mut self,
    sql: &'a str,
    params: Vec<SqlValue>,
  ) -> Result<Execution> {
    let insert = is_insert(sql);
    let sql = sql.to_owned();
    let params = encode_params(params);
    let execution = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(&sql, rusqlite::params_from_iter(params))?;
        Ok(Execution {
          rows_affected:  changed as u64,
          last_insert_id: insert.then(|| conn.last_insert_rowid()),
        })
      })
      .await?;
    Ok(execution)
  }

  async fn commit(mut self) -> Result<()> {
    let committed = run_batch(&self.conn, "COMMIT").await;
    if let Err(error) = committed {
      // A failed COMMIT may leave the transaction open.
      if let Err(rollback) = run_batch(&self.conn, "ROLLBACK").await {
        debug!(%rollback, "rollback after failed commit");
      }
      self.finish();
      return Err(error);
    }
    self.finish();
    Ok(())
  }

  async fn rollback(mut self) -> Result<()> {
    let result = run_batch(&self.conn, "ROLLBACK").await;
    self.finish();
    result
  }
}

impl Drop for SqliteTransaction {
  fn drop(&mut self) {
    let Some(guard) = self.guard.take() else {
      return;
    };
    warn!("transaction dropped while open; rolling back");

    let conn = self.conn.clone();
    match tokio::runtime::Handle::try_current() {
      Ok(handle) => {
        handle.spawn(async move {
          if let Err(error) = run_batch(&conn, "ROLLBACK").await {
            warn!(%error, "rollback of dropped transaction failed");
          }
          drop(guard);
        });
      }
      // The next caller through the gate rolls it back instead.
      Err(_) => drop(guard),
    }
  }
}
