//! Statement helpers shared by the resolver, writer, link and record queries.

use matricula_core::{
  Field,
  store::{Execution, Row, SqlValue, Transaction},
};

use crate::WriteError;

pub async fn execute<T: Transaction>(
  tx: &mut T,
  sql: &str,
  params: Vec<SqlValue>,
) -> Result<Execution, WriteError> {
  tx.execute(sql, params).await.map_err(WriteError::store)
}

pub async fn query<T: Transaction>(
  tx: &mut T,
  sql: &str,
  params: Vec<SqlValue>,
) -> Result<Vec<Row>, WriteError> {
  tx.query(sql, params).await.map_err(WriteError::store)
}

/// The integer `column` of the first row, if any.
pub fn first_key(rows: &[Row], column: &str) -> Result<Option<i64>, WriteError> {
  rows.first().map(|row| row.get::<i64>(column)).transpose().map_err(WriteError::from)
}

/// Run a single-key `SELECT` and fail with `NotFound` when it matches nothing.
pub async fn ensure_exists<T: Transaction>(
  tx: &mut T,
  entity: &'static str,
  sql: &str,
  key: i64,
) -> Result<(), WriteError> {
  let rows = query(tx, sql, vec![key.into()]).await?;
  if rows.is_empty() {
    return Err(WriteError::NotFound { entity, key });
  }
  Ok(())
}

/// Turn a key returned by an `INSERT` into a typed key.
pub fn inserted(execution: Execution, table: &'static str) -> Result<i64, WriteError> {
  execution
    .last_insert_id
    .ok_or(WriteError::Incomplete(table))
}

// ─── Column lists ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
  /// Every column is written; absent input becomes the column default.
  Insert,
  /// Only provided input is written.
  Update,
}

/// Column/value pairs for one `INSERT` or `UPDATE` statement.
#[derive(Debug)]
pub struct Columns {
  mode:   Mode,
  names:  Vec<&'static str>,
  values: Vec<SqlValue>,
}

impl Columns {
  pub fn new(mode: Mode) -> Self { Self { mode, names: Vec::new(), values: Vec::new() } }

  pub fn is_empty(&self) -> bool { self.names.is_empty() }

  /// Always write `value`.
  pub fn set(&mut self, name: &'static str, value: impl Into<SqlValue>) {
    self.names.push(name);
    self.values.push(value.into());
  }

  /// Write `field` through `encode`; absent or cleared input becomes `NULL`.
  pub fn field<T, V: Into<SqlValue>>(
    &mut self,
    name: &'static str,
    field: &Field<T>,
    encode: impl FnOnce(&T) -> V,
  ) {
    self.field_or(name, field, encode, SqlValue::Null);
  }

  /// Like [`field`](Self::field), with a non-null value for absent or
  /// cleared input.
  pub fn field_or<T, V: Into<SqlValue>>(
    &mut self,
    name: &'static str,
    field: &Field<T>,
    encode: impl FnOnce(&T) -> V,
    default: impl Into<SqlValue>,
  ) {
    let value = match (field, self.mode) {
      (Field::Missing, Mode::Update) => return,
      (Field::Value(v), _) => encode(v).into(),
      (Field::Missing | Field::Null, _) => default.into(),
    };
    self.set(name, value);
  }

  pub fn insert(self, table: &str) -> (String, Vec<SqlValue>) {
    let marks = vec!["?"; self.names.len()].join(", ");
    let sql = format!("INSERT INTO {table} ({}) VALUES ({marks})", self.names.join(", "));
    (sql, self.values)
  }

  pub fn update(self, table: &str, key_column: &str, key: i64) -> (String, Vec<SqlValue>) {
    let assignments = self
      .names
      .iter()
      .map(|name| format!("{name} = ?"))
      .collect::<Vec<_>>()
      .join(", ");
    let sql = format!("UPDATE {table} SET {assignments} WHERE {key_column} = ?");
    let mut values = self.values;
    values.push(key.into());
    (sql, values)
  }
}
