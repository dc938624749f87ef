//! The transactional datastore abstraction.
//!
//! Backends (e.g. `matricula-store-sqlite`) implement [`Datastore`] and
//! [`Transaction`]. The coordinator issues parameterized SQL through these
//! traits and never talks to a concrete database.
//!
//! SQL uses positional `?` placeholders; parameters and result cells are
//! [`SqlValue`]s.

use std::{future::Future, sync::Arc};

use chrono::NaiveDate;

use crate::{Error, Result};

// ─── Values ──────────────────────────────────────────────────────────────────

/// A single SQL parameter or result cell.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
  Null,
  Integer(i64),
  Real(f64),
  Text(String),
}

impl SqlValue {
  fn kind(&self) -> &'static str {
    match self {
      Self::Null => "null",
      Self::Integer(_) => "integer",
      Self::Real(_) => "real",
      Self::Text(_) => "text",
    }
  }
}

impl From<i64> for SqlValue {
  fn from(v: i64) -> Self { Self::Integer(v) }
}

impl From<f64> for SqlValue {
  fn from(v: f64) -> Self { Self::Real(v) }
}

impl From<bool> for SqlValue {
  fn from(v: bool) -> Self { Self::Integer(i64::from(v)) }
}

impl From<String> for SqlValue {
  fn from(v: String) -> Self { Self::Text(v) }
}

impl From<&str> for SqlValue {
  fn from(v: &str) -> Self { Self::Text(v.to_owned()) }
}

/// Dates are stored as ISO 8601 text (`YYYY-MM-DD`).
impl From<NaiveDate> for SqlValue {
  fn from(v: NaiveDate) -> Self { Self::Text(v.format("%Y-%m-%d").to_string()) }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
  fn from(v: Option<T>) -> Self { v.map_or(Self::Null, Into::into) }
}

/// Conversion from a result cell into a Rust value.
pub trait FromSqlValue: Sized {
  fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self>;
}

fn mismatch(column: &str, expected: &'static str, value: &SqlValue) -> Error {
  Error::ColumnType { column: column.to_owned(), expected, found: value.kind() }
}

impl FromSqlValue for i64 {
  fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self> {
    match value {
      SqlValue::Integer(v) => Ok(*v),
      other => Err(mismatch(column, "integer", other)),
    }
  }
}

impl FromSqlValue for f64 {
  fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self> {
    match value {
      SqlValue::Real(v) => Ok(*v),
      SqlValue::Integer(v) => Ok(*v as f64),
      other => Err(mismatch(column, "real", other)),
    }
  }
}

/// Flags are stored as `0`/`1`.
impl FromSqlValue for bool {
  fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self> {
    match value {
      SqlValue::Integer(v) => Ok(*v != 0),
      other => Err(mismatch(column, "integer flag", other)),
    }
  }
}

impl FromSqlValue for String {
  fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self> {
    match value {
      SqlValue::Text(v) => Ok(v.clone()),
      SqlValue::Integer(v) => Ok(v.to_string()),
      other => Err(mismatch(column, "text", other)),
    }
  }
}

impl FromSqlValue for NaiveDate {
  fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self> {
    match value {
      SqlValue::Text(v) => NaiveDate::parse_from_str(v, "%Y-%m-%d").map_err(|_| {
        Error::ColumnDate { column: column.to_owned(), value: v.clone() }
      }),
      other => Err(mismatch(column, "date text", other)),
    }
  }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
  fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self> {
    match value {
      SqlValue::Null => Ok(None),
      other => T::from_sql_value(column, other).map(Some),
    }
  }
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// One result row. Column names are shared between all rows of a result.
#[derive(Debug, Clone)]
pub struct Row {
  columns: Arc<[String]>,
  values:  Vec<SqlValue>,
}

impl Row {
  pub fn new(columns: Arc<[String]>, values: Vec<SqlValue>) -> Self {
    Self { columns, values }
  }

  pub fn columns(&self) -> &[String] { &self.columns }

  pub fn values(&self) -> &[SqlValue] { &self.values }

  /// Read the named column as `T`.
  pub fn get<T: FromSqlValue>(&self, column: &str) -> Result<T> {
    let index = self
      .columns
      .iter()
      .position(|c| c == column)
      .ok_or_else(|| Error::MissingColumn(column.to_owned()))?;
    T::from_sql_value(column, &self.values[index])
  }
}

/// Result of a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Execution {
  pub rows_affected:  u64,
  /// Key generated by the most recent insert on this connection.
  pub last_insert_id: Option<i64>,
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// A relational store reachable through parameterized SQL.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait Datastore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;
  type Tx: Transaction<Error = Self::Error>;

  /// Open a transaction. The returned handle exclusively owns its
  /// connection until it is committed, rolled back or dropped.
  fn begin(&self) -> impl Future<Output = Result<Self::Tx, Self::Error>> + Send + '_;

  /// Run a read outside any caller-visible transaction. Never observes
  /// writes of a transaction that has not committed.
  fn query<'a>(
    &'a self,
    sql: &'a str,
    params: Vec<SqlValue>,
  ) -> impl Future<Output = Result<Vec<Row>, Self::Error>> + Send + 'a;
}

/// An open transaction.
///
/// Dropping a transaction without calling [`commit`](Transaction::commit)
/// or [`rollback`](Transaction::rollback) must roll it back.
pub trait Transaction: Send {
  type Error: std::error::Error + Send + Sync + 'static;

  fn query<'a>(
    &'a mut self,
    sql: &'a str,
    params: Vec<SqlValue>,
  ) -> impl Future<Output = Result<Vec<Row>, Self::Error>> + Send + 'a;

  fn execute<'a>(
    &'a mut self,
    sql: &'a str,
    params: Vec<SqlValue>,
  ) -> impl Future<Output = Result<Execution, Self::Error>> + Send + 'a;

  fn commit(self) -> impl Future<Output = Result<(), Self::Error>> + Send;

  fn rollback(self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

#[cfg(test)]
mod tests {
  use super::*;

  fn row() -> Row {
    Row::new(
      vec!["id".to_owned(), "name".to_owned(), "born".to_owned(), "flag".to_owned(), "gone".to_owned()]
        .into(),
      vec![
        SqlValue::Integer(7),
        SqlValue::Text("ANA".into()),
        SqlValue::Text("2015-03-09".into()),
        SqlValue::Integer(1),
        SqlValue::Null,
      ],
    )
  }

  #[test]
  fn typed_access() {
    let row = row();
    assert_eq!(row.get::<i64>("id").unwrap(), 7);
    assert_eq!(row.get::<String>("name").unwrap(), "ANA");
    assert_eq!(
      row.get::<NaiveDate>("born").unwrap(),
      NaiveDate::from_ymd_opt(2015, 3, 9).unwrap()
    );
    assert!(row.get::<bool>("flag").unwrap());
    assert_eq!(row.get::<Option<String>>("gone").unwrap(), None);
  }

  #[test]
  fn wrong_type_and_missing_column() {
    let row = row();
    assert!(matches!(row.get::<i64>("name"), Err(Error::ColumnType { .. })));
    assert!(matches!(row.get::<i64>("nope"), Err(Error::MissingColumn(_))));
    assert!(matches!(row.get::<String>("gone"), Err(Error::ColumnType { .. })));
  }

  #[test]
  fn option_parameters_become_null() {
    assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
    assert_eq!(SqlValue::from(Some("x")), SqlValue::Text("x".into()));
    assert_eq!(SqlValue::from(true), SqlValue::Integer(1));
  }
}
