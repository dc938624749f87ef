//! Conversions between [`SqlValue`] and the values rusqlite binds and reads.
//!
//! SQLite has no boolean or date type: flags arrive as integers and dates as
//! ISO 8601 text, already encoded by [`SqlValue`]'s `From` impls.

use std::sync::Arc;

use matricula_core::store::{Row, SqlValue};
use rusqlite::types::Value;

pub fn encode_value(value: SqlValue) -> Value {
  match value {
    SqlValue::Null => Value::Null,
    SqlValue::Integer(v) => Value::Integer(v),
    SqlValue::Real(v) => Value::Real(v),
    SqlValue::Text(v) => Value::Text(v),
  }
}

pub fn decode_value(value: Value) -> SqlValue {
  match value {
    Value::Null => SqlValue::Null,
    Value::Integer(v) => SqlValue::Integer(v),
    Value::Real(v) => SqlValue::Real(v),
    Value::Text(v) => SqlValue::Text(v),
    // Nothing in the schema stores blobs; surface them as text.
    Value::Blob(v) => SqlValue::Text(String::from_utf8_lossy(&v).into_owned()),
  }
}

pub fn encode_params(params: Vec<SqlValue>) -> Vec<Value> {
  params.into_iter().map(encode_value).collect()
}

/// Run `sql` and collect every result row.
pub fn query_rows(
  conn: &rusqlite::Connection,
  sql: &str,
  params: Vec<Value>,
) -> rusqlite::Result<Vec<Row>> {
  let mut stmt = conn.prepare(sql)?;
  let columns: Arc<[String]> =
    stmt.column_names().into_iter().map(str::to_owned).collect();
  let width = columns.len();

  let mut rows = stmt.query(rusqlite::params_from_iter(params))?;
  let mut out = Vec::new();
  while let Some(row) = rows.next()? {
    let values = (0..width)
      .map(|i| row.get::<_, Value>(i).map(decode_value))
      .collect::<rusqlite::Result<Vec<_>>>()?;
    out.push(Row::new(Arc::clone(&columns), values));
  }
  Ok(out)
}

/// Whether `sql` is an `INSERT`, so its rowid is meaningful.
pub fn is_insert(sql: &str) -> bool {
  sql
    .trim_start()
    .get(..6)
    .is_some_and(|head| head.eq_ignore_ascii_case("insert"))
}
