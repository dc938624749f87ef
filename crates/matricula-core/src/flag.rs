//! Boolean normalization for form-submitted flags.
//!
//! Forms have historically sent the same yes/no answer as `true`, `1`,
//! `"true"`, `"1"`, `"Si"`, `"Sí"` or `"S"`. Every one of those is "yes";
//! anything else, including `null`, is "no". Stored flags are always `0`/`1`.

use serde_json::Value;

/// Collapse any accepted "yes" representation to `true`, everything else to
/// `false`.
pub fn normalize(value: &Value) -> bool {
  match value {
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_i64() == Some(1) || n.as_f64() == Some(1.0),
    Value::String(s) => is_yes(s),
    Value::Null | Value::Array(_) | Value::Object(_) => false,
  }
}

/// String form of [`normalize`].
pub fn is_yes(s: &str) -> bool {
  matches!(
    s.trim().to_lowercase().as_str(),
    "true" | "1" | "si" | "sí" | "s"
  )
}

/// The stored representation of a flag.
pub fn stored(flag: bool) -> i64 { i64::from(flag) }

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn yes_representations() {
    for v in [json!(true), json!(1), json!(1.0), json!("true"), json!("TRUE"), json!("1"), json!("Si"), json!("SI"), json!("sí"), json!("S")] {
      assert!(normalize(&v), "{v}");
    }
  }

  #[test]
  fn everything_else_is_no() {
    for v in [json!(false), json!(0), json!(2), json!("false"), json!("No"), json!("N"), json!(""), json!(null), json!([1]), json!({"a": 1}), json!("yes please")] {
      assert!(!normalize(&v), "{v}");
    }
  }

  #[test]
  fn stored_is_zero_or_one() {
    assert_eq!(stored(true), 1);
    assert_eq!(stored(false), 0);
  }
}
