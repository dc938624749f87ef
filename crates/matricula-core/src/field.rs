//! [`Field`]: one input attribute that may be absent, cleared, or set.
//!
//! Inserts treat absent and cleared alike (the column becomes `NULL`).
//! Updates only touch attributes that are cleared or set, leaving absent ones
//! as they are.

/// A tri-state input value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Field<T> {
  /// The caller did not mention this attribute.
  #[default]
  Missing,
  /// The caller explicitly supplied an empty value.
  Null,
  Value(T),
}

impl<T> Field<T> {
  pub fn is_missing(&self) -> bool { matches!(self, Self::Missing) }

  pub fn is_null(&self) -> bool { matches!(self, Self::Null) }

  /// `true` for [`Field::Null`] and [`Field::Value`].
  pub fn is_provided(&self) -> bool { !self.is_missing() }

  pub fn as_value(&self) -> Option<&T> {
    match self {
      Self::Value(v) => Some(v),
      Self::Missing | Self::Null => None,
    }
  }

  /// Collapse to the value that an insert would store.
  pub fn into_value(self) -> Option<T> {
    match self {
      Self::Value(v) => Some(v),
      Self::Missing | Self::Null => None,
    }
  }

  pub fn as_ref(&self) -> Field<&T> {
    match self {
      Self::Missing => Field::Missing,
      Self::Null => Field::Null,
      Self::Value(v) => Field::Value(v),
    }
  }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Field<U> {
    match self {
      Self::Missing => Field::Missing,
      Self::Null => Field::Null,
      Self::Value(v) => Field::Value(f(v)),
    }
  }
}

impl<T> From<T> for Field<T> {
  fn from(value: T) -> Self { Self::Value(value) }
}
