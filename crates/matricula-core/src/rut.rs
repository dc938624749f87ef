//! Chilean national identity numbers (RUT).
//!
//! A RUT is a 7–8 digit body followed by a check character (`0`–`9` or `K`)
//! computed with the modulo-11 algorithm. People without a usable number are
//! recorded with one of two sentinels, [`FOREIGN`] and [`UNKNOWN`], which are
//! always accepted and never identify anybody.
//!
//! [`validate`] and [`format`] are total: malformed input yields `false` or
//! is returned unchanged, never a panic.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Sentinel for foreign nationals without a Chilean RUT.
pub const FOREIGN: &str = "EXTRANJERO";

/// Sentinel for a person whose RUT is not known.
pub const UNKNOWN: &str = "SIN RUT";

// ─── Free functions ──────────────────────────────────────────────────────────

/// `true` if `id` is a sentinel or a well-formed RUT with a matching check
/// character.
pub fn validate(id: &str) -> bool { id.parse::<NationalId>().is_ok() }

/// Re-insert thousands separators and the check-digit separator
/// (`12345678-5` → `12.345.678-5`).
///
/// Sentinels and input that does not have the shape of a RUT are returned
/// unchanged. The check character is not verified here.
pub fn format(id: &str) -> String {
  if sentinel(id).is_some() {
    return id.to_owned();
  }
  match split(&clean(id)) {
    Some((body, check)) => format!("{}-{check}", group_thousands(body)),
    None => id.to_owned(),
  }
}

/// Compute the check character for a run of digits.
///
/// Digits are weighted right to left with the cycle 2, 3, 4, 5, 6, 7, 2, …;
/// the check is `11 - (sum mod 11)` with 11 → `0` and 10 → `K`. The sum is
/// reduced as it goes, so bodies of any length are accepted.
pub fn check_digit(body: &str) -> char {
  let mut sum = 0u32;
  let mut weight = 2u32;
  for digit in body.chars().rev().filter_map(|c| c.to_digit(10)) {
    sum = (sum + digit * weight) % 11;
    weight = if weight == 7 { 2 } else { weight + 1 };
  }
  match 11 - sum % 11 {
    11 => '0',
    10 => 'K',
    d => char::from(b'0' + d as u8),
  }
}

/// Strip separators and surrounding whitespace, upper-casing the rest.
fn clean(id: &str) -> String {
  id.trim()
    .chars()
    .filter(|c| *c != '.' && *c != '-')
    .flat_map(char::to_uppercase)
    .collect()
}

/// Split a cleaned value into `(body, check)` if it has the shape of a RUT.
fn split(cleaned: &str) -> Option<(&str, char)> {
  let check = cleaned.chars().last()?;
  let body = &cleaned[..cleaned.len() - check.len_utf8()];
  let shape_ok = (7..=8).contains(&body.len())
    && body.bytes().all(|b| b.is_ascii_digit())
    && (check.is_ascii_digit() || check == 'K');
  shape_ok.then_some((body, check))
}

fn sentinel(id: &str) -> Option<NationalId> {
  let normalized = id.trim().to_uppercase();
  if normalized == FOREIGN {
    Some(NationalId::Foreign)
  } else if normalized == UNKNOWN {
    Some(NationalId::Unknown)
  } else {
    None
  }
}

fn group_thousands(body: &str) -> String {
  let mut out = String::with_capacity(body.len() + body.len() / 3);
  for (i, c) in body.chars().enumerate() {
    if i > 0 && (body.len() - i) % 3 == 0 {
      out.push('.');
    }
    out.push(c);
  }
  out
}

// ─── Rut ─────────────────────────────────────────────────────────────────────

/// Returned when a string is neither a sentinel nor a valid RUT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidRut(pub String);

impl fmt::Display for InvalidRut {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "invalid RUT: {:?}", self.0)
  }
}

impl std::error::Error for InvalidRut {}

/// A checksum-verified RUT.
///
/// Displays in the compact canonical form used for storage (`12345678-5`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rut {
  body:  String,
  check: char,
}

impl Rut {
  pub fn body(&self) -> &str { &self.body }

  pub fn check(&self) -> char { self.check }

  /// Body and check character with every separator removed (`123456785`).
  /// This is the form identity lookups compare on.
  pub fn digits(&self) -> String { format!("{}{}", self.body, self.check) }

  /// Display form with thousands separators (`12.345.678-5`).
  pub fn formatted(&self) -> String {
    format!("{}-{}", group_thousands(&self.body), self.check)
  }
}

impl FromStr for Rut {
  type Err = InvalidRut;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let cleaned = clean(s);
    let (body, check) = split(&cleaned).ok_or_else(|| InvalidRut(s.to_owned()))?;
    if check_digit(body) != check {
      return Err(InvalidRut(s.to_owned()));
    }
    Ok(Self { body: body.to_owned(), check })
  }
}

impl fmt::Display for Rut {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-{}", self.body, self.check)
  }
}

// ─── NationalId ──────────────────────────────────────────────────────────────

/// The national-ID column of a person: a real RUT or one of the sentinels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NationalId {
  Rut(Rut),
  /// Foreign national without a RUT ([`FOREIGN`]).
  Foreign,
  /// RUT not known ([`UNKNOWN`]).
  Unknown,
}

impl NationalId {
  pub fn as_rut(&self) -> Option<&Rut> {
    match self {
      Self::Rut(rut) => Some(rut),
      Self::Foreign | Self::Unknown => None,
    }
  }

  /// Sentinels never match an existing person.
  pub fn is_sentinel(&self) -> bool { self.as_rut().is_none() }
}

impl FromStr for NationalId {
  type Err = InvalidRut;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match sentinel(s) {
      Some(id) => Ok(id),
      None => s.parse().map(Self::Rut),
    }
  }
}

impl fmt::Display for NationalId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Rut(rut) => rut.fmt(f),
      Self::Foreign => f.write_str(FOREIGN),
      Self::Unknown => f.write_str(UNKNOWN),
    }
  }
}

impl Serialize for NationalId {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for NationalId {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
  }
}
