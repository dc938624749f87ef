//! Identity resolution: find an existing person by national ID.
//!
//! Identity is global. The same person may be a guardian for one student and
//! appear again as a guardian of a sibling; the role only labels log lines.
//! Stored IDs are compared on their digits and check character, so rows
//! saved as `12.345.678-5`, `12345678-5` or `123456785` all match.

use matricula_core::{
  person::{PersonKey, Role},
  rut::NationalId,
  store::Transaction,
};
use tracing::warn;

use crate::{WriteError, sql};

/// Every person whose stored RUT matches the bound compact digits, oldest
/// first.
pub(crate) const FIND_BY_RUT: &str = "SELECT id FROM persons \
   WHERE REPLACE(REPLACE(UPPER(TRIM(rut)), '.', ''), '-', '') = ? \
   ORDER BY id";

/// Look up the person holding `id`.
///
/// Sentinels (`EXTRANJERO`, `SIN RUT`) never match: every such person is a
/// distinct new record. When several rows share the RUT the lowest key wins.
pub async fn resolve<T: Transaction>(
  tx: &mut T,
  id: &NationalId,
  role: Role,
) -> Result<Option<PersonKey>, WriteError> {
  let Some(rut) = id.as_rut() else {
    return Ok(None);
  };

  let rows = sql::query(tx, FIND_BY_RUT, vec![rut.digits().into()]).await?;
  if rows.len() > 1 {
    warn!(%rut, %role, matches = rows.len(), "national ID shared by several persons; using the oldest");
  }
  Ok(sql::first_key(&rows, "id")?.map(PersonKey))
}
