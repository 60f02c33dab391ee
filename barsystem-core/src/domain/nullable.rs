//! Serde helpers for service payloads
//!
//! The service sends `null` for empty names and empty price lists. These
//! helpers fold `null` into the field's default value.

use serde::{Deserialize, Deserializer};

/// Deserialize `null` (or a missing field, together with `#[serde(default)]`)
/// as `T::default()`
pub fn default_on_null<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
