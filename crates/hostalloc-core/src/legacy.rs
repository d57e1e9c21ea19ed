//! Deserialization helpers for legacy inventory encodings.
//!
//! Older inventory feeds report some flags (`reserved`, `setup`) as the
//! strings `"true"`/`"false"` instead of JSON booleans. These helpers
//! normalize both encodings at the boundary so the engine only ever sees
//! a real `bool`.

use serde::de::{self, Deserializer, Unexpected, Visitor};
use std::fmt;

/// Deserialize a boolean from either a JSON bool or a `"true"`/`"false"` string.
pub fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(FlexibleBool)
}

struct FlexibleBool;

impl Visitor<'_> for FlexibleBool {
    type Value = bool;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a boolean or the string \"true\" / \"false\"")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
        Ok(v)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<bool, E> {
        match v.trim() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(E::invalid_value(Unexpected::Str(other), &self)),
        }
    }
}
