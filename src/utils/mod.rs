//! Utility functions and helpers

use regex::Regex;
use uuid::Uuid;

/// Pattern for role names embedded in request paths.
/// One word character, optionally followed by word characters, dots or hyphens,
/// ending in a word character.
pub static VALID_NAME_REGEX: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"^\w(([\w.-]+)?\w)?$").unwrap());

/// Generate a new UUID v4 as a string
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Check a role name against [`VALID_NAME_REGEX`]
pub fn is_valid_name(name: &str) -> bool {
    VALID_NAME_REGEX.is_match(name)
}

/// Serde adapter storing a `Duration` as integer nanoseconds.
///
/// Nanoseconds round-trip exactly; values beyond `u64::MAX` ns (~584 years)
/// are rejected on write.
pub mod duration_nanos {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let nanos = u64::try_from(value.as_nanos())
            .map_err(|_| serde::ser::Error::custom("duration exceeds u64 nanoseconds"))?;
        serializer.serialize_u64(nanos)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_nanos)
    }
}
