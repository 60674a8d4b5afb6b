use std::fmt;

use serde::{Deserialize, Serialize};

/// Partitioning identifier for temporal matching and segmentation.
///
/// Currency pairs arrive as strings while instrument ids are usually integers.
/// Keeping both variants preserves the natural ordering of the source column:
/// integer keys sort numerically (`9 < 10`), string keys lexically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityKey {
    Int(i64),
    Str(String),
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EntityKey {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for EntityKey {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for EntityKey {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_keys_sort_numerically() {
        let mut keys = vec![EntityKey::from(10), EntityKey::from(9), EntityKey::from(100)];
        keys.sort();
        assert_eq!(
            keys,
            vec![EntityKey::from(9), EntityKey::from(10), EntityKey::from(100)]
        );
    }

    #[test]
    fn test_display_round_trips_source_value() {
        assert_eq!(EntityKey::from("EURUSD").to_string(), "EURUSD");
        assert_eq!(EntityKey::from(42).to_string(), "42");
    }
}
