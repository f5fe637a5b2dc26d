//! Stat key module.
//!
//! Provides the `StatKey` type, the identifier a modifier contributes to
//! (for example `"base_maximum_life"`). Uses `Arc<str>` so the same key can
//! be shared by every modifier, table and rule that mentions it.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::sync::Arc;

/// Shared string identifier for a stat.
///
/// # Examples
///
/// ```rust
/// use itemfilter::StatKey;
///
/// let life = StatKey::new("base_maximum_life");
/// let life2: StatKey = "base_maximum_life".into();
///
/// assert_eq!(life, life2);
/// assert_eq!(life.as_str(), "base_maximum_life");
/// ```
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct StatKey(Arc<str>);

impl Serialize for StatKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.as_ref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StatKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(StatKey::from(s))
    }
}

impl StatKey {
    /// Create a new `StatKey` from a string slice.
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    /// Get the string representation of this key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StatKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StatKey {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

// Lets `HashMap<StatKey, _>` be queried with a plain `&str`.
impl Borrow<str> for StatKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StatKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_stat_key_equality() {
        let a = StatKey::new("life");
        let b: StatKey = String::from("life").into();
        assert_eq!(a, b);
    }

    #[test]
    fn test_stat_key_borrow_lookup() {
        let mut map = HashMap::new();
        map.insert(StatKey::new("mana"), 3);
        assert_eq!(map.get("mana"), Some(&3));
    }

    #[test]
    fn test_stat_key_serde() {
        let key = StatKey::new("armour");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"armour\"");
        let back: StatKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
