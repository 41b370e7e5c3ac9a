// ── Core identity types ──
//
// LayerKey and ElementId address every element in the map. An element is
// only unique within its layer, so most lookups take both.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ── LayerKey ────────────────────────────────────────────────────────

/// Identifier of an asset layer (e.g. `"p_cable"`, `"region"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerKey(String);

impl LayerKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The region boundary layer, fetched through the region endpoints.
    pub fn is_region(&self) -> bool {
        self.0 == "region"
    }
}

impl fmt::Display for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LayerKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for LayerKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for LayerKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for LayerKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ── ElementId ───────────────────────────────────────────────────────

/// Numeric server id of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(u64);

impl ElementId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ElementId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<u64> for ElementId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn layer_key_region_detection() {
        assert!(LayerKey::from("region").is_region());
        assert!(!LayerKey::from("p_cable").is_region());
    }

    #[test]
    fn layer_key_serializes_as_string() {
        let key = LayerKey::from("p_dp");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"p_dp\"");
    }

    #[test]
    fn element_id_from_str() {
        let id: ElementId = " 42 ".parse().unwrap();
        assert_eq!(id.get(), 42);
        assert!("abc".parse::<ElementId>().is_err());
    }
}
