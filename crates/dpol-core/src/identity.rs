//! # Identifier Newtypes
//!
//! Item and permission identifiers are assigned by the external storage
//! system and are opaque strings. Wrapping them keeps an item id from being
//! passed where a permission id (or a domain) is expected.

use serde::{Deserialize, Serialize};

/// Externally assigned, globally unique identifier of a file or folder.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

/// Identifier of one access-control entry, unique within its item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionId(String);

impl ItemId {
    /// Wrap an identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Access the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PermissionId {
    /// Wrap an identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Access the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for PermissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PermissionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_id_displays_raw_value() {
        let id = ItemId::new("0B1x-folder");
        assert_eq!(id.to_string(), "0B1x-folder");
        assert_eq!(id.as_str(), "0B1x-folder");
    }

    #[test]
    fn identifiers_serialize_transparently() {
        let id = PermissionId::from("anyoneWithLink");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"anyoneWithLink\"");
        let back: PermissionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
