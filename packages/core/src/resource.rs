//! Resource descriptors returned by listing operations.

use std::collections::BTreeMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Whether a resource is a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    File,
    Directory,
}

/// A pure, read-only descriptor of a listed resource.
///
/// Never persisted; recomputed on every listing. The metadata map carries
/// backend-specific free-form attributes (visibility, executable flag,
/// watchable flag, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub address: Address,
    pub kind: ResourceKind,
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub metadata: BTreeMap<String, String>,
}

impl Resource {
    /// Descriptor for a file with no extra metadata.
    pub fn file(address: Address, size: u64, modified: Option<SystemTime>) -> Self {
        Resource {
            address,
            kind: ResourceKind::File,
            size,
            modified,
            metadata: BTreeMap::new(),
        }
    }

    /// Descriptor for a directory with no extra metadata.
    pub fn directory(address: Address, modified: Option<SystemTime>) -> Self {
        Resource {
            address,
            kind: ResourceKind::Directory,
            size: 0,
            modified,
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata attribute.
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_file(&self) -> bool {
        self.kind == ResourceKind::File
    }

    pub fn is_directory(&self) -> bool {
        self.kind == ResourceKind::Directory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_descriptor() {
        let r = Resource::file(Address::parse("/a/b"), 42, None);
        assert!(r.is_file());
        assert!(!r.is_directory());
        assert_eq!(r.size, 42);
        assert!(r.metadata.is_empty());
    }

    #[test]
    fn directory_descriptor() {
        let r = Resource::directory(Address::parse("/a"), None);
        assert!(r.is_directory());
        assert_eq!(r.size, 0);
    }

    #[test]
    fn with_meta_accumulates() {
        let r = Resource::file(Address::parse("/x"), 1, None)
            .with_meta("visibility", "public")
            .with_meta("executable", "false");
        assert_eq!(r.metadata.get("visibility").map(String::as_str), Some("public"));
        assert_eq!(r.metadata.len(), 2);
    }

    #[test]
    fn kind_serde_wire_form() {
        assert_eq!(
            serde_json::to_string(&ResourceKind::Directory).unwrap(),
            "\"directory\""
        );
    }
}
