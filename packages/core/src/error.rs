//! Error type shared by every OmniFS layer.

use crate::address::Address;
use crate::capability::Capability;

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure kinds surfaced by OmniFS operations.
///
/// The kind is preserved through every layer so callers can branch on it:
/// a missing resource (`NotFound`) is not the same situation as a storage
/// failure (`Backend`).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The resource does not exist, or no mount matched the address.
    #[error("not found: {address}")]
    NotFound { address: Address },

    /// Normalization rejected a `..` that would escape the root.
    #[error("path traversal escapes root: '{path}'")]
    Traversal { path: String },

    /// AlreadyExists-style conflict, e.g. deleting a non-empty collection
    /// without the recursive flag.
    #[error("conflict at {address}: {message}")]
    Conflict { address: Address, message: String },

    /// The adapter does not advertise the operation group.
    #[error("adapter lacks the '{capability}' capability (operation: {operation})")]
    Capability {
        capability: Capability,
        operation: &'static str,
    },

    /// Opaque passthrough from the underlying storage. No retries happen in
    /// the core; retry policy, if any, belongs to the backend.
    #[error("backend failure during {operation}: {source}")]
    Backend {
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl Error {
    pub fn not_found(address: Address) -> Self {
        Error::NotFound { address }
    }

    pub fn conflict(address: Address, message: impl Into<String>) -> Self {
        Error::Conflict {
            address,
            message: message.into(),
        }
    }

    pub fn capability(capability: Capability, operation: &'static str) -> Self {
        Error::Capability {
            capability,
            operation,
        }
    }

    pub fn backend(
        operation: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::Backend {
            operation,
            source: Box::new(source),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_traversal(&self) -> bool {
        matches!(self, Error::Traversal { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    pub fn is_capability(&self) -> bool {
        matches!(self, Error::Capability { .. })
    }
}
