//! OmniFS core: one filesystem interface over heterogeneous backends.
//!
//! This crate carries the two subsystems that make the abstraction work:
//!
//! - [`Address`]: a URI-superset location value with normalization,
//!   traversal protection, and composition operations.
//! - [`CompositeAdapter`]: a mount router binding backend adapters onto
//!   path prefixes of one logical namespace, with longest-prefix
//!   resolution and cross-backend move/copy emulation.
//!
//! Around them sit the [`Adapter`] contract every backend implements, the
//! [`CapabilitySet`] describing which optional operation groups a backend
//! supports, and the [`Filesystem`] facade callers hold.
//!
//! # Example
//!
//! ```rust
//! use omnifs_core::Address;
//!
//! let addr = Address::parse("s3://bucket/reports//q1/./summary");
//! let addr = addr.normalize().unwrap();
//! assert_eq!(addr.path, "/reports/q1/summary");
//! ```

pub use bytes::Bytes;

mod adapter;
mod address;
mod capability;
mod composite;
mod error;
mod filesystem;
mod resource;
mod visibility;

pub use adapter::{
    Adapter, AdapterHandle, ByteStream, CollectionAdapter, ExecOutput, ExecutableAdapter,
    MountableAdapter, StreamAdapter, StreamOptions, WriteOptions, DEFAULT_CHUNK_SIZE,
};
pub use address::{Address, DEFAULT_SCHEME};
pub use capability::{Capability, CapabilitySet};
pub use composite::CompositeAdapter;
pub use error::{Error, Result};
pub use filesystem::Filesystem;
pub use resource::{Resource, ResourceKind};
pub use visibility::Visibility;
