//! Reference backends for the OmniFS adapter contract.
//!
//! Three adapters with deliberately different storage semantics:
//!
//! - [`InMemoryAdapter`]: ordered in-memory maps with explicit directories.
//! - [`LocalAdapter`]: a host directory tree with unix permission bits.
//! - [`ObjectStoreAdapter`]: a flat key/blob space with synthesized
//!   directories, the way object stores behave.
//!
//! All three are safe to share across threads behind an `Arc`, so any of
//! them can be mounted into an `omnifs_core::CompositeAdapter`.

mod local;
mod memory;
mod object;

pub use local::LocalAdapter;
pub use memory::InMemoryAdapter;
pub use object::ObjectStoreAdapter;
