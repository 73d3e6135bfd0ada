//! OmniFS: one filesystem interface over heterogeneous storage backends.
//!
//! OmniFS routes a single logical namespace across interchangeable backends:
//! addresses are normalized URI-superset locations, backends are mounted onto
//! path prefixes, and the deepest matching mount serves each operation.

pub use omnifs_adapters::{InMemoryAdapter, LocalAdapter, ObjectStoreAdapter};
pub use omnifs_core::*;
