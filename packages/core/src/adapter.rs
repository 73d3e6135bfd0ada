//! The adapter contract every storage backend implements.
//!
//! The base [`Adapter`] trait carries the `transform` group
//! (read/write/delete/rename/copy/exists/visibility). Optional groups live
//! in separate traits reached through accessor methods that default to
//! `None`; the dispatching layer checks the advertised [`CapabilitySet`]
//! before following an accessor, so an unsupported call fails fast with a
//! capability error instead of an I/O failure.

use std::io;
use std::sync::Arc;

use bytes::Bytes;

use crate::address::Address;
use crate::capability::CapabilitySet;
use crate::error::Result;
use crate::resource::Resource;
use crate::visibility::Visibility;

/// Default chunk size for streaming operations.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Options applied to write-shaped operations.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Visibility for the written resource itself.
    pub visibility: Option<Visibility>,
    /// Visibility for any parent collections auto-created by the write.
    pub directory_visibility: Option<Visibility>,
}

impl WriteOptions {
    pub fn with_visibility(visibility: Visibility) -> Self {
        WriteOptions {
            visibility: Some(visibility),
            ..WriteOptions::default()
        }
    }
}

/// Options applied to streaming operations.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    pub chunk_size: usize,
    pub write: WriteOptions,
}

impl Default for StreamOptions {
    fn default() -> Self {
        StreamOptions {
            chunk_size: DEFAULT_CHUNK_SIZE,
            write: WriteOptions::default(),
        }
    }
}

/// A lazy, forward-only, finite byte sequence.
///
/// Consumed exactly once; not restartable from an arbitrary offset. A
/// partially-consumed stream may hold backend resources (an open
/// descriptor, an in-flight upload) that are released when it is dropped.
pub type ByteStream = Box<dyn io::Read + Send>;

/// Output of executing a resource.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    /// Process exit code, when the backend can report one.
    pub status: Option<i32>,
    pub stdout: Bytes,
    pub stderr: Bytes,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// A shareable adapter handle.
pub type AdapterHandle = Arc<dyn Adapter>;

/// The polymorphic interface every backend implements.
///
/// All operations take a backend-relative [`Address`] whose path has
/// already been normalized by the dispatching layer. Methods take `&self`;
/// backends with mutable state use interior mutability so concurrent
/// callers can share one handle.
///
/// # Object safety
///
/// The trait is object-safe: adapters are passed around as
/// `Arc<dyn Adapter>`.
pub trait Adapter: Send + Sync {
    /// The operation groups this instance supports. Static per instance.
    fn capabilities(&self) -> CapabilitySet;

    /// Read the full contents of a resource.
    fn read(&self, addr: &Address) -> Result<Bytes>;

    /// Write a resource, creating parent collections as needed.
    fn write(&self, addr: &Address, data: Bytes, opts: &WriteOptions) -> Result<()>;

    /// Delete a resource. Idempotent: deleting an absent resource succeeds.
    fn delete(&self, addr: &Address) -> Result<()>;

    /// Move a resource. May be an atomic backend-native rename.
    fn rename(&self, src: &Address, dst: &Address, opts: &WriteOptions) -> Result<()>;

    /// Copy a resource.
    fn copy(&self, src: &Address, dst: &Address, opts: &WriteOptions) -> Result<()>;

    /// Whether a resource exists.
    fn exists(&self, addr: &Address) -> Result<bool>;

    /// Current visibility of a resource.
    fn visibility(&self, addr: &Address) -> Result<Visibility>;

    /// Change the visibility of a resource.
    fn set_visibility(&self, addr: &Address, visibility: Visibility) -> Result<()>;

    /// The `collection` group, when supported.
    fn collections(&self) -> Option<&dyn CollectionAdapter> {
        None
    }

    /// The `streamable` group, when supported.
    fn streams(&self) -> Option<&dyn StreamAdapter> {
        None
    }

    /// The `executable` group, when supported.
    fn executor(&self) -> Option<&dyn ExecutableAdapter> {
        None
    }

    /// The `mountable` group, when supported.
    fn mounts(&self) -> Option<&dyn MountableAdapter> {
        None
    }
}

/// Optional `collection` operation group.
pub trait CollectionAdapter: Send + Sync {
    /// List the direct children of a collection.
    fn list(&self, addr: &Address) -> Result<Vec<Resource>>;

    /// Create a collection, including missing parents.
    fn create_collection(&self, addr: &Address, opts: &WriteOptions) -> Result<()>;

    /// Delete a collection. A non-empty collection without `recursive`
    /// fails with a conflict.
    fn delete_collection(&self, addr: &Address, recursive: bool) -> Result<()>;
}

/// Optional `streamable` operation group.
pub trait StreamAdapter: Send + Sync {
    /// Open a lazy read stream over a resource.
    fn read_stream(&self, addr: &Address, opts: &StreamOptions) -> Result<ByteStream>;

    /// Write a resource by draining `source` in `chunk_size` pieces.
    fn write_stream(
        &self,
        addr: &Address,
        source: &mut dyn io::Read,
        opts: &StreamOptions,
    ) -> Result<()>;
}

/// Optional `executable` operation group.
pub trait ExecutableAdapter: Send + Sync {
    /// Execute a resource with arguments, capturing its output.
    fn execute(&self, addr: &Address, args: &[String]) -> Result<ExecOutput>;
}

/// Optional `mountable` operation group.
pub trait MountableAdapter: Send + Sync {
    /// Bind an adapter at a path prefix. Mounting the same exact prefix
    /// twice replaces the earlier mount.
    fn mount(&self, adapter: AdapterHandle, at: &Address) -> Result<()>;

    /// Remove the mount at a prefix. Absent entries are a no-op.
    fn unmount(&self, at: &Address) -> Result<()>;
}
