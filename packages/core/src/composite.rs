//! CompositeAdapter: route operations to backends mounted at path prefixes.
//!
//! A composite owns a mount table binding prefix addresses to backend
//! adapters. Incoming addresses are normalized, matched against the table
//! (deepest prefix wins), stripped of the matched prefix, and delegated to
//! exactly one backend. Rename and copy spanning two different backends
//! degrade to read-then-write(-then-delete).

use std::io;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;

use crate::adapter::{
    Adapter, AdapterHandle, ByteStream, CollectionAdapter, ExecOutput, ExecutableAdapter,
    MountableAdapter, StreamAdapter, StreamOptions, WriteOptions,
};
use crate::address::Address;
use crate::capability::{Capability, CapabilitySet};
use crate::error::{Error, Result};
use crate::resource::Resource;
use crate::visibility::Visibility;

/// One mount table entry.
struct MountEntry {
    /// Normalized prefix in the composite's logical namespace.
    prefix: Address,
    /// Backend-relative address at which the backend's root is anchored.
    root: Address,
    adapter: AdapterHandle,
}

/// Result of resolving a logical address to one backend.
struct Resolved {
    adapter: AdapterHandle,
    /// Backend-relative address, re-anchored at `/` under the mount's root.
    relative: Address,
    /// The matched mount prefix, for re-prefixing results.
    prefix: Address,
    root: Address,
}

impl Resolved {
    fn group_err(&self, capability: Capability, operation: &'static str) -> Error {
        Error::capability(capability, operation)
    }

    fn collections(&self, operation: &'static str) -> Result<&dyn CollectionAdapter> {
        if !self.adapter.capabilities().contains(Capability::Collection) {
            return Err(self.group_err(Capability::Collection, operation));
        }
        self.adapter
            .collections()
            .ok_or_else(|| self.group_err(Capability::Collection, operation))
    }

    fn streams(&self, operation: &'static str) -> Result<&dyn StreamAdapter> {
        if !self.adapter.capabilities().contains(Capability::Streamable) {
            return Err(self.group_err(Capability::Streamable, operation));
        }
        self.adapter
            .streams()
            .ok_or_else(|| self.group_err(Capability::Streamable, operation))
    }

    fn executor(&self, operation: &'static str) -> Result<&dyn ExecutableAdapter> {
        if !self.adapter.capabilities().contains(Capability::Executable) {
            return Err(self.group_err(Capability::Executable, operation));
        }
        self.adapter
            .executor()
            .ok_or_else(|| self.group_err(Capability::Executable, operation))
    }

    /// Map a backend-relative address back into the logical namespace.
    fn logical(&self, addr: &Address) -> Address {
        let unanchored = addr
            .strip_prefix(&self.root.path)
            .unwrap_or_else(|| addr.clone());
        unanchored.join_prefix(&self.prefix.path)
    }
}

/// Routes a single logical namespace across independent backend adapters.
///
/// The mount table is the only mutable shared state: `mount`/`unmount`
/// serialize through a write lock, resolution takes a read lock, clones the
/// adapter handle, and releases the lock before any backend I/O. Readers
/// observe either the pre- or post-mutation table, never a mixture.
///
/// # Example
///
/// ```rust,ignore
/// let composite = CompositeAdapter::new();
/// composite.mount(memory_adapter, &Address::parse("/cache"))?;
/// composite.mount(disk_adapter, &Address::parse("/data"))?;
///
/// // Reads of /cache/x go to the memory adapter with relative address /x.
/// // A rename from /cache/x to /data/x degrades to read+write+delete.
/// ```
pub struct CompositeAdapter {
    table: RwLock<Vec<MountEntry>>,
}

impl Default for CompositeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositeAdapter {
    /// Create a composite with an empty mount table.
    pub fn new() -> Self {
        CompositeAdapter {
            table: RwLock::new(Vec::new()),
        }
    }

    // A poisoned table lock only means another thread panicked mid-call;
    // the table itself is always left consistent, so recover the guard.
    fn table_read(&self) -> RwLockReadGuard<'_, Vec<MountEntry>> {
        self.table.read().unwrap_or_else(|e| e.into_inner())
    }

    fn table_write(&self) -> RwLockWriteGuard<'_, Vec<MountEntry>> {
        self.table.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Bind `adapter` at the prefix `at`, anchored at the backend's root.
    ///
    /// Overlap with existing mounts is not validated: deepest-prefix-wins
    /// resolution keeps overlapping mounts unambiguous. Mounting the same
    /// exact prefix twice replaces the earlier mount.
    pub fn mount(&self, adapter: AdapterHandle, at: &Address) -> Result<()> {
        self.mount_with_root(adapter, at, &Address::root())
    }

    /// Bind `adapter` at `at`, anchoring the backend's namespace at `root`.
    pub fn mount_with_root(
        &self,
        adapter: AdapterHandle,
        at: &Address,
        root: &Address,
    ) -> Result<()> {
        let prefix = at.normalize()?;
        let root = root.normalize()?;

        let mut table = self.table_write();
        table.retain(|entry| entry.prefix.path != prefix.path);
        table.push(MountEntry {
            prefix: prefix.clone(),
            root,
            adapter,
        });
        // Deepest prefix first makes linear resolution longest-match.
        table.sort_by(|a, b| b.prefix.segment_count().cmp(&a.prefix.segment_count()));

        log::debug!("mounted adapter at {}", prefix);
        Ok(())
    }

    /// Remove the mount at the exact prefix `at`. Absent entries are a
    /// no-op.
    pub fn unmount(&self, at: &Address) -> Result<()> {
        let prefix = at.normalize()?;
        let mut table = self.table_write();
        let before = table.len();
        table.retain(|entry| entry.prefix.path != prefix.path);
        if table.len() < before {
            log::debug!("unmounted {}", prefix);
        }
        Ok(())
    }

    /// Currently mounted prefixes, deepest first.
    pub fn mount_points(&self) -> Vec<Address> {
        self.table_read()
            .iter()
            .map(|entry| entry.prefix.clone())
            .collect()
    }

    pub fn mount_count(&self) -> usize {
        self.table_read().len()
    }

    /// Resolve a logical address to (backend, backend-relative address).
    ///
    /// The matched entry is the one with the longest prefix that is a
    /// path-prefix of the address. The table lock is released before the
    /// caller performs backend I/O.
    fn resolve(&self, addr: &Address) -> Result<Resolved> {
        let addr = addr.normalize()?;
        let table = self.table_read();
        for entry in table.iter() {
            if let Some(stripped) = addr.strip_prefix(&entry.prefix.path) {
                let relative = if entry.root.is_root() {
                    stripped
                } else {
                    stripped.join_prefix(&entry.root.path)
                };
                return Ok(Resolved {
                    adapter: Arc::clone(&entry.adapter),
                    relative,
                    prefix: entry.prefix.clone(),
                    root: entry.root.clone(),
                });
            }
        }
        Err(Error::not_found(addr))
    }

    /// Copy across two different backends: read fully, then write.
    ///
    /// A failure during the write leaves whatever destination artifact the
    /// destination backend's own failure semantics produce; the composite
    /// does not clean up partial writes.
    fn cross_copy(&self, src: &Resolved, dst: &Resolved, opts: &WriteOptions) -> Result<()> {
        log::debug!(
            "cross-backend copy {} -> {}",
            src.logical(&src.relative),
            dst.logical(&dst.relative)
        );
        let data = src.adapter.read(&src.relative)?;
        dst.adapter.write(&dst.relative, data, opts)
    }
}

impl Adapter for CompositeAdapter {
    /// A composite forwards every group; per-call checks run against the
    /// resolved backend's own capability set.
    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::full()
    }

    fn read(&self, addr: &Address) -> Result<Bytes> {
        let resolved = self.resolve(addr)?;
        resolved.adapter.read(&resolved.relative)
    }

    fn write(&self, addr: &Address, data: Bytes, opts: &WriteOptions) -> Result<()> {
        let resolved = self.resolve(addr)?;
        resolved.adapter.write(&resolved.relative, data, opts)
    }

    fn delete(&self, addr: &Address) -> Result<()> {
        let resolved = self.resolve(addr)?;
        resolved.adapter.delete(&resolved.relative)
    }

    fn rename(&self, src: &Address, dst: &Address, opts: &WriteOptions) -> Result<()> {
        let src_resolved = self.resolve(src)?;
        let dst_resolved = self.resolve(dst)?;

        if Arc::ptr_eq(&src_resolved.adapter, &dst_resolved.adapter) {
            return src_resolved
                .adapter
                .rename(&src_resolved.relative, &dst_resolved.relative, opts);
        }

        // Emulated move: read, write, then delete. A write failure leaves
        // the source intact; a delete failure after a successful write
        // leaves a duplicate, which is a documented limitation.
        self.cross_copy(&src_resolved, &dst_resolved, opts)?;
        src_resolved.adapter.delete(&src_resolved.relative)
    }

    fn copy(&self, src: &Address, dst: &Address, opts: &WriteOptions) -> Result<()> {
        let src_resolved = self.resolve(src)?;
        let dst_resolved = self.resolve(dst)?;

        if Arc::ptr_eq(&src_resolved.adapter, &dst_resolved.adapter) {
            return src_resolved
                .adapter
                .copy(&src_resolved.relative, &dst_resolved.relative, opts);
        }

        self.cross_copy(&src_resolved, &dst_resolved, opts)
    }

    fn exists(&self, addr: &Address) -> Result<bool> {
        let resolved = self.resolve(addr)?;
        resolved.adapter.exists(&resolved.relative)
    }

    fn visibility(&self, addr: &Address) -> Result<Visibility> {
        let resolved = self.resolve(addr)?;
        resolved.adapter.visibility(&resolved.relative)
    }

    fn set_visibility(&self, addr: &Address, visibility: Visibility) -> Result<()> {
        let resolved = self.resolve(addr)?;
        resolved.adapter.set_visibility(&resolved.relative, visibility)
    }

    fn collections(&self) -> Option<&dyn CollectionAdapter> {
        Some(self)
    }

    fn streams(&self) -> Option<&dyn StreamAdapter> {
        Some(self)
    }

    fn executor(&self) -> Option<&dyn ExecutableAdapter> {
        Some(self)
    }

    fn mounts(&self) -> Option<&dyn MountableAdapter> {
        Some(self)
    }
}

impl CollectionAdapter for CompositeAdapter {
    fn list(&self, addr: &Address) -> Result<Vec<Resource>> {
        let resolved = self.resolve(addr)?;
        let inner = resolved.collections("list")?;
        let resources = inner.list(&resolved.relative)?;
        // Listed addresses come back backend-relative; re-prefix them into
        // the composite's namespace.
        Ok(resources
            .into_iter()
            .map(|resource| {
                let address = resolved.logical(&resource.address);
                Resource {
                    address,
                    ..resource
                }
            })
            .collect())
    }

    fn create_collection(&self, addr: &Address, opts: &WriteOptions) -> Result<()> {
        let resolved = self.resolve(addr)?;
        resolved
            .collections("create_collection")?
            .create_collection(&resolved.relative, opts)
    }

    fn delete_collection(&self, addr: &Address, recursive: bool) -> Result<()> {
        let resolved = self.resolve(addr)?;
        resolved
            .collections("delete_collection")?
            .delete_collection(&resolved.relative, recursive)
    }
}

impl StreamAdapter for CompositeAdapter {
    fn read_stream(&self, addr: &Address, opts: &StreamOptions) -> Result<ByteStream> {
        let resolved = self.resolve(addr)?;
        resolved
            .streams("read_stream")?
            .read_stream(&resolved.relative, opts)
    }

    fn write_stream(
        &self,
        addr: &Address,
        source: &mut dyn io::Read,
        opts: &StreamOptions,
    ) -> Result<()> {
        let resolved = self.resolve(addr)?;
        resolved
            .streams("write_stream")?
            .write_stream(&resolved.relative, source, opts)
    }
}

impl ExecutableAdapter for CompositeAdapter {
    fn execute(&self, addr: &Address, args: &[String]) -> Result<ExecOutput> {
        let resolved = self.resolve(addr)?;
        resolved.executor("execute")?.execute(&resolved.relative, args)
    }
}

impl MountableAdapter for CompositeAdapter {
    fn mount(&self, adapter: AdapterHandle, at: &Address) -> Result<()> {
        CompositeAdapter::mount(self, adapter, at)
    }

    fn unmount(&self, at: &Address) -> Result<()> {
        CompositeAdapter::unmount(self, at)
    }
}
