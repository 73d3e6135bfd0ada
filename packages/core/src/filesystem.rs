//! Filesystem facade: the uniform operation surface over any adapter.

use std::io;

use bytes::Bytes;

use crate::adapter::{
    AdapterHandle, ByteStream, CollectionAdapter, ExecOutput, ExecutableAdapter,
    MountableAdapter, StreamAdapter, StreamOptions, WriteOptions,
};
use crate::address::Address;
use crate::capability::Capability;
use crate::error::{Error, Result};
use crate::resource::Resource;
use crate::visibility::Visibility;

/// The caller-facing filesystem handle.
///
/// Wraps a single adapter (which may itself be a
/// [`CompositeAdapter`](crate::CompositeAdapter)) and applies the uniform
/// dispatch discipline: every address is normalized before the backend sees
/// it, so the traversal guard fires before any I/O, and optional-group
/// operations are checked against the adapter's capability set and fail
/// fast with [`Error::Capability`] when unsupported.
///
/// Callers hold their own `Filesystem` value; there is no ambient registry
/// of named instances.
///
/// # Example
///
/// ```rust,ignore
/// let fs = Filesystem::new(Arc::new(CompositeAdapter::new()));
/// fs.mount(memory_adapter, &Address::parse("/cache"))?;
/// fs.write(&Address::parse("/cache/greeting"), "hello", &WriteOptions::default())?;
/// ```
pub struct Filesystem {
    adapter: AdapterHandle,
}

impl Filesystem {
    pub fn new(adapter: AdapterHandle) -> Self {
        Filesystem { adapter }
    }

    /// The underlying adapter handle.
    pub fn adapter(&self) -> &AdapterHandle {
        &self.adapter
    }

    fn require(&self, capability: Capability, operation: &'static str) -> Result<()> {
        if self.adapter.capabilities().contains(capability) {
            Ok(())
        } else {
            Err(Error::capability(capability, operation))
        }
    }

    fn collections(&self, operation: &'static str) -> Result<&dyn CollectionAdapter> {
        self.require(Capability::Collection, operation)?;
        self.adapter
            .collections()
            .ok_or_else(|| Error::capability(Capability::Collection, operation))
    }

    fn streams(&self, operation: &'static str) -> Result<&dyn StreamAdapter> {
        self.require(Capability::Streamable, operation)?;
        self.adapter
            .streams()
            .ok_or_else(|| Error::capability(Capability::Streamable, operation))
    }

    fn executor(&self, operation: &'static str) -> Result<&dyn ExecutableAdapter> {
        self.require(Capability::Executable, operation)?;
        self.adapter
            .executor()
            .ok_or_else(|| Error::capability(Capability::Executable, operation))
    }

    fn mountable(&self, operation: &'static str) -> Result<&dyn MountableAdapter> {
        self.require(Capability::Mountable, operation)?;
        self.adapter
            .mounts()
            .ok_or_else(|| Error::capability(Capability::Mountable, operation))
    }

    pub fn read(&self, addr: &Address) -> Result<Bytes> {
        let addr = addr.normalize()?;
        self.adapter.read(&addr)
    }

    pub fn write(
        &self,
        addr: &Address,
        data: impl Into<Bytes>,
        opts: &WriteOptions,
    ) -> Result<()> {
        let addr = addr.normalize()?;
        self.adapter.write(&addr, data.into(), opts)
    }

    /// Idempotent: deleting an absent resource succeeds.
    pub fn delete(&self, addr: &Address) -> Result<()> {
        let addr = addr.normalize()?;
        self.adapter.delete(&addr)
    }

    /// Move a resource.
    pub fn rename(&self, src: &Address, dst: &Address, opts: &WriteOptions) -> Result<()> {
        let src = src.normalize()?;
        let dst = dst.normalize()?;
        self.adapter.rename(&src, &dst, opts)
    }

    pub fn copy(&self, src: &Address, dst: &Address, opts: &WriteOptions) -> Result<()> {
        let src = src.normalize()?;
        let dst = dst.normalize()?;
        self.adapter.copy(&src, &dst, opts)
    }

    pub fn exists(&self, addr: &Address) -> Result<bool> {
        let addr = addr.normalize()?;
        self.adapter.exists(&addr)
    }

    pub fn visibility(&self, addr: &Address) -> Result<Visibility> {
        let addr = addr.normalize()?;
        self.adapter.visibility(&addr)
    }

    pub fn set_visibility(&self, addr: &Address, visibility: Visibility) -> Result<()> {
        let addr = addr.normalize()?;
        self.adapter.set_visibility(&addr, visibility)
    }

    pub fn list(&self, addr: &Address) -> Result<Vec<Resource>> {
        let addr = addr.normalize()?;
        self.collections("list")?.list(&addr)
    }

    pub fn create_collection(&self, addr: &Address, opts: &WriteOptions) -> Result<()> {
        let addr = addr.normalize()?;
        self.collections("create_collection")?
            .create_collection(&addr, opts)
    }

    pub fn delete_collection(&self, addr: &Address, recursive: bool) -> Result<()> {
        let addr = addr.normalize()?;
        self.collections("delete_collection")?
            .delete_collection(&addr, recursive)
    }

    pub fn read_stream(&self, addr: &Address, opts: &StreamOptions) -> Result<ByteStream> {
        let addr = addr.normalize()?;
        self.streams("read_stream")?.read_stream(&addr, opts)
    }

    pub fn write_stream(
        &self,
        addr: &Address,
        source: &mut dyn io::Read,
        opts: &StreamOptions,
    ) -> Result<()> {
        let addr = addr.normalize()?;
        self.streams("write_stream")?.write_stream(&addr, source, opts)
    }

    pub fn execute(&self, addr: &Address, args: &[String]) -> Result<ExecOutput> {
        let addr = addr.normalize()?;
        self.executor("execute")?.execute(&addr, args)
    }

    pub fn mount(&self, adapter: AdapterHandle, at: &Address) -> Result<()> {
        let at = at.normalize()?;
        self.mountable("mount")?.mount(adapter, &at)
    }

    pub fn unmount(&self, at: &Address) -> Result<()> {
        let at = at.normalize()?;
        self.mountable("unmount")?.unmount(&at)
    }
}
