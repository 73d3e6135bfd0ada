//! Flat key/blob adapter emulating an object store.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Read};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

use bytes::Bytes;

use omnifs_core::{
    Adapter, Address, ByteStream, Capability, CapabilitySet, CollectionAdapter, Error, Resource,
    Result, StreamAdapter, StreamOptions, Visibility, WriteOptions,
};

struct ObjectEntry {
    data: Bytes,
    visibility: Visibility,
    modified: SystemTime,
}

/// Backend with object-store semantics: a flat map of keys to blobs.
///
/// There are no real directories. Collections are synthesized from key
/// prefixes: `create_collection` is a metadata no-op, listing a prefix
/// shows the objects and deeper prefixes directly under it, and deleting a
/// collection removes every key under the prefix. A prefix "exists"
/// exactly while at least one key lives under it.
pub struct ObjectStoreAdapter {
    objects: RwLock<BTreeMap<String, ObjectEntry>>,
}

impl Default for ObjectStoreAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// True when `key` lies strictly underneath `prefix`.
fn under(prefix: &str, key: &str) -> bool {
    key != prefix
        && key
            .strip_prefix(prefix)
            .is_some_and(|rest| prefix == "/" || rest.starts_with('/'))
}

/// First segment of `key` relative to `prefix`, plus whether more follow.
fn child_of<'a>(prefix: &str, key: &'a str) -> Option<(&'a str, bool)> {
    let rest = if prefix == "/" {
        key.strip_prefix('/')?
    } else {
        key.strip_prefix(prefix)?.strip_prefix('/')?
    };
    let mut parts = rest.split('/');
    let first = parts.next()?;
    if first.is_empty() {
        return None;
    }
    Some((first, parts.next().is_some()))
}

impl ObjectStoreAdapter {
    pub fn new() -> Self {
        ObjectStoreAdapter {
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    fn read_objects(&self) -> RwLockReadGuard<'_, BTreeMap<String, ObjectEntry>> {
        self.objects.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_objects(&self) -> RwLockWriteGuard<'_, BTreeMap<String, ObjectEntry>> {
        self.objects.write().unwrap_or_else(|e| e.into_inner())
    }

    fn put(&self, addr: &Address, data: Bytes, opts: &WriteOptions) -> Result<()> {
        self.write_objects().insert(
            addr.path.clone(),
            ObjectEntry {
                data,
                visibility: opts.visibility.unwrap_or_default(),
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }
}

impl Adapter for ObjectStoreAdapter {
    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::base()
            .with(Capability::Collection)
            .with(Capability::Streamable)
    }

    fn read(&self, addr: &Address) -> Result<Bytes> {
        self.read_objects()
            .get(&addr.path)
            .map(|entry| entry.data.clone())
            .ok_or_else(|| Error::not_found(addr.clone()))
    }

    fn write(&self, addr: &Address, data: Bytes, opts: &WriteOptions) -> Result<()> {
        self.put(addr, data, opts)
    }

    fn delete(&self, addr: &Address) -> Result<()> {
        self.write_objects().remove(&addr.path);
        Ok(())
    }

    fn rename(&self, src: &Address, dst: &Address, opts: &WriteOptions) -> Result<()> {
        let mut objects = self.write_objects();
        let entry = objects
            .remove(&src.path)
            .ok_or_else(|| Error::not_found(src.clone()))?;
        objects.insert(
            dst.path.clone(),
            ObjectEntry {
                visibility: opts.visibility.unwrap_or(entry.visibility),
                ..entry
            },
        );
        Ok(())
    }

    fn copy(&self, src: &Address, dst: &Address, opts: &WriteOptions) -> Result<()> {
        let mut objects = self.write_objects();
        let entry = objects
            .get(&src.path)
            .ok_or_else(|| Error::not_found(src.clone()))?;
        let copied = ObjectEntry {
            data: entry.data.clone(),
            visibility: opts.visibility.unwrap_or(entry.visibility),
            modified: SystemTime::now(),
        };
        objects.insert(dst.path.clone(), copied);
        Ok(())
    }

    fn exists(&self, addr: &Address) -> Result<bool> {
        let objects = self.read_objects();
        Ok(addr.is_root()
            || objects.contains_key(&addr.path)
            || objects.keys().any(|key| under(&addr.path, key)))
    }

    fn visibility(&self, addr: &Address) -> Result<Visibility> {
        self.read_objects()
            .get(&addr.path)
            .map(|entry| entry.visibility)
            .ok_or_else(|| Error::not_found(addr.clone()))
    }

    fn set_visibility(&self, addr: &Address, visibility: Visibility) -> Result<()> {
        self.write_objects()
            .get_mut(&addr.path)
            .map(|entry| entry.visibility = visibility)
            .ok_or_else(|| Error::not_found(addr.clone()))
    }

    fn collections(&self) -> Option<&dyn CollectionAdapter> {
        Some(self)
    }

    fn streams(&self) -> Option<&dyn StreamAdapter> {
        Some(self)
    }
}

impl CollectionAdapter for ObjectStoreAdapter {
    fn list(&self, addr: &Address) -> Result<Vec<Resource>> {
        let objects = self.read_objects();
        if !addr.is_root() && !objects.keys().any(|key| under(&addr.path, key)) {
            return Err(Error::not_found(addr.clone()));
        }

        let mut resources = Vec::new();
        let mut prefixes = BTreeSet::new();
        for (key, entry) in objects.iter() {
            match child_of(&addr.path, key) {
                Some((name, true)) => {
                    if prefixes.insert(name.to_string()) {
                        resources.push(Resource::directory(addr.join(name), None));
                    }
                }
                Some((name, false)) => {
                    resources.push(
                        Resource::file(
                            addr.join(name),
                            entry.data.len() as u64,
                            Some(entry.modified),
                        )
                        .with_meta("visibility", entry.visibility.to_string()),
                    );
                }
                None => {}
            }
        }
        Ok(resources)
    }

    // Prefixes spring into being with their first object.
    fn create_collection(&self, _addr: &Address, _opts: &WriteOptions) -> Result<()> {
        Ok(())
    }

    fn delete_collection(&self, addr: &Address, recursive: bool) -> Result<()> {
        let mut objects = self.write_objects();
        let occupied = objects.keys().any(|key| under(&addr.path, key));
        if !occupied {
            if addr.is_root() {
                return Ok(());
            }
            return Err(Error::not_found(addr.clone()));
        }
        if !recursive {
            return Err(Error::conflict(addr.clone(), "collection not empty"));
        }
        objects.retain(|key, _| !under(&addr.path, key));
        Ok(())
    }
}

impl StreamAdapter for ObjectStoreAdapter {
    fn read_stream(&self, addr: &Address, _opts: &StreamOptions) -> Result<ByteStream> {
        let data = self.read(addr)?;
        Ok(Box::new(io::Cursor::new(data.to_vec())))
    }

    fn write_stream(
        &self,
        addr: &Address,
        source: &mut dyn Read,
        opts: &StreamOptions,
    ) -> Result<()> {
        let mut data = Vec::new();
        let mut chunk = vec![0u8; opts.chunk_size.max(1)];
        loop {
            let n = source
                .read(&mut chunk)
                .map_err(|e| Error::backend("write_stream", e))?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..n]);
        }
        self.put(addr, Bytes::from(data), &opts.write)
    }
}
