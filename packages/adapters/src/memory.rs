//! In-memory adapter backed by ordered path maps.

use std::collections::BTreeMap;
use std::io::{self, Read};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

use bytes::Bytes;

use omnifs_core::{
    Adapter, Address, ByteStream, Capability, CapabilitySet, CollectionAdapter, Error, Resource,
    Result, StreamAdapter, StreamOptions, Visibility, WriteOptions,
};

struct FileEntry {
    data: Bytes,
    visibility: Visibility,
    modified: SystemTime,
}

struct DirEntry {
    visibility: Visibility,
    modified: SystemTime,
}

#[derive(Default)]
struct State {
    files: BTreeMap<String, FileEntry>,
    dirs: BTreeMap<String, DirEntry>,
}

/// Fully in-memory backend.
///
/// Stores files and explicit directory markers in ordered maps keyed by
/// normalized path strings. The root directory `/` always exists. State is
/// guarded by one `RwLock`, so a single instance can be shared across
/// threads behind an `Arc`.
pub struct InMemoryAdapter {
    state: RwLock<State>,
}

impl Default for InMemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// True when `candidate` is `dir` itself or lies underneath it.
fn under(dir: &str, candidate: &str) -> bool {
    candidate == dir
        || candidate
            .strip_prefix(dir)
            .is_some_and(|rest| dir == "/" || rest.starts_with('/'))
}

/// Name of the direct child of `dir` that `candidate` belongs to, if any.
fn child_name<'a>(dir: &str, candidate: &'a str) -> Option<&'a str> {
    let rest = if dir == "/" {
        candidate.strip_prefix('/')?
    } else {
        candidate.strip_prefix(dir)?.strip_prefix('/')?
    };
    let first = rest.split('/').next()?;
    if first.is_empty() {
        None
    } else {
        Some(first)
    }
}

fn parent(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(i) => Some(&path[..i]),
        None => None,
    }
}

impl InMemoryAdapter {
    pub fn new() -> Self {
        InMemoryAdapter {
            state: RwLock::new(State::default()),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn is_dir(state: &State, path: &str) -> bool {
        path == "/" || state.dirs.contains_key(path)
    }

    fn ensure_parents(state: &mut State, path: &str, visibility: Option<Visibility>) {
        let mut current = path.to_string();
        while let Some(p) = parent(&current) {
            if p != "/" && !state.dirs.contains_key(p) {
                state.dirs.insert(
                    p.to_string(),
                    DirEntry {
                        visibility: visibility.unwrap_or_default(),
                        modified: SystemTime::now(),
                    },
                );
            }
            current = p.to_string();
        }
    }

    fn insert_file(
        &self,
        addr: &Address,
        data: Bytes,
        opts: &WriteOptions,
    ) -> Result<()> {
        let mut state = self.write_state();
        if Self::is_dir(&state, &addr.path) {
            return Err(Error::conflict(addr.clone(), "a directory exists here"));
        }
        Self::ensure_parents(&mut state, &addr.path, opts.directory_visibility);
        state.files.insert(
            addr.path.clone(),
            FileEntry {
                data,
                visibility: opts.visibility.unwrap_or_default(),
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }
}

impl Adapter for InMemoryAdapter {
    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::base()
            .with(Capability::Collection)
            .with(Capability::Streamable)
    }

    fn read(&self, addr: &Address) -> Result<Bytes> {
        self.read_state()
            .files
            .get(&addr.path)
            .map(|entry| entry.data.clone())
            .ok_or_else(|| Error::not_found(addr.clone()))
    }

    fn write(&self, addr: &Address, data: Bytes, opts: &WriteOptions) -> Result<()> {
        self.insert_file(addr, data, opts)
    }

    fn delete(&self, addr: &Address) -> Result<()> {
        self.write_state().files.remove(&addr.path);
        Ok(())
    }

    fn rename(&self, src: &Address, dst: &Address, opts: &WriteOptions) -> Result<()> {
        let mut state = self.write_state();
        if Self::is_dir(&state, &dst.path) {
            return Err(Error::conflict(dst.clone(), "a directory exists here"));
        }
        let entry = state
            .files
            .remove(&src.path)
            .ok_or_else(|| Error::not_found(src.clone()))?;
        Self::ensure_parents(&mut state, &dst.path, opts.directory_visibility);
        state.files.insert(
            dst.path.clone(),
            FileEntry {
                visibility: opts.visibility.unwrap_or(entry.visibility),
                ..entry
            },
        );
        Ok(())
    }

    fn copy(&self, src: &Address, dst: &Address, opts: &WriteOptions) -> Result<()> {
        let mut state = self.write_state();
        if Self::is_dir(&state, &dst.path) {
            return Err(Error::conflict(dst.clone(), "a directory exists here"));
        }
        let entry = state
            .files
            .get(&src.path)
            .ok_or_else(|| Error::not_found(src.clone()))?;
        let copied = FileEntry {
            data: entry.data.clone(),
            visibility: opts.visibility.unwrap_or(entry.visibility),
            modified: SystemTime::now(),
        };
        Self::ensure_parents(&mut state, &dst.path, opts.directory_visibility);
        state.files.insert(dst.path.clone(), copied);
        Ok(())
    }

    fn exists(&self, addr: &Address) -> Result<bool> {
        let state = self.read_state();
        Ok(state.files.contains_key(&addr.path) || Self::is_dir(&state, &addr.path))
    }

    fn visibility(&self, addr: &Address) -> Result<Visibility> {
        let state = self.read_state();
        if let Some(entry) = state.files.get(&addr.path) {
            return Ok(entry.visibility);
        }
        if addr.path == "/" {
            return Ok(Visibility::default());
        }
        state
            .dirs
            .get(&addr.path)
            .map(|d| d.visibility)
            .ok_or_else(|| Error::not_found(addr.clone()))
    }

    fn set_visibility(&self, addr: &Address, visibility: Visibility) -> Result<()> {
        let mut state = self.write_state();
        if let Some(entry) = state.files.get_mut(&addr.path) {
            entry.visibility = visibility;
            return Ok(());
        }
        if let Some(entry) = state.dirs.get_mut(&addr.path) {
            entry.visibility = visibility;
            return Ok(());
        }
        Err(Error::not_found(addr.clone()))
    }

    fn collections(&self) -> Option<&dyn CollectionAdapter> {
        Some(self)
    }

    fn streams(&self) -> Option<&dyn StreamAdapter> {
        Some(self)
    }
}

impl CollectionAdapter for InMemoryAdapter {
    fn list(&self, addr: &Address) -> Result<Vec<Resource>> {
        let state = self.read_state();
        if !Self::is_dir(&state, &addr.path) {
            return Err(Error::not_found(addr.clone()));
        }

        let mut resources = Vec::new();
        let mut seen_dirs = Vec::new();

        for (path, entry) in &state.dirs {
            if let Some(name) = child_name(&addr.path, path) {
                if path == &addr.join(name).path {
                    seen_dirs.push(name.to_string());
                    resources.push(
                        Resource::directory(addr.join(name), Some(entry.modified))
                            .with_meta("visibility", entry.visibility.to_string()),
                    );
                }
            }
        }
        for (path, entry) in &state.files {
            if let Some(name) = child_name(&addr.path, path) {
                if path == &addr.join(name).path {
                    resources.push(
                        Resource::file(
                            addr.join(name),
                            entry.data.len() as u64,
                            Some(entry.modified),
                        )
                        .with_meta("visibility", entry.visibility.to_string()),
                    );
                }
            }
        }
        Ok(resources)
    }

    fn create_collection(&self, addr: &Address, opts: &WriteOptions) -> Result<()> {
        let mut state = self.write_state();
        if state.files.contains_key(&addr.path) {
            return Err(Error::conflict(addr.clone(), "a file exists here"));
        }
        if addr.path == "/" {
            return Ok(());
        }
        Self::ensure_parents(&mut state, &addr.path, opts.directory_visibility);
        state.dirs.entry(addr.path.clone()).or_insert(DirEntry {
            visibility: opts.visibility.unwrap_or_default(),
            modified: SystemTime::now(),
        });
        Ok(())
    }

    fn delete_collection(&self, addr: &Address, recursive: bool) -> Result<()> {
        let mut state = self.write_state();
        if !Self::is_dir(&state, &addr.path) {
            return Err(Error::not_found(addr.clone()));
        }

        let has_children = state
            .files
            .keys()
            .chain(state.dirs.keys())
            .any(|path| path != &addr.path && under(&addr.path, path));

        if has_children && !recursive {
            return Err(Error::conflict(addr.clone(), "collection not empty"));
        }

        state.files.retain(|path, _| !under(&addr.path, path));
        state.dirs.retain(|path, _| !under(&addr.path, path));
        Ok(())
    }
}

impl StreamAdapter for InMemoryAdapter {
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
        self.insert_file(addr, Bytes::from(data), &opts.write)
    }
}
