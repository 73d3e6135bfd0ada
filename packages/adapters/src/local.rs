//! Local-disk adapter rooted at a host directory.

use std::{ffi, fs, io, path, process};

use bytes::Bytes;

use omnifs_core::{
    Adapter, Address, ByteStream, Capability, CapabilitySet, CollectionAdapter, Error, ExecOutput,
    ExecutableAdapter, Resource, Result, StreamAdapter, StreamOptions, Visibility, WriteOptions,
};

#[cfg(unix)]
const PUBLIC_FILE_MODE: u32 = 0o644;
#[cfg(unix)]
const PRIVATE_FILE_MODE: u32 = 0o600;
#[cfg(unix)]
const PUBLIC_DIR_MODE: u32 = 0o755;
#[cfg(unix)]
const PRIVATE_DIR_MODE: u32 = 0o700;

/// Backend over a directory tree on the host filesystem.
///
/// All addresses resolve to locations under `root`; address segments are
/// joined as normal path components only, so a resolved location can never
/// leave the root. Visibility maps to unix permission bits (on non-unix
/// hosts everything reads as public and visibility changes are no-ops).
pub struct LocalAdapter {
    root: path::PathBuf,
}

impl LocalAdapter {
    /// Open an adapter over `root`, which must be an existing writable
    /// directory.
    pub fn new(root: impl Into<path::PathBuf>) -> Result<LocalAdapter> {
        let root = root.into();
        let attr = fs::metadata(&root).map_err(|e| Error::backend("open_root", e))?;

        if !attr.is_dir() {
            return Err(Error::backend(
                "open_root",
                io::Error::other(format!("{} is not a directory", root.display())),
            ));
        }
        if attr.permissions().readonly() {
            return Err(Error::backend(
                "open_root",
                io::Error::other(format!("{} is not writable", root.display())),
            ));
        }

        let root = root
            .canonicalize()
            .map_err(|e| Error::backend("open_root", e))?;
        Ok(LocalAdapter { root })
    }

    /// The canonicalized root directory.
    pub fn root(&self) -> &path::Path {
        &self.root
    }

    fn full_path(&self, addr: &Address) -> Result<path::PathBuf> {
        let addr = addr.normalize()?;
        Ok(self
            .root
            .components()
            .chain(
                addr.segments()
                    .map(|s| path::Component::Normal(ffi::OsStr::new(s))),
            )
            .collect())
    }

    fn ensure_parent(
        file_path: &path::Path,
        opts: &WriteOptions,
        operation: &'static str,
    ) -> Result<()> {
        if let Some(parent) = file_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| Error::backend(operation, e))?;
                if let Some(visibility) = opts.directory_visibility {
                    Self::apply_mode(parent, visibility, true, operation)?;
                }
            }
        }
        Ok(())
    }

    #[cfg(unix)]
    fn apply_mode(
        file_path: &path::Path,
        visibility: Visibility,
        is_dir: bool,
        operation: &'static str,
    ) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let mode = match (visibility, is_dir) {
            (Visibility::Public, false) => PUBLIC_FILE_MODE,
            (Visibility::Private, false) => PRIVATE_FILE_MODE,
            (Visibility::Public, true) => PUBLIC_DIR_MODE,
            (Visibility::Private, true) => PRIVATE_DIR_MODE,
        };
        fs::set_permissions(file_path, fs::Permissions::from_mode(mode))
            .map_err(|e| Error::backend(operation, e))
    }

    #[cfg(not(unix))]
    fn apply_mode(
        _file_path: &path::Path,
        _visibility: Visibility,
        _is_dir: bool,
        _operation: &'static str,
    ) -> Result<()> {
        Ok(())
    }

    #[cfg(unix)]
    fn mode_visibility(attr: &fs::Metadata) -> Visibility {
        use std::os::unix::fs::PermissionsExt;

        // World-readable means public.
        if attr.permissions().mode() & 0o004 != 0 {
            Visibility::Public
        } else {
            Visibility::Private
        }
    }

    #[cfg(not(unix))]
    fn mode_visibility(_attr: &fs::Metadata) -> Visibility {
        Visibility::Public
    }

    #[cfg(unix)]
    fn is_executable(attr: &fs::Metadata) -> bool {
        use std::os::unix::fs::PermissionsExt;
        attr.is_file() && attr.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    fn is_executable(_attr: &fs::Metadata) -> bool {
        false
    }

    fn map_io(addr: &Address, operation: &'static str, err: io::Error) -> Error {
        if err.kind() == io::ErrorKind::NotFound {
            Error::not_found(addr.clone())
        } else {
            Error::backend(operation, err)
        }
    }

    fn describe(addr: &Address, name: &str, attr: &fs::Metadata) -> Resource {
        let modified = attr.modified().ok();
        let resource = if attr.is_dir() {
            Resource::directory(addr.join(name), modified)
        } else {
            Resource::file(addr.join(name), attr.len(), modified)
        };
        resource
            .with_meta("visibility", Self::mode_visibility(attr).to_string())
            .with_meta("executable", Self::is_executable(attr).to_string())
    }
}

impl Adapter for LocalAdapter {
    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::base()
            .with(Capability::Collection)
            .with(Capability::Streamable)
            .with(Capability::Executable)
    }

    fn read(&self, addr: &Address) -> Result<Bytes> {
        let file_path = self.full_path(addr)?;
        log::debug!("Reading {}...", file_path.display());
        fs::read(&file_path)
            .map(Bytes::from)
            .map_err(|e| Self::map_io(addr, "read", e))
    }

    fn write(&self, addr: &Address, data: Bytes, opts: &WriteOptions) -> Result<()> {
        let file_path = self.full_path(addr)?;
        log::debug!("Writing {}...", file_path.display());

        Self::ensure_parent(&file_path, opts, "write")?;
        fs::write(&file_path, &data).map_err(|e| Error::backend("write", e))?;
        if let Some(visibility) = opts.visibility {
            Self::apply_mode(&file_path, visibility, false, "write")?;
        }
        Ok(())
    }

    fn delete(&self, addr: &Address) -> Result<()> {
        let file_path = self.full_path(addr)?;
        match fs::remove_file(&file_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::backend("delete", e)),
        }
    }

    fn rename(&self, src: &Address, dst: &Address, opts: &WriteOptions) -> Result<()> {
        let src_path = self.full_path(src)?;
        let dst_path = self.full_path(dst)?;
        Self::ensure_parent(&dst_path, opts, "rename")?;
        fs::rename(&src_path, &dst_path).map_err(|e| Self::map_io(src, "rename", e))?;
        if let Some(visibility) = opts.visibility {
            Self::apply_mode(&dst_path, visibility, dst_path.is_dir(), "rename")?;
        }
        Ok(())
    }

    fn copy(&self, src: &Address, dst: &Address, opts: &WriteOptions) -> Result<()> {
        let src_path = self.full_path(src)?;
        let dst_path = self.full_path(dst)?;
        Self::ensure_parent(&dst_path, opts, "copy")?;
        fs::copy(&src_path, &dst_path).map_err(|e| Self::map_io(src, "copy", e))?;
        if let Some(visibility) = opts.visibility {
            Self::apply_mode(&dst_path, visibility, false, "copy")?;
        }
        Ok(())
    }

    fn exists(&self, addr: &Address) -> Result<bool> {
        let file_path = self.full_path(addr)?;
        Ok(file_path.symlink_metadata().is_ok())
    }

    fn visibility(&self, addr: &Address) -> Result<Visibility> {
        let file_path = self.full_path(addr)?;
        let attr = fs::metadata(&file_path).map_err(|e| Self::map_io(addr, "visibility", e))?;
        Ok(Self::mode_visibility(&attr))
    }

    fn set_visibility(&self, addr: &Address, visibility: Visibility) -> Result<()> {
        let file_path = self.full_path(addr)?;
        let attr =
            fs::metadata(&file_path).map_err(|e| Self::map_io(addr, "set_visibility", e))?;
        Self::apply_mode(&file_path, visibility, attr.is_dir(), "set_visibility")
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
}

impl CollectionAdapter for LocalAdapter {
    fn list(&self, addr: &Address) -> Result<Vec<Resource>> {
        let dir_path = self.full_path(addr)?;
        let attr = fs::metadata(&dir_path).map_err(|e| Self::map_io(addr, "list", e))?;
        if !attr.is_dir() {
            return Err(Error::not_found(addr.clone()));
        }

        let mut resources = Vec::new();
        for entry in walkdir::WalkDir::new(&dir_path)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| Error::backend("list", e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let attr = entry.metadata().map_err(|e| Error::backend("list", e))?;
            resources.push(Self::describe(addr, &name, &attr));
        }
        Ok(resources)
    }

    fn create_collection(&self, addr: &Address, opts: &WriteOptions) -> Result<()> {
        let dir_path = self.full_path(addr)?;
        if dir_path.is_file() {
            return Err(Error::conflict(addr.clone(), "a file exists here"));
        }
        fs::create_dir_all(&dir_path).map_err(|e| Error::backend("create_collection", e))?;
        if let Some(visibility) = opts.visibility {
            Self::apply_mode(&dir_path, visibility, true, "create_collection")?;
        }
        Ok(())
    }

    fn delete_collection(&self, addr: &Address, recursive: bool) -> Result<()> {
        let dir_path = self.full_path(addr)?;
        if !dir_path.is_dir() {
            return Err(Error::not_found(addr.clone()));
        }

        let result = if recursive {
            fs::remove_dir_all(&dir_path)
        } else {
            fs::remove_dir(&dir_path)
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::DirectoryNotEmpty => {
                Err(Error::conflict(addr.clone(), "collection not empty"))
            }
            Err(e) => Err(Self::map_io(addr, "delete_collection", e)),
        }
    }
}

impl StreamAdapter for LocalAdapter {
    fn read_stream(&self, addr: &Address, opts: &StreamOptions) -> Result<ByteStream> {
        let file_path = self.full_path(addr)?;
        log::debug!("Streaming from {}...", file_path.display());
        let file = fs::File::open(&file_path).map_err(|e| Self::map_io(addr, "read_stream", e))?;
        Ok(Box::new(io::BufReader::with_capacity(
            opts.chunk_size.max(1),
            file,
        )))
    }

    fn write_stream(
        &self,
        addr: &Address,
        source: &mut dyn io::Read,
        opts: &StreamOptions,
    ) -> Result<()> {
        let file_path = self.full_path(addr)?;
        log::debug!("Streaming to {}...", file_path.display());

        Self::ensure_parent(&file_path, &opts.write, "write_stream")?;
        let file =
            fs::File::create(&file_path).map_err(|e| Error::backend("write_stream", e))?;
        let mut writer = io::BufWriter::with_capacity(opts.chunk_size.max(1), file);
        io::copy(source, &mut writer).map_err(|e| Error::backend("write_stream", e))?;
        io::Write::flush(&mut writer).map_err(|e| Error::backend("write_stream", e))?;

        if let Some(visibility) = opts.write.visibility {
            Self::apply_mode(&file_path, visibility, false, "write_stream")?;
        }
        Ok(())
    }
}

impl ExecutableAdapter for LocalAdapter {
    fn execute(&self, addr: &Address, args: &[String]) -> Result<ExecOutput> {
        let file_path = self.full_path(addr)?;
        if !file_path.is_file() {
            return Err(Error::not_found(addr.clone()));
        }
        log::debug!("Executing {}...", file_path.display());

        let output = process::Command::new(&file_path)
            .args(args)
            .output()
            .map_err(|e| Error::backend("execute", e))?;
        Ok(ExecOutput {
            status: output.status.code(),
            stdout: Bytes::from(output.stdout),
            stderr: Bytes::from(output.stderr),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    struct TestLocalAdapter {
        // Keeps the directory alive until the adapter is dropped.
        _dir: tempfile::TempDir,
        adapter: LocalAdapter,
    }

    impl TestLocalAdapter {
        fn new() -> TestLocalAdapter {
            let dir = tempfile::tempdir().unwrap();
            let adapter = LocalAdapter::new(dir.path()).unwrap();
            TestLocalAdapter { _dir: dir, adapter }
        }
    }

    fn write(adapter: &LocalAdapter, path: &str, data: &'static [u8]) {
        adapter
            .write(
                &Address::parse(path),
                Bytes::from_static(data),
                &WriteOptions::default(),
            )
            .unwrap();
    }

    #[test]
    fn rejects_missing_root() {
        assert!(LocalAdapter::new("/definitely/not/a/real/root").is_err());
    }

    #[test]
    fn rejects_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        fs::write(&file, b"x").unwrap();
        assert!(LocalAdapter::new(file).is_err());
    }

    #[test]
    fn write_read_roundtrip() {
        let t = TestLocalAdapter::new();
        write(&t.adapter, "/nested/greeting", b"hello");
        assert_eq!(
            t.adapter.read(&Address::parse("/nested/greeting")).unwrap(),
            Bytes::from_static(b"hello")
        );
    }

    #[test]
    fn read_missing_is_not_found() {
        let t = TestLocalAdapter::new();
        assert!(t
            .adapter
            .read(&Address::parse("/missing"))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn traversal_rejected_before_disk_access() {
        let t = TestLocalAdapter::new();
        assert!(t
            .adapter
            .read(&Address::parse("/../outside"))
            .unwrap_err()
            .is_traversal());
    }

    #[test]
    fn dot_segments_resolved_inside_root() {
        let t = TestLocalAdapter::new();
        write(&t.adapter, "/a/b", b"v");
        assert_eq!(
            t.adapter.read(&Address::parse("/a/./x/../b")).unwrap(),
            Bytes::from_static(b"v")
        );
    }

    #[test]
    fn delete_is_idempotent() {
        let t = TestLocalAdapter::new();
        write(&t.adapter, "/x", b"v");
        t.adapter.delete(&Address::parse("/x")).unwrap();
        t.adapter.delete(&Address::parse("/x")).unwrap();
        assert!(!t.adapter.exists(&Address::parse("/x")).unwrap());
    }

    #[test]
    fn rename_and_copy() {
        let t = TestLocalAdapter::new();
        write(&t.adapter, "/src", b"v");

        t.adapter
            .copy(
                &Address::parse("/src"),
                &Address::parse("/copied/here"),
                &WriteOptions::default(),
            )
            .unwrap();
        assert!(t.adapter.exists(&Address::parse("/src")).unwrap());
        assert_eq!(
            t.adapter.read(&Address::parse("/copied/here")).unwrap(),
            Bytes::from_static(b"v")
        );

        t.adapter
            .rename(
                &Address::parse("/src"),
                &Address::parse("/moved"),
                &WriteOptions::default(),
            )
            .unwrap();
        assert!(!t.adapter.exists(&Address::parse("/src")).unwrap());
        assert!(t.adapter.exists(&Address::parse("/moved")).unwrap());
    }

    #[test]
    fn rename_missing_is_not_found() {
        let t = TestLocalAdapter::new();
        assert!(t
            .adapter
            .rename(
                &Address::parse("/no"),
                &Address::parse("/where"),
                &WriteOptions::default()
            )
            .unwrap_err()
            .is_not_found());
    }

    #[cfg(unix)]
    #[test]
    fn visibility_maps_to_mode_bits() {
        use std::os::unix::fs::PermissionsExt;

        let t = TestLocalAdapter::new();
        let addr = Address::parse("/secret");
        t.adapter
            .write(
                &addr,
                Bytes::from_static(b"v"),
                &WriteOptions::with_visibility(Visibility::Private),
            )
            .unwrap();

        let full = t.adapter.full_path(&addr).unwrap();
        assert_eq!(
            fs::metadata(&full).unwrap().permissions().mode() & 0o777,
            PRIVATE_FILE_MODE
        );
        assert_eq!(t.adapter.visibility(&addr).unwrap(), Visibility::Private);

        t.adapter.set_visibility(&addr, Visibility::Public).unwrap();
        assert_eq!(t.adapter.visibility(&addr).unwrap(), Visibility::Public);
    }

    #[test]
    fn visibility_of_missing_is_not_found() {
        let t = TestLocalAdapter::new();
        assert!(t
            .adapter
            .visibility(&Address::parse("/missing"))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn list_direct_children_with_metadata() {
        let t = TestLocalAdapter::new();
        write(&t.adapter, "/top/file", b"1234");
        write(&t.adapter, "/top/sub/deeper", b"x");

        let listed = t.adapter.list(&Address::parse("/top")).unwrap();
        assert_eq!(listed.len(), 2);

        let file = listed.iter().find(|r| r.is_file()).unwrap();
        assert_eq!(file.address, Address::parse("/top/file"));
        assert_eq!(file.size, 4);
        assert!(file.metadata.contains_key("visibility"));

        let dir = listed.iter().find(|r| r.is_directory()).unwrap();
        assert_eq!(dir.address, Address::parse("/top/sub"));
    }

    #[test]
    fn list_missing_is_not_found() {
        let t = TestLocalAdapter::new();
        assert!(t
            .adapter
            .list(&Address::parse("/void"))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn collection_lifecycle() {
        let t = TestLocalAdapter::new();
        t.adapter
            .create_collection(&Address::parse("/a/b/c"), &WriteOptions::default())
            .unwrap();
        assert!(t.adapter.exists(&Address::parse("/a/b/c")).unwrap());

        write(&t.adapter, "/a/b/c/file", b"v");
        assert!(t
            .adapter
            .delete_collection(&Address::parse("/a/b/c"), false)
            .unwrap_err()
            .is_conflict());

        t.adapter
            .delete_collection(&Address::parse("/a/b/c"), true)
            .unwrap();
        assert!(!t.adapter.exists(&Address::parse("/a/b/c")).unwrap());
    }

    #[test]
    fn delete_missing_collection_is_not_found() {
        let t = TestLocalAdapter::new();
        assert!(t
            .adapter
            .delete_collection(&Address::parse("/nope"), true)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn stream_roundtrip() {
        let t = TestLocalAdapter::new();
        let addr = Address::parse("/streamed");
        let mut source: &[u8] = b"lazy bytes";
        t.adapter
            .write_stream(&addr, &mut source, &StreamOptions::default())
            .unwrap();

        let mut out = Vec::new();
        t.adapter
            .read_stream(&addr, &StreamOptions::default())
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, b"lazy bytes");
    }

    #[cfg(unix)]
    #[test]
    fn execute_captures_output() {
        use std::os::unix::fs::PermissionsExt;

        let t = TestLocalAdapter::new();
        let addr = Address::parse("/hello.sh");
        write(&t.adapter, "/hello.sh", b"#!/bin/sh\necho \"hi $1\"\n");

        let full = t.adapter.full_path(&addr).unwrap();
        fs::set_permissions(&full, fs::Permissions::from_mode(0o755)).unwrap();

        let output = t.adapter.execute(&addr, &["there".to_string()]).unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, Bytes::from_static(b"hi there\n"));
    }

    #[test]
    fn execute_missing_is_not_found() {
        let t = TestLocalAdapter::new();
        assert!(t
            .adapter
            .execute(&Address::parse("/no-such-binary"), &[])
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn capabilities_exclude_mountable() {
        let t = TestLocalAdapter::new();
        let caps = t.adapter.capabilities();
        assert!(caps.contains(Capability::Executable));
        assert!(!caps.contains(Capability::Mountable));
    }
}
