//! End-to-end tests driving heterogeneous backends through one mount table.

use std::io::Read;
use std::sync::Arc;

use omnifs_adapters::{InMemoryAdapter, LocalAdapter, ObjectStoreAdapter};
use omnifs_core::{
    Address, Bytes, CompositeAdapter, Filesystem, StreamOptions, Visibility, WriteOptions,
};

struct Fixture {
    // Keeps the local adapter's backing directory alive for the test.
    _dir: tempfile::TempDir,
    fs: Filesystem,
}

/// Memory at /cache, local disk at /disk, object store at /objects.
fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let composite = Arc::new(CompositeAdapter::new());
    let fs = Filesystem::new(composite);

    fs.mount(
        Arc::new(InMemoryAdapter::new()),
        &Address::parse("/cache"),
    )
    .unwrap();
    fs.mount(
        Arc::new(LocalAdapter::new(dir.path()).unwrap()),
        &Address::parse("/disk"),
    )
    .unwrap();
    fs.mount(
        Arc::new(ObjectStoreAdapter::new()),
        &Address::parse("/objects"),
    )
    .unwrap();

    Fixture { _dir: dir, fs }
}

#[test]
fn each_backend_reachable_under_its_prefix() {
    let f = fixture();
    for path in ["/cache/a", "/disk/a", "/objects/a"] {
        let addr = Address::parse(path);
        f.fs.write(&addr, "payload", &WriteOptions::default()).unwrap();
        assert_eq!(f.fs.read(&addr).unwrap(), Bytes::from_static(b"payload"));
    }
}

#[test]
fn unmounted_prefix_is_not_found() {
    let f = fixture();
    assert!(f
        .fs
        .read(&Address::parse("/elsewhere/x"))
        .unwrap_err()
        .is_not_found());
}

#[test]
fn longest_prefix_shadows_shorter_mount() {
    let f = fixture();
    f.fs.mount(
        Arc::new(InMemoryAdapter::new()),
        &Address::parse("/disk/scratch"),
    )
    .unwrap();

    let shadowed = Address::parse("/disk/scratch/note");
    f.fs.write(&shadowed, "in memory", &WriteOptions::default())
        .unwrap();
    // The file went to the deeper memory mount, not the disk backend.
    assert!(!f.fs.exists(&Address::parse("/disk/note")).unwrap());
    assert_eq!(
        f.fs.read(&shadowed).unwrap(),
        Bytes::from_static(b"in memory")
    );

    f.fs.unmount(&Address::parse("/disk/scratch")).unwrap();
    assert!(f.fs.read(&shadowed).unwrap_err().is_not_found());
}

#[test]
fn move_across_backends() {
    let f = fixture();
    let src = Address::parse("/cache/report");
    let dst = Address::parse("/disk/archive/report");

    f.fs.write(&src, "hello", &WriteOptions::default()).unwrap();
    f.fs.rename(&src, &dst, &WriteOptions::default()).unwrap();

    assert!(!f.fs.exists(&src).unwrap());
    assert_eq!(f.fs.read(&dst).unwrap(), Bytes::from_static(b"hello"));
}

#[test]
fn copy_across_backends_keeps_source() {
    let f = fixture();
    let src = Address::parse("/disk/seed");
    let dst = Address::parse("/objects/bucket/seed");

    f.fs.write(&src, "seed data", &WriteOptions::default())
        .unwrap();
    f.fs.copy(&src, &dst, &WriteOptions::default()).unwrap();

    assert_eq!(f.fs.read(&src).unwrap(), Bytes::from_static(b"seed data"));
    assert_eq!(f.fs.read(&dst).unwrap(), Bytes::from_static(b"seed data"));
}

#[test]
fn move_missing_source_across_backends() {
    let f = fixture();
    let err = f
        .fs
        .rename(
            &Address::parse("/cache/void"),
            &Address::parse("/disk/void"),
            &WriteOptions::default(),
        )
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn listing_returns_logical_addresses() {
    let f = fixture();
    f.fs.write(
        &Address::parse("/cache/letters/a"),
        "1",
        &WriteOptions::default(),
    )
    .unwrap();
    f.fs.write(
        &Address::parse("/cache/letters/b"),
        "2",
        &WriteOptions::default(),
    )
    .unwrap();

    let listed = f.fs.list(&Address::parse("/cache/letters")).unwrap();
    let mut paths: Vec<&str> = listed.iter().map(|r| r.address.path.as_str()).collect();
    paths.sort();
    assert_eq!(paths, vec!["/cache/letters/a", "/cache/letters/b"]);
}

#[test]
fn visibility_through_the_mount_table() {
    let f = fixture();
    let addr = Address::parse("/disk/secret");
    f.fs.write(
        &addr,
        "classified",
        &WriteOptions::with_visibility(Visibility::Private),
    )
    .unwrap();

    if cfg!(unix) {
        assert_eq!(f.fs.visibility(&addr).unwrap(), Visibility::Private);
    }
    f.fs.set_visibility(&addr, Visibility::Public).unwrap();
    assert_eq!(f.fs.visibility(&addr).unwrap(), Visibility::Public);
}

#[test]
fn streams_route_like_whole_value_operations() {
    let f = fixture();
    let addr = Address::parse("/objects/bucket/blob");
    let mut source: &[u8] = b"streamed across the table";

    f.fs.write_stream(&addr, &mut source, &StreamOptions::default())
        .unwrap();

    let mut out = Vec::new();
    f.fs.read_stream(&addr, &StreamOptions::default())
        .unwrap()
        .read_to_end(&mut out)
        .unwrap();
    assert_eq!(out, b"streamed across the table");
}

#[test]
fn capability_checked_against_resolved_backend() {
    let f = fixture();
    f.fs.write(
        &Address::parse("/cache/script"),
        "#!/bin/sh\n",
        &WriteOptions::default(),
    )
    .unwrap();

    // The memory backend cannot execute anything.
    let err = f
        .fs
        .execute(&Address::parse("/cache/script"), &[])
        .unwrap_err();
    assert!(err.is_capability());
}

#[cfg(unix)]
#[test]
fn execute_through_the_mount_table() {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    let f = fixture();
    let addr = Address::parse("/disk/tool.sh");
    f.fs.write(&addr, "#!/bin/sh\necho routed\n", &WriteOptions::default())
        .unwrap();
    fs::set_permissions(
        f._dir.path().join("tool.sh"),
        fs::Permissions::from_mode(0o755),
    )
    .unwrap();

    let output = f.fs.execute(&addr, &[]).unwrap();
    assert!(output.success());
    assert_eq!(output.stdout, Bytes::from_static(b"routed\n"));
}

#[test]
fn traversal_rejected_before_routing() {
    let f = fixture();
    let err = f.fs.read(&Address::parse("/cache/../../etc/passwd")).unwrap_err();
    assert!(err.is_traversal());
}

#[test]
fn dot_segments_resolve_before_routing() {
    let f = fixture();
    f.fs.write(
        &Address::parse("/cache/dir/value"),
        "v",
        &WriteOptions::default(),
    )
    .unwrap();
    assert_eq!(
        f.fs.read(&Address::parse("/cache/./other/../dir/value"))
            .unwrap(),
        Bytes::from_static(b"v")
    );
}
