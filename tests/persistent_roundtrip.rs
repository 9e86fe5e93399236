//! On-disk registry tests.
//!
//! These verify that the file store:
//! - Round-trips every key → id pair exactly
//! - Rejects flipped bytes, truncation and foreign files
//! - Keeps a second writer out while one holds the lock

#![cfg(feature = "persistent")]

use std::fs;

use player_registry::storage::persistent::{WriterLock, DEFAULT_FILE_NAME};
use player_registry::{
    build, load_registry, save_registry, FileRegistryStore, RegistryStore, Resolver, StorageError,
};
use tempfile::tempdir;

fn corpus() -> Vec<&'static str> {
    vec!["Magnus Carlsen", "Carlsen, Magnus", "丁立人", "Ding Liren", "Hou Yifan", "Anish Giri"]
}

#[test]
fn test_roundtrip_preserves_every_pair() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(DEFAULT_FILE_NAME);
    let registry = build(&corpus()).unwrap();

    save_registry(&registry, &path).unwrap();
    let loaded = load_registry(&path).unwrap();

    assert_eq!(loaded.len(), registry.len());
    for (key, id) in registry.iter() {
        assert_eq!(loaded.get(key.as_str()), Some(id), "key {key} changed");
    }
    assert_eq!(loaded.cluster_count(), registry.cluster_count());
    assert_eq!(loaded.max_tokens(), registry.max_tokens());
}

#[test]
fn test_reloaded_registry_resolves_identically() {
    let dir = tempdir().unwrap();
    let store = FileRegistryStore::new(dir.path().join(DEFAULT_FILE_NAME));
    let registry = build(&corpus()).unwrap();
    store.publish(&registry).unwrap();

    let before = Resolver::new(registry.into_shared());
    let after = Resolver::new(store.load().unwrap());
    let queries = ["Liren Ding", "Giri Anish", "Yifan Hou", "Nobody Here"];
    assert_eq!(before.resolve_batch(&queries), after.resolve_batch(&queries));
}

#[test]
fn test_empty_registry_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(DEFAULT_FILE_NAME);
    let empty: [&str; 0] = [];
    save_registry(&build(&empty).unwrap(), &path).unwrap();

    let loaded = load_registry(&path).unwrap();
    assert!(loaded.is_empty());
    assert_eq!(loaded.cluster_count(), 0);
}

#[test]
fn test_every_flipped_byte_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(DEFAULT_FILE_NAME);
    save_registry(&build(&["Anna Lee", "Jane Doe"]).unwrap(), &path).unwrap();
    let pristine = fs::read(&path).unwrap();

    for i in 0..pristine.len() {
        let mut bytes = pristine.clone();
        bytes[i] ^= 0x5A;
        fs::write(&path, &bytes).unwrap();

        let result = FileRegistryStore::new(&path).load_verified();
        assert!(
            matches!(
                result,
                Err(StorageError::Corrupted { .. } | StorageError::UnsupportedVersion { .. })
            ),
            "flip at byte {i} was not rejected: {result:?}"
        );
    }
}

#[test]
fn test_truncation_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(DEFAULT_FILE_NAME);
    save_registry(&build(&corpus()).unwrap(), &path).unwrap();
    let pristine = fs::read(&path).unwrap();

    for cut in [0, 3, 5, pristine.len() / 2, pristine.len() - 1] {
        fs::write(&path, &pristine[..cut]).unwrap();
        let err = FileRegistryStore::new(&path).load_verified().unwrap_err();
        assert!(matches!(err, StorageError::Corrupted { .. }), "cut at {cut}: {err:?}");
    }
}

#[test]
fn test_trailing_garbage_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(DEFAULT_FILE_NAME);
    save_registry(&build(&corpus()).unwrap(), &path).unwrap();

    let mut bytes = fs::read(&path).unwrap();
    bytes.extend_from_slice(b"extra");
    fs::write(&path, bytes).unwrap();

    let err = FileRegistryStore::new(&path).load_verified().unwrap_err();
    assert!(matches!(err, StorageError::Corrupted { .. }));
}

#[test]
fn test_foreign_file_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(DEFAULT_FILE_NAME);
    fs::write(&path, b"name,player\nAnna Lee,player_0\n").unwrap();

    let err = load_registry(&path).unwrap_err();
    assert!(err.is_corruption());
}

#[test]
fn test_second_writer_fails_fast() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(DEFAULT_FILE_NAME);
    save_registry(&build(&["Anna Lee"]).unwrap(), &path).unwrap();

    let _held = WriterLock::acquire(&path).unwrap();
    let err = FileRegistryStore::new(&path)
        .save(&build(&["John Smith"]).unwrap())
        .unwrap_err();
    assert!(matches!(err, StorageError::Locked { .. }));

    // The published file is untouched and still readable without the lock.
    let loaded = load_registry(&path).unwrap();
    assert!(loaded.contains_key("annalee"));
    assert!(!loaded.contains_key("johnsmith"));
}

#[test]
fn test_inspect_reads_header_only() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(DEFAULT_FILE_NAME);
    let registry = build(&corpus()).unwrap();
    let written = save_registry(&registry, &path).unwrap();

    let header = FileRegistryStore::new(&path).inspect().unwrap();
    assert_eq!(header, written);
    assert_eq!(header.entry_count, registry.len() as u64);
    assert_eq!(header.fingerprint, registry.fingerprint());
}
