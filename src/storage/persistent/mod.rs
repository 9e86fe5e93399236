//! File-backed registry store.
//!
//! A registry is written as one self-describing file:
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ "PREG" │ codec version                         │
//! ├───────────────────────────────────────────────┤
//! │ frame: RegistryHeader (JSON, CRC32)           │
//! ├───────────────────────────────────────────────┤
//! │ frame: Registry (JSON, CRC32)                 │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! Writes go to a uniquely named temp file in the same directory, are
//! fsynced, and renamed over the target, all under an exclusive
//! `<file>.lock`. Readers never take the lock: they see either the old file
//! or the new one. Loads re-check the header against the body (entry count,
//! cluster count, token cap, BLAKE3 fingerprint) before returning.

mod codec;
mod file_lock;

pub use file_lock::WriterLock;

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{RegistryResult, StorageError, ValidationError};
use crate::registry::Registry;
use crate::storage::traits::RegistryStore;

/// Version of the header/body layout inside the frames.
pub const FORMAT_VERSION: u32 = 1;

/// Conventional file name for a published registry.
pub const DEFAULT_FILE_NAME: &str = "name_mapping.preg";

/// Configuration for [`FileRegistryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Whether to fsync the temp file before the rename.
    pub sync_on_write: bool,
    /// Files larger than this are refused on load (bytes).
    pub max_file_size: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sync_on_write: true,
            max_file_size: 2 * 1024 * 1024 * 1024,
        }
    }
}

impl StoreConfig {
    const MIN_FILE_SIZE: u64 = 4 * 1024;

    /// Validates the configuration.
    ///
    /// # Errors
    /// [`ValidationError::BelowMinimum`] if `max_file_size` is under 4 KiB.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.max_file_size < Self::MIN_FILE_SIZE {
            return Err(ValidationError::BelowMinimum {
                field: "max_file_size".to_string(),
                min: Self::MIN_FILE_SIZE as usize,
                actual: usize::try_from(self.max_file_size).unwrap_or(usize::MAX),
            });
        }
        Ok(self)
    }
}

/// Header frame of a registry file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryHeader {
    /// Layout version, see [`FORMAT_VERSION`].
    pub format_version: u32,
    /// When the file was written.
    pub created_at: DateTime<Utc>,
    /// Number of blocking keys in the body.
    pub entry_count: u64,
    /// Number of canonical ids in the body.
    pub cluster_count: u32,
    /// Token cap the registry was built with.
    pub max_tokens: usize,
    /// BLAKE3 fingerprint of the body, hex.
    pub fingerprint: String,
}

impl RegistryHeader {
    fn describe(registry: &Registry) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            created_at: Utc::now(),
            entry_count: registry.len() as u64,
            cluster_count: registry.cluster_count(),
            max_tokens: registry.max_tokens(),
            fingerprint: registry.fingerprint(),
        }
    }

    fn verify(&self, registry: &Registry) -> Result<(), StorageError> {
        if self.entry_count != registry.len() as u64 {
            return Err(corrupted(format!(
                "header declares {} entries, body has {}",
                self.entry_count,
                registry.len()
            )));
        }
        if self.cluster_count != registry.cluster_count() {
            return Err(corrupted(format!(
                "header declares {} clusters, body has {}",
                self.cluster_count,
                registry.cluster_count()
            )));
        }
        if self.max_tokens != registry.max_tokens() {
            return Err(corrupted(format!(
                "header declares token cap {}, body has {}",
                self.max_tokens,
                registry.max_tokens()
            )));
        }
        let actual = registry.fingerprint();
        if self.fingerprint != actual {
            return Err(StorageError::FingerprintMismatch {
                expected: self.fingerprint.clone(),
                actual,
            });
        }
        registry.check_integrity().map_err(corrupted)
    }
}

fn corrupted(reason: impl Into<String>) -> StorageError {
    StorageError::Corrupted {
        reason: reason.into(),
    }
}

/// Maps codec-level I/O failures onto storage errors.
fn classify(err: std::io::Error) -> StorageError {
    match err.kind() {
        ErrorKind::InvalidData => corrupted(err.to_string()),
        ErrorKind::UnexpectedEof => corrupted("file is truncated"),
        _ => StorageError::Io(err),
    }
}

/// `<target>.tmp.<uuid>` in the same directory, so the rename stays on one
/// filesystem.
fn temp_path_for(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".tmp.{}", Uuid::new_v4()));
    target.with_file_name(name)
}

/// Temp file that becomes the registry on [`AtomicWrite::commit`] and is
/// removed otherwise.
struct AtomicWrite {
    temp_path: Option<PathBuf>,
    writer: Option<BufWriter<File>>,
}

impl AtomicWrite {
    fn create(target: &Path) -> std::io::Result<Self> {
        let temp_path = temp_path_for(target);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)?;
        Ok(Self {
            temp_path: Some(temp_path),
            writer: Some(BufWriter::new(file)),
        })
    }

    fn writer(&mut self) -> std::io::Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| std::io::Error::new(ErrorKind::Other, "writer already consumed"))
    }

    /// Flush, optionally fsync, rename over `target`. The commit point.
    fn commit(mut self, target: &Path, sync: bool) -> std::io::Result<()> {
        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| std::io::Error::new(ErrorKind::Other, "writer already consumed"))?;
        writer.flush()?;
        if sync {
            writer.get_ref().sync_all()?;
        }
        drop(writer);

        let temp_path = self
            .temp_path
            .take()
            .ok_or_else(|| std::io::Error::new(ErrorKind::Other, "temp path already consumed"))?;
        if let Err(err) = fs::rename(&temp_path, target) {
            let _ = fs::remove_file(&temp_path);
            return Err(err);
        }
        Ok(())
    }
}

impl Drop for AtomicWrite {
    fn drop(&mut self) {
        self.writer.take();
        if let Some(ref temp_path) = self.temp_path {
            let _ = fs::remove_file(temp_path);
        }
    }
}

/// Registry store backed by a single file.
#[derive(Debug, Clone)]
pub struct FileRegistryStore {
    path: PathBuf,
    config: StoreConfig,
}

impl FileRegistryStore {
    /// Store at `path` with default configuration.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: StoreConfig::default(),
        }
    }

    /// Store at `path` with a validated configuration.
    ///
    /// # Errors
    /// Returns a validation error if `config` is invalid.
    pub fn with_config(path: impl Into<PathBuf>, config: StoreConfig) -> RegistryResult<Self> {
        Ok(Self {
            path: path.into(),
            config: config.validate()?,
        })
    }

    /// Path of the registry file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Atomically writes `registry`, returning the header that was written.
    ///
    /// # Errors
    /// [`StorageError::Locked`] if another writer holds the lock, or the I/O
    /// failure. On error the previous file, if any, is untouched.
    pub fn save(&self, registry: &Registry) -> Result<RegistryHeader, StorageError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let lock = WriterLock::acquire(&self.path).map_err(|err| match err.kind() {
            ErrorKind::WouldBlock => StorageError::Locked {
                path: file_lock::lock_path_for(&self.path).display().to_string(),
            },
            _ => StorageError::Io(err),
        })?;
        debug!(lock = %lock.path().display(), "acquired registry writer lock");

        self.remove_stale_temps();

        let header = RegistryHeader::describe(registry);
        let mut write = AtomicWrite::create(&self.path)?;
        {
            let writer = write.writer()?;
            codec::write_header(writer)?;
            writer.write_all(&codec::encode(&header)?)?;
            writer.write_all(&codec::encode(registry)?)?;
        }
        write.commit(&self.path, self.config.sync_on_write)?;

        info!(
            path = %self.path.display(),
            keys = header.entry_count,
            clusters = header.cluster_count,
            "registry written"
        );
        Ok(header)
    }

    /// Loads and verifies the registry file.
    ///
    /// # Errors
    /// [`StorageError::Missing`] if there is no file, [`StorageError::Corrupted`]
    /// for bad magic, checksum, truncation or a header/body disagreement,
    /// [`StorageError::UnsupportedVersion`], or
    /// [`StorageError::FingerprintMismatch`].
    pub fn load_verified(&self) -> Result<(RegistryHeader, Registry), StorageError> {
        let file = self.open_for_read()?;
        let size = file.metadata()?.len();
        if size > self.config.max_file_size {
            return Err(corrupted(format!(
                "file size {size} exceeds limit {}",
                self.config.max_file_size
            )));
        }

        let limit = usize::try_from(size).unwrap_or(usize::MAX);
        let mut reader = BufReader::new(file);
        let header = read_preamble(&mut reader, limit)?;
        let registry: Registry = codec::decode(&mut reader, limit).map_err(classify)?;

        let mut trailing = [0u8; 1];
        if reader.read(&mut trailing)? != 0 {
            return Err(corrupted("trailing bytes after registry body"));
        }

        header.verify(&registry)?;
        debug!(
            path = %self.path.display(),
            keys = header.entry_count,
            fingerprint = %header.fingerprint,
            "registry loaded"
        );
        Ok((header, registry))
    }

    /// Reads only the header frame, without loading the body.
    ///
    /// # Errors
    /// As [`FileRegistryStore::load_verified`], minus the body checks.
    pub fn inspect(&self) -> Result<RegistryHeader, StorageError> {
        let file = self.open_for_read()?;
        let limit = usize::try_from(file.metadata()?.len()).unwrap_or(usize::MAX);
        read_preamble(&mut BufReader::new(file), limit)
    }

    fn open_for_read(&self) -> Result<File, StorageError> {
        File::open(&self.path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => StorageError::Missing {
                location: self.path.display().to_string(),
            },
            _ => StorageError::Io(err),
        })
    }

    /// Deletes temp files left by writers that died mid-save. Only called
    /// with the writer lock held.
    fn remove_stale_temps(&self) {
        let Some(name) = self.path.file_name() else {
            return;
        };
        let mut prefix = OsString::from(name);
        prefix.push(".tmp.");
        let Some(prefix) = prefix.to_str().map(str::to_owned) else {
            return;
        };
        let dir = match self.path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d,
            _ => Path::new("."),
        };
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            if file_name.to_str().is_some_and(|n| n.starts_with(&prefix)) {
                match fs::remove_file(entry.path()) {
                    Ok(()) => debug!(path = %entry.path().display(), "removed stale temp file"),
                    Err(err) => warn!(path = %entry.path().display(), error = %err, "failed to remove stale temp file"),
                }
            }
        }
    }
}

/// Reads magic, codec version and the header frame. No frame may claim more
/// than `limit` bytes, the size of the file being read.
fn read_preamble(reader: &mut impl Read, limit: usize) -> Result<RegistryHeader, StorageError> {
    let version = codec::read_header(reader).map_err(classify)?;
    if version != codec::CODEC_VERSION {
        return Err(StorageError::UnsupportedVersion {
            found: u32::from(version),
            expected: u32::from(codec::CODEC_VERSION),
        });
    }
    let header: RegistryHeader = codec::decode(reader, limit).map_err(classify)?;
    if header.format_version != FORMAT_VERSION {
        return Err(StorageError::UnsupportedVersion {
            found: header.format_version,
            expected: FORMAT_VERSION,
        });
    }
    Ok(header)
}

impl RegistryStore for FileRegistryStore {
    fn publish(&self, registry: &Registry) -> Result<(), StorageError> {
        self.save(registry).map(|_| ())
    }

    fn load(&self) -> Result<Arc<Registry>, StorageError> {
        self.load_verified().map(|(_, registry)| Arc::new(registry))
    }
}

/// Writes `registry` to `path` with default settings.
///
/// # Errors
/// See [`FileRegistryStore::save`].
pub fn save_registry(registry: &Registry, path: impl AsRef<Path>) -> RegistryResult<RegistryHeader> {
    Ok(FileRegistryStore::new(path.as_ref()).save(registry)?)
}

/// Loads and verifies the registry at `path`.
///
/// # Errors
/// See [`FileRegistryStore::load_verified`].
pub fn load_registry(path: impl AsRef<Path>) -> RegistryResult<Registry> {
    let (_, registry) = FileRegistryStore::new(path.as_ref()).load_verified()?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterBuilder;
    use tempfile::tempdir;

    fn sample() -> Registry {
        ClusterBuilder::new()
            .build(&["Anna Lee", "John Smith", "李雷", "Lee Anna"])
            .unwrap()
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let store = FileRegistryStore::new(dir.path().join(DEFAULT_FILE_NAME));
        let registry = sample();

        let header = store.save(&registry).unwrap();
        assert_eq!(header.entry_count, registry.len() as u64);
        assert_eq!(header.cluster_count, 3);

        let (loaded_header, loaded) = store.load_verified().unwrap();
        assert_eq!(loaded, registry);
        assert_eq!(loaded_header, header);
        assert_eq!(store.inspect().unwrap(), header);
    }

    #[test]
    fn test_save_creates_missing_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("models").join("v2").join(DEFAULT_FILE_NAME);
        save_registry(&sample(), &path).unwrap();
        assert_eq!(load_registry(&path).unwrap(), sample());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let store = FileRegistryStore::new(dir.path().join("absent.preg"));
        assert!(matches!(store.load_verified(), Err(StorageError::Missing { .. })));
    }

    #[test]
    fn test_overwrite_replaces_previous() {
        let dir = tempdir().unwrap();
        let store = FileRegistryStore::new(dir.path().join(DEFAULT_FILE_NAME));
        store.save(&sample()).unwrap();

        let smaller = ClusterBuilder::new().build(&["Jane Doe"]).unwrap();
        store.save(&smaller).unwrap();
        assert_eq!(*store.load().unwrap(), smaller);
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = tempdir().unwrap();
        let store = FileRegistryStore::new(dir.path().join(DEFAULT_FILE_NAME));
        store.save(&sample()).unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_stale_temp_is_removed_on_save() {
        let dir = tempdir().unwrap();
        let target = dir.path().join(DEFAULT_FILE_NAME);
        let stale = temp_path_for(&target);
        fs::write(&stale, b"half a registry").unwrap();

        FileRegistryStore::new(&target).save(&sample()).unwrap();
        assert!(!stale.exists());
    }

    #[test]
    fn test_held_lock_fails_fast() {
        let dir = tempdir().unwrap();
        let target = dir.path().join(DEFAULT_FILE_NAME);
        let _held = WriterLock::acquire(&target).unwrap();

        let err = FileRegistryStore::new(&target).save(&sample()).unwrap_err();
        assert!(matches!(err, StorageError::Locked { .. }));
        assert!(!target.exists());
    }

    #[test]
    fn test_unsupported_codec_version() {
        let dir = tempdir().unwrap();
        let target = dir.path().join(DEFAULT_FILE_NAME);
        save_registry(&sample(), &target).unwrap();

        let mut bytes = fs::read(&target).unwrap();
        bytes[4] = 9;
        fs::write(&target, bytes).unwrap();

        let err = FileRegistryStore::new(&target).load_verified().unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedVersion { found: 9, expected: 1 }));
    }

    #[test]
    fn test_fingerprint_mismatch_is_detected() {
        let dir = tempdir().unwrap();
        let target = dir.path().join(DEFAULT_FILE_NAME);
        let registry = sample();

        let mut header = RegistryHeader::describe(&registry);
        header.fingerprint = "0".repeat(64);
        let mut bytes = Vec::new();
        codec::write_header(&mut bytes).unwrap();
        bytes.extend(codec::encode(&header).unwrap());
        bytes.extend(codec::encode(&registry).unwrap());
        fs::write(&target, bytes).unwrap();

        let err = FileRegistryStore::new(&target).load_verified().unwrap_err();
        assert!(matches!(err, StorageError::FingerprintMismatch { .. }));
    }

    #[test]
    fn test_entry_count_mismatch_is_corruption() {
        let dir = tempdir().unwrap();
        let target = dir.path().join(DEFAULT_FILE_NAME);
        let registry = sample();

        let mut header = RegistryHeader::describe(&registry);
        header.entry_count += 1;
        let mut bytes = Vec::new();
        codec::write_header(&mut bytes).unwrap();
        bytes.extend(codec::encode(&header).unwrap());
        bytes.extend(codec::encode(&registry).unwrap());
        fs::write(&target, bytes).unwrap();

        let err = FileRegistryStore::new(&target).load_verified().unwrap_err();
        assert!(matches!(err, StorageError::Corrupted { .. }));
    }

    #[test]
    fn test_oversized_length_field_is_corruption() {
        let dir = tempdir().unwrap();
        let target = dir.path().join(DEFAULT_FILE_NAME);

        // Preamble, then a header frame claiming 512 MiB in a tiny file.
        let mut bytes = Vec::new();
        codec::write_header(&mut bytes).unwrap();
        bytes.push(codec::CODEC_VERSION);
        bytes.extend_from_slice(&(512u32 * 1024 * 1024).to_le_bytes());
        bytes.extend_from_slice(b"{}");
        fs::write(&target, bytes).unwrap();

        let store = FileRegistryStore::new(&target);
        for result in [store.load_verified().map(|_| ()), store.inspect().map(|_| ())] {
            match &result {
                Err(StorageError::Corrupted { reason }) => {
                    assert!(reason.contains("exceeds limit"), "{reason}");
                }
                other => panic!("expected corruption, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(StoreConfig::default().validate().is_ok());
        let bad = StoreConfig { max_file_size: 16, ..StoreConfig::default() };
        assert!(FileRegistryStore::with_config("x.preg", bad).is_err());
    }

    #[test]
    fn test_file_over_size_limit_is_refused() {
        let dir = tempdir().unwrap();
        let target = dir.path().join(DEFAULT_FILE_NAME);
        let big = ClusterBuilder::new()
            .build(&(0..400).map(|i| format!("player{i} family{i} given{i}")).collect::<Vec<_>>())
            .unwrap();
        save_registry(&big, &target).unwrap();

        let config = StoreConfig { max_file_size: 4096, ..StoreConfig::default() };
        let store = FileRegistryStore::with_config(&target, config).unwrap();
        assert!(matches!(store.load_verified(), Err(StorageError::Corrupted { .. })));
    }
}
