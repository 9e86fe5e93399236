//! Exclusive writer lock for a registry file.
//!
//! The lock lives in a sibling file (`<registry>.lock`) so readers never
//! contend with it. It is non-blocking: a second writer fails immediately.
//! The OS releases the lock when the handle is closed, so dropping
//! [`WriterLock`] (or the process dying) frees it.

use std::fs::{File, OpenOptions};
use std::io::{Error as IoError, ErrorKind, Result as IoResult};
use std::path::{Path, PathBuf};

/// Held exclusive lock on `<registry>.lock`.
#[derive(Debug)]
pub struct WriterLock {
    _file: File,
    path: PathBuf,
}

impl WriterLock {
    /// Tries to take the writer lock for `target`.
    ///
    /// # Errors
    /// `ErrorKind::WouldBlock` if another writer holds it, or the I/O error
    /// from creating the lock file.
    pub fn acquire(target: &Path) -> IoResult<Self> {
        let path = lock_path_for(target);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        Self::try_lock(&file)?;

        Ok(Self { _file: file, path })
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(unix)]
    fn try_lock(file: &File) -> IoResult<()> {
        use std::os::unix::io::AsRawFd;

        let fd = file.as_raw_fd();
        // SAFETY: `fd` is a valid open descriptor owned by `file` for the
        // duration of the call.
        let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };

        if result != 0 {
            let errno = IoError::last_os_error();
            if errno.raw_os_error() == Some(libc::EWOULDBLOCK) {
                return Err(IoError::new(
                    ErrorKind::WouldBlock,
                    "registry is locked by another writer",
                ));
            }
            return Err(errno);
        }
        Ok(())
    }

    #[cfg(windows)]
    fn try_lock(file: &File) -> IoResult<()> {
        use std::os::windows::io::AsRawHandle;
        use windows_sys::Win32::Foundation::HANDLE;
        use windows_sys::Win32::Storage::FileSystem::{
            LockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
        };

        let handle = file.as_raw_handle() as HANDLE;
        // SAFETY: `handle` is owned by `file`; `overlapped` outlives the call.
        let result = unsafe {
            let mut overlapped = std::mem::zeroed::<windows_sys::Win32::System::IO::OVERLAPPED>();
            LockFileEx(
                handle,
                LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
                0,
                1,
                0,
                &mut overlapped,
            )
        };

        if result == 0 {
            let err = IoError::last_os_error();
            return Err(IoError::new(
                ErrorKind::WouldBlock,
                format!("registry is locked by another writer: {err}"),
            ));
        }
        Ok(())
    }

    #[cfg(not(any(unix, windows)))]
    fn try_lock(_file: &File) -> IoResult<()> {
        Err(IoError::new(
            ErrorKind::Unsupported,
            "file locking not supported on this platform",
        ))
    }
}

/// `<target>.lock`, next to the registry file.
pub(crate) fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    target.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_lock_path_is_sibling() {
        let path = lock_path_for(Path::new("/data/name_mapping.preg"));
        assert_eq!(path, Path::new("/data/name_mapping.preg.lock"));
    }

    #[test]
    fn test_lock_acquire_release() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("registry.preg");
        {
            let lock = WriterLock::acquire(&target).unwrap();
            assert!(lock.path().exists());
        }
        assert!(WriterLock::acquire(&target).is_ok());
    }

    #[test]
    fn test_lock_prevents_second_writer() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("registry.preg");

        let _held = WriterLock::acquire(&target).unwrap();
        let err = WriterLock::acquire(&target).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldBlock);
    }
}
