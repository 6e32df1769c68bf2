//! Advisory locks through a sibling `<file>.lock` file.
//!
//! The lock file contains the id of the owning process.
//! A lock whose owner is no longer running is stale and gets removed on the next check.
//! The lock file is written under a private name first and then hard linked into place,
//! so of several concurrent callers exactly one acquires the lock.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::StorageError;

/// Path of the lock file guarding `path`.
pub fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

#[cfg(target_os = "linux")]
fn is_process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(not(target_os = "linux"))]
fn is_process_alive(_pid: u32) -> bool {
    true
}

/// Whether another simulation holds the lock of `path`.
///
/// Stale locks are removed and reported as unlocked.
pub fn is_file_locked(path: &Path) -> Result<bool, StorageError> {
    let lock = lock_path(path);
    let content = match std::fs::read_to_string(&lock) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    match content.trim().parse::<u32>() {
        Ok(pid) if !is_process_alive(pid) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(pid, lock = %lock.display(), "removing stale lock");
            match std::fs::remove_file(&lock) {
                Ok(()) => Ok(false),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(_) => Ok(true),
            }
        }
        // Locks without a readable owner never expire
        _ => Ok(true),
    }
}

static PENDING_LOCKS: AtomicUsize = AtomicUsize::new(0);

fn already_locked(path: &Path) -> StorageError {
    StorageError::LockError(format!(
        "cannot lock already locked file {}",
        path.display()
    ))
}

/// Creates the lock of `path` owned by the running process.
pub fn lock_file(path: &Path) -> Result<(), StorageError> {
    if is_file_locked(path)? {
        return Err(already_locked(path));
    }
    let lock = lock_path(path);
    let pid = std::process::id();
    let mut pending = lock.clone().into_os_string();
    pending.push(format!(
        ".{pid}.{}",
        PENDING_LOCKS.fetch_add(1, Ordering::Relaxed)
    ));
    let pending = PathBuf::from(pending);
    std::fs::write(&pending, pid.to_string())?;
    let linked = std::fs::hard_link(&pending, &lock);
    if let Err(_e) = std::fs::remove_file(&pending) {
        #[cfg(feature = "tracing")]
        tracing::warn!(file = %pending.display(), error = %_e, "could not remove pending lock");
    }
    match linked {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(already_locked(path)),
        Err(e) => Err(e.into()),
    }
}

/// Removes the lock of `path`.
pub fn unlock_file(path: &Path) -> Result<(), StorageError> {
    if !is_file_locked(path)? {
        return Err(StorageError::LockError(format!(
            "cannot unlock already unlocked file {}",
            path.display()
        )));
    }
    std::fs::remove_file(lock_path(path))?;
    Ok(())
}
