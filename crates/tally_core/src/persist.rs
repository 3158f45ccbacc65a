//! Crash-safe file helpers shared by the file-backed stores.

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Replaces `path` with `data` atomically.
///
/// Uses write-then-rename:
/// 1. Write to `<path>.tmp`
/// 2. Sync the temporary file to disk
/// 3. Rename it over `path`
/// 4. Fsync the parent directory so the rename is durable
pub fn write_atomic(path: &Path, data: &[u8]) -> CoreResult<()> {
    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");
    let temp_path = Path::new(&temp_path);

    let mut file = File::create(temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(temp_path, path)?;
    sync_parent(path)?;
    Ok(())
}

/// Reads a file, returning `None` if it does not exist or is empty.
pub fn read_optional(path: &Path) -> CoreResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(data) if data.is_empty() => Ok(None),
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Takes an exclusive advisory lock on `path`, creating the file if needed.
///
/// The lock is held until the returned handle is dropped.
pub fn lock_exclusive(path: &Path) -> CoreResult<File> {
    let lock_file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;

    if lock_file.try_lock_exclusive().is_err() {
        return Err(CoreError::StoreLocked);
    }

    Ok(lock_file)
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> CoreResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> CoreResult<()> {
    // NTFS journals metadata; directory fsync is unsupported.
    Ok(())
}
