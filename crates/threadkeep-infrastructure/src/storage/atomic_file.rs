//! Atomic file operations.
//!
//! Every write goes to a temporary file in the target's directory, is fsynced,
//! then renamed over the target. Readers therefore see either the old content
//! or the new content, never a torn file.

use serde::{Serialize, de::DeserializeOwned};
use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use threadkeep_core::error::{Result, ThreadkeepError};

/// Writes `contents` to `path` atomically.
///
/// `label` names the entry in a `StorageExhausted` error.
pub fn write_atomic(path: &Path, contents: &[u8], label: &str) -> Result<()> {
    let tmp_path = stage(path, contents, label)?;
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        ThreadkeepError::from_write_error(label, e)
    })
}

/// Writes `contents` next to `path` without committing it.
///
/// Returns the temporary path; the caller renames it over `path` to commit or
/// removes it to abort.
pub fn stage(path: &Path, contents: &[u8], label: &str) -> Result<PathBuf> {
    if let Some(parent) = path.parent()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| ThreadkeepError::from_write_error(label, e))?;
    }

    let tmp_path = temp_path(path)?;
    let written = (|| -> std::io::Result<()> {
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(contents)?;
        // Ensure data is written to disk
        tmp_file.sync_all()
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(ThreadkeepError::from_write_error(label, e));
    }
    Ok(tmp_path)
}

/// Gets a temporary file path for atomic writes.
pub fn temp_path(path: &Path) -> Result<PathBuf> {
    let parent = path
        .parent()
        .ok_or_else(|| ThreadkeepError::io(format!("Path has no parent directory: {path:?}")))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| ThreadkeepError::io(format!("Path has no file name: {path:?}")))?;

    let tmp_name = format!(".{}.tmp", file_name.to_string_lossy());
    Ok(parent.join(tmp_name))
}

/// A file lock guard that releases the lock when dropped.
///
/// The lock file itself is left in place so that concurrent waiters keep
/// locking the same inode.
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Blocks until an exclusive lock on `lock_path` is held.
    pub fn acquire(lock_path: &Path) -> Result<Self> {
        Self::lock(lock_path, true)
    }

    /// Blocks until a shared lock on `lock_path` is held. Shared holders
    /// exclude exclusive ones but not each other.
    pub fn acquire_shared(lock_path: &Path) -> Result<Self> {
        Self::lock(lock_path, false)
    }

    fn lock(lock_path: &Path, exclusive: bool) -> Result<Self> {
        if let Some(parent) = lock_path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)?;

        #[cfg(unix)]
        {
            use fs2::FileExt;
            let locked = if exclusive {
                file.lock_exclusive()
            } else {
                file.lock_shared()
            };
            locked.map_err(|e| ThreadkeepError::io(format!("Failed to acquire lock: {}", e)))?;
        }
        #[cfg(not(unix))]
        let _ = exclusive;

        Ok(FileLock { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use fs2::FileExt;
            let _ = self.file.unlock();
        }
    }
}

/// A handle to a TOML file that is read whole and written atomically.
pub struct AtomicTomlFile<T> {
    path: PathBuf,
    _phantom: PhantomData<T>,
}

impl<T> AtomicTomlFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and deserializes the file.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(T))`: Successfully loaded and deserialized
    /// - `Ok(None)`: File doesn't exist or is empty
    /// - `Err`: Failed to read or parse the file
    pub fn load(&self) -> Result<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        let data: T = toml::from_str(&content)?;
        Ok(Some(data))
    }

    /// Serializes `data` and replaces the file atomically.
    pub fn save(&self, data: &T) -> Result<()> {
        let toml_string = toml::to_string_pretty(data)?;
        let label = self.path.to_string_lossy().into_owned();
        write_atomic(&self.path, toml_string.as_bytes(), &label)
    }
}
