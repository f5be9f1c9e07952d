//! Atomic JSON file operations.
//!
//! Provides a thin layer for safe concurrent access to the shared evolution
//! state file.

use fs2::FileExt;
use serde::{Serialize, de::DeserializeOwned};
use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Errors that can occur during atomic JSON operations.
#[derive(Debug)]
pub enum AtomicJsonError {
    /// File I/O error.
    IoError(std::io::Error),
    /// JSON parse error (the file exists but is not the expected structure).
    ParseError(serde_json::Error),
    /// JSON serialization error.
    SerializeError(serde_json::Error),
    /// File locking error.
    LockError(String),
}

impl std::fmt::Display for AtomicJsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AtomicJsonError::IoError(e) => write!(f, "I/O error: {}", e),
            AtomicJsonError::ParseError(e) => write!(f, "JSON parse error: {}", e),
            AtomicJsonError::SerializeError(e) => write!(f, "JSON serialization error: {}", e),
            AtomicJsonError::LockError(e) => write!(f, "Lock error: {}", e),
        }
    }
}

impl std::error::Error for AtomicJsonError {}

impl From<std::io::Error> for AtomicJsonError {
    fn from(e: std::io::Error) -> Self {
        AtomicJsonError::IoError(e)
    }
}

/// A handle to a JSON file written atomically.
///
/// Provides:
/// - **Atomicity**: Updates are all-or-nothing via tmp file + atomic rename
/// - **Isolation**: `update` holds an exclusive file lock around load+save
/// - **Durability**: Explicit fsync before rename
#[derive(Debug)]
pub struct AtomicJsonFile<T> {
    path: PathBuf,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> Clone for AtomicJsonFile<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<T> AtomicJsonFile<T>
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

    /// Loads the JSON file and deserializes it.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(T))`: Successfully loaded and deserialized
    /// - `Ok(None)`: File doesn't exist or is empty
    /// - `Err`: Failed to read or parse the file
    pub fn load(&self) -> Result<Option<T>, AtomicJsonError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;

        if content.trim().is_empty() {
            return Ok(None);
        }

        let data: T = serde_json::from_str(&content).map_err(AtomicJsonError::ParseError)?;
        Ok(Some(data))
    }

    /// Saves data to the JSON file atomically.
    ///
    /// Writes a uniquely named temporary file in the same directory, then
    /// renames it over the target. Concurrent writers never share a
    /// temporary file.
    pub fn save(&self, data: &T) -> Result<(), AtomicJsonError> {
        let parent = self.parent_dir()?;
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(data).map_err(AtomicJsonError::SerializeError)?;

        let mut tmp_file = tempfile::Builder::new()
            .prefix(&format!(".{}.", self.file_name()?))
            .suffix(".tmp")
            .tempfile_in(parent)?;
        tmp_file.write_all(json.as_bytes())?;
        tmp_file.write_all(b"\n")?;
        tmp_file.as_file().sync_all()?;

        tmp_file.persist(&self.path).map_err(|e| AtomicJsonError::IoError(e.error))?;

        Ok(())
    }

    /// Performs a transactional update with file locking.
    ///
    /// The update function receives the current data (or `default_value` if
    /// the file does not exist yet). If it returns `Ok(())`, the changes are
    /// atomically written back while the lock is still held.
    pub fn update<F>(&self, default_value: T, f: F) -> Result<(), AtomicJsonError>
    where
        F: FnOnce(&mut T) -> Result<(), AtomicJsonError>,
    {
        let _lock = self.acquire_lock()?;

        let mut data = self.load()?.unwrap_or(default_value);

        f(&mut data)?;

        self.save(&data)?;

        Ok(())
    }

    fn parent_dir(&self) -> Result<&Path, AtomicJsonError> {
        self.path.parent().ok_or_else(|| {
            AtomicJsonError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Path has no parent directory",
            ))
        })
    }

    fn file_name(&self) -> Result<String, AtomicJsonError> {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                AtomicJsonError::IoError(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "Path has no file name",
                ))
            })
    }

    /// Lock file guarding `update`: `.{file_name}.lock` next to the data file.
    fn lock_path(&self) -> Result<PathBuf, AtomicJsonError> {
        Ok(self.parent_dir()?.join(format!(".{}.lock", self.file_name()?)))
    }

    fn acquire_lock(&self) -> Result<FileLock, AtomicJsonError> {
        FileLock::acquire(&self.lock_path()?)
    }
}

/// A file lock guard that releases the lock when dropped.
///
/// The lock file is never removed: all callers must lock the same inode.
struct FileLock {
    file: File,
}

impl FileLock {
    /// Acquires an exclusive lock on `lock_path`, creating it if needed.
    fn acquire(lock_path: &Path) -> Result<Self, AtomicJsonError> {
        if let Some(parent) = lock_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)?;

        file.lock_exclusive()
            .map_err(|e| AtomicJsonError::LockError(format!("Failed to acquire lock: {}", e)))?;

        Ok(FileLock { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        name: String,
        count: u32,
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let file = AtomicJsonFile::<Counter>::new(temp_dir.path().join("state.json"));

        let counter = Counter {
            name: "test".to_string(),
            count: 42,
        };
        file.save(&counter).unwrap();

        assert_eq!(file.load().unwrap(), Some(counter));
    }

    #[test]
    fn test_load_nonexistent_or_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        let file = AtomicJsonFile::<Counter>::new(path.clone());

        assert!(file.load().unwrap().is_none());

        fs::write(&path, "  \n").unwrap();
        assert!(file.load().unwrap().is_none());
    }

    #[test]
    fn test_load_malformed_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        fs::write(&path, "{\"name\": ").unwrap();

        let file = AtomicJsonFile::<Counter>::new(path);
        assert!(matches!(file.load(), Err(AtomicJsonError::ParseError(_))));
    }

    #[test]
    fn test_update() {
        let temp_dir = TempDir::new().unwrap();
        let file = AtomicJsonFile::<Counter>::new(temp_dir.path().join("state.json"));

        let default_counter = Counter {
            name: "default".to_string(),
            count: 0,
        };

        file.update(default_counter.clone(), |c| {
            c.count += 10;
            Ok(())
        })
        .unwrap();
        file.update(default_counter, |c| {
            c.count += 5;
            Ok(())
        })
        .unwrap();

        assert_eq!(file.load().unwrap().unwrap().count, 15);
        assert!(temp_dir.path().join(".state.json.lock").exists());
    }

    #[test]
    fn test_concurrent_updates_are_serialized() {
        let temp_dir = TempDir::new().unwrap();
        let file = AtomicJsonFile::<Counter>::new(temp_dir.path().join("state.json"));
        let default_counter = Counter {
            name: "shared".to_string(),
            count: 0,
        };

        let workers: Vec<_> = (0..16)
            .map(|_| {
                let file = file.clone();
                let default_counter = default_counter.clone();
                std::thread::spawn(move || {
                    for _ in 0..5 {
                        file.update(default_counter.clone(), |c| {
                            c.count += 1;
                            Ok(())
                        })
                        .unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(file.load().unwrap().unwrap().count, 80);
    }

    #[test]
    fn test_lock_survives_release() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join(".state.json.lock");

        let first = FileLock::acquire(&lock_path).unwrap();
        drop(first);
        assert!(lock_path.exists());

        let _second = FileLock::acquire(&lock_path).unwrap();
        let other = OpenOptions::new().write(true).open(&lock_path).unwrap();
        assert!(other.try_lock_exclusive().is_err());
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        let file = AtomicJsonFile::<Counter>::new(path.clone());

        file.save(&Counter {
            name: "test".to_string(),
            count: 1,
        })
        .unwrap();

        let leftovers: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .filter(|name| name.to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
        assert!(path.exists());
    }
}
