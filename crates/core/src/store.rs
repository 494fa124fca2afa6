//! Local durable key-value store.
//!
//! The submission pipeline persists its pending queue through the [`DurableStore`] trait so the
//! backing storage can be swapped: [`FileStore`] for real devices (survives restarts) and
//! [`MemoryStore`] for tests.
//!
//! ## Single-writer arbitration
//!
//! `compare_and_swap` is the only mutation the pending queue uses. `FileStore` implements it
//! under an in-process mutex plus an advisory lock file next to the entry, so two processes
//! sharing one store directory cannot interleave a read-modify-write.

use crate::error::{CoreError, CoreResult};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime};
use tempfile::NamedTempFile;

const LOCK_WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(10);
/// A lock file older than this is assumed to belong to a crashed writer.
const STALE_LOCK_AGE: Duration = Duration::from_secs(30);
const MAX_KEY_LEN: usize = 128;

/// Key-value storage that survives process restart.
pub trait DurableStore: Send + Sync {
    fn get(&self, key: &str) -> CoreResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> CoreResult<()>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> CoreResult<()>;

    /// Atomically replaces the value of `key` with `new` if its current value equals
    /// `expected` (`None` meaning "absent"). Returns whether the swap happened.
    fn compare_and_swap(&self, key: &str, expected: Option<&str>, new: &str) -> CoreResult<bool>;
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Validates that a key is safe to use as a file name.
///
/// Keys are restricted to ASCII alphanumerics plus `-`, `_` and `.`, must not start with `.`,
/// and are bounded in length.
pub fn validate_store_key(key: &str) -> CoreResult<()> {
    let ok = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && !key.starts_with('.')
        && key
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'.' | b'-' | b'_'));

    if ok {
        Ok(())
    } else {
        Err(CoreError::InvalidStoreKey(key.to_owned()))
    }
}

/// File-backed store: one file per key under a directory.
///
/// Writes go to a temporary file in the same directory which is then renamed over the entry,
/// so readers never observe a partially written value.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    local: Mutex<()>,
    lock_timeout: Duration,
}

impl FileStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::StoreDirCreation` if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> CoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(CoreError::StoreDirCreation)?;
        Ok(Self {
            dir,
            local: Mutex::new(()),
            lock_timeout: LOCK_WAIT_TIMEOUT,
        })
    }

    /// How long a write waits for another writer's lock file before giving up.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> CoreResult<PathBuf> {
        validate_store_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn lock_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.lock"))
    }

    fn read_entry(&self, key: &str, path: &Path) -> CoreResult<Option<String>> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CoreError::StoreRead {
                key: key.to_owned(),
                source,
            }),
        }
    }

    fn write_entry(&self, key: &str, path: &Path, value: &str) -> CoreResult<()> {
        let write_err = |source| CoreError::StoreWrite {
            key: key.to_owned(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(write_err)?;
        tmp.write_all(value.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;
        Ok(())
    }

    fn acquire_lock(&self, key: &str) -> CoreResult<LockFileGuard> {
        let path = self.lock_path(key);
        let started = Instant::now();

        loop {
            match OpenOptions::new().create_new(true).write(true).open(&path) {
                Ok(mut file) => {
                    let _ = writeln!(file, "{}", std::process::id());
                    return Ok(LockFileGuard { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if lock_is_stale(&path) {
                        tracing::warn!(path = %path.display(), "removing stale store lock");
                        let _ = fs::remove_file(&path);
                        continue;
                    }
                    if started.elapsed() >= self.lock_timeout {
                        return Err(CoreError::StoreLockTimeout { path });
                    }
                    std::thread::sleep(LOCK_RETRY_DELAY);
                }
                Err(source) => {
                    return Err(CoreError::StoreWrite {
                        key: key.to_owned(),
                        source,
                    })
                }
            }
        }
    }
}

fn lock_is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > STALE_LOCK_AGE)
}

struct LockFileGuard {
    path: PathBuf,
}

impl Drop for LockFileGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

impl DurableStore for FileStore {
    fn get(&self, key: &str) -> CoreResult<Option<String>> {
        let path = self.entry_path(key)?;
        self.read_entry(key, &path)
    }

    fn set(&self, key: &str, value: &str) -> CoreResult<()> {
        let path = self.entry_path(key)?;
        let _local = lock_ignoring_poison(&self.local);
        let _lock = self.acquire_lock(key)?;
        self.write_entry(key, &path, value)
    }

    fn remove(&self, key: &str) -> CoreResult<()> {
        let path = self.entry_path(key)?;
        let _local = lock_ignoring_poison(&self.local);
        let _lock = self.acquire_lock(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CoreError::StoreWrite {
                key: key.to_owned(),
                source,
            }),
        }
    }

    fn compare_and_swap(&self, key: &str, expected: Option<&str>, new: &str) -> CoreResult<bool> {
        let path = self.entry_path(key)?;
        let _local = lock_ignoring_poison(&self.local);
        let _lock = self.acquire_lock(key)?;

        let current = self.read_entry(key, &path)?;
        if current.as_deref() != expected {
            return Ok(false);
        }

        self.write_entry(key, &path, new)?;
        Ok(true)
    }
}

/// In-memory store. Contents are lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> CoreResult<Option<String>> {
        Ok(lock_ignoring_poison(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> CoreResult<()> {
        lock_ignoring_poison(&self.entries).insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> CoreResult<()> {
        lock_ignoring_poison(&self.entries).remove(key);
        Ok(())
    }

    fn compare_and_swap(&self, key: &str, expected: Option<&str>, new: &str) -> CoreResult<bool> {
        let mut entries = lock_ignoring_poison(&self.entries);
        if entries.get(key).map(String::as_str) != expected {
            return Ok(false);
        }
        entries.insert(key.to_owned(), new.to_owned());
        Ok(true)
    }
}
