use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use log::{debug, warn};
use nudge_core::{NotifyStore, NotifyStoreError};

use crate::paths::{AppPaths, AppPathsError};

type Flags = BTreeMap<String, bool>;

/// Notification flags persisted as a JSON object on disk.
///
/// Every read and write holds an advisory lock on a sibling `.lock` file so
/// separate processes sharing the file do not race.
#[derive(Debug, Clone)]
pub struct FileNotifyStore {
    path: PathBuf,
}

impl FileNotifyStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store located in the per-user data directory.
    ///
    /// # Errors
    /// Returns an error when the data directory cannot be determined.
    pub fn open_default() -> Result<Self, AppPathsError> {
        Ok(Self::new(AppPaths::new()?.notify_state_file()))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove every persisted flag.
    ///
    /// # Errors
    /// Returns an error when the lock or state file cannot be accessed.
    pub fn clear(&self) -> Result<(), NotifyStoreError> {
        let _lock = self.lock(true)?;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(NotifyStoreError::io(
                "failed to remove notification flags",
                error,
            )),
        }
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn lock(&self, exclusive: bool) -> Result<File, NotifyStoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|error| NotifyStoreError::io("failed to create state directory", error))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())
            .map_err(|error| NotifyStoreError::io("failed to open state lock file", error))?;

        let locked = if exclusive {
            file.lock_exclusive()
        } else {
            file.lock_shared()
        };
        locked.map_err(|error| NotifyStoreError::io("failed to lock state file", error))?;
        Ok(file)
    }

    fn read_flags(&self) -> Flags {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Flags::new(),
            Err(error) => {
                warn!("Failed to read {}: {error}", self.path.display());
                return Flags::new();
            }
        };
        serde_json::from_slice(&data).unwrap_or_else(|error| {
            warn!(
                "Discarding unreadable notification flags in {}: {error}",
                self.path.display()
            );
            Flags::new()
        })
    }

    fn write_flags(&self, flags: &Flags) -> Result<(), NotifyStoreError> {
        let data = serde_json::to_vec_pretty(flags)
            .map_err(|error| NotifyStoreError::serialize("failed to encode flags", error))?;
        write_atomic(&self.path, &data)
            .map_err(|error| NotifyStoreError::io("failed to write notification flags", error))
    }

    fn insert_locked(&self, key: &str) -> Result<bool, NotifyStoreError> {
        let mut flags = self.read_flags();
        if flags.get(key).copied().unwrap_or(false) {
            return Ok(false);
        }
        flags.insert(key.to_string(), true);
        self.write_flags(&flags)?;
        debug!("Persisted notification flag {key}");
        Ok(true)
    }
}

impl NotifyStore for FileNotifyStore {
    fn is_set(&self, key: &str) -> bool {
        let _lock = self
            .lock(false)
            .map_err(|error| warn!("Reading notification flags without lock: {error}"))
            .ok();
        self.read_flags().get(key).copied().unwrap_or(false)
    }

    fn set(&self, key: &str) -> Result<(), NotifyStoreError> {
        let _lock = self.lock(true)?;
        self.insert_locked(key).map(|_| ())
    }

    fn set_if_unset(&self, key: &str) -> Result<bool, NotifyStoreError> {
        let _lock = self.lock(true)?;
        self.insert_locked(key)
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "state path has no parent")
    })?;

    let file_name = path
        .file_name()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("state");
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    let tmp_path = parent.join(format!(".{file_name}.{}.{timestamp}.tmp", std::process::id()));

    let written = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&tmp_path)
        .and_then(|mut file| {
            file.write_all(data)?;
            file.sync_all()
        })
        .and_then(|()| std::fs::rename(&tmp_path, path));

    if written.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    written
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use nudge_core::{NotifyPolicy, NotifyStore, Version};

    use super::FileNotifyStore;

    fn store_in(dir: &tempfile::TempDir) -> FileNotifyStore {
        FileNotifyStore::new(dir.path().join("state").join("notified.json"))
    }

    #[test]
    fn flags_survive_new_store_instances() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");

        store_in(&temp_dir)
            .set("nudge.notified.3.0.0-0")
            .expect("flag should persist");

        let reopened = store_in(&temp_dir);
        assert!(reopened.is_set("nudge.notified.3.0.0-0"));
        assert!(!reopened.is_set("nudge.notified.3.0.1-0"));
    }

    #[test]
    fn set_if_unset_reports_first_writer_only() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let store = store_in(&temp_dir);

        assert!(store.set_if_unset("key").expect("first write succeeds"));
        assert!(!store.set_if_unset("key").expect("second write succeeds"));
    }

    #[test]
    fn unreadable_state_is_treated_as_empty() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let store = store_in(&temp_dir);
        std::fs::create_dir_all(store.path().parent().expect("state path has parent"))
            .expect("state dir should be created");
        std::fs::write(store.path(), "{not-valid-json").expect("corrupt state written");

        assert!(!store.is_set("key"));
        store.set("key").expect("write replaces corrupt state");
        assert!(store.is_set("key"));
    }

    #[test]
    fn clear_removes_all_flags() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let store = store_in(&temp_dir);

        store.clear().expect("clearing a missing file succeeds");
        store.set("key").expect("flag should persist");
        store.clear().expect("clear succeeds");

        assert!(!store.is_set("key"));
    }

    #[test]
    fn policy_over_file_store_notifies_once_across_instances() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let version = Version::new(2, 0, 0, 0);

        let first = NotifyPolicy::new(store_in(&temp_dir));
        assert!(first.notify_once(&version));

        let second = NotifyPolicy::new(store_in(&temp_dir));
        assert!(second.was_notified(&version));
        assert!(!second.notify_once(&version));
    }

    #[test]
    fn concurrent_stores_have_single_winner() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let path = temp_dir.path().join("notified.json");
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let store = FileNotifyStore::new(path.clone());
                let winners = Arc::clone(&winners);
                std::thread::spawn(move || {
                    if store.set_if_unset("shared").expect("write succeeds") {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("worker thread should not panic");
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn no_temp_files_left_behind() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let store = FileNotifyStore::new(temp_dir.path().join("notified.json"));
        store.set("a").expect("write succeeds");
        store.set("b").expect("write succeeds");

        let leftovers = std::fs::read_dir(temp_dir.path())
            .expect("read temp dir entries")
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }
}
