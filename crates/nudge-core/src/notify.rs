use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, warn};

use crate::error::NotifyStoreError;
use crate::version::Version;

/// Namespace prefix for persisted "already notified" keys.
pub const NOTIFIED_KEY_PREFIX: &str = "nudge.notified.";

/// Durable key-value storage for notification flags.
pub trait NotifyStore: Send + Sync {
    fn is_set(&self, key: &str) -> bool;

    /// Persist `key` as set.
    ///
    /// # Errors
    /// Returns an error when the backing storage cannot be written.
    fn set(&self, key: &str) -> Result<(), NotifyStoreError>;

    /// Set `key` if it was not already set, returning whether this call set it.
    ///
    /// Stores shared between processes should override this to hold their own
    /// lock across the read and the write.
    ///
    /// # Errors
    /// Returns an error when the backing storage cannot be written.
    fn set_if_unset(&self, key: &str) -> Result<bool, NotifyStoreError> {
        if self.is_set(key) {
            return Ok(false);
        }
        self.set(key)?;
        Ok(true)
    }
}

#[derive(Debug, Default)]
pub struct MemoryNotifyStore {
    keys: Mutex<HashSet<String>>,
}

impl MemoryNotifyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl NotifyStore for MemoryNotifyStore {
    fn is_set(&self, key: &str) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    fn set(&self, key: &str) -> Result<(), NotifyStoreError> {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string());
        Ok(())
    }

    fn set_if_unset(&self, key: &str) -> Result<bool, NotifyStoreError> {
        Ok(self
            .keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string()))
    }
}

/// Tracks which versions have already been surfaced to the user.
///
/// Outlives individual checks; share it with `Arc` when checks run
/// concurrently.
pub struct NotifyPolicy {
    store: Arc<dyn NotifyStore>,
    guard: Mutex<()>,
}

impl NotifyPolicy {
    pub fn new(store: impl NotifyStore + 'static) -> Self {
        Self::from_shared(Arc::new(store))
    }

    #[must_use]
    pub fn from_shared(store: Arc<dyn NotifyStore>) -> Self {
        Self {
            store,
            guard: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryNotifyStore::new())
    }

    #[must_use]
    pub fn key_for(version: &Version) -> String {
        format!("{NOTIFIED_KEY_PREFIX}{version}")
    }

    #[must_use]
    pub fn was_notified(&self, version: &Version) -> bool {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        self.store.is_set(&Self::key_for(version))
    }

    /// Record that `version` has been surfaced.
    ///
    /// # Errors
    /// Returns an error when the backing store cannot be written.
    pub fn mark_notified(&self, version: &Version) -> Result<(), NotifyStoreError> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        self.store.set(&Self::key_for(version))
    }

    /// Check and mark `version` in one step.
    ///
    /// Returns `true` for exactly one caller per version. If the flag cannot
    /// be persisted the caller is still told to notify.
    #[must_use]
    pub fn notify_once(&self, version: &Version) -> bool {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let key = Self::key_for(version);
        match self.store.set_if_unset(&key) {
            Ok(fresh) => {
                debug!("Notification flag {key}: first notification = {fresh}");
                fresh
            }
            Err(error) => {
                warn!("Failed to persist notification flag {key}: {error}");
                true
            }
        }
    }
}

impl std::fmt::Debug for NotifyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyPolicy").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;

    struct FailingStore;

    impl NotifyStore for FailingStore {
        fn is_set(&self, _key: &str) -> bool {
            false
        }

        fn set(&self, _key: &str) -> Result<(), NotifyStoreError> {
            Err(NotifyStoreError::io(
                "failed to write flags",
                std::io::Error::other("read-only"),
            ))
        }
    }

    #[test]
    fn key_uses_prefix_and_canonical_version() {
        let key = NotifyPolicy::key_for(&Version::new(3, 0, 0, 0));
        assert_eq!(key, "nudge.notified.3.0.0-0");
    }

    #[test]
    fn mark_notified_is_visible_to_was_notified() {
        let policy = NotifyPolicy::in_memory();
        let version: Version = "2.1".parse().expect("valid version");

        assert!(!policy.was_notified(&version));
        policy.mark_notified(&version).expect("memory store never fails");
        assert!(policy.was_notified(&version));
        assert!(!policy.was_notified(&"2.1.1".parse().expect("valid version")));
    }

    #[test]
    fn equivalent_inputs_share_one_flag() {
        let policy = NotifyPolicy::in_memory();
        policy
            .mark_notified(&"4".parse().expect("valid version"))
            .expect("memory store never fails");

        assert!(policy.was_notified(&"4.0.0-0".parse().expect("valid version")));
    }

    #[test]
    fn notify_once_returns_true_only_the_first_time() {
        let policy = NotifyPolicy::in_memory();
        let version = Version::new(5, 0, 0, 0);

        assert!(policy.notify_once(&version));
        assert!(!policy.notify_once(&version));
        assert!(policy.was_notified(&version));
    }

    #[test]
    fn notify_once_reports_true_when_store_write_fails() {
        let policy = NotifyPolicy::new(FailingStore);
        assert!(policy.notify_once(&Version::new(1, 0, 0, 0)));
    }

    #[test]
    fn concurrent_notify_once_has_single_winner() {
        let policy = Arc::new(NotifyPolicy::in_memory());
        let winners = Arc::new(AtomicUsize::new(0));
        let version = Version::new(9, 1, 0, 0);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let policy = Arc::clone(&policy);
                let winners = Arc::clone(&winners);
                thread::spawn(move || {
                    if policy.notify_once(&version) {
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
}
