use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// One async mutex per container name. Entries are dropped once nobody holds or
/// waits on them.
#[derive(Debug, Default)]
pub struct NameLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

/// Held for the duration of one operation on a container name.
#[derive(Debug)]
pub struct NameGuard {
    name: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl NameLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, name: &str) -> NameGuard {
        let lock = self
            .locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        if lock.try_lock().is_err() {
            debug!(container = %name, "Waiting for in-flight operation on container");
        }
        let guard = lock.lock_owned().await;

        NameGuard {
            name: name.to_string(),
            guard: Some(guard),
            locks: self.locks.clone(),
        }
    }

    pub fn is_locked(&self, name: &str) -> bool {
        self.locks
            .get(name)
            .is_some_and(|lock| lock.try_lock().is_err())
    }

    /// Names with a live entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for NameGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // The map holds the last reference unless another caller is queued.
        self.locks
            .remove_if(&self.name, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_name_is_exclusive() {
        let locks = NameLocks::new();
        let first = locks.acquire("web1").await;
        assert!(locks.is_locked("web1"));

        let second = tokio::time::timeout(Duration::from_millis(50), locks.acquire("web1")).await;
        assert!(second.is_err(), "second acquire must wait");

        drop(first);
        let second = tokio::time::timeout(Duration::from_millis(50), locks.acquire("web1")).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_different_names_are_independent() {
        let locks = NameLocks::new();
        let _a = locks.acquire("web1").await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.acquire("web2")).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_entries_are_released() {
        let locks = NameLocks::new();
        {
            let _guard = locks.acquire("db").await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
        assert!(!locks.is_locked("db"));
    }
}
