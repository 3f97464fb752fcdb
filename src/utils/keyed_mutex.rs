use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A mutex that allows locking based on a key (e.g., a destination filename).
/// Writers to different keys never wait on each other.
#[derive(Debug, Clone, Default)]
pub struct KeyedMutex {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedMutex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires a lock for the given key.
    /// The lock is released when the returned guard is dropped.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        mutex.lock_owned().await
    }

    /// Removes locks that are not currently held or awaited by any task.
    pub fn cleanup(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = KeyedMutex::new();
        let guard = locks.lock("clip.mp4").await;

        let contender = locks.clone();
        let waiter = tokio::spawn(async move {
            let _guard = contender.lock("clip.mp4").await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should acquire the released lock")
            .unwrap();
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let locks = KeyedMutex::new();
        let _a = locks.lock("a.mp4").await;
        let b = tokio::time::timeout(Duration::from_millis(200), locks.lock("b.mp4")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_cleanup_drops_idle_entries() {
        let locks = KeyedMutex::new();
        let held = locks.lock("held.mp4").await;
        drop(locks.lock("idle.mp4").await);

        locks.cleanup();
        assert_eq!(locks.len(), 1);

        drop(held);
        locks.cleanup();
        assert!(locks.is_empty());
    }
}
