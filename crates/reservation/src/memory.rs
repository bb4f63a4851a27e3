use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::{FastStore, FastStoreError, KeyWrite};

/// In-memory fast store implementation for testing.
///
/// A single mutex stands in for Redis's single-threaded command loop,
/// so every operation, `eval_int` included, is atomic with respect
/// to the others. TTLs are recorded for assertions but never enforced;
/// tests that need expiry drive it explicitly.
#[derive(Clone, Default)]
pub struct InMemoryFastStore {
    inner: Arc<Mutex<HashMap<String, Entry>>>,
    fail: Arc<AtomicBool>,
}

#[derive(Debug, Clone)]
struct Entry {
    value: i64,
    ttl: Option<Duration>,
}

impl InMemoryFastStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every operation fails as if the store were down.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Reads a key without going through the trait, for assertions.
    pub fn value_of(&self, key: &str) -> Option<i64> {
        self.table().get(key).map(|e| e.value)
    }

    /// Returns the TTL recorded by the last expiring write to `key`.
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.table().get(key).and_then(|e| e.ttl)
    }

    /// Drops every key, simulating a cold (flushed) fast store.
    pub fn flush(&self) {
        self.table().clear();
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self) -> Result<(), FastStoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(FastStoreError::Unavailable(
                "injected fast-store failure".to_string(),
            ));
        }
        Ok(())
    }
}

fn incr_entry(table: &mut HashMap<String, Entry>, key: &str, delta: i64) -> i64 {
    let entry = table.entry(key.to_string()).or_insert(Entry {
        value: 0,
        ttl: None,
    });
    entry.value += delta;
    entry.value
}

#[async_trait]
impl FastStore for InMemoryFastStore {
    async fn ping(&self) -> Result<(), FastStoreError> {
        self.check()
    }

    async fn incr(&self, key: &str) -> Result<i64, FastStoreError> {
        self.check()?;
        Ok(incr_entry(&mut self.table(), key, 1))
    }

    async fn incr_by_with_expiry(
        &self,
        key: &str,
        delta: i64,
        ttl: Duration,
    ) -> Result<i64, FastStoreError> {
        self.check()?;
        let mut table = self.table();
        let value = incr_entry(&mut table, key, delta);
        if let Some(entry) = table.get_mut(key) {
            entry.ttl = Some(ttl);
        }
        Ok(value)
    }

    async fn get_int(&self, key: &str) -> Result<Option<i64>, FastStoreError> {
        self.check()?;
        Ok(self.table().get(key).map(|e| e.value))
    }

    async fn exists(&self, key: &str) -> Result<bool, FastStoreError> {
        self.check()?;
        Ok(self.table().contains_key(key))
    }

    async fn set_many(&self, writes: &[KeyWrite]) -> Result<(), FastStoreError> {
        self.check()?;
        let mut table = self.table();
        for write in writes {
            table.insert(
                write.key.clone(),
                Entry {
                    value: write.value,
                    ttl: Some(write.ttl),
                },
            );
        }
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<(), FastStoreError> {
        self.check()?;
        let mut table = self.table();
        for key in keys {
            table.remove(key);
        }
        Ok(())
    }

    /// Applies the reservation transition the production script
    /// performs, under the store-wide mutex: decrement `keys[0]`, roll
    /// back and return −1 when it goes negative, otherwise increment
    /// `keys[1]` and return the new queue number. The script body is
    /// not interpreted.
    async fn eval_int(&self, _script: &str, keys: &[&str]) -> Result<i64, FastStoreError> {
        self.check()?;
        let [quota_key, queue_key] = keys else {
            return Err(FastStoreError::Unavailable(format!(
                "script expects 2 keys, got {}",
                keys.len()
            )));
        };

        let mut table = self.table();
        let remaining = incr_entry(&mut table, quota_key, -1);
        if remaining < 0 {
            incr_entry(&mut table, quota_key, 1);
            return Ok(-1);
        }
        Ok(incr_entry(&mut table, queue_key, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reserve_script_decrements_and_numbers() {
        let store = InMemoryFastStore::new();
        store
            .set_many(&[
                KeyWrite {
                    key: "q".to_string(),
                    value: 2,
                    ttl: Duration::from_secs(60),
                },
                KeyWrite {
                    key: "n".to_string(),
                    value: 0,
                    ttl: Duration::from_secs(60),
                },
            ])
            .await
            .unwrap();

        assert_eq!(store.eval_int("", &["q", "n"]).await.unwrap(), 1);
        assert_eq!(store.eval_int("", &["q", "n"]).await.unwrap(), 2);
        assert_eq!(store.eval_int("", &["q", "n"]).await.unwrap(), -1);
        // Rolled back, not driven negative.
        assert_eq!(store.value_of("q"), Some(0));
        assert_eq!(store.value_of("n"), Some(2));
    }

    #[tokio::test]
    async fn injected_failure_hits_every_operation() {
        let store = InMemoryFastStore::new();
        store.set_fail(true);

        assert!(store.ping().await.is_err());
        assert!(store.incr("k").await.is_err());
        assert!(store.get_int("k").await.is_err());
        assert!(store.eval_int("", &["a", "b"]).await.is_err());

        store.set_fail(false);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn set_many_records_ttl() {
        let store = InMemoryFastStore::new();
        store
            .set_many(&[KeyWrite {
                key: "k".to_string(),
                value: 9,
                ttl: Duration::from_secs(3600),
            }])
            .await
            .unwrap();

        assert_eq!(store.value_of("k"), Some(9));
        assert_eq!(store.ttl_of("k"), Some(Duration::from_secs(3600)));
    }

    #[tokio::test]
    async fn del_and_exists() {
        let store = InMemoryFastStore::new();
        store.incr("k").await.unwrap();
        assert!(store.exists("k").await.unwrap());

        store.del(&["k".to_string()]).await.unwrap();
        assert!(!store.exists("k").await.unwrap());
    }
}
