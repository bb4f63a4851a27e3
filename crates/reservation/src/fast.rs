use std::time::Duration;

use async_trait::async_trait;

use crate::FastStoreError;

/// One key write in an atomic pipeline: `SET key value EX ttl`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyWrite {
    pub key: String,
    pub value: i64,
    pub ttl: Duration,
}

/// Fast-store interface: atomic counters, expiring keys, transactional
/// pipelines, and an atomic integer script.
///
/// The adapter carries no booking semantics; key names, script bodies,
/// and all invariants belong to the reservation engine. All
/// implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait FastStore: Send + Sync {
    /// Round-trips the connection to check the store is reachable.
    async fn ping(&self) -> Result<(), FastStoreError>;

    /// Atomically increments a key by 1, returning the new value.
    /// A missing key counts as 0 before the increment.
    async fn incr(&self, key: &str) -> Result<i64, FastStoreError>;

    /// Atomically applies `INCRBY delta` and re-arms the key's expiry,
    /// both in one transactional pipeline. Returns the new value.
    async fn incr_by_with_expiry(
        &self,
        key: &str,
        delta: i64,
        ttl: Duration,
    ) -> Result<i64, FastStoreError>;

    /// Reads a key as an integer; `None` when the key does not exist.
    async fn get_int(&self, key: &str) -> Result<Option<i64>, FastStoreError>;

    /// Returns true if the key exists.
    async fn exists(&self, key: &str) -> Result<bool, FastStoreError>;

    /// Writes every entry (`SET` with expiry) in one transactional
    /// pipeline. The pipeline is built for this call only, so memory
    /// stays bounded by the caller's batch size.
    async fn set_many(&self, writes: &[KeyWrite]) -> Result<(), FastStoreError>;

    /// Deletes the given keys. A missing key is not an error.
    async fn del(&self, keys: &[String]) -> Result<(), FastStoreError>;

    /// Executes an integer-returning script atomically against `keys`.
    ///
    /// Implementations must guarantee the whole script observes and
    /// mutates the keyspace without interleaving, and should send the
    /// script body only on first use and its digest thereafter.
    async fn eval_int(&self, script: &str, keys: &[&str]) -> Result<i64, FastStoreError>;
}
