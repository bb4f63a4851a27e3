use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};

use crate::{FastStore, FastStoreError, KeyWrite};

/// Redis-backed fast store.
///
/// Commands go through a shared `ConnectionManager`, which multiplexes
/// and reconnects on its own; no user-space locking is layered on top.
/// Scripts are cached per body so repeat invocations send only the
/// digest (`EVALSHA`), falling back to `EVAL` when the server has not
/// seen the script yet.
#[derive(Clone)]
pub struct RedisFastStore {
    conn: ConnectionManager,
    scripts: Arc<Mutex<HashMap<String, Arc<Script>>>>,
}

impl RedisFastStore {
    /// Connects to the given Redis URL.
    pub async fn connect(url: &str) -> Result<Self, FastStoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            scripts: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn script_for(&self, body: &str) -> Arc<Script> {
        let mut scripts = self
            .scripts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        scripts
            .entry(body.to_string())
            .or_insert_with(|| Arc::new(Script::new(body)))
            .clone()
    }
}

/// TTLs are sent as whole seconds; anything shorter still gets 1s so
/// the key expires rather than living forever.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl FastStore for RedisFastStore {
    async fn ping(&self) -> Result<(), FastStoreError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64, FastStoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.incr(key, 1i64).await?)
    }

    async fn incr_by_with_expiry(
        &self,
        key: &str,
        delta: i64,
        ttl: Duration,
    ) -> Result<i64, FastStoreError> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("INCRBY")
            .arg(key)
            .arg(delta)
            .cmd("EXPIRE")
            .arg(key)
            .arg(ttl_secs(ttl))
            .ignore();
        let (value,): (i64,) = pipe.query_async(&mut conn).await?;
        Ok(value)
    }

    async fn get_int(&self, key: &str) -> Result<Option<i64>, FastStoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn exists(&self, key: &str) -> Result<bool, FastStoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.exists(key).await?)
    }

    async fn set_many(&self, writes: &[KeyWrite]) -> Result<(), FastStoreError> {
        if writes.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic();
        for write in writes {
            pipe.cmd("SET")
                .arg(&write.key)
                .arg(write.value)
                .arg("EX")
                .arg(ttl_secs(write.ttl))
                .ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<(), FastStoreError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = conn.del(keys).await?;
        Ok(())
    }

    async fn eval_int(&self, script: &str, keys: &[&str]) -> Result<i64, FastStoreError> {
        let script = self.script_for(script);
        let mut invocation = script.prepare_invoke();
        for key in keys {
            invocation.key(*key);
        }
        let mut conn = self.conn.clone();
        Ok(invocation.invoke_async(&mut conn).await?)
    }
}
