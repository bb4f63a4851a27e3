//! The quota reservation engine.
//!
//! Owns the fast-store keyspace for every schedule: a quota counter
//! that gates admission and a queue counter that issues monotonically
//! increasing queue numbers. The durable store remains the source of
//! truth; every sync path recomputes the keys from it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use booking_store::BookingStore;
use chrono::NaiveDate;
use common::ScheduleId;
use domain::today_utc;
use tokio::sync::watch;

use crate::{FastStore, KeyWrite, Result};
use crate::error::ReservationError;

/// Key prefix for a schedule's remaining-quota counter.
pub const QUOTA_KEY_PREFIX: &str = "schedule:quota:";
/// Key prefix for a schedule's queue-number counter.
pub const QUEUE_KEY_PREFIX: &str = "booking:queue:";

/// Fast-store key holding the remaining quota for a schedule.
pub fn quota_key(id: ScheduleId) -> String {
    format!("{QUOTA_KEY_PREFIX}{id}")
}

/// Fast-store key holding the last issued queue number for a schedule.
pub fn queue_key(id: ScheduleId) -> String {
    format!("{QUEUE_KEY_PREFIX}{id}")
}

/// Returned by the reservation script when the quota is exhausted.
const QUOTA_FULL_SENTINEL: i64 = -1;

/// Startup sync page size; one pipeline is built and executed per page
/// so memory stays O(batch) regardless of fleet size.
const SYNC_BATCH_SIZE: i64 = 500;

/// TTL applied to keys of schedules already in the past, so stale
/// entries drain instead of lingering.
const PAST_KEY_TTL: Duration = Duration::from_secs(60);

/// How often the background sweeper walks the lock table.
const LOCK_SWEEP_INTERVAL: Duration = Duration::from_secs(600);
/// How long a schedule lock must sit unused before eviction.
const LOCK_IDLE_AFTER: Duration = Duration::from_secs(600);

/// The atomic reservation transition, executed server-side so there is
/// no window between the quota decrement and the queue assignment:
/// decrement the quota, roll back and signal −1 when it goes negative,
/// otherwise issue the next queue number.
const RESERVE_SCRIPT: &str = r#"
local remaining = redis.call('DECR', KEYS[1])
if remaining < 0 then
    redis.call('INCR', KEYS[1])
    return -1
end
return redis.call('INCR', KEYS[2])
"#;

/// Keys expire at midnight UTC after the schedule's date.
fn ttl_for(schedule_date: NaiveDate) -> Duration {
    let Some(next_day) = schedule_date.succ_opt() else {
        return PAST_KEY_TTL;
    };
    let expires_at = next_day.and_time(chrono::NaiveTime::MIN).and_utc();
    (expires_at - chrono::Utc::now())
        .to_std()
        .unwrap_or(PAST_KEY_TTL)
}

#[derive(Default)]
struct ScheduleLock {
    mutex: tokio::sync::Mutex<()>,
    /// Seconds since engine start, stamped on every acquisition.
    last_used: AtomicU64,
}

/// The reservation engine.
///
/// The hot path (`reserve_slot`) takes no in-process lock: the fast
/// store already serializes the script per keyspace, and a lock here
/// would line up every reservation for a schedule behind it. The slow
/// paths (sync, delta, delete, restore) combine durable reads with
/// fast-store writes and therefore serialize per schedule through the
/// lock table.
pub struct ReservationEngine<F, S> {
    fast: F,
    store: S,
    locks: Mutex<HashMap<ScheduleId, Arc<ScheduleLock>>>,
    started: Instant,
}

impl<F, S> ReservationEngine<F, S>
where
    F: FastStore,
    S: BookingStore,
{
    pub fn new(fast: F, store: S) -> Self {
        Self {
            fast,
            store,
            locks: Mutex::new(HashMap::new()),
            started: Instant::now(),
        }
    }

    /// Reserves one slot on the schedule, returning the assigned queue
    /// number.
    ///
    /// Returns `ReservationError::QuotaFull` when the schedule is sold
    /// out; in that case nothing was mutated. Fast-store failures
    /// surface as-is: the script either ran or it did not, so there is
    /// nothing to compensate.
    #[tracing::instrument(skip(self))]
    pub async fn reserve_slot(&self, schedule_id: ScheduleId) -> Result<i32> {
        let quota = quota_key(schedule_id);
        let queue = queue_key(schedule_id);

        let result = self
            .fast
            .eval_int(RESERVE_SCRIPT, &[&quota, &queue])
            .await?;

        if result == QUOTA_FULL_SENTINEL {
            metrics::counter!("reservations_rejected_total").increment(1);
            return Err(ReservationError::QuotaFull);
        }

        metrics::counter!("reservations_total").increment(1);
        tracing::debug!(%schedule_id, queue_number = result, "reserved slot");
        Ok(result as i32)
    }

    /// Returns one slot to the schedule's quota after a cancellation or
    /// a failed durable insert.
    ///
    /// The queue counter is deliberately untouched: queue numbers are
    /// append-only, and cancellations leave gaps.
    #[tracing::instrument(skip(self))]
    pub async fn restore_slot(&self, schedule_id: ScheduleId) -> Result<()> {
        let lock = self.lock_for(schedule_id);
        let _guard = lock.mutex.lock().await;

        self.fast.incr(&quota_key(schedule_id)).await?;
        metrics::counter!("reservations_restored_total").increment(1);
        tracing::debug!(%schedule_id, "restored slot");
        Ok(())
    }

    /// Overwrites both keys for a schedule from durable truth:
    /// `max(total_quota - active_bookings, 0)` and the highest queue
    /// number ever issued. Both writes go out in one atomic pipeline.
    ///
    /// Past-dated schedules are skipped; their keys drain via TTL.
    #[tracing::instrument(skip(self))]
    pub async fn sync_schedule(
        &self,
        schedule_id: ScheduleId,
        total_quota: i32,
        schedule_date: NaiveDate,
    ) -> Result<()> {
        let lock = self.lock_for(schedule_id);
        let _guard = lock.mutex.lock().await;

        if schedule_date < today_utc() {
            tracing::debug!(%schedule_id, "skipping sync for past schedule");
            return Ok(());
        }

        let counters = self.store.schedule_counters(schedule_id).await?;
        let remaining = (i64::from(total_quota) - counters.booked_count).max(0);
        let ttl = ttl_for(schedule_date);

        self.fast
            .set_many(&[
                KeyWrite {
                    key: quota_key(schedule_id),
                    value: remaining,
                    ttl,
                },
                KeyWrite {
                    key: queue_key(schedule_id),
                    value: i64::from(counters.max_queue_number),
                    ttl,
                },
            ])
            .await?;

        tracing::debug!(
            %schedule_id,
            remaining,
            max_queue = counters.max_queue_number,
            "synced schedule keys"
        );
        Ok(())
    }

    /// Applies a signed capacity change to the quota key.
    ///
    /// Absolute writes are forbidden here: between reading the
    /// remaining quota and writing it back, a concurrent reservation
    /// could land and be erased. `INCRBY` composes with reservations;
    /// a negative delta is first clamped so the counter never goes
    /// below zero.
    #[tracing::instrument(skip(self))]
    pub async fn update_quota_delta(
        &self,
        schedule_id: ScheduleId,
        delta: i32,
        schedule_date: NaiveDate,
    ) -> Result<()> {
        let lock = self.lock_for(schedule_id);
        let _guard = lock.mutex.lock().await;

        if schedule_date < today_utc() {
            tracing::debug!(%schedule_id, "skipping delta update for past schedule");
            return Ok(());
        }

        let key = quota_key(schedule_id);
        let mut delta = i64::from(delta);
        if delta < 0 {
            let current = self.fast.get_int(&key).await?.unwrap_or(0);
            if current + delta < 0 {
                tracing::warn!(
                    %schedule_id,
                    current,
                    delta,
                    "delta would drive quota negative, clamping to zero"
                );
                delta = -current;
            }
        }

        self.fast
            .incr_by_with_expiry(&key, delta, ttl_for(schedule_date))
            .await?;

        tracing::debug!(%schedule_id, delta, "applied quota delta");
        Ok(())
    }

    /// Deletes both keys for a schedule and evicts its lock entry.
    #[tracing::instrument(skip(self))]
    pub async fn delete_schedule_keys(&self, schedule_id: ScheduleId) -> Result<()> {
        {
            let lock = self.lock_for(schedule_id);
            let _guard = lock.mutex.lock().await;
            self.fast
                .del(&[quota_key(schedule_id), queue_key(schedule_id)])
                .await?;
        }
        self.lock_table().remove(&schedule_id);
        tracing::debug!(%schedule_id, "deleted schedule keys");
        Ok(())
    }

    /// Live remaining quota for a schedule; `None` when the key has
    /// expired or was never synced.
    pub async fn remaining_quota(&self, schedule_id: ScheduleId) -> Result<Option<i64>> {
        Ok(self.fast.get_int(&quota_key(schedule_id)).await?)
    }

    /// Rebuilds the fast store from durable truth for every schedule
    /// dated today or later.
    ///
    /// Pages through the store in batches; each batch gets its own
    /// freshly built pipeline, executed and discarded before the next
    /// page is fetched. Must complete before booking traffic is
    /// admitted.
    #[tracing::instrument(skip(self))]
    pub async fn sync_on_startup(&self) -> Result<()> {
        self.fast.ping().await?;

        let start = Instant::now();
        let today = today_utc();
        let mut offset = 0i64;
        let mut total = 0usize;

        loop {
            let batch = self
                .store
                .quota_snapshots(today, SYNC_BATCH_SIZE, offset)
                .await?;
            if batch.is_empty() {
                break;
            }

            let writes: Vec<KeyWrite> = batch
                .iter()
                .flat_map(|snap| {
                    let ttl = ttl_for(snap.schedule_date);
                    [
                        KeyWrite {
                            key: quota_key(snap.schedule_id),
                            value: i64::from(snap.remaining_quota.max(0)),
                            ttl,
                        },
                        KeyWrite {
                            key: queue_key(snap.schedule_id),
                            value: i64::from(snap.max_queue_number),
                            ttl,
                        },
                    ]
                })
                .collect();
            self.fast.set_many(&writes).await?;

            total += batch.len();
            if (batch.len() as i64) < SYNC_BATCH_SIZE {
                break;
            }
            offset += SYNC_BATCH_SIZE;
        }

        tracing::info!(
            schedules = total,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "fast store re-sync complete"
        );
        Ok(())
    }

    /// Removes lock-table entries idle for at least `idle_after`.
    ///
    /// An entry is only evicted after `try_lock` succeeds and the
    /// `last_used` stamp, re-read while the lock is held, is still
    /// stale. An acquirer that stamped before our `try_lock` is
    /// therefore always observed, closing the reviver race.
    pub fn sweep_stale_locks(&self, idle_after: Duration) -> usize {
        let now = self.started.elapsed().as_secs();
        let idle_secs = idle_after.as_secs();

        let mut table = self.lock_table();
        let before = table.len();
        table.retain(|_, entry| match entry.mutex.try_lock() {
            Ok(_held) => {
                now.saturating_sub(entry.last_used.load(Ordering::Acquire)) < idle_secs
            }
            Err(_) => true,
        });
        before - table.len()
    }

    /// Periodically sweeps the lock table until `shutdown` flips true
    /// (or its sender is dropped).
    pub async fn run_lock_sweeper(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(LOCK_SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let evicted = self.sweep_stale_locks(LOCK_IDLE_AFTER);
                    if evicted > 0 {
                        tracing::debug!(evicted, "swept stale schedule locks");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("lock sweeper stopping");
                        return;
                    }
                }
            }
        }
    }

    /// Number of live entries in the lock table.
    pub fn lock_count(&self) -> usize {
        self.lock_table().len()
    }

    fn lock_for(&self, schedule_id: ScheduleId) -> Arc<ScheduleLock> {
        let uptime = self.started.elapsed().as_secs();
        let mut table = self.lock_table();
        let entry = table.entry(schedule_id).or_default();
        entry.last_used.store(uptime, Ordering::Release);
        entry.clone()
    }

    fn lock_table(&self) -> MutexGuard<'_, HashMap<ScheduleId, Arc<ScheduleLock>>> {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
