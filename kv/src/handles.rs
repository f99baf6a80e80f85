use crate::entry::Entry;
use crate::error::CacheError;
use crate::metrics::{CacheStats, MetricsSnapshot};
use crate::shared::CacheShared;
use crate::store::Lookup;
use crate::time;

use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, trace};

/// A thread-safe, sharded cache with asynchronous writes.
///
/// Every key is routed to one shard. `set` hands the write to that shard's
/// worker and returns; the value becomes visible to `get` once the worker has
/// applied it. `delete` is handed to a single background delete worker.
/// Reads go straight to the shard under its shared lock.
///
/// Use [`flush`](Cache::flush) when a caller needs its own writes to be
/// visible before continuing.
pub struct Cache<K, V, H = ahash::RandomState>
where
  K: Eq + Hash + AsRef<[u8]> + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  pub(crate) shared: Arc<CacheShared<K, V, H>>,
}

impl<K, V, H> fmt::Debug for Cache<K, V, H>
where
  K: Eq + Hash + AsRef<[u8]> + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Cache").field("shared", &self.shared).finish()
  }
}

// Cloning shares the same shards and workers.
impl<K, V, H> Clone for Cache<K, V, H>
where
  K: Eq + Hash + AsRef<[u8]> + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
    }
  }
}

impl<K, V, H> Cache<K, V, H>
where
  K: Eq + Hash + AsRef<[u8]> + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone,
{
  /// Queues `value` for `key` with a TTL in whole seconds.
  ///
  /// A `ttl_secs` of zero or less stores the value without expiry. The write
  /// is applied later by the shard's worker, in the order it was queued
  /// relative to other writes on the same shard.
  ///
  /// With the default [`BackpressurePolicy::Block`](crate::BackpressurePolicy::Block)
  /// this blocks while the shard's queue is full and never reports
  /// `QueueFull`.
  pub fn set(&self, key: K, value: V, ttl_secs: i64) -> Result<(), CacheError> {
    self
      .shared
      .enqueue_write(key, Entry::new(value, time::expiry_from_secs(ttl_secs)))
  }

  /// Like [`set`](Cache::set), but with a `Duration` TTL. `Duration::ZERO`
  /// stores the value without expiry.
  pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) -> Result<(), CacheError> {
    self
      .shared
      .enqueue_write(key, Entry::new(value, time::expiry_from_duration(ttl)))
  }

  /// Fetches the value stored under `key`.
  ///
  /// Returns `None` if the key is absent or its entry has expired. An expired
  /// entry is scheduled for background removal without blocking this call.
  pub fn get<Q>(&self, key: &Q) -> Option<Arc<V>>
  where
    K: Borrow<Q>,
    Q: AsRef<[u8]> + Hash + Eq + ?Sized,
  {
    let shard = self.shared.store.get_shard(key);
    // The shard's read lock is released before any removal is scheduled.
    match shard.lookup(key, time::now_nanos()) {
      Lookup::Live(value) => {
        self.shared.metrics.record_hit();
        Some(value)
      }
      Lookup::Missing => {
        self.shared.metrics.record_miss();
        None
      }
      Lookup::Expired(stored_key) => {
        self.shared.metrics.record_miss();
        trace!("read found an expired entry");
        self.shared.schedule_expiry(stored_key);
        None
      }
    }
  }

  /// Queues removal of `key` and returns immediately. Deleting a missing key
  /// is a no-op.
  pub fn delete<Q>(&self, key: &Q)
  where
    K: Borrow<Q>,
    Q: ToOwned<Owned = K> + ?Sized,
  {
    self.shared.enqueue_delete(key.to_owned());
  }

  /// Returns the number of entries across all shards.
  ///
  /// Shards are counted one at a time while the others keep changing, so the
  /// result is an approximation rather than a single point-in-time snapshot.
  /// The sharded cache does not account memory, so `approx_memory_bytes` is 0.
  pub fn stats(&self) -> CacheStats {
    let key_count = self.shared.store.iter_shards().map(|shard| shard.size()).sum();
    CacheStats {
      approx_memory_bytes: 0,
      key_count,
    }
  }

  /// Returns the number of entries as one consistent snapshot.
  ///
  /// Holds every shard's read lock at the same time, acquired in shard index
  /// order, so all writers and deletes pause while the count is taken.
  pub fn consistent_stats(&self) -> CacheStats {
    let guards: Vec<_> = self.shared.store.iter_shards().map(|shard| shard.read()).collect();
    let key_count = guards.iter().map(|guard| guard.len()).sum();
    CacheStats {
      approx_memory_bytes: 0,
      key_count,
    }
  }

  /// Blocks until every write and delete queued before this call has been
  /// applied.
  ///
  /// Lazy removals scheduled by reads count as deletes. Writes queued by
  /// other threads after this call started may or may not be included.
  pub fn flush(&self) {
    // Writes first: a drained write path cannot queue further deletes.
    let pending: Vec<_> = self
      .shared
      .writers
      .iter()
      .filter_map(|writer| writer.enqueue_flush().ok())
      .collect();
    for done in pending {
      if done.recv().is_err() {
        error!("write worker exited before acknowledging flush");
      }
    }

    if let Some(deleter) = &self.shared.deleter {
      match deleter.enqueue_flush() {
        Ok(done) => {
          if done.recv().is_err() {
            error!("delete worker exited before acknowledging flush");
          }
        }
        Err(_) => error!("delete worker is gone, nothing to flush"),
      }
    }
  }

  /// Returns the index of the shard that owns `key`. Stable for the lifetime
  /// of the cache.
  #[inline]
  pub fn shard_index<Q>(&self, key: &Q) -> usize
  where
    Q: AsRef<[u8]> + ?Sized,
  {
    self.shared.store.shard_index(key)
  }

  /// The number of shards (and write workers).
  #[inline]
  pub fn shard_count(&self) -> usize {
    self.shared.store.router().shard_count()
  }

  /// Writes waiting in shard queues that no worker has picked up yet.
  pub fn queued_writes(&self) -> usize {
    self.shared.writers.iter().map(|writer| writer.queue_len()).sum()
  }

  /// Delete requests waiting in the delete queue.
  pub fn queued_deletes(&self) -> usize {
    self.shared.deleter.as_ref().map_or(0, |deleter| deleter.queue_len())
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.shared.metrics.snapshot()
  }
}
