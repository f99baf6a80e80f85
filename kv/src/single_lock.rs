//! The single-lock baseline: one table behind one mutex, synchronous
//! operations and exact memory accounting against a hard ceiling.

use crate::entry::Entry;
use crate::error::{BuildError, CacheError};
use crate::metrics::{CacheStats, Metrics, MetricsSnapshot};
use crate::store;
use crate::time;

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

/// Fixed per-item overhead for the stored expiry timestamp.
pub const TTL_OVERHEAD_BYTES: u64 = 8;

/// Estimates the size in bytes of a stored value.
pub type Weigher<V> = Arc<dyn Fn(&V) -> u64 + Send + Sync>;

struct Table<K, V, H> {
  items: HashMap<K, Entry<V>, H>,
  current_memory: u64,
}

/// A cache that serializes every operation behind one lock.
///
/// Slower under contention than [`Cache`](crate::Cache), but its memory
/// counter and [`stats`](SingleLockCache::stats) are always exact.
pub struct SingleLockCache<K, V, H = ahash::RandomState> {
  table: Mutex<Table<K, V, H>>,
  max_memory: u64,
  weigher: Weigher<V>,
  metrics: Metrics,
}

impl<K, V, H> fmt::Debug for SingleLockCache<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let table = self.table.lock();
    f.debug_struct("SingleLockCache")
      .field("keys", &table.items.len())
      .field("current_memory", &table.current_memory)
      .field("max_memory", &self.max_memory)
      .finish_non_exhaustive()
  }
}

impl<K, V, H> SingleLockCache<K, V, H>
where
  K: Eq + Hash + AsRef<[u8]>,
  H: BuildHasher,
{
  pub(crate) fn new(
    capacity: usize,
    max_memory: u64,
    weigher: Weigher<V>,
    hasher: H,
  ) -> Result<Self, BuildError> {
    let items = store::preallocate(capacity, hasher)?;
    debug!(capacity, max_memory, "single-lock cache built");
    Ok(Self {
      table: Mutex::new(Table {
        items,
        current_memory: 0,
      }),
      max_memory,
      weigher,
      metrics: Metrics::new(),
    })
  }

  /// The accounted size of one item: key bytes, weighed value and the fixed
  /// TTL overhead. Insert and delete must agree on it.
  #[inline]
  fn item_size<Q>(&self, key: &Q, value: &V) -> u64
  where
    Q: AsRef<[u8]> + ?Sized,
  {
    (key.as_ref().len() as u64)
      .saturating_add((self.weigher)(value))
      .saturating_add(TTL_OVERHEAD_BYTES)
  }

  /// Stores `value` under `key` with a TTL in whole seconds; zero or less
  /// means no expiry.
  ///
  /// Fails with [`CacheError::MemoryLimitExceeded`] and leaves the cache
  /// untouched if the item does not fit. Replacing a key first credits the
  /// size of the value it replaces.
  pub fn set(&self, key: K, value: V, ttl_secs: i64) -> Result<(), CacheError> {
    self.insert_entry(key, value, time::expiry_from_secs(ttl_secs))
  }

  /// Like [`set`](SingleLockCache::set), but with a `Duration` TTL.
  pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) -> Result<(), CacheError> {
    self.insert_entry(key, value, time::expiry_from_duration(ttl))
  }

  fn insert_entry(&self, key: K, value: V, expires_at: u64) -> Result<(), CacheError> {
    let size = self.item_size(&key, &value);
    let mut table = self.table.lock();

    let replaced = table
      .items
      .get(&key)
      .map_or(0, |old| self.item_size(&key, old.value_ref()));
    let current = table.current_memory;
    let projected = current.saturating_sub(replaced);
    if projected.saturating_add(size) > self.max_memory {
      self.metrics.memory_rejections.fetch_add(1, Ordering::Relaxed);
      debug!(
        requested = size,
        current,
        max = self.max_memory,
        "memory limit exceeded, write rejected"
      );
      return Err(CacheError::MemoryLimitExceeded {
        requested: size,
        current,
        max: self.max_memory,
      });
    }

    let displaced = table.items.insert(key, Entry::new(value, expires_at));
    table.current_memory = projected + size;
    drop(table);
    drop(displaced);

    self.metrics.writes_enqueued.fetch_add(1, Ordering::Relaxed);
    self.metrics.writes_applied.fetch_add(1, Ordering::Relaxed);
    Ok(())
  }

  /// Fetches the value stored under `key`. An expired entry is removed on the
  /// spot and reported as missing.
  pub fn get<Q>(&self, key: &Q) -> Option<Arc<V>>
  where
    K: Borrow<Q>,
    Q: AsRef<[u8]> + Hash + Eq + ?Sized,
  {
    let now = time::now_nanos();
    let mut table = self.table.lock();

    match table.items.get(key) {
      None => {
        self.metrics.record_miss();
        return None;
      }
      Some(entry) if !entry.is_expired_at(now) => {
        self.metrics.record_hit();
        return Some(entry.value());
      }
      Some(_) => {}
    }

    let expired = self.remove_locked(&mut table, key);
    drop(table);

    if expired.is_some() {
      self.metrics.expired_removed.fetch_add(1, Ordering::Relaxed);
    }
    self.metrics.record_miss();
    None
  }

  /// Removes `key`, returning whether it was present.
  pub fn delete<Q>(&self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: AsRef<[u8]> + Hash + Eq + ?Sized,
  {
    let removed = {
      let mut table = self.table.lock();
      self.remove_locked(&mut table, key)
    };
    removed.is_some()
  }

  // The removed pair is handed back so the caller drops it after the guard;
  // a value's destructor never runs under the table lock.
  fn remove_locked<Q>(&self, table: &mut Table<K, V, H>, key: &Q) -> Option<(K, Entry<V>)>
  where
    K: Borrow<Q>,
    Q: AsRef<[u8]> + Hash + Eq + ?Sized,
  {
    let (stored_key, entry) = table.items.remove_entry(key)?;
    let size = self.item_size(&stored_key, entry.value_ref());
    table.current_memory = table.current_memory.saturating_sub(size);
    self.metrics.deletes_applied.fetch_add(1, Ordering::Relaxed);
    Some((stored_key, entry))
  }

  /// Returns memory in use and key count as one consistent snapshot.
  pub fn stats(&self) -> CacheStats {
    let table = self.table.lock();
    CacheStats {
      approx_memory_bytes: table.current_memory,
      key_count: table.items.len(),
    }
  }

  /// The configured memory ceiling in bytes.
  #[inline]
  pub fn max_memory(&self) -> u64 {
    self.max_memory
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.metrics.snapshot()
  }
}
