use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// A thread-safe, internal metrics collector shared by callers and workers.
/// All fields are atomic to allow for lock-free updates.
#[derive(Debug)]
pub struct Metrics {
  // --- Hit/Miss Ratios ---
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,

  // --- Write Path ---
  pub(crate) writes_enqueued: CachePadded<AtomicU64>,
  pub(crate) writes_applied: CachePadded<AtomicU64>,
  pub(crate) writes_rejected: CachePadded<AtomicU64>,

  // --- Delete Path ---
  pub(crate) deletes_enqueued: CachePadded<AtomicU64>,
  pub(crate) deletes_applied: CachePadded<AtomicU64>,
  pub(crate) expired_removed: CachePadded<AtomicU64>,
  pub(crate) deferred_expirations: CachePadded<AtomicU64>,

  // --- Memory (single-lock cache only) ---
  pub(crate) memory_rejections: CachePadded<AtomicU64>,

  created_at: Instant,
}

// Manual implementation of Default to handle the non-default `Instant`.
impl Default for Metrics {
  fn default() -> Self {
    Self {
      hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      writes_enqueued: CachePadded::new(AtomicU64::new(0)),
      writes_applied: CachePadded::new(AtomicU64::new(0)),
      writes_rejected: CachePadded::new(AtomicU64::new(0)),
      deletes_enqueued: CachePadded::new(AtomicU64::new(0)),
      deletes_applied: CachePadded::new(AtomicU64::new(0)),
      expired_removed: CachePadded::new(AtomicU64::new(0)),
      deferred_expirations: CachePadded::new(AtomicU64::new(0)),
      memory_rejections: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn record_hit(&self) {
    self.hits.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub(crate) fn record_miss(&self) {
    self.misses.fetch_add(1, Ordering::Relaxed);
  }

  /// Creates a point-in-time snapshot of the current metrics.
  pub(crate) fn snapshot(&self) -> MetricsSnapshot {
    let hits = self.hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let total_lookups = hits + misses;

    MetricsSnapshot {
      hits,
      misses,
      hit_ratio: if total_lookups == 0 {
        0.0
      } else {
        hits as f64 / total_lookups as f64
      },
      writes_enqueued: self.writes_enqueued.load(Ordering::Relaxed),
      writes_applied: self.writes_applied.load(Ordering::Relaxed),
      writes_rejected: self.writes_rejected.load(Ordering::Relaxed),
      deletes_enqueued: self.deletes_enqueued.load(Ordering::Relaxed),
      deletes_applied: self.deletes_applied.load(Ordering::Relaxed),
      expired_removed: self.expired_removed.load(Ordering::Relaxed),
      deferred_expirations: self.deferred_expirations.load(Ordering::Relaxed),
      memory_rejections: self.memory_rejections.load(Ordering::Relaxed),
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time, public-facing snapshot of the cache's metrics.
#[derive(Clone)]
pub struct MetricsSnapshot {
  /// The number of lookups that returned a value.
  pub hits: u64,
  /// The number of lookups that found nothing or an expired entry.
  pub misses: u64,
  /// The cache hit ratio (hits / (hits + misses)).
  pub hit_ratio: f64,
  /// Writes accepted onto a shard queue (sharded) or into the table (single-lock).
  pub writes_enqueued: u64,
  /// Writes applied to a shard table by its worker.
  pub writes_applied: u64,
  /// Writes refused by the backpressure policy.
  pub writes_rejected: u64,
  /// Delete requests accepted onto the delete queue, explicit or lazy.
  pub deletes_enqueued: u64,
  /// Delete requests that actually removed an entry.
  pub deletes_applied: u64,
  /// Expired entries removed after a read discovered them.
  pub expired_removed: u64,
  /// Lazy removals skipped because the delete queue was full. The entry stays
  /// in place and the next read of the key tries again.
  pub deferred_expirations: u64,
  /// Single-lock writes rejected for exceeding the memory limit.
  pub memory_rejections: u64,
  /// The number of seconds the cache has been running.
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("hits", &self.hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("writes_enqueued", &self.writes_enqueued)
      .field("writes_applied", &self.writes_applied)
      .field("writes_rejected", &self.writes_rejected)
      .field("deletes_enqueued", &self.deletes_enqueued)
      .field("deletes_applied", &self.deletes_applied)
      .field("expired_removed", &self.expired_removed)
      .field("deferred_expirations", &self.deferred_expirations)
      .field("memory_rejections", &self.memory_rejections)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}

/// Key count and memory usage reported by `stats()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
  /// Estimated bytes in use. Always `0` for the sharded cache, which does not
  /// account memory.
  pub approx_memory_bytes: u64,
  /// The number of entries currently held, including expired entries that
  /// have not been removed yet.
  pub key_count: usize,
}
