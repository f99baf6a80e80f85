use crate::backpressure::BackpressurePolicy;
use crate::error::BuildError;
use crate::handles::Cache;
use crate::metrics::Metrics;
use crate::shared::CacheShared;
use crate::single_lock::{SingleLockCache, Weigher};
use crate::store::ShardedStore;
use crate::task::deleter::DeleteWorker;
use crate::task::writer::WriteWorker;

use core::fmt;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

/// Queue depth used when no profile or explicit depth is configured.
const DEFAULT_QUEUE_DEPTH: usize = 10;

/// Preset queue and table sizing for the sharded cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardProfile {
  /// A general-purpose configuration.
  ///
  /// - Queue depth: 10 per shard, 10 for deletes
  /// - Overallocation: none (each shard preallocates `capacity_hint / shards`)
  Standard,

  /// Optimized for sustained write bursts. Deeper queues absorb bursts before
  /// producers feel backpressure, at the cost of a longer visibility delay.
  ///
  /// - Queue depth: 100 per shard, 100 for deletes
  /// - Overallocation: 20% extra table space per shard
  HighThroughput,
}

/// A builder for creating [`Cache`] and [`SingleLockCache`] instances.
pub struct CacheBuilder<K, V, H = ahash::RandomState> {
  pub(crate) capacity_hint: usize,
  pub(crate) shards: usize,
  pub(crate) write_queue_depth: usize,
  pub(crate) delete_queue_depth: usize,
  pub(crate) overallocation: f64,
  pub(crate) backpressure: BackpressurePolicy,
  pub(crate) max_memory: u64,
  pub(crate) hasher: H,
  weigher: Option<Weigher<V>>,
  _key_marker: PhantomData<K>,
}

// Manual Debug implementation for CacheBuilder.
impl<K, V, H> fmt::Debug for CacheBuilder<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheBuilder")
      .field("capacity_hint", &self.capacity_hint)
      .field("shards", &self.shards)
      .field("write_queue_depth", &self.write_queue_depth)
      .field("delete_queue_depth", &self.delete_queue_depth)
      .field("overallocation", &self.overallocation)
      .field("backpressure", &self.backpressure)
      .field("max_memory", &self.max_memory)
      .field("has_weigher", &self.weigher.is_some())
      .finish_non_exhaustive()
  }
}

// --- General Configuration Methods ---
impl<K, V, H> CacheBuilder<K, V, H> {
  /// Sets the expected number of entries. Used only to preallocate shard
  /// tables; it is not a limit.
  pub fn capacity_hint(mut self, capacity: usize) -> Self {
    self.capacity_hint = capacity;
    self
  }

  /// Sets the number of shards, and therefore of write workers.
  ///
  /// Defaults to the number of logical CPUs.
  pub fn shards(mut self, shards: usize) -> Self {
    self.shards = shards;
    self
  }

  /// Sets the capacity of each shard's write queue.
  pub fn write_queue_depth(mut self, depth: usize) -> Self {
    self.write_queue_depth = depth;
    self
  }

  /// Sets the capacity of the global delete queue.
  pub fn delete_queue_depth(mut self, depth: usize) -> Self {
    self.delete_queue_depth = depth;
    self
  }

  /// Sets the factor by which each shard's preallocated table exceeds its
  /// even share of `capacity_hint`. Must be at least `1.0`.
  pub fn overallocation(mut self, factor: f64) -> Self {
    self.overallocation = factor;
    self
  }

  /// Applies a preset for queue depths and overallocation.
  ///
  /// Any later call to `.write_queue_depth()`, `.delete_queue_depth()` or
  /// `.overallocation()` overrides the value set by the preset.
  pub fn profile(mut self, profile: ShardProfile) -> Self {
    let (depth, overallocation) = match profile {
      ShardProfile::Standard => (DEFAULT_QUEUE_DEPTH, 1.0),
      ShardProfile::HighThroughput => (100, 1.2),
    };
    self.write_queue_depth = depth;
    self.delete_queue_depth = depth;
    self.overallocation = overallocation;
    self
  }

  /// Sets what `set` does when a shard's write queue is full.
  ///
  /// Defaults to [`BackpressurePolicy::Block`].
  pub fn backpressure(mut self, policy: BackpressurePolicy) -> Self {
    self.backpressure = policy;
    self
  }

  /// Sets the memory ceiling in bytes. Only the single-lock cache enforces it.
  pub fn max_memory(mut self, bytes: u64) -> Self {
    self.max_memory = bytes;
    self
  }

  /// Sets the function that estimates a value's size in bytes for the
  /// single-lock cache's memory accounting.
  pub fn weigher(mut self, f: impl Fn(&V) -> u64 + Send + Sync + 'static) -> Self {
    self.weigher = Some(Arc::new(f));
    self
  }

  /// Sets the hasher used inside each shard's table. Routing between shards
  /// does not use it.
  pub fn hasher<S>(self, hasher: S) -> CacheBuilder<K, V, S> {
    CacheBuilder {
      capacity_hint: self.capacity_hint,
      shards: self.shards,
      write_queue_depth: self.write_queue_depth,
      delete_queue_depth: self.delete_queue_depth,
      overallocation: self.overallocation,
      backpressure: self.backpressure,
      max_memory: self.max_memory,
      hasher,
      weigher: self.weigher,
      _key_marker: PhantomData,
    }
  }

  /// Table capacity each shard preallocates. Saturates at `usize::MAX`, which
  /// the store then refuses with [`BuildError::CapacityOverflow`].
  pub(crate) fn per_shard_capacity(&self) -> usize {
    let even_share = self.capacity_hint / self.shards.max(1);
    (even_share as f64 * self.overallocation).ceil() as usize
  }

  /// Validates the sharded-cache configuration.
  pub(crate) fn validate(&self) -> Result<(), BuildError> {
    if self.shards == 0 {
      return Err(BuildError::ZeroShards);
    }
    if self.write_queue_depth == 0 || self.delete_queue_depth == 0 {
      return Err(BuildError::ZeroQueueDepth);
    }
    if !self.overallocation.is_finite() || self.overallocation < 1.0 {
      return Err(BuildError::InvalidOverallocation);
    }
    Ok(())
  }
}

// --- Default Constructor ---
impl<K, V, H: BuildHasher + Default> CacheBuilder<K, V, H> {
  /// Creates a new `CacheBuilder` with default settings.
  pub fn new() -> Self {
    Self {
      capacity_hint: 0,
      shards: num_cpus::get().max(1),
      write_queue_depth: DEFAULT_QUEUE_DEPTH,
      delete_queue_depth: DEFAULT_QUEUE_DEPTH,
      overallocation: 1.0,
      backpressure: BackpressurePolicy::default(),
      max_memory: u64::MAX,
      hasher: H::default(),
      weigher: None,
      _key_marker: PhantomData,
    }
  }
}

impl<K, V> Default for CacheBuilder<K, V, ahash::RandomState> {
  fn default() -> Self {
    Self::new()
  }
}

// --- Build Methods ---
impl<K, V, H> CacheBuilder<K, V, H>
where
  K: Eq + Hash + AsRef<[u8]> + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  /// Builds the sharded cache and starts its workers.
  pub fn build(self) -> Result<Cache<K, V, H>, BuildError> {
    self.validate()?;

    let per_shard_capacity = self.per_shard_capacity();
    let store = Arc::new(ShardedStore::new(
      self.shards,
      per_shard_capacity,
      self.hasher.clone(),
    )?);
    let metrics = Arc::new(Metrics::new());

    let mut writers = Vec::with_capacity(self.shards);
    for shard_index in 0..self.shards {
      writers.push(WriteWorker::spawn(
        shard_index,
        Arc::clone(&store),
        Arc::clone(&metrics),
        self.write_queue_depth,
      )?);
    }
    let deleter = DeleteWorker::spawn(
      Arc::clone(&store),
      Arc::clone(&metrics),
      self.delete_queue_depth,
    )?;

    debug!(
      shards = self.shards,
      write_queue_depth = self.write_queue_depth,
      delete_queue_depth = self.delete_queue_depth,
      per_shard_capacity,
      backpressure = ?self.backpressure,
      "sharded cache built"
    );

    Ok(Cache {
      shared: Arc::new(CacheShared {
        store,
        metrics,
        writers,
        deleter: Some(deleter),
        backpressure: self.backpressure,
        write_queue_depth: self.write_queue_depth,
        delete_queue_depth: self.delete_queue_depth,
      }),
    })
  }

  /// Builds the single-lock baseline cache. Requires a weigher; honors
  /// `capacity_hint`, `max_memory` and `hasher`.
  pub fn build_single_lock(self) -> Result<SingleLockCache<K, V, H>, BuildError> {
    if self.max_memory == 0 {
      return Err(BuildError::ZeroMemoryLimit);
    }
    let weigher = self.weigher.ok_or(BuildError::WeigherRequired)?;

    SingleLockCache::new(self.capacity_hint, self.max_memory, weigher, self.hasher)
  }
}
