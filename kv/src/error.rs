use thiserror::Error;

/// Errors that can occur when building a cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
  /// The cache was configured with zero shards, which is not allowed.
  #[error("shard count cannot be zero")]
  ZeroShards,
  /// A write or delete queue was configured with a depth of zero.
  #[error("queue depth cannot be zero")]
  ZeroQueueDepth,
  /// The per-shard overallocation factor was below 1.0 or not finite.
  #[error("overallocation factor must be a finite number >= 1.0")]
  InvalidOverallocation,
  /// A table could not be preallocated for the requested number of entries,
  /// either because the size overflows or because the allocation failed.
  #[error("cannot preallocate a table for {requested} entries")]
  CapacityOverflow {
    /// The per-table entry count derived from `capacity_hint`.
    requested: usize,
  },
  /// A single-lock cache was requested with a memory limit of zero.
  #[error("single-lock cache memory limit cannot be zero")]
  ZeroMemoryLimit,
  /// A single-lock cache was requested without a weigher to size its values.
  #[error("a single-lock cache requires a weigher")]
  WeigherRequired,
  /// The operating system refused to start a worker thread.
  #[error("failed to spawn worker thread: {0}")]
  WorkerSpawn(String),
}

/// Errors returned by cache operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
  /// The single-lock cache could not admit the item without exceeding its
  /// memory limit. The cache is left unchanged.
  #[error("memory limit exceeded: {requested} bytes requested with {current} of {max} in use")]
  MemoryLimitExceeded {
    /// The estimated size of the rejected item.
    requested: u64,
    /// Memory in use at the time of the call.
    current: u64,
    /// The configured ceiling.
    max: u64,
  },
  /// A shard's write queue stayed full for longer than the backpressure
  /// policy allows. The write was not enqueued.
  #[error("write queue for shard {shard} is full")]
  QueueFull {
    /// The shard the write was routed to.
    shard: usize,
  },
  /// The worker behind a queue is gone, so the operation can never be applied.
  #[error("cache worker has shut down")]
  Closed,
}
