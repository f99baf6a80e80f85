//! An in-process key-value cache built around two concurrency strategies.
//!
//! # Features
//! - **Sharded, Asynchronous Writes**: [`Cache`] routes each key to one of N
//!   shards. Writes are queued to a per-shard worker thread and applied in FIFO
//!   order, so producers never contend on a shard's write lock.
//! - **Lazy Expiration**: Entries carry an optional TTL. Expired entries are
//!   never swept; a read that finds one reports a miss and schedules its
//!   removal on a background delete worker.
//! - **Explicit Backpressure**: A full write queue blocks, waits for a bounded
//!   time, or rejects, depending on the configured [`BackpressurePolicy`].
//! - **Single-Lock Baseline**: [`SingleLockCache`] serializes everything behind
//!   one lock in exchange for exact memory accounting and a hard ceiling.
//! - **Observability**: Both variants expose a [`MetricsSnapshot`].
//!
//! Writes to the sharded cache are eventually consistent: a value becomes
//! visible once its shard worker has applied it. [`Cache::flush`] waits for
//! everything queued so far.

// Public modules that form the API
pub mod backpressure;
pub mod builder;
pub mod error;
pub mod handles;
pub mod metrics;
pub mod router;
pub mod single_lock;

// Internal, crate-only modules
mod entry;
mod shared;
mod store;
mod task;
mod time;

// Re-export the primary user-facing types for convenience
pub use backpressure::BackpressurePolicy;
pub use builder::{CacheBuilder, ShardProfile};
pub use error::{BuildError, CacheError};
pub use handles::Cache;
pub use metrics::{CacheStats, MetricsSnapshot};
pub use router::HashRouter;
pub use single_lock::SingleLockCache;
