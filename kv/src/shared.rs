use crate::backpressure::{BackpressurePolicy, EnqueueError};
use crate::entry::Entry;
use crate::error::CacheError;
use crate::metrics::Metrics;
use crate::store::ShardedStore;
use crate::task::deleter::DeleteWorker;
use crate::task::writer::WriteWorker;

use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{debug, error, trace, warn};

/// The internal, thread-safe core of the sharded cache.
pub(crate) struct CacheShared<K, V, H>
where
  K: Eq + Hash + AsRef<[u8]> + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  pub(crate) store: Arc<ShardedStore<K, V, H>>,
  pub(crate) metrics: Arc<Metrics>,
  pub(crate) writers: Vec<WriteWorker<K, V>>,
  pub(crate) deleter: Option<DeleteWorker<K>>,
  pub(crate) backpressure: BackpressurePolicy,
  pub(crate) write_queue_depth: usize,
  pub(crate) delete_queue_depth: usize,
}

impl<K, V, H> fmt::Debug for CacheShared<K, V, H>
where
  K: Eq + Hash + AsRef<[u8]> + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheShared")
      .field("store", &self.store)
      .field("backpressure", &self.backpressure)
      .field("write_queue_depth", &self.write_queue_depth)
      .field("delete_queue_depth", &self.delete_queue_depth)
      .field("metrics", &self.metrics.snapshot())
      .finish_non_exhaustive()
  }
}

impl<K, V, H> Drop for CacheShared<K, V, H>
where
  K: Eq + Hash + AsRef<[u8]> + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  fn drop(&mut self) {
    // Writers first: they never feed the delete queue, so the deleter can
    // still drain whatever is already queued afterwards.
    for writer in self.writers.drain(..) {
      writer.stop();
    }
    if let Some(deleter) = self.deleter.take() {
      deleter.stop();
    }
    debug!("sharded cache workers stopped");
  }
}

impl<K, V, H> CacheShared<K, V, H>
where
  K: Eq + Hash + AsRef<[u8]> + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone,
{
  /// Routes `key` to its shard's writer.
  pub(crate) fn enqueue_write(&self, key: K, entry: Entry<V>) -> Result<(), CacheError> {
    let shard = self.store.shard_index(&key);
    match self.writers[shard].enqueue(key, entry, self.backpressure) {
      Ok(()) => Ok(()),
      Err(EnqueueError::Full) => {
        self.metrics.writes_rejected.fetch_add(1, Ordering::Relaxed);
        warn!(
          shard,
          policy = ?self.backpressure,
          "write queue full, write rejected"
        );
        Err(CacheError::QueueFull { shard })
      }
      Err(EnqueueError::Closed) => {
        error!(shard, "write worker is gone, write dropped");
        Err(CacheError::Closed)
      }
    }
  }

  pub(crate) fn enqueue_delete(&self, key: K) {
    let Some(deleter) = &self.deleter else {
      return;
    };
    if deleter.enqueue_delete(key).is_err() {
      error!("delete worker is gone, delete dropped");
    }
  }

  /// Schedules background removal of a key a read found expired. Never blocks:
  /// if the delete queue is full the request is dropped and the next read of
  /// the key will try again.
  pub(crate) fn schedule_expiry(&self, key: K) {
    let Some(deleter) = &self.deleter else {
      return;
    };
    match deleter.try_enqueue_expired(key) {
      Ok(()) => trace!("expired entry scheduled for removal"),
      Err(EnqueueError::Full) => {
        self
          .metrics
          .deferred_expirations
          .fetch_add(1, Ordering::Relaxed);
        debug!("delete queue full, expired entry left for the next read");
      }
      Err(EnqueueError::Closed) => error!("delete worker is gone, expiry dropped"),
    }
  }
}
