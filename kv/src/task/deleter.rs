use super::{flush_marker, join_worker, spawn_named, FlushAck};
use crate::backpressure::{self, BackpressurePolicy, EnqueueError};
use crate::error::BuildError;
use crate::metrics::Metrics;
use crate::store::ShardedStore;
use crate::time;

use std::hash::{BuildHasher, Hash};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;

use fibre::mpsc;
use tracing::{debug, trace};

const WORKER_NAME: &str = "fibre-kv-deleter";

/// A removal for the delete worker to apply.
pub(crate) enum DeleteRequest<K> {
  /// Remove the key unconditionally.
  Explicit(K),
  /// Remove the key only if it is still expired when the request is applied.
  Expired(K),
  Flush(FlushAck),
}

/// The single delete worker shared by every shard.
pub(crate) struct DeleteWorker<K: Send> {
  sender: mpsc::BoundedSender<DeleteRequest<K>>,
  handle: JoinHandle<()>,
  metrics: Arc<Metrics>,
}

impl<K> DeleteWorker<K>
where
  K: Eq + Hash + AsRef<[u8]> + Send + Sync + 'static,
{
  pub(crate) fn spawn<V, H>(
    store: Arc<ShardedStore<K, V, H>>,
    metrics: Arc<Metrics>,
    queue_depth: usize,
  ) -> Result<Self, BuildError>
  where
    V: Send + Sync + 'static,
    H: BuildHasher + Clone + Send + Sync + 'static,
  {
    let (tx, rx): (
      mpsc::BoundedSender<DeleteRequest<K>>,
      mpsc::BoundedReceiver<DeleteRequest<K>>,
    ) = mpsc::bounded(queue_depth);

    let worker_metrics = metrics.clone();
    let handle = spawn_named(WORKER_NAME.to_string(), move || {
      debug!("delete worker started");
      while let Ok(request) = rx.recv() {
        let removed = match request {
          DeleteRequest::Explicit(key) => store.get_shard(&key).apply_delete(&key),
          DeleteRequest::Expired(key) => {
            let removed = store.get_shard(&key).apply_expire(&key, time::now_nanos());
            if removed {
              worker_metrics.expired_removed.fetch_add(1, Ordering::Relaxed);
            }
            removed
          }
          DeleteRequest::Flush(ack) => {
            let _ = ack.send(());
            continue;
          }
        };
        if removed {
          worker_metrics.deletes_applied.fetch_add(1, Ordering::Relaxed);
        }
      }
      debug!("delete worker stopped");
    })?;

    Ok(Self {
      sender: tx,
      handle,
      metrics,
    })
  }

  /// Queues an explicit delete, blocking while the queue is full.
  pub(crate) fn enqueue_delete(&self, key: K) -> Result<(), EnqueueError> {
    self.send(DeleteRequest::Explicit(key), BackpressurePolicy::Block)
  }

  /// Attempts to queue removal of an expired key without blocking.
  pub(crate) fn try_enqueue_expired(&self, key: K) -> Result<(), EnqueueError> {
    self.send(DeleteRequest::Expired(key), BackpressurePolicy::Reject)
  }

  fn send(&self, request: DeleteRequest<K>, policy: BackpressurePolicy) -> Result<(), EnqueueError> {
    backpressure::enqueue(&self.sender, request, policy)?;
    self.metrics.deletes_enqueued.fetch_add(1, Ordering::Relaxed);
    trace!("delete enqueued");
    Ok(())
  }

  /// Queues a flush marker behind every delete accepted so far.
  pub(crate) fn enqueue_flush(&self) -> Result<mpsc::BoundedReceiver<()>, EnqueueError> {
    let (ack, done) = flush_marker();
    backpressure::enqueue(&self.sender, DeleteRequest::Flush(ack), BackpressurePolicy::Block)?;
    Ok(done)
  }

  /// Number of requests waiting in the delete queue.
  #[inline]
  pub(crate) fn queue_len(&self) -> usize {
    self.sender.len()
  }

  /// Closes the queue and waits for the worker to drain it and exit.
  pub(crate) fn stop(self) {
    drop(self.sender);
    join_worker(WORKER_NAME, self.handle);
  }
}
