use super::{flush_marker, join_worker, spawn_named, FlushAck};
use crate::backpressure::{self, BackpressurePolicy, EnqueueError};
use crate::entry::Entry;
use crate::error::BuildError;
use crate::metrics::Metrics;
use crate::store::ShardedStore;

use std::hash::{BuildHasher, Hash};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;

use fibre::mpsc;
use tracing::{debug, trace};

/// A message on a shard's write queue.
pub(crate) enum WriteMessage<K, V> {
  /// Insert or replace `key`.
  Write(K, Entry<V>),
  Flush(FlushAck),
}

/// The sole writer for one shard.
///
/// Producers hand writes over through a bounded FIFO queue, so writes to the
/// shard are applied in enqueue order without the producer ever touching the
/// shard's lock.
pub(crate) struct WriteWorker<K: Send, V: Send + Sync> {
  shard_index: usize,
  sender: mpsc::BoundedSender<WriteMessage<K, V>>,
  handle: JoinHandle<()>,
  metrics: Arc<Metrics>,
}

impl<K, V> WriteWorker<K, V>
where
  K: Eq + Hash + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  /// Spawns the writer thread for shard `shard_index`.
  pub(crate) fn spawn<H>(
    shard_index: usize,
    store: Arc<ShardedStore<K, V, H>>,
    metrics: Arc<Metrics>,
    queue_depth: usize,
  ) -> Result<Self, BuildError>
  where
    H: BuildHasher + Clone + Send + Sync + 'static,
  {
    let (tx, rx): (
      mpsc::BoundedSender<WriteMessage<K, V>>,
      mpsc::BoundedReceiver<WriteMessage<K, V>>,
    ) = mpsc::bounded(queue_depth);

    let worker_metrics = metrics.clone();
    let handle = spawn_named(worker_name(shard_index), move || {
      debug!(shard = shard_index, "write worker started");
      let shard = &store.shards[shard_index];

      // Ends once every sender is dropped and the queue has been drained.
      while let Ok(message) = rx.recv() {
        match message {
          WriteMessage::Write(key, entry) => {
            shard.apply_write(key, entry);
            worker_metrics.writes_applied.fetch_add(1, Ordering::Relaxed);
          }
          WriteMessage::Flush(ack) => {
            // The flusher may have given up waiting.
            let _ = ack.send(());
          }
        }
      }
      debug!(shard = shard_index, "write worker stopped");
    })?;

    Ok(Self {
      shard_index,
      sender: tx,
      handle,
      metrics,
    })
  }

  /// Queues a write for this shard according to `policy`.
  pub(crate) fn enqueue(
    &self,
    key: K,
    entry: Entry<V>,
    policy: BackpressurePolicy,
  ) -> Result<(), EnqueueError> {
    backpressure::enqueue(&self.sender, WriteMessage::Write(key, entry), policy)?;
    self.metrics.writes_enqueued.fetch_add(1, Ordering::Relaxed);
    trace!(shard = self.shard_index, "write enqueued");
    Ok(())
  }

  /// Queues a flush marker behind every write accepted so far. The returned
  /// receiver yields once the worker reaches the marker.
  pub(crate) fn enqueue_flush(&self) -> Result<mpsc::BoundedReceiver<()>, EnqueueError> {
    let (ack, done) = flush_marker();
    backpressure::enqueue(&self.sender, WriteMessage::Flush(ack), BackpressurePolicy::Block)?;
    Ok(done)
  }

  /// Number of messages waiting in this shard's queue.
  #[inline]
  pub(crate) fn queue_len(&self) -> usize {
    self.sender.len()
  }

  /// Closes the queue and waits for the worker to drain it and exit.
  pub(crate) fn stop(self) {
    drop(self.sender);
    join_worker(&worker_name(self.shard_index), self.handle);
  }
}

fn worker_name(shard_index: usize) -> String {
  format!("fibre-kv-writer-{shard_index}")
}
