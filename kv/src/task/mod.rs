//! Background workers for the sharded cache: one writer per shard and a
//! single deleter shared by all shards.

pub(crate) mod deleter;
pub(crate) mod writer;

use crate::error::BuildError;

use std::thread::{self, JoinHandle};

use fibre::mpsc;
use tracing::error;

/// A marker sent through a worker queue. The worker acknowledges it once every
/// operation queued ahead of it has been applied.
pub(crate) type FlushAck = mpsc::BoundedSender<()>;

/// Creates a flush marker and the receiver its acknowledgement arrives on.
pub(crate) fn flush_marker() -> (FlushAck, mpsc::BoundedReceiver<()>) {
  mpsc::bounded(1)
}

/// Starts a named worker thread.
fn spawn_named<F>(name: String, body: F) -> Result<JoinHandle<()>, BuildError>
where
  F: FnOnce() + Send + 'static,
{
  thread::Builder::new()
    .name(name)
    .spawn(body)
    .map_err(|err| BuildError::WorkerSpawn(err.to_string()))
}

/// Waits for a worker whose queue has already been closed.
fn join_worker(name: &str, handle: JoinHandle<()>) {
  if handle.join().is_err() {
    error!(worker = name, "cache worker panicked");
  }
}
