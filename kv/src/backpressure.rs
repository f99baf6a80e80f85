//! What a producer does when a worker queue is full.

use std::thread;
use std::time::{Duration, Instant};

use crossbeam_utils::Backoff;
use fibre::error::TrySendError;
use fibre::mpsc;

/// Longest single sleep while waiting out a full queue under
/// [`BackpressurePolicy::Timeout`], once spinning has stopped paying off.
const MAX_PARK: Duration = Duration::from_micros(200);

/// The policy applied when a shard's write queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackpressurePolicy {
  /// Block the producer until the worker frees a slot. Writes are never lost,
  /// but `set` latency grows while the worker is behind.
  #[default]
  Block,
  /// Keep retrying for at most the given duration, then fail the write with
  /// [`CacheError::QueueFull`](crate::CacheError::QueueFull).
  Timeout(Duration),
  /// Make a single attempt and fail immediately if the queue is full.
  Reject,
}

/// Why an enqueue did not happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EnqueueError {
  Full,
  Closed,
}

/// Sends `value` on `tx`, honoring `policy` when the queue is full.
pub(crate) fn enqueue<T: Send>(
  tx: &mpsc::BoundedSender<T>,
  value: T,
  policy: BackpressurePolicy,
) -> Result<(), EnqueueError> {
  match policy {
    BackpressurePolicy::Block => tx.send(value).map_err(|_| EnqueueError::Closed),
    BackpressurePolicy::Reject => try_enqueue(tx, value),
    BackpressurePolicy::Timeout(limit) => enqueue_within(tx, value, limit),
  }
}

/// A single non-blocking attempt.
#[inline]
pub(crate) fn try_enqueue<T: Send>(tx: &mpsc::BoundedSender<T>, value: T) -> Result<(), EnqueueError> {
  tx.try_send(value).map_err(|err| match err {
    TrySendError::Full(_) => EnqueueError::Full,
    _ => EnqueueError::Closed,
  })
}

fn enqueue_within<T: Send>(
  tx: &mpsc::BoundedSender<T>,
  mut value: T,
  limit: Duration,
) -> Result<(), EnqueueError> {
  let Some(deadline) = Instant::now().checked_add(limit) else {
    // A deadline past the clock's range never arrives.
    return tx.send(value).map_err(|_| EnqueueError::Closed);
  };
  let backoff = Backoff::new();
  loop {
    match tx.try_send(value) {
      Ok(()) => return Ok(()),
      Err(TrySendError::Full(returned)) => value = returned,
      Err(_) => return Err(EnqueueError::Closed),
    }

    let now = Instant::now();
    if now >= deadline {
      return Err(EnqueueError::Full);
    }
    if backoff.is_completed() {
      thread::sleep(MAX_PARK.min(deadline - now));
    } else {
      backoff.snooze();
    }
  }
}
