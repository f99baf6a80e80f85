mod common;

use common::{build_payload_cache, init_tracing, wait_until, Gate, Payload};
use fibre_kv::{BackpressurePolicy, CacheError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Leaves the only write worker parked inside a value's destructor with its
/// queue (depth 1) empty. The caller must keep the returned guard alive.
fn stall_writer<'a>(
  cache: &fibre_kv::Cache<String, Payload>,
  gate: &'a Gate,
) -> std::sync::MutexGuard<'a, ()> {
  init_tracing();
  cache.set("key".to_string(), Payload::stall(gate), 0).unwrap();
  cache.flush();

  let closed = gate.close();
  // Replacing the staller makes the worker drop it and park on the gate.
  cache.set("key".to_string(), Payload::Plain(1), 0).unwrap();
  assert!(wait_until(|| cache
    .get("key")
    .is_some_and(|value| value.plain() == Some(1))));
  assert_eq!(cache.queued_writes(), 0);
  closed
}

#[test]
fn test_reject_fails_fast_when_queue_is_full() {
  let gate = Gate::default();
  let cache = build_payload_cache(1, 10, BackpressurePolicy::Reject);
  let closed = stall_writer(&cache, &gate);

  cache.set("key".to_string(), Payload::Plain(2), 0).unwrap();
  let started = Instant::now();
  let result = cache.set("key".to_string(), Payload::Plain(3), 0);
  assert_eq!(result, Err(CacheError::QueueFull { shard: 0 }));
  assert!(started.elapsed() < Duration::from_secs(1));

  drop(closed);
  cache.flush();

  assert_eq!(cache.get("key").and_then(|value| value.plain()), Some(2));
  let metrics = cache.metrics();
  assert_eq!(metrics.writes_rejected, 1);
  assert_eq!(metrics.writes_enqueued, 3);
  assert_eq!(metrics.writes_applied, 3);
}

#[test]
fn test_timeout_gives_up_after_its_limit() {
  let gate = Gate::default();
  let limit = Duration::from_millis(50);
  let cache = build_payload_cache(1, 10, BackpressurePolicy::Timeout(limit));
  let closed = stall_writer(&cache, &gate);

  cache.set("key".to_string(), Payload::Plain(2), 0).unwrap();
  let started = Instant::now();
  let result = cache.set("key".to_string(), Payload::Plain(3), 0);
  assert_eq!(result, Err(CacheError::QueueFull { shard: 0 }));
  assert!(started.elapsed() >= limit);

  drop(closed);
  cache.flush();
  assert_eq!(cache.get("key").and_then(|value| value.plain()), Some(2));
  assert_eq!(cache.metrics().writes_rejected, 1);
}

fn assert_waiting_producer_completes(policy: BackpressurePolicy) {
  let gate = Gate::default();
  let cache = build_payload_cache(1, 10, policy);
  let closed = stall_writer(&cache, &gate);
  cache.set("key".to_string(), Payload::Plain(2), 0).unwrap();

  let finished = Arc::new(AtomicBool::new(false));
  let producer = {
    let cache = cache.clone();
    let finished = finished.clone();
    thread::spawn(move || {
      let result = cache.set("key".to_string(), Payload::Plain(3), 0);
      finished.store(true, Ordering::SeqCst);
      result
    })
  };

  thread::sleep(Duration::from_millis(50));
  assert!(
    !finished.load(Ordering::SeqCst),
    "Producer should wait while the queue is full"
  );

  drop(closed);
  assert_eq!(producer.join().unwrap(), Ok(()));
  cache.flush();

  assert_eq!(cache.get("key").and_then(|value| value.plain()), Some(3));
  assert_eq!(cache.metrics().writes_rejected, 0);
}

#[test]
fn test_block_waits_for_a_free_slot() {
  assert_waiting_producer_completes(BackpressurePolicy::Block);
}

#[test]
fn test_timeout_succeeds_once_a_slot_frees() {
  assert_waiting_producer_completes(BackpressurePolicy::Timeout(Duration::from_secs(5)));
}

#[test]
fn test_timeout_too_long_for_the_clock_waits_like_block() {
  assert_waiting_producer_completes(BackpressurePolicy::Timeout(Duration::MAX));
}

#[test]
fn test_expiry_is_deferred_when_delete_queue_is_full() {
  let gate = Gate::default();
  let cache = build_payload_cache(10, 1, BackpressurePolicy::Block);
  cache.set("staller".to_string(), Payload::stall(&gate), 0).unwrap();
  cache
    .set_with_ttl("short".to_string(), Payload::Plain(1), Duration::from_millis(20))
    .unwrap();
  cache.flush();

  let closed = gate.close();
  // The delete worker removes the staller and parks in its destructor.
  cache.delete("staller");
  assert!(wait_until(|| cache.queued_deletes() == 0 && cache.get("staller").is_none()));
  // Fills the only slot in the delete queue.
  cache.delete("missing");

  thread::sleep(Duration::from_millis(40));

  // The removal cannot be queued, but the read still reports a miss.
  assert!(cache.get("short").is_none());
  assert_eq!(cache.metrics().deferred_expirations, 1);
  assert_eq!(cache.stats().key_count, 1, "Expired entry is still stored");

  drop(closed);
  cache.flush();
  assert_eq!(cache.stats().key_count, 1);

  // The next read retries the removal.
  assert!(cache.get("short").is_none());
  cache.flush();
  assert_eq!(cache.stats().key_count, 0);
  assert_eq!(cache.metrics().expired_removed, 1);
}
