#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use fibre_kv::{BackpressurePolicy, Cache, CacheBuilder};
use tracing_subscriber::EnvFilter;

/// Routes the cache's tracing output to the test harness. Filter with `RUST_LOG`.
pub fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}

pub fn build_test_cache(shards: usize) -> Cache<String, String> {
  CacheBuilder::<String, String>::new()
    .shards(shards)
    .build()
    .unwrap()
}

/// Polls `condition` until it holds or two seconds pass.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
  let deadline = Instant::now() + Duration::from_secs(2);
  while Instant::now() < deadline {
    if condition() {
      return true;
    }
    thread::sleep(Duration::from_millis(1));
  }
  condition()
}

/// A lock the test holds to stall whichever worker drops a [`Payload::Stall`].
#[derive(Clone, Default)]
pub struct Gate(Arc<Mutex<()>>);

impl Gate {
  pub fn close(&self) -> MutexGuard<'_, ()> {
    self.0.lock().unwrap()
  }
}

pub struct Staller(Gate);

impl Drop for Staller {
  fn drop(&mut self) {
    // Blocks while the test holds the gate closed.
    let _open = (self.0).0.lock();
  }
}

/// A cache value that can park the worker thread which drops it.
pub enum Payload {
  Plain(u32),
  Stall(Staller),
}

impl Payload {
  pub fn stall(gate: &Gate) -> Self {
    Payload::Stall(Staller(gate.clone()))
  }

  pub fn plain(&self) -> Option<u32> {
    match self {
      Payload::Plain(n) => Some(*n),
      Payload::Stall(_) => None,
    }
  }
}

pub fn build_payload_cache(
  write_queue_depth: usize,
  delete_queue_depth: usize,
  policy: BackpressurePolicy,
) -> Cache<String, Payload> {
  CacheBuilder::<String, Payload>::new()
    .shards(1)
    .write_queue_depth(write_queue_depth)
    .delete_queue_depth(delete_queue_depth)
    .backpressure(policy)
    .build()
    .unwrap()
}
