use fibre_kv::{BackpressurePolicy, BuildError, CacheBuilder, ShardProfile};
use std::time::Duration;

#[test]
fn test_default_builder_builds_a_working_cache() {
  let cache = CacheBuilder::<String, String>::default().build().unwrap();
  assert!(cache.shard_count() >= 1);

  cache.set("key".to_string(), "value".to_string(), 0).unwrap();
  cache.flush();
  assert!(cache.get("key").is_some());
}

#[test]
fn test_zero_shards_is_rejected() {
  let result = CacheBuilder::<String, String>::new().shards(0).build();
  assert_eq!(result.unwrap_err(), BuildError::ZeroShards);
}

#[test]
fn test_zero_queue_depth_is_rejected() {
  let writes = CacheBuilder::<String, String>::new()
    .write_queue_depth(0)
    .build();
  assert_eq!(writes.unwrap_err(), BuildError::ZeroQueueDepth);

  let deletes = CacheBuilder::<String, String>::new()
    .delete_queue_depth(0)
    .build();
  assert_eq!(deletes.unwrap_err(), BuildError::ZeroQueueDepth);
}

#[test]
fn test_invalid_overallocation_is_rejected() {
  for factor in [0.5, -1.0, f64::NAN, f64::INFINITY] {
    let result = CacheBuilder::<String, String>::new()
      .overallocation(factor)
      .build();
    assert_eq!(result.unwrap_err(), BuildError::InvalidOverallocation);
  }
}

#[test]
fn test_profiles_build_and_can_be_overridden() {
  for profile in [ShardProfile::Standard, ShardProfile::HighThroughput] {
    let cache = CacheBuilder::<String, u32>::new()
      .shards(2)
      .capacity_hint(1_000)
      .profile(profile)
      .build()
      .unwrap();
    cache.set("key".to_string(), 1, 0).unwrap();
    cache.flush();
    assert_eq!(cache.get("key").as_deref(), Some(&1));
  }

  // A later explicit depth wins over the preset.
  let result = CacheBuilder::<String, u32>::new()
    .profile(ShardProfile::HighThroughput)
    .write_queue_depth(0)
    .build();
  assert_eq!(result.unwrap_err(), BuildError::ZeroQueueDepth);
}

#[test]
fn test_custom_hasher_and_policy() {
  let cache = CacheBuilder::<String, u32>::new()
    .shards(3)
    .hasher(std::collections::hash_map::RandomState::new())
    .backpressure(BackpressurePolicy::Timeout(Duration::from_millis(100)))
    .build()
    .unwrap();

  for i in 0..30 {
    cache.set(format!("key-{i}"), i, 0).unwrap();
  }
  cache.flush();
  assert_eq!(cache.stats().key_count, 30);
  assert_eq!(cache.shard_count(), 3);
}

#[test]
fn test_builder_debug_lists_configuration() {
  let builder = CacheBuilder::<String, String>::new()
    .shards(4)
    .backpressure(BackpressurePolicy::Reject);
  let debug = format!("{builder:?}");
  assert!(debug.contains("shards: 4"));
  assert!(debug.contains("Reject"));
}

#[test]
fn test_oversized_capacity_is_a_build_error() {
  let huge_hint = CacheBuilder::<String, String>::new()
    .shards(1)
    .capacity_hint(usize::MAX)
    .build();
  assert_eq!(
    huge_hint.unwrap_err(),
    BuildError::CapacityOverflow {
      requested: usize::MAX
    }
  );

  // The scaled capacity saturates rather than wrapping.
  let huge_factor = CacheBuilder::<String, String>::new()
    .shards(1)
    .capacity_hint(10)
    .overallocation(1e300)
    .build();
  assert_eq!(
    huge_factor.unwrap_err(),
    BuildError::CapacityOverflow {
      requested: usize::MAX
    }
  );
}
