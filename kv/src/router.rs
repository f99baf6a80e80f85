//! Key-to-shard routing.

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// A 32-bit FNV hash of `bytes`.
///
/// Each byte is folded in by multiplying by the prime first and XOR-ing the
/// byte second. Routing must stay stable for the lifetime of a cache, so this
/// order must not change.
#[inline]
pub fn fnv32(bytes: &[u8]) -> u32 {
  let mut hash = FNV_OFFSET_BASIS;
  for &byte in bytes {
    hash = hash.wrapping_mul(FNV_PRIME);
    hash ^= u32::from(byte);
  }
  hash
}

/// Maps keys onto a fixed number of shards.
///
/// Cheap and reasonably uniform, but not resistant to adversarially chosen keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashRouter {
  shard_count: usize,
}

impl HashRouter {
  /// Creates a router over `shard_count` shards. The builder guarantees the
  /// count is non-zero; a zero count is clamped to one.
  pub fn new(shard_count: usize) -> Self {
    Self {
      shard_count: shard_count.max(1),
    }
  }

  /// The number of shards this router distributes over.
  #[inline]
  pub fn shard_count(&self) -> usize {
    self.shard_count
  }

  /// Returns the index of the shard that owns `key`.
  #[inline]
  pub fn route(&self, key: &[u8]) -> usize {
    fnv32(key) as usize % self.shard_count
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_key_hashes_to_offset_basis() {
    assert_eq!(fnv32(b""), FNV_OFFSET_BASIS);
  }

  #[test]
  fn multiplies_before_xor() {
    let expected = FNV_OFFSET_BASIS.wrapping_mul(FNV_PRIME) ^ u32::from(b'a');
    assert_eq!(fnv32(b"a"), expected);

    let expected = expected.wrapping_mul(FNV_PRIME) ^ u32::from(b'b');
    assert_eq!(fnv32(b"ab"), expected);
  }

  #[test]
  fn route_stays_in_range() {
    let router = HashRouter::new(7);
    for i in 0..1_000 {
      let key = format!("key-{i}");
      assert!(router.route(key.as_bytes()) < 7);
    }
  }

  #[test]
  fn single_shard_routes_everything_to_zero() {
    let router = HashRouter::new(1);
    assert_eq!(router.route(b"anything"), 0);
    assert_eq!(router.route(b""), 0);
  }

  #[test]
  fn zero_shards_is_clamped() {
    assert_eq!(HashRouter::new(0).shard_count(), 1);
  }
}
