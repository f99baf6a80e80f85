use once_cell::sync::Lazy;
use std::time::{Duration, Instant};

// The single, static reference point for all expiry calculations.
// It is initialized lazily on its first use.
static CACHE_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// The current time in nanoseconds since the cache epoch.
#[inline]
pub(crate) fn now_nanos() -> u64 {
  Instant::now()
    .saturating_duration_since(*CACHE_EPOCH)
    .as_nanos() as u64
}

/// Computes an absolute `expires_at` from a TTL in whole seconds.
///
/// Zero or negative TTLs mean "never expires" and yield `0`.
#[inline]
pub(crate) fn expiry_from_secs(ttl_secs: i64) -> u64 {
  if ttl_secs <= 0 {
    return 0;
  }
  deadline_after((ttl_secs as u64).saturating_mul(NANOS_PER_SEC))
}

/// Computes an absolute `expires_at` from a TTL duration. A zero duration
/// means "never expires".
#[inline]
pub(crate) fn expiry_from_duration(ttl: Duration) -> u64 {
  if ttl.is_zero() {
    return 0;
  }
  deadline_after(u64::try_from(ttl.as_nanos()).unwrap_or(u64::MAX))
}

#[inline]
fn deadline_after(ttl_nanos: u64) -> u64 {
  // `max(1)` keeps a real deadline from ever colliding with the "no TTL" marker.
  now_nanos().saturating_add(ttl_nanos).max(1)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn non_positive_ttl_never_expires() {
    assert_eq!(expiry_from_secs(0), 0);
    assert_eq!(expiry_from_secs(-5), 0);
    assert_eq!(expiry_from_duration(Duration::ZERO), 0);
  }

  #[test]
  fn positive_ttl_lands_in_the_future() {
    let before = now_nanos();
    let expires_at = expiry_from_secs(2);
    assert!(expires_at >= before + 2 * NANOS_PER_SEC);

    let expires_at = expiry_from_duration(Duration::from_millis(5));
    assert!(expires_at >= before + 5_000_000);
  }

  #[test]
  fn huge_ttl_saturates() {
    assert_eq!(expiry_from_secs(i64::MAX), u64::MAX);
  }
}
