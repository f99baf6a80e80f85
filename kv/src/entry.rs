use std::sync::Arc;

/// A stored value together with its absolute expiry.
#[derive(Debug)]
pub(crate) struct Entry<V> {
  /// The user's value, wrapped in an Arc for shared ownership.
  value: Arc<V>,
  /// The expiration timestamp in nanoseconds. 0 means no TTL.
  expires_at: u64,
}

// Manual impl so that `V` does not need to be `Clone`.
impl<V> Clone for Entry<V> {
  fn clone(&self) -> Self {
    Self {
      value: Arc::clone(&self.value),
      expires_at: self.expires_at,
    }
  }
}

impl<V> Entry<V> {
  pub(crate) fn new(value: V, expires_at: u64) -> Self {
    Self {
      value: Arc::new(value),
      expires_at,
    }
  }

  /// Returns a clone of the `Arc` containing the value.
  #[inline]
  pub(crate) fn value(&self) -> Arc<V> {
    self.value.clone()
  }

  #[inline]
  pub(crate) fn value_ref(&self) -> &V {
    &self.value
  }

  /// An entry is expired once a non-zero deadline lies strictly before `now`.
  /// A zero deadline never expires.
  #[inline]
  pub(crate) fn is_expired_at(&self, now: u64) -> bool {
    self.expires_at != 0 && self.expires_at < now
  }
}
