use crate::entry::Entry;
use crate::error::BuildError;
use crate::router::HashRouter;

use core::fmt;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use crossbeam_utils::CachePadded;
use parking_lot::{RwLock, RwLockReadGuard};

/// The outcome of a shared-lock lookup.
pub(crate) enum Lookup<K, V> {
  Missing,
  Live(Arc<V>),
  /// The entry is present but past its deadline. Carries an owned copy of the
  /// stored key so removal can be scheduled after the read lock is released.
  Expired(K),
}

/// Creates a table with room for `capacity` entries, failing instead of
/// panicking when the size overflows or the allocation is refused.
pub(crate) fn preallocate<K, T, H>(capacity: usize, hasher: H) -> Result<HashMap<K, T, H>, BuildError>
where
  K: Eq + Hash,
  H: BuildHasher,
{
  let mut map = HashMap::with_hasher(hasher);
  map
    .try_reserve(capacity)
    .map_err(|_| BuildError::CapacityOverflow { requested: capacity })?;
  Ok(map)
}

/// One partition of the key space: a table guarded by a single RwLock.
pub(crate) struct Shard<K, V, H> {
  map: RwLock<HashMap<K, Entry<V>, H>>,
}

impl<K, V, H> Shard<K, V, H>
where
  K: Eq + Hash,
  H: BuildHasher,
{
  fn try_with_capacity_and_hasher(capacity: usize, hasher: H) -> Result<Self, BuildError> {
    Ok(Self {
      map: RwLock::new(preallocate(capacity, hasher)?),
    })
  }

  /// Looks up `key` under the shared lock.
  pub(crate) fn lookup<Q>(&self, key: &Q, now: u64) -> Lookup<K, V>
  where
    K: Borrow<Q> + Clone,
    Q: Hash + Eq + ?Sized,
  {
    let guard = self.map.read();
    match guard.get_key_value(key) {
      None => Lookup::Missing,
      Some((stored_key, entry)) => {
        if entry.is_expired_at(now) {
          Lookup::Expired(stored_key.clone())
        } else {
          Lookup::Live(entry.value())
        }
      }
    }
  }

  // Displaced entries are returned from the locked section and dropped after
  // the guard, so a value's destructor never runs under the shard lock.

  /// Inserts or replaces under the exclusive lock.
  #[inline]
  pub(crate) fn apply_write(&self, key: K, entry: Entry<V>) {
    let replaced = self.map.write().insert(key, entry);
    drop(replaced);
  }

  /// Removes `key` if present. Returns whether anything was removed.
  #[inline]
  pub(crate) fn apply_delete<Q>(&self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let removed = self.map.write().remove(key);
    removed.is_some()
  }

  /// Removes `key` only if it is still expired at `now`. A value rewritten
  /// after the expiry was observed is left alone.
  pub(crate) fn apply_expire<Q>(&self, key: &Q, now: u64) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let removed = {
      let mut guard = self.map.write();
      if guard.get(key).is_some_and(|entry| entry.is_expired_at(now)) {
        guard.remove(key)
      } else {
        None
      }
    };
    removed.is_some()
  }

  #[inline]
  pub(crate) fn size(&self) -> usize {
    self.map.read().len()
  }

  /// Acquires the shared lock and hands out the guard. Used when several
  /// shards must be held at once.
  #[inline]
  pub(crate) fn read(&self) -> RwLockReadGuard<'_, HashMap<K, Entry<V>, H>> {
    self.map.read()
  }
}

/// A cache store that is partitioned into multiple, independently locked shards.
///
/// Routing is by key bytes through a [`HashRouter`], so a key always lands on
/// the same shard for the lifetime of the store.
pub(crate) struct ShardedStore<K, V, H> {
  pub(crate) shards: Box<[CachePadded<Shard<K, V, H>>]>,
  router: HashRouter,
}

impl<K, V, H> fmt::Debug for ShardedStore<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ShardedStore")
      .field("num_shards", &self.shards.len())
      .finish()
  }
}

impl<K, V, H> ShardedStore<K, V, H>
where
  K: Eq + Hash,
  H: BuildHasher + Clone,
{
  /// Creates a store of `num_shards` shards, each preallocated for
  /// `per_shard_capacity` entries.
  pub(crate) fn new(
    num_shards: usize,
    per_shard_capacity: usize,
    hasher: H,
  ) -> Result<Self, BuildError> {
    let mut shards = Vec::with_capacity(num_shards);
    for _ in 0..num_shards {
      let shard = Shard::try_with_capacity_and_hasher(per_shard_capacity, hasher.clone())?;
      shards.push(CachePadded::new(shard));
    }

    Ok(Self {
      shards: shards.into_boxed_slice(),
      router: HashRouter::new(num_shards),
    })
  }

  #[inline]
  pub(crate) fn router(&self) -> &HashRouter {
    &self.router
  }

  #[inline]
  pub(crate) fn shard_index<Q>(&self, key: &Q) -> usize
  where
    Q: AsRef<[u8]> + ?Sized,
  {
    self.router.route(key.as_ref())
  }

  /// Returns the shard that owns `key`.
  #[inline]
  pub(crate) fn get_shard<Q>(&self, key: &Q) -> &Shard<K, V, H>
  where
    Q: AsRef<[u8]> + ?Sized,
  {
    &self.shards[self.shard_index(key)]
  }

  /// Returns an iterator over all shards in index order.
  pub(crate) fn iter_shards(&self) -> impl Iterator<Item = &Shard<K, V, H>> {
    self.shards.iter().map(|padded| &**padded)
  }
}
