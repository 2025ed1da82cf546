//! Per-session staging over the shared second-level cache.
//!
//! Entries written during a session stay in the overlay until commit;
//! misses are recorded so the blocking decorator's per-key locks can be
//! released whether the session commits or rolls back.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::warn;

use crate::cache::{Cache, CacheError, CacheValue};
use crate::key::CacheKey;

pub struct TransactionalCache {
	delegate: Arc<dyn Cache>,
	clear_on_commit: bool,
	entries_to_add_on_commit: HashMap<CacheKey, CacheValue>,
	entries_missed_in_cache: HashSet<CacheKey>,
}

impl TransactionalCache {
	pub fn new(delegate: Arc<dyn Cache>) -> Self {
		Self {
			delegate,
			clear_on_commit: false,
			entries_to_add_on_commit: HashMap::new(),
			entries_missed_in_cache: HashSet::new(),
		}
	}

	pub fn id(&self) -> &str {
		self.delegate.id()
	}

	/// Reads go straight to the delegate; misses are recorded, and while a
	/// transactional `clear` is pending every read reports a miss.
	pub fn get(&mut self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
		let found = self.delegate.get(key)?;
		if found.is_none() {
			self.entries_missed_in_cache.insert(key.clone());
		}
		if self.clear_on_commit { Ok(None) } else { Ok(found) }
	}

	/// Writes land in the overlay, invisible to other sessions until commit.
	pub fn put(&mut self, key: CacheKey, value: CacheValue) {
		self.entries_to_add_on_commit.insert(key, value);
	}

	/// Cross-session removal only happens at commit; within the session this
	/// is a no-op that reports nothing removed.
	pub fn remove(&mut self, _key: &CacheKey) -> Option<CacheValue> {
		None
	}

	pub fn clear(&mut self) {
		self.clear_on_commit = true;
		self.entries_to_add_on_commit.clear();
	}

	pub fn commit(&mut self) -> Result<(), CacheError> {
		if self.clear_on_commit {
			self.delegate.clear();
		}
		self.flush_pending_entries()?;
		self.reset();
		Ok(())
	}

	pub fn rollback(&mut self) {
		self.unlock_missed_entries();
		self.reset();
	}

	fn reset(&mut self) {
		self.clear_on_commit = false;
		self.entries_to_add_on_commit.clear();
		self.entries_missed_in_cache.clear();
	}

	fn flush_pending_entries(&mut self) -> Result<(), CacheError> {
		for (key, value) in self.entries_to_add_on_commit.drain() {
			self.entries_missed_in_cache.remove(&key);
			self.delegate.put(key, value)?;
		}
		// missed keys get a null entry so blocked readers wake up
		for key in self.entries_missed_in_cache.drain() {
			self.delegate.put(key, CacheValue::Null)?;
		}
		Ok(())
	}

	fn unlock_missed_entries(&mut self) {
		for key in self.entries_missed_in_cache.drain() {
			if let Err(error) = self.delegate.remove(&key) {
				warn!(
					cache = self.delegate.id(),
					%error,
					"failed to release missed cache entry during rollback"
				);
			}
		}
	}
}

/// Routes second-level reads and writes through one staging buffer per
/// shared cache, commit/rollback fanning out to all of them.
#[derive(Default)]
pub struct TransactionalCacheManager {
	caches: HashMap<String, TransactionalCache>,
}

impl TransactionalCacheManager {
	pub fn new() -> Self {
		Self::default()
	}

	fn staged(&mut self, cache: &Arc<dyn Cache>) -> &mut TransactionalCache {
		self.caches
			.entry(cache.id().to_string())
			.or_insert_with(|| TransactionalCache::new(Arc::clone(cache)))
	}

	pub fn get(
		&mut self,
		cache: &Arc<dyn Cache>,
		key: &CacheKey,
	) -> Result<Option<CacheValue>, CacheError> {
		self.staged(cache).get(key)
	}

	pub fn put(&mut self, cache: &Arc<dyn Cache>, key: CacheKey, value: CacheValue) {
		self.staged(cache).put(key, value);
	}

	pub fn clear(&mut self, cache: &Arc<dyn Cache>) {
		self.staged(cache).clear();
	}

	pub fn commit(&mut self) -> Result<(), CacheError> {
		for cache in self.caches.values_mut() {
			cache.commit()?;
		}
		Ok(())
	}

	pub fn rollback(&mut self) {
		for cache in self.caches.values_mut() {
			cache.rollback();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cache::PerpetualCache;
	use grappelli_core::value::Value;

	fn shared() -> Arc<dyn Cache> {
		Arc::new(PerpetualCache::new("blog"))
	}

	fn key(n: i64) -> CacheKey {
		let mut k = CacheKey::new();
		k.update_value(&Value::Int(n));
		k
	}

	#[test]
	fn test_puts_invisible_until_commit() {
		let cache = shared();
		let mut staged = TransactionalCache::new(Arc::clone(&cache));
		staged.put(key(1), CacheValue::rows(vec![Value::Int(1)]));
		assert!(cache.get(&key(1)).unwrap().is_none());
		staged.commit().unwrap();
		assert!(cache.get(&key(1)).unwrap().is_some());
	}

	#[test]
	fn test_rollback_discards_puts_and_releases_misses() {
		let cache = shared();
		let mut staged = TransactionalCache::new(Arc::clone(&cache));
		staged.get(&key(2)).unwrap();
		staged.put(key(3), CacheValue::Null);
		staged.rollback();
		assert!(cache.get(&key(3)).unwrap().is_none());
	}

	#[test]
	fn test_missed_keys_flushed_as_null_on_commit() {
		let cache = shared();
		let mut staged = TransactionalCache::new(Arc::clone(&cache));
		staged.get(&key(4)).unwrap();
		staged.commit().unwrap();
		assert!(matches!(cache.get(&key(4)).unwrap(), Some(CacheValue::Null)));
	}

	#[test]
	fn test_clear_hides_delegate_until_commit() {
		let cache = shared();
		cache.put(key(5), CacheValue::rows(vec![Value::Int(5)])).unwrap();
		let mut staged = TransactionalCache::new(Arc::clone(&cache));
		staged.clear();
		assert!(staged.get(&key(5)).unwrap().is_none());
		// other sessions still see the entry until this one commits
		assert!(cache.get(&key(5)).unwrap().is_some());
		staged.commit().unwrap();
		assert!(cache.get(&key(5)).unwrap().is_none());
	}
}
