//! Least-recently-used eviction.

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::cache::{Cache, CacheError, CacheValue};
use crate::key::CacheKey;

pub struct LruCache {
	delegate: Box<dyn Cache>,
	// insertion-ordered key map; an access moves the key to the back
	keys: Mutex<IndexMap<CacheKey, ()>>,
	size: usize,
}

impl LruCache {
	pub fn new(delegate: Box<dyn Cache>, size: usize) -> Self {
		Self { delegate, keys: Mutex::new(IndexMap::new()), size: size.max(1) }
	}

	fn touch(&self, key: &CacheKey) {
		let mut keys = self.keys.lock();
		if keys.shift_remove(key).is_some() {
			keys.insert(key.clone(), ());
		}
	}

	fn record(&self, key: CacheKey) -> Option<CacheKey> {
		let mut keys = self.keys.lock();
		keys.shift_remove(&key);
		keys.insert(key, ());
		if keys.len() > self.size {
			keys.shift_remove_index(0).map(|(evicted, _)| evicted)
		} else {
			None
		}
	}
}

impl Cache for LruCache {
	fn id(&self) -> &str {
		self.delegate.id()
	}

	fn get(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
		let found = self.delegate.get(key)?;
		if found.is_some() {
			self.touch(key);
		}
		Ok(found)
	}

	fn put(&self, key: CacheKey, value: CacheValue) -> Result<(), CacheError> {
		self.delegate.put(key.clone(), value)?;
		if let Some(evicted) = self.record(key) {
			self.delegate.remove(&evicted)?;
		}
		Ok(())
	}

	fn remove(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
		self.keys.lock().shift_remove(key);
		self.delegate.remove(key)
	}

	fn clear(&self) {
		self.keys.lock().clear();
		self.delegate.clear();
	}

	fn size(&self) -> usize {
		self.delegate.size()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cache::PerpetualCache;
	use grappelli_core::value::Value;

	fn key(n: i64) -> CacheKey {
		let mut k = CacheKey::new();
		k.update_value(&Value::Int(n));
		k
	}

	#[test]
	fn test_evicts_least_recently_used() {
		let cache = LruCache::new(Box::new(PerpetualCache::new("t")), 2);
		cache.put(key(1), CacheValue::Null).unwrap();
		cache.put(key(2), CacheValue::Null).unwrap();
		// touch 1 so 2 becomes the eviction candidate
		cache.get(&key(1)).unwrap();
		cache.put(key(3), CacheValue::Null).unwrap();
		assert!(cache.get(&key(1)).unwrap().is_some());
		assert!(cache.get(&key(2)).unwrap().is_none());
		assert!(cache.get(&key(3)).unwrap().is_some());
	}
}
