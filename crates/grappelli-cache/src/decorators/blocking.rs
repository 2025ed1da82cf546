//! One-reader-at-a-time per key during a miss.
//!
//! A `get` that misses keeps the per-key lock so other sessions wait instead
//! of stampeding the database; the subsequent `put` (or `remove`, which only
//! releases) unblocks the waiters. Locks must be released on both success
//! and error paths, which is why the transactional buffer flushes a null
//! entry for every missed key on commit and removes them on rollback.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::cache::{Cache, CacheError, CacheValue};
use crate::key::CacheKey;

#[derive(Default)]
struct KeyLock {
	held: Mutex<bool>,
	released: Condvar,
}

pub struct BlockingCache {
	delegate: Box<dyn Cache>,
	locks: Mutex<HashMap<CacheKey, Arc<KeyLock>>>,
	timeout: Option<Duration>,
}

impl BlockingCache {
	pub fn new(delegate: Box<dyn Cache>) -> Self {
		Self { delegate, locks: Mutex::new(HashMap::new()), timeout: None }
	}

	pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.timeout = timeout;
		self
	}

	fn lock_for(&self, key: &CacheKey) -> Arc<KeyLock> {
		Arc::clone(self.locks.lock().entry(key.clone()).or_default())
	}

	fn acquire(&self, key: &CacheKey) -> Result<(), CacheError> {
		let lock = self.lock_for(key);
		let mut held = lock.held.lock();
		while *held {
			match self.timeout {
				None => lock.released.wait(&mut held),
				Some(timeout) => {
					if lock.released.wait_for(&mut held, timeout).timed_out() && *held {
						return Err(CacheError::LockTimeout {
							cache_id: self.delegate.id().to_string(),
							key: key.to_string(),
						});
					}
				}
			}
		}
		*held = true;
		Ok(())
	}

	fn release(&self, key: &CacheKey) -> Result<(), CacheError> {
		let lock = self.lock_for(key);
		let mut held = lock.held.lock();
		if !*held {
			return Err(CacheError::ReleaseWithoutLock {
				cache_id: self.delegate.id().to_string(),
				key: key.to_string(),
			});
		}
		*held = false;
		lock.released.notify_one();
		Ok(())
	}
}

impl Cache for BlockingCache {
	fn id(&self) -> &str {
		self.delegate.id()
	}

	fn get(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
		self.acquire(key)?;
		let found = self.delegate.get(key)?;
		if found.is_some() {
			self.release(key)?;
		}
		// on a miss the lock stays held until the caller puts the value
		Ok(found)
	}

	fn put(&self, key: CacheKey, value: CacheValue) -> Result<(), CacheError> {
		let result = self.delegate.put(key.clone(), value);
		self.release(&key)?;
		result
	}

	/// Releases the key's lock; the underlying entry is left untouched.
	fn remove(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
		self.release(key)?;
		Ok(None)
	}

	fn clear(&self) {
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
	fn test_hit_releases_immediately() {
		let cache = BlockingCache::new(Box::new(PerpetualCache::new("t")));
		cache.delegate.put(key(1), CacheValue::Null).unwrap();
		assert!(cache.get(&key(1)).unwrap().is_some());
		// a second get must not deadlock
		assert!(cache.get(&key(1)).unwrap().is_some());
	}

	#[test]
	fn test_miss_blocks_until_put() {
		let cache = Arc::new(BlockingCache::new(Box::new(PerpetualCache::new("t"))));
		assert!(cache.get(&key(2)).unwrap().is_none());
		let waiter = {
			let cache = Arc::clone(&cache);
			std::thread::spawn(move || cache.get(&key(2)).unwrap())
		};
		std::thread::sleep(Duration::from_millis(20));
		cache.put(key(2), CacheValue::rows(vec![Value::Int(7)])).unwrap();
		let seen = waiter.join().unwrap();
		assert!(seen.is_some());
	}

	#[test]
	fn test_release_without_lock_is_an_error() {
		let cache = BlockingCache::new(Box::new(PerpetualCache::new("t")));
		assert!(matches!(
			cache.remove(&key(3)),
			Err(CacheError::ReleaseWithoutLock { .. })
		));
	}

	#[test]
	fn test_timeout_surfaces() {
		let cache = Arc::new(
			BlockingCache::new(Box::new(PerpetualCache::new("t")))
				.with_timeout(Some(Duration::from_millis(10))),
		);
		assert!(cache.get(&key(4)).unwrap().is_none()); // holds the lock
		let blocked = {
			let cache = Arc::clone(&cache);
			std::thread::spawn(move || cache.get(&key(4)))
		};
		assert!(matches!(
			blocked.join().unwrap(),
			Err(CacheError::LockTimeout { .. })
		));
	}
}
