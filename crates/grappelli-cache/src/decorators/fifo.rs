//! First-in-first-out eviction.
//!
//! The key list mirrors every mutation, including explicit `remove`, so it
//! always tracks the keys actually present in the delegate.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::cache::{Cache, CacheError, CacheValue};
use crate::key::CacheKey;

pub struct FifoCache {
	delegate: Box<dyn Cache>,
	keys: Mutex<VecDeque<CacheKey>>,
	size: usize,
}

impl FifoCache {
	pub fn new(delegate: Box<dyn Cache>, size: usize) -> Self {
		Self { delegate, keys: Mutex::new(VecDeque::new()), size: size.max(1) }
	}
}

impl Cache for FifoCache {
	fn id(&self) -> &str {
		self.delegate.id()
	}

	fn get(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
		self.delegate.get(key)
	}

	fn put(&self, key: CacheKey, value: CacheValue) -> Result<(), CacheError> {
		let evicted = {
			let mut keys = self.keys.lock();
			if !keys.contains(&key) {
				keys.push_back(key.clone());
			}
			if keys.len() > self.size { keys.pop_front() } else { None }
		};
		self.delegate.put(key, value)?;
		if let Some(oldest) = evicted {
			self.delegate.remove(&oldest)?;
		}
		Ok(())
	}

	fn remove(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
		let mut keys = self.keys.lock();
		if let Some(pos) = keys.iter().position(|k| k == key) {
			keys.remove(pos);
		}
		drop(keys);
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
