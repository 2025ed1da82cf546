//! Whole-cache mutual exclusion, applied as the outermost decorator so a
//! user-supplied cache implementation never sees concurrent calls.

use parking_lot::ReentrantMutex;

use crate::cache::{Cache, CacheError, CacheValue};
use crate::key::CacheKey;

pub struct SynchronizedCache {
	delegate: Box<dyn Cache>,
	guard: ReentrantMutex<()>,
}

impl SynchronizedCache {
	pub fn new(delegate: Box<dyn Cache>) -> Self {
		Self { delegate, guard: ReentrantMutex::new(()) }
	}
}

impl Cache for SynchronizedCache {
	fn id(&self) -> &str {
		self.delegate.id()
	}

	fn get(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
		let _lock = self.guard.lock();
		self.delegate.get(key)
	}

	fn put(&self, key: CacheKey, value: CacheValue) -> Result<(), CacheError> {
		let _lock = self.guard.lock();
		self.delegate.put(key, value)
	}

	fn remove(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
		let _lock = self.guard.lock();
		self.delegate.remove(key)
	}

	fn clear(&self) {
		let _lock = self.guard.lock();
		self.delegate.clear();
	}

	fn size(&self) -> usize {
		let _lock = self.guard.lock();
		self.delegate.size()
	}
}
