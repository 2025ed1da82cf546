//! Periodic full clear. No background thread: the interval is checked on
//! every operation, matching the synchronous resource model.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::cache::{Cache, CacheError, CacheValue};
use crate::key::CacheKey;

pub struct ScheduledCache {
	delegate: Box<dyn Cache>,
	interval: Duration,
	last_clear: Mutex<Instant>,
}

impl ScheduledCache {
	pub fn new(delegate: Box<dyn Cache>, interval: Duration) -> Self {
		Self { delegate, interval, last_clear: Mutex::new(Instant::now()) }
	}

	fn clear_when_stale(&self) {
		let mut last = self.last_clear.lock();
		if last.elapsed() >= self.interval {
			self.delegate.clear();
			*last = Instant::now();
		}
	}
}

impl Cache for ScheduledCache {
	fn id(&self) -> &str {
		self.delegate.id()
	}

	fn get(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
		self.clear_when_stale();
		self.delegate.get(key)
	}

	fn put(&self, key: CacheKey, value: CacheValue) -> Result<(), CacheError> {
		self.clear_when_stale();
		self.delegate.put(key, value)
	}

	fn remove(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
		self.clear_when_stale();
		self.delegate.remove(key)
	}

	fn clear(&self) {
		*self.last_clear.lock() = Instant::now();
		self.delegate.clear();
	}

	fn size(&self) -> usize {
		self.clear_when_stale();
		self.delegate.size()
	}
}
