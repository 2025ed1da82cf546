//! Hit/miss accounting with a `tracing` debug line per lookup.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::cache::{Cache, CacheError, CacheValue};
use crate::key::CacheKey;

pub struct LoggingCache {
	delegate: Box<dyn Cache>,
	requests: AtomicU64,
	hits: AtomicU64,
}

impl LoggingCache {
	pub fn new(delegate: Box<dyn Cache>) -> Self {
		Self { delegate, requests: AtomicU64::new(0), hits: AtomicU64::new(0) }
	}

	pub fn requests(&self) -> u64 {
		self.requests.load(Ordering::Relaxed)
	}

	pub fn hits(&self) -> u64 {
		self.hits.load(Ordering::Relaxed)
	}

	pub fn hit_ratio(&self) -> f64 {
		let requests = self.requests();
		if requests == 0 { 0.0 } else { self.hits() as f64 / requests as f64 }
	}
}

impl Cache for LoggingCache {
	fn id(&self) -> &str {
		self.delegate.id()
	}

	fn get(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
		self.requests.fetch_add(1, Ordering::Relaxed);
		let found = self.delegate.get(key)?;
		if found.is_some() {
			self.hits.fetch_add(1, Ordering::Relaxed);
		}
		debug!(
			cache = self.delegate.id(),
			hit = found.is_some(),
			ratio = self.hit_ratio(),
			"cache lookup"
		);
		Ok(found)
	}

	fn put(&self, key: CacheKey, value: CacheValue) -> Result<(), CacheError> {
		self.delegate.put(key, value)
	}

	fn remove(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
		self.delegate.remove(key)
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

	#[test]
	fn test_counts_hits_and_misses() {
		let cache = LoggingCache::new(Box::new(PerpetualCache::new("t")));
		let mut key = CacheKey::new();
		key.update("k");
		cache.get(&key).unwrap();
		cache.put(key.clone(), CacheValue::Null).unwrap();
		cache.get(&key).unwrap();
		assert_eq!(cache.requests(), 2);
		assert_eq!(cache.hits(), 1);
		assert!((cache.hit_ratio() - 0.5).abs() < f64::EPSILON);
	}
}
