//! The cache contract and the plain map implementation decorators wrap.

use std::collections::HashMap;
use std::sync::Arc;

use grappelli_core::value::Value;
use parking_lot::Mutex;

use crate::key::CacheKey;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
	#[error("cache '{cache_id}': lock release without a prior lock on key {key}")]
	ReleaseWithoutLock { cache_id: String, key: String },
	#[error("cache '{cache_id}': timed out waiting for lock on key {key}")]
	LockTimeout { cache_id: String, key: String },
	#[error("cache '{cache_id}': serialization failed: {detail}")]
	Serialization { cache_id: String, detail: String },
}

/// A cached query result.
///
/// `Null` marks a cached absence (it also releases blocking waiters after a
/// rollback); `Serialized` is the deep-copy form the serialized decorator
/// stores.
#[derive(Debug, Clone)]
pub enum CacheValue {
	Null,
	Rows(Arc<Vec<Value>>),
	Serialized(Arc<str>),
}

impl CacheValue {
	pub fn rows(rows: Vec<Value>) -> Self {
		CacheValue::Rows(Arc::new(rows))
	}

	/// Materializes the row list, decoding the serialized form if needed.
	pub fn into_rows(self) -> Option<Vec<Value>> {
		match self {
			CacheValue::Null => None,
			CacheValue::Rows(rows) => Some(rows.as_ref().clone()),
			CacheValue::Serialized(text) => {
				let json: serde_json::Value = serde_json::from_str(&text).ok()?;
				match Value::from_json(json) {
					Value::Array(rows) => Some(rows),
					_ => None,
				}
			}
		}
	}
}

/// The capability interface every cache and decorator implements.
///
/// Implementations are shared across sessions and synchronize internally;
/// `get`/`put`/`remove` are fallible because decorators add failure modes
/// (lock timeouts, serialization).
pub trait Cache: Send + Sync {
	/// Identity, normally the owning namespace.
	fn id(&self) -> &str;
	fn get(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError>;
	fn put(&self, key: CacheKey, value: CacheValue) -> Result<(), CacheError>;
	fn remove(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError>;
	fn clear(&self);
	fn size(&self) -> usize;
}

/// Unbounded map-backed cache, the default innermost store.
pub struct PerpetualCache {
	id: String,
	entries: Mutex<HashMap<CacheKey, CacheValue>>,
}

impl PerpetualCache {
	pub fn new(id: impl Into<String>) -> Self {
		Self { id: id.into(), entries: Mutex::new(HashMap::new()) }
	}
}

impl Cache for PerpetualCache {
	fn id(&self) -> &str {
		&self.id
	}

	fn get(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
		Ok(self.entries.lock().get(key).cloned())
	}

	fn put(&self, key: CacheKey, value: CacheValue) -> Result<(), CacheError> {
		self.entries.lock().insert(key, value);
		Ok(())
	}

	fn remove(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
		Ok(self.entries.lock().remove(key))
	}

	fn clear(&self) {
		self.entries.lock().clear();
	}

	fn size(&self) -> usize {
		self.entries.lock().len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn key(n: i64) -> CacheKey {
		let mut k = CacheKey::new();
		k.update_value(&Value::Int(n));
		k
	}

	#[test]
	fn test_perpetual_cache_round_trip() {
		let cache = PerpetualCache::new("blog");
		assert!(cache.get(&key(1)).unwrap().is_none());
		cache.put(key(1), CacheValue::rows(vec![Value::Int(42)])).unwrap();
		let hit = cache.get(&key(1)).unwrap().unwrap();
		assert_eq!(hit.into_rows(), Some(vec![Value::Int(42)]));
		assert_eq!(cache.size(), 1);
		cache.remove(&key(1)).unwrap();
		assert!(cache.get(&key(1)).unwrap().is_none());
	}

	#[test]
	fn test_cached_null_round_trip() {
		let cache = PerpetualCache::new("blog");
		cache.put(key(2), CacheValue::Null).unwrap();
		let hit = cache.get(&key(2)).unwrap().unwrap();
		assert!(hit.into_rows().is_none());
	}
}
