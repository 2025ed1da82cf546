//! Deep copy on put/get through serialization, so a shared cache never
//! hands two sessions the same row-list allocation.

use std::sync::Arc;

use grappelli_core::value::Value;

use crate::cache::{Cache, CacheError, CacheValue};
use crate::key::CacheKey;

pub struct SerializedCache {
	delegate: Box<dyn Cache>,
}

impl SerializedCache {
	pub fn new(delegate: Box<dyn Cache>) -> Self {
		Self { delegate }
	}

	fn serialize(&self, value: CacheValue) -> Result<CacheValue, CacheError> {
		match value {
			CacheValue::Rows(rows) => {
				let json =
					serde_json::Value::Array(rows.iter().map(Value::to_json).collect());
				let text = serde_json::to_string(&json).map_err(|e| {
					CacheError::Serialization {
						cache_id: self.delegate.id().to_string(),
						detail: e.to_string(),
					}
				})?;
				Ok(CacheValue::Serialized(Arc::from(text.as_str())))
			}
			other => Ok(other),
		}
	}

	fn deserialize(&self, value: CacheValue) -> Result<CacheValue, CacheError> {
		match value {
			CacheValue::Serialized(text) => {
				let json: serde_json::Value =
					serde_json::from_str(&text).map_err(|e| CacheError::Serialization {
						cache_id: self.delegate.id().to_string(),
						detail: e.to_string(),
					})?;
				match Value::from_json(json) {
					Value::Array(rows) => Ok(CacheValue::Rows(Arc::new(rows))),
					other => Err(CacheError::Serialization {
						cache_id: self.delegate.id().to_string(),
						detail: format!("expected row array, found {}", other.type_name()),
					}),
				}
			}
			other => Ok(other),
		}
	}
}

impl Cache for SerializedCache {
	fn id(&self) -> &str {
		self.delegate.id()
	}

	fn get(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
		match self.delegate.get(key)? {
			Some(value) => Ok(Some(self.deserialize(value)?)),
			None => Ok(None),
		}
	}

	fn put(&self, key: CacheKey, value: CacheValue) -> Result<(), CacheError> {
		let serialized = self.serialize(value)?;
		self.delegate.put(key, serialized)
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
	fn test_get_returns_detached_copy() {
		let cache = SerializedCache::new(Box::new(PerpetualCache::new("t")));
		let mut key = CacheKey::new();
		key.update("k");
		let rows = Arc::new(vec![Value::Int(1), Value::Int(2)]);
		cache.put(key.clone(), CacheValue::Rows(Arc::clone(&rows))).unwrap();
		let Some(CacheValue::Rows(copy)) = cache.get(&key).unwrap() else {
			panic!("expected rows");
		};
		assert_eq!(copy.as_ref(), rows.as_ref());
		assert!(!Arc::ptr_eq(&copy, &rows));
	}
}
