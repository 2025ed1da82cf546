//! Memory-sensitive retention.
//!
//! Row lists are kept through weak references, with a bounded deque of
//! strong references to the most recently touched entries so fresh results
//! survive the next collection of outstanding `Arc`s. There is no soft
//! reference in Rust; the `SOFT` eviction spelling maps onto this decorator.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};

use grappelli_core::value::Value;
use parking_lot::Mutex;

use crate::cache::{Cache, CacheError, CacheValue};
use crate::key::CacheKey;

const DEFAULT_HARD_LINKS: usize = 256;

enum WeakEntry {
	Null,
	Rows(Weak<Vec<Value>>),
	Serialized(Arc<str>),
}

pub struct WeakCache {
	id: String,
	entries: Mutex<HashMap<CacheKey, WeakEntry>>,
	hard_links: Mutex<VecDeque<Arc<Vec<Value>>>>,
	hard_link_count: usize,
}

impl WeakCache {
	pub fn new(id: impl Into<String>) -> Self {
		Self::with_hard_links(id, DEFAULT_HARD_LINKS)
	}

	pub fn with_hard_links(id: impl Into<String>, hard_link_count: usize) -> Self {
		Self {
			id: id.into(),
			entries: Mutex::new(HashMap::new()),
			hard_links: Mutex::new(VecDeque::new()),
			hard_link_count: hard_link_count.max(1),
		}
	}

	fn retain(&self, rows: &Arc<Vec<Value>>) {
		let mut links = self.hard_links.lock();
		links.push_front(Arc::clone(rows));
		if links.len() > self.hard_link_count {
			links.pop_back();
		}
	}
}

impl Cache for WeakCache {
	fn id(&self) -> &str {
		&self.id
	}

	fn get(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
		let mut entries = self.entries.lock();
		match entries.get(key) {
			None => Ok(None),
			Some(WeakEntry::Null) => Ok(Some(CacheValue::Null)),
			Some(WeakEntry::Serialized(text)) => {
				Ok(Some(CacheValue::Serialized(Arc::clone(text))))
			}
			Some(WeakEntry::Rows(weak)) => match weak.upgrade() {
				Some(rows) => {
					drop(entries);
					self.retain(&rows);
					Ok(Some(CacheValue::Rows(rows)))
				}
				None => {
					// collected since last touch
					entries.remove(key);
					Ok(None)
				}
			},
		}
	}

	fn put(&self, key: CacheKey, value: CacheValue) -> Result<(), CacheError> {
		let entry = match value {
			CacheValue::Null => WeakEntry::Null,
			CacheValue::Serialized(text) => WeakEntry::Serialized(text),
			CacheValue::Rows(rows) => {
				self.retain(&rows);
				WeakEntry::Rows(Arc::downgrade(&rows))
			}
		};
		self.entries.lock().insert(key, entry);
		Ok(())
	}

	fn remove(&self, key: &CacheKey) -> Result<Option<CacheValue>, CacheError> {
		let removed = self.entries.lock().remove(key);
		Ok(match removed {
			Some(WeakEntry::Null) => Some(CacheValue::Null),
			Some(WeakEntry::Serialized(text)) => Some(CacheValue::Serialized(text)),
			Some(WeakEntry::Rows(weak)) => weak.upgrade().map(CacheValue::Rows),
			None => None,
		})
	}

	fn clear(&self) {
		self.hard_links.lock().clear();
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
	fn test_recent_entry_survives_via_hard_link() {
		let cache = WeakCache::new("t");
		cache.put(key(1), CacheValue::rows(vec![Value::Int(9)])).unwrap();
		// the caller's Arc is gone; the hard-link deque keeps it alive
		let hit = cache.get(&key(1)).unwrap().unwrap();
		assert_eq!(hit.into_rows(), Some(vec![Value::Int(9)]));
	}

	#[test]
	fn test_entry_dies_once_pushed_out_of_hard_links() {
		let cache = WeakCache::with_hard_links("t", 1);
		cache.put(key(1), CacheValue::rows(vec![Value::Int(1)])).unwrap();
		cache.put(key(2), CacheValue::rows(vec![Value::Int(2)])).unwrap();
		assert!(cache.get(&key(1)).unwrap().is_none());
		assert!(cache.get(&key(2)).unwrap().is_some());
	}
}
