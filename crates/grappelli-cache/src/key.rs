//! Composite cache key.
//!
//! Built from the statement id, row bounds, rendered SQL, every parameter
//! value (in binding order, handler-normalized), and the environment tag.
//! Equal keys hash equal; the running checksum keeps accidental collisions
//! of reordered parts apart.

use std::hash::{Hash, Hasher};

use grappelli_core::value::Value;

const MULTIPLIER: u64 = 37;
const INITIAL_HASH: u64 = 17;

#[derive(Debug, Clone)]
pub struct CacheKey {
	count: u32,
	hashcode: u64,
	checksum: u64,
	parts: Vec<String>,
}

impl Default for CacheKey {
	fn default() -> Self {
		Self::new()
	}
}

impl CacheKey {
	pub fn new() -> Self {
		Self { count: 0, hashcode: INITIAL_HASH, checksum: 0, parts: Vec::new() }
	}

	pub fn update(&mut self, part: impl Into<String>) {
		let part = part.into();
		let base = part_hash(&part);
		self.count += 1;
		self.checksum = self.checksum.wrapping_add(base);
		let scaled = base.wrapping_mul(self.count as u64);
		self.hashcode = self.hashcode.wrapping_mul(MULTIPLIER).wrapping_add(scaled);
		self.parts.push(part);
	}

	pub fn update_value(&mut self, value: &Value) {
		self.update(value.canonical());
	}

	pub fn part_count(&self) -> u32 {
		self.count
	}
}

fn part_hash(part: &str) -> u64 {
	let mut hasher = std::collections::hash_map::DefaultHasher::new();
	part.hash(&mut hasher);
	hasher.finish()
}

impl PartialEq for CacheKey {
	fn eq(&self, other: &Self) -> bool {
		self.hashcode == other.hashcode
			&& self.checksum == other.checksum
			&& self.count == other.count
			&& self.parts == other.parts
	}
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.hashcode.hash(state);
	}
}

impl std::fmt::Display for CacheKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}:{}", self.hashcode, self.checksum)?;
		for part in &self.parts {
			write!(f, ":{part}")?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_equal_updates_equal_keys() {
		let mut a = CacheKey::new();
		let mut b = CacheKey::new();
		for key in [&mut a, &mut b] {
			key.update("ns.select");
			key.update_value(&Value::Int(5));
			key.update_value(&Value::from("title"));
		}
		assert_eq!(a, b);
		let mut ha = std::collections::hash_map::DefaultHasher::new();
		let mut hb = std::collections::hash_map::DefaultHasher::new();
		a.hash(&mut ha);
		b.hash(&mut hb);
		assert_eq!(ha.finish(), hb.finish());
	}

	#[test]
	fn test_order_matters() {
		let mut a = CacheKey::new();
		a.update("x");
		a.update("y");
		let mut b = CacheKey::new();
		b.update("y");
		b.update("x");
		assert_ne!(a, b);
	}

	#[test]
	fn test_value_type_distinguished() {
		let mut a = CacheKey::new();
		a.update_value(&Value::Int(1));
		let mut b = CacheKey::new();
		b.update_value(&Value::from("1"));
		assert_ne!(a, b);
	}
}
