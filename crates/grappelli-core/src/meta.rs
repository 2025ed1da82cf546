//! Type descriptors, reflectors, and value navigation.
//!
//! There is no runtime reflection to lean on, so target types are described
//! explicitly: a [`TypeDescriptor`] names a type's properties, constructor
//! signatures, and (for enums) variants. A [`Reflector`] memoizes the
//! per-descriptor lookup tables — canonical case-insensitive names,
//! readable/writable sets, ambiguity marks — and the [`ReflectorFactory`]
//! caches reflectors by type name, effectively immutable after first build.
//!
//! [`MetaValue`] navigates plain value trees by property path independently
//! of any descriptor; reflectors come into play where a declared target type
//! constrains mapping (constructor matching, auto-mapping, type inference).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::property::{self, PropertyIndex, PropertySegment};
use crate::types::JavaType;
use crate::value::Value;

#[derive(Debug, thiserror::Error)]
pub enum ReflectionError {
	#[error("type '{type_name}' has no default constructor")]
	MissingDefaultConstructor { type_name: String },
	#[error("type '{type_name}' has no property '{property}'")]
	NoSuchProperty { type_name: String, property: String },
	#[error("property '{property}' of '{type_name}' is ambiguous under case-insensitive lookup")]
	AmbiguousProperty { type_name: String, property: String },
	#[error("property '{property}' of '{type_name}' is not writable")]
	NotWritable { type_name: String, property: String },
	#[error("no constructor of '{type_name}' matches {arity} declared constructor mappings")]
	NoMatchingConstructor { type_name: String, arity: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
	Struct,
	Enum,
}

/// Declared shape of a mapped domain type.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
	pub name: String,
	pub kind: TypeKind,
	pub properties: Vec<PropertyDescriptor>,
	pub constructors: Vec<ConstructorDescriptor>,
	/// Supertype chain hook used by the handler registry lookup walk.
	pub parent: Option<String>,
	/// Enum variant names, declaration order.
	pub variants: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
	pub name: String,
	pub java_type: JavaType,
	/// Element type for collection properties (`List<Post>` → `post`).
	pub element_type: Option<JavaType>,
	pub readable: bool,
	pub writable: bool,
}

#[derive(Debug, Clone)]
pub struct ConstructorDescriptor {
	pub params: Vec<(String, JavaType)>,
}

impl TypeDescriptor {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			kind: TypeKind::Struct,
			properties: Vec::new(),
			constructors: Vec::new(),
			parent: None,
			variants: Vec::new(),
		}
	}

	pub fn enumeration(name: impl Into<String>, variants: Vec<String>) -> Self {
		Self { kind: TypeKind::Enum, variants, ..Self::new(name) }
	}

	pub fn property(mut self, name: &str, java_type: JavaType) -> Self {
		self.properties.push(PropertyDescriptor {
			name: name.to_string(),
			java_type,
			element_type: None,
			readable: true,
			writable: true,
		});
		self
	}

	pub fn collection(mut self, name: &str, element_type: JavaType) -> Self {
		self.properties.push(PropertyDescriptor {
			name: name.to_string(),
			java_type: JavaType::List,
			element_type: Some(element_type),
			readable: true,
			writable: true,
		});
		self
	}

	pub fn constructor(mut self, params: Vec<(&str, JavaType)>) -> Self {
		self.constructors.push(ConstructorDescriptor {
			params: params.into_iter().map(|(n, t)| (n.to_string(), t)).collect(),
		});
		self
	}

	pub fn parent(mut self, parent: &str) -> Self {
		self.parent = Some(parent.to_string());
		self
	}
}

/// Memoized lookup tables over one descriptor.
#[derive(Debug)]
pub struct Reflector {
	descriptor: Arc<TypeDescriptor>,
	canonical: HashMap<String, String>,
	ambiguous: HashSet<String>,
	readable: HashSet<String>,
	writable: HashSet<String>,
	has_default_constructor: bool,
}

impl Reflector {
	fn build(descriptor: Arc<TypeDescriptor>) -> Self {
		let mut canonical = HashMap::new();
		let mut ambiguous = HashSet::new();
		let mut readable = HashSet::new();
		let mut writable = HashSet::new();
		for prop in &descriptor.properties {
			let upper = prop.name.to_uppercase();
			if let Some(existing) = canonical.get(&upper) {
				if existing != &prop.name {
					ambiguous.insert(upper.clone());
				}
			} else {
				canonical.insert(upper, prop.name.clone());
			}
			if prop.readable {
				readable.insert(prop.name.clone());
			}
			if prop.writable {
				writable.insert(prop.name.clone());
			}
		}
		// with no declared constructors the type is assumed default-constructible
		let has_default_constructor = descriptor.constructors.is_empty()
			|| descriptor.constructors.iter().any(|c| c.params.is_empty());
		Self { descriptor, canonical, ambiguous, readable, writable, has_default_constructor }
	}

	pub fn type_name(&self) -> &str {
		&self.descriptor.name
	}

	pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
		&self.descriptor
	}

	pub fn has_default_constructor(&self) -> bool {
		self.has_default_constructor
	}

	/// Resolves a name case-insensitively to the declared property name.
	/// Ambiguous collisions raise on access, not at build.
	pub fn find_property(&self, name: &str) -> Result<Option<&str>, ReflectionError> {
		let upper = name.to_uppercase();
		if self.ambiguous.contains(&upper) {
			return Err(ReflectionError::AmbiguousProperty {
				type_name: self.descriptor.name.clone(),
				property: name.to_string(),
			});
		}
		Ok(self.canonical.get(&upper).map(String::as_str))
	}

	pub fn is_readable(&self, property: &str) -> bool {
		self.readable.contains(property)
	}

	pub fn is_writable(&self, property: &str) -> bool {
		self.writable.contains(property)
	}

	pub fn property_type(&self, property: &str) -> Option<&JavaType> {
		self.descriptor.properties.iter().find(|p| p.name == property).map(|p| &p.java_type)
	}

	pub fn element_type(&self, property: &str) -> Option<&JavaType> {
		self.descriptor
			.properties
			.iter()
			.find(|p| p.name == property)
			.and_then(|p| p.element_type.as_ref())
	}

	/// Picks the constructor whose parameter names match the declared
	/// constructor mappings, by arity then by name set.
	pub fn find_constructor(
		&self,
		arg_names: &[String],
	) -> Result<&ConstructorDescriptor, ReflectionError> {
		let by_arity: Vec<_> = self
			.descriptor
			.constructors
			.iter()
			.filter(|c| c.params.len() == arg_names.len())
			.collect();
		if let Some(exact) = by_arity.iter().find(|c| {
			c.params.iter().zip(arg_names).all(|((name, _), wanted)| name == wanted)
		}) {
			return Ok(exact);
		}
		by_arity.first().copied().ok_or_else(|| ReflectionError::NoMatchingConstructor {
			type_name: self.descriptor.name.clone(),
			arity: arg_names.len(),
		})
	}
}

/// Caches reflectors by type name. Shared process-wide through the
/// configuration; reads after build take the read lock only.
#[derive(Debug, Default)]
pub struct ReflectorFactory {
	cache: RwLock<HashMap<String, Arc<Reflector>>>,
}

impl ReflectorFactory {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn find_for(&self, descriptor: &Arc<TypeDescriptor>) -> Arc<Reflector> {
		if let Some(found) = self.cache.read().get(&descriptor.name) {
			return Arc::clone(found);
		}
		let built = Arc::new(Reflector::build(Arc::clone(descriptor)));
		self.cache.write().insert(descriptor.name.clone(), Arc::clone(&built));
		built
	}

	pub fn cached(&self, type_name: &str) -> Option<Arc<Reflector>> {
		self.cache.read().get(type_name).map(Arc::clone)
	}
}

/// Read-side navigation over a value tree.
#[derive(Clone, Copy)]
pub struct MetaValue<'a> {
	value: &'a Value,
	underscore_to_camel: bool,
}

impl<'a> MetaValue<'a> {
	pub fn new(value: &'a Value) -> Self {
		Self { value, underscore_to_camel: false }
	}

	pub fn map_underscore(mut self, enabled: bool) -> Self {
		self.underscore_to_camel = enabled;
		self
	}

	/// Resolves a full dotted/indexed path; any unresolved step yields None.
	pub fn get(&self, path: &str) -> Option<&'a Value> {
		let mut current = self.value;
		for seg in property::parse_path(path) {
			current = Self::resolve_segment(current, &seg, self.underscore_to_camel)?;
		}
		Some(current)
	}

	pub fn has(&self, path: &str) -> bool {
		self.get(path).is_some()
	}

	pub fn segment(&self, seg: &PropertySegment) -> Option<&'a Value> {
		Self::resolve_segment(self.value, seg, self.underscore_to_camel)
	}

	pub fn index(&self, index: &PropertyIndex) -> Option<&'a Value> {
		Self::resolve_index(self.value, index)
	}

	fn resolve_segment<'v>(
		value: &'v Value,
		seg: &PropertySegment,
		camel: bool,
	) -> Option<&'v Value> {
		let base = if seg.name.is_empty() {
			value
		} else {
			Self::resolve_name(value, &seg.name, camel)?
		};
		match &seg.index {
			None => Some(base),
			Some(index) => Self::resolve_index(base, index),
		}
	}

	fn resolve_name<'v>(value: &'v Value, name: &str, camel: bool) -> Option<&'v Value> {
		let map = value.as_object()?;
		if let Some(found) = map.get(name) {
			return Some(found);
		}
		if let Some((_, found)) = map.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
			return Some(found);
		}
		if camel {
			let camelized = underscore_to_camel(name);
			if let Some((_, found)) =
				map.iter().find(|(k, _)| k.eq_ignore_ascii_case(&camelized))
			{
				return Some(found);
			}
		}
		None
	}

	fn resolve_index<'v>(value: &'v Value, index: &PropertyIndex) -> Option<&'v Value> {
		match (value, index) {
			(Value::Array(items), PropertyIndex::Position(n)) => items.get(*n),
			(Value::Object(map), PropertyIndex::Key(key)) => map.get(key.as_str()),
			(Value::Object(map), PropertyIndex::Position(n)) => map.get(&n.to_string()),
			_ => None,
		}
	}
}

/// Writes a value at the given path, creating intermediate objects for
/// missing steps. Indexed writes require the container to already exist.
pub fn set_path(target: &mut Value, path: &str, new_value: Value) {
	let segments = property::parse_path(path);
	set_segments(target, &segments, new_value);
}

fn set_segments(target: &mut Value, segments: &[PropertySegment], new_value: Value) {
	let Some((seg, rest)) = segments.split_first() else {
		*target = new_value;
		return;
	};
	if !matches!(target, Value::Object(_) | Value::Array(_)) {
		*target = Value::Object(Default::default());
	}
	let slot: &mut Value = match (&seg.index, &mut *target) {
		(Some(PropertyIndex::Position(n)), Value::Array(items)) if seg.name.is_empty() => {
			if items.len() <= *n {
				items.resize(*n + 1, Value::Null);
			}
			&mut items[*n]
		}
		(None, Value::Object(map)) => {
			let key = existing_key(map, &seg.name).unwrap_or_else(|| seg.name.clone());
			map.entry(key).or_insert(Value::Null)
		}
		(Some(PropertyIndex::Position(n)), Value::Object(map)) => {
			let key = existing_key(map, &seg.name).unwrap_or_else(|| seg.name.clone());
			let container = map.entry(key).or_insert_with(|| Value::Array(Vec::new()));
			let Value::Array(items) = container else { return };
			if items.len() <= *n {
				items.resize(*n + 1, Value::Null);
			}
			&mut items[*n]
		}
		(Some(PropertyIndex::Key(key)), Value::Object(map)) => {
			let name = existing_key(map, &seg.name).unwrap_or_else(|| seg.name.clone());
			let container = map.entry(name).or_insert_with(|| Value::Object(Default::default()));
			let Value::Object(inner) = container else { return };
			inner.entry(key.clone()).or_insert(Value::Null)
		}
		(None, Value::Array(items)) => {
			let Ok(n) = seg.name.parse::<usize>() else { return };
			if items.len() <= n {
				items.resize(n + 1, Value::Null);
			}
			&mut items[n]
		}
		_ => return,
	};
	set_segments(slot, rest, new_value);
}

fn existing_key(map: &crate::value::ValueMap, name: &str) -> Option<String> {
	if map.contains_key(name) {
		return Some(name.to_string());
	}
	map.keys().find(|k| k.eq_ignore_ascii_case(name)).cloned()
}

/// `author_name` → `authorName`; already-camel names pass through.
pub fn underscore_to_camel(name: &str) -> String {
	let mut out = String::with_capacity(name.len());
	let mut upper_next = false;
	for c in name.chars() {
		if c == '_' {
			upper_next = true;
		} else if upper_next {
			out.extend(c.to_uppercase());
			upper_next = false;
		} else {
			out.push(c);
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	fn object(entries: &[(&str, Value)]) -> Value {
		Value::Object(entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
	}

	#[test]
	fn test_get_nested_path() {
		let value = object(&[(
			"blog",
			object(&[("posts", Value::from(vec![object(&[("id", Value::Int(7))])]))]),
		)]);
		let meta = MetaValue::new(&value);
		assert_eq!(meta.get("blog.posts[0].id"), Some(&Value::Int(7)));
		assert_eq!(meta.get("blog.posts[1].id"), None);
		assert_eq!(meta.get("blog.missing"), None);
	}

	#[test]
	fn test_case_insensitive_lookup() {
		let value = object(&[("authorName", Value::from("kent"))]);
		assert_eq!(MetaValue::new(&value).get("AUTHORNAME"), Some(&Value::from("kent")));
	}

	#[test]
	fn test_underscore_mapping() {
		let value = object(&[("authorName", Value::from("kent"))]);
		let meta = MetaValue::new(&value).map_underscore(true);
		assert_eq!(meta.get("author_name"), Some(&Value::from("kent")));
		assert_eq!(MetaValue::new(&value).get("author_name"), None);
	}

	#[test]
	fn test_set_path_creates_intermediates() {
		let mut value = Value::Object(Default::default());
		set_path(&mut value, "user.address.city", Value::from("austin"));
		assert_eq!(MetaValue::new(&value).get("user.address.city"), Some(&Value::from("austin")));
	}

	#[test]
	fn test_set_indexed_path() {
		let mut value = object(&[("ids", Value::from(vec![1i64]))]);
		set_path(&mut value, "ids[2]", Value::Int(9));
		assert_eq!(MetaValue::new(&value).get("ids[2]"), Some(&Value::Int(9)));
		assert_eq!(MetaValue::new(&value).get("ids[1]"), Some(&Value::Null));
	}

	#[test]
	fn test_reflector_ambiguity_raises_on_access() {
		let descriptor = Arc::new(
			TypeDescriptor::new("conflicted")
				.property("userName", JavaType::String)
				.property("username", JavaType::String),
		);
		let factory = ReflectorFactory::new();
		let reflector = factory.find_for(&descriptor);
		assert!(matches!(
			reflector.find_property("USERNAME"),
			Err(ReflectionError::AmbiguousProperty { .. })
		));
	}

	#[test]
	fn test_reflector_constructor_matching() {
		let descriptor = Arc::new(
			TypeDescriptor::new("point")
				.constructor(vec![("x", JavaType::Int), ("y", JavaType::Int)]),
		);
		let factory = ReflectorFactory::new();
		let reflector = factory.find_for(&descriptor);
		assert!(reflector.find_constructor(&["x".into(), "y".into()]).is_ok());
		assert!(reflector.find_constructor(&["x".into()]).is_err());
		assert!(!reflector.has_default_constructor());
	}

	#[test]
	fn test_reflector_factory_memoizes() {
		let descriptor = Arc::new(TypeDescriptor::new("memo").property("a", JavaType::Int));
		let factory = ReflectorFactory::new();
		let first = factory.find_for(&descriptor);
		let second = factory.find_for(&descriptor);
		assert!(Arc::ptr_eq(&first, &second));
	}
}
