//! Type alias registry: maps document/descriptor spellings to java types
//! and holds registered type descriptors.

use std::collections::HashMap;
use std::sync::Arc;

use crate::meta::TypeDescriptor;
use crate::types::JavaType;

#[derive(Debug)]
pub struct TypeAliasRegistry {
	aliases: HashMap<String, JavaType>,
	descriptors: HashMap<String, Arc<TypeDescriptor>>,
}

impl Default for TypeAliasRegistry {
	fn default() -> Self {
		let mut registry =
			Self { aliases: HashMap::new(), descriptors: HashMap::new() };
		registry.register_builtins();
		registry
	}
}

impl TypeAliasRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	fn register_builtins(&mut self) {
		let pairs: &[(&str, JavaType)] = &[
			("boolean", JavaType::Bool),
			("bool", JavaType::Bool),
			("byte", JavaType::Int),
			("short", JavaType::Int),
			("int", JavaType::Int),
			("integer", JavaType::Int),
			("long", JavaType::Long),
			("float", JavaType::Float),
			("double", JavaType::Double),
			("decimal", JavaType::Double),
			("string", JavaType::String),
			("bytes", JavaType::Bytes),
			("byte[]", JavaType::Bytes),
			("date", JavaType::Date),
			("time", JavaType::Time),
			("datetime", JavaType::DateTime),
			("timestamp", JavaType::DateTime),
			("uuid", JavaType::Uuid),
			("map", JavaType::Map),
			("hashmap", JavaType::Map),
			("list", JavaType::List),
			("arraylist", JavaType::List),
			("collection", JavaType::List),
			("object", JavaType::Object),
		];
		for (alias, java) in pairs {
			self.aliases.insert((*alias).to_string(), java.clone());
		}
	}

	/// Registers an explicit alias for a java type. Aliases are
	/// case-insensitive, matching the document grammar.
	pub fn register_alias(&mut self, alias: &str, java_type: JavaType) {
		self.aliases.insert(alias.to_lowercase(), java_type);
	}

	/// Registers a domain type descriptor; its name becomes an alias.
	pub fn register_type(&mut self, descriptor: TypeDescriptor) -> Arc<TypeDescriptor> {
		let name = descriptor.name.clone();
		let arc = Arc::new(descriptor);
		self.aliases.insert(name.to_lowercase(), JavaType::Named(name.clone()));
		self.descriptors.insert(name, Arc::clone(&arc));
		arc
	}

	/// Resolves a spelling to a java type. Unregistered names resolve to
	/// `Named` so forward references can settle later.
	pub fn resolve(&self, name: &str) -> JavaType {
		self.aliases
			.get(&name.to_lowercase())
			.cloned()
			.unwrap_or_else(|| JavaType::Named(name.to_string()))
	}

	pub fn descriptor(&self, name: &str) -> Option<&Arc<TypeDescriptor>> {
		self.descriptors.get(name).or_else(|| {
			// alias spellings may differ in case from the descriptor name
			match self.aliases.get(&name.to_lowercase()) {
				Some(JavaType::Named(canonical)) => self.descriptors.get(canonical),
				_ => None,
			}
		})
	}

	pub fn descriptor_for(&self, java_type: &JavaType) -> Option<&Arc<TypeDescriptor>> {
		match java_type {
			JavaType::Named(name) => self.descriptor(name),
			_ => None,
		}
	}

	pub fn has_alias(&self, name: &str) -> bool {
		self.aliases.contains_key(&name.to_lowercase())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_builtin_aliases() {
		let registry = TypeAliasRegistry::new();
		assert_eq!(registry.resolve("int"), JavaType::Int);
		assert_eq!(registry.resolve("STRING"), JavaType::String);
		assert_eq!(registry.resolve("hashmap"), JavaType::Map);
	}

	#[test]
	fn test_unknown_name_is_named() {
		let registry = TypeAliasRegistry::new();
		assert_eq!(registry.resolve("blog"), JavaType::named("blog"));
	}

	#[test]
	fn test_registered_type_resolves_case_insensitively() {
		let mut registry = TypeAliasRegistry::new();
		registry.register_type(TypeDescriptor::new("Blog"));
		assert_eq!(registry.resolve("blog"), JavaType::named("Blog"));
		assert!(registry.descriptor("blog").is_some());
	}
}
