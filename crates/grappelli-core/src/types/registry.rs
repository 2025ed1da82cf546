//! Type handler registry with the pair-then-default-then-supertype lookup
//! order, plus the runtime-resolving unknown handler.

use std::collections::HashMap;
use std::sync::Arc;

use crate::driver::{ResultSet, Statement};
use crate::meta::TypeKind;
use crate::types::handlers::{
	self, BooleanTypeHandler, BytesTypeHandler, DateTimeTypeHandler, DateTypeHandler,
	DoubleTypeHandler, EnumTypeHandler, IntegerTypeHandler, ObjectTypeHandler,
	StringTypeHandler, TimeTypeHandler, UuidTypeHandler,
};
use crate::types::{JavaType, JdbcType, TypeAliasRegistry, TypeError, TypeHandler};
use crate::value::Value;

pub struct TypeHandlerRegistry {
	by_java: HashMap<JavaType, HashMap<Option<JdbcType>, Arc<dyn TypeHandler>>>,
	by_jdbc: HashMap<JdbcType, Arc<dyn TypeHandler>>,
	unknown: Arc<dyn TypeHandler>,
}

impl Default for TypeHandlerRegistry {
	fn default() -> Self {
		let mut registry = Self {
			by_java: HashMap::new(),
			by_jdbc: HashMap::new(),
			unknown: Arc::new(UnknownTypeHandler),
		};
		registry.register_builtins();
		registry
	}
}

impl TypeHandlerRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	fn register_builtins(&mut self) {
		self.register(JavaType::Bool, None, Arc::new(BooleanTypeHandler));
		self.register(JavaType::Bool, Some(JdbcType::Boolean), Arc::new(BooleanTypeHandler));
		self.register(JavaType::Bool, Some(JdbcType::Bit), Arc::new(BooleanTypeHandler));
		self.register(JavaType::Int, None, Arc::new(IntegerTypeHandler));
		self.register(JavaType::Long, None, Arc::new(IntegerTypeHandler));
		self.register(JavaType::Float, None, Arc::new(DoubleTypeHandler));
		self.register(JavaType::Double, None, Arc::new(DoubleTypeHandler));
		self.register(JavaType::String, None, Arc::new(StringTypeHandler));
		self.register(JavaType::String, Some(JdbcType::Clob), Arc::new(StringTypeHandler));
		self.register(JavaType::Bytes, None, Arc::new(BytesTypeHandler));
		self.register(JavaType::Bytes, Some(JdbcType::Blob), Arc::new(BytesTypeHandler));
		self.register(JavaType::Date, None, Arc::new(DateTypeHandler));
		self.register(JavaType::Time, None, Arc::new(TimeTypeHandler));
		self.register(JavaType::DateTime, None, Arc::new(DateTimeTypeHandler));
		self.register(JavaType::Uuid, None, Arc::new(UuidTypeHandler));
		self.register(JavaType::Map, None, Arc::new(ObjectTypeHandler));
		self.register(JavaType::List, None, Arc::new(ObjectTypeHandler));
		self.register(JavaType::Object, None, Arc::new(ObjectTypeHandler));

		for jdbc in [
			JdbcType::Boolean,
			JdbcType::Bit,
			JdbcType::TinyInt,
			JdbcType::SmallInt,
			JdbcType::Integer,
			JdbcType::BigInt,
			JdbcType::Float,
			JdbcType::Real,
			JdbcType::Double,
			JdbcType::Numeric,
			JdbcType::Decimal,
			JdbcType::Char,
			JdbcType::Varchar,
			JdbcType::LongVarchar,
			JdbcType::NChar,
			JdbcType::NVarchar,
			JdbcType::Clob,
			JdbcType::NClob,
			JdbcType::Date,
			JdbcType::Time,
			JdbcType::Timestamp,
			JdbcType::Binary,
			JdbcType::VarBinary,
			JdbcType::LongVarBinary,
			JdbcType::Blob,
		] {
			self.by_jdbc.insert(jdbc, handlers::handler_for_jdbc(jdbc));
		}
	}

	pub fn register(
		&mut self,
		java_type: JavaType,
		jdbc_type: Option<JdbcType>,
		handler: Arc<dyn TypeHandler>,
	) {
		self.by_java.entry(java_type).or_default().insert(jdbc_type, handler);
	}

	pub fn register_jdbc(&mut self, jdbc_type: JdbcType, handler: Arc<dyn TypeHandler>) {
		self.by_jdbc.insert(jdbc_type, handler);
	}

	pub fn has_handler(&self, java_type: &JavaType) -> bool {
		self.by_java.contains_key(java_type)
	}

	pub fn unknown(&self) -> Arc<dyn TypeHandler> {
		Arc::clone(&self.unknown)
	}

	pub fn by_jdbc(&self, jdbc_type: JdbcType) -> Option<Arc<dyn TypeHandler>> {
		self.by_jdbc.get(&jdbc_type).map(Arc::clone)
	}

	/// Resolves a handler for a `(javaType, jdbcType)` pair:
	///
	/// 1. exact pair
	/// 2. `(javaType, None)` default
	/// 3. the supertype chain, same lookup at each step
	/// 4. synthesized default enum handler for unbound enum descriptors
	/// 5. the sole registered handler for the java type, if unambiguous
	pub fn resolve(
		&self,
		java_type: Option<&JavaType>,
		jdbc_type: Option<JdbcType>,
		aliases: &TypeAliasRegistry,
	) -> Result<Arc<dyn TypeHandler>, TypeError> {
		let Some(start) = java_type else {
			return jdbc_type
				.and_then(|j| self.by_jdbc(j))
				.ok_or(TypeError::NoHandler { java: None, jdbc: jdbc_type });
		};
		let mut current = Some(start.clone());
		while let Some(java) = current {
			if let Some(for_java) = self.by_java.get(&java) {
				if let Some(handler) = for_java.get(&jdbc_type) {
					return Ok(Arc::clone(handler));
				}
				if jdbc_type.is_some() {
					if let Some(handler) = for_java.get(&None) {
						return Ok(Arc::clone(handler));
					}
				}
				if for_java.len() == 1 {
					if let Some(handler) = for_java.values().next() {
						return Ok(Arc::clone(handler));
					}
				}
			}
			if let Some(descriptor) = aliases.descriptor_for(&java) {
				if descriptor.kind == TypeKind::Enum {
					return Ok(Arc::new(EnumTypeHandler::new(Arc::clone(descriptor))));
				}
				current = descriptor.parent.as_ref().map(|p| aliases.resolve(p));
			} else {
				current = None;
			}
		}
		Err(TypeError::NoHandler { java: Some(start.clone()), jdbc: jdbc_type })
	}
}

impl std::fmt::Debug for TypeHandlerRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TypeHandlerRegistry")
			.field("java_types", &self.by_java.len())
			.field("jdbc_types", &self.by_jdbc.len())
			.finish()
	}
}

/// Defers handler selection to runtime: parameters resolve from the actual
/// value's type, results from column metadata.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnknownTypeHandler;

impl TypeHandler for UnknownTypeHandler {
	fn set_parameter(
		&self,
		stmt: &mut dyn Statement,
		index: usize,
		value: &Value,
		jdbc_type: Option<JdbcType>,
	) -> Result<(), TypeError> {
		handlers::handler_for_value(value).set_parameter(stmt, index, value, jdbc_type)
	}

	fn get_result(&self, rs: &dyn ResultSet, column: usize) -> Result<Value, TypeError> {
		let jdbc = rs
			.columns()
			.get(column)
			.map(|c| c.jdbc_type)
			.unwrap_or(JdbcType::Other);
		handlers::handler_for_jdbc(jdbc).get_result(rs, column)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::meta::TypeDescriptor;

	#[test]
	fn test_lookup_exact_pair_then_default() {
		let registry = TypeHandlerRegistry::new();
		let aliases = TypeAliasRegistry::new();
		assert!(registry
			.resolve(Some(&JavaType::Bool), Some(JdbcType::Bit), &aliases)
			.is_ok());
		// no (String, Timestamp) pair registered, falls to the String default
		assert!(registry
			.resolve(Some(&JavaType::String), Some(JdbcType::Timestamp), &aliases)
			.is_ok());
	}

	#[test]
	fn test_enum_handler_synthesized() {
		let registry = TypeHandlerRegistry::new();
		let mut aliases = TypeAliasRegistry::new();
		aliases.register_type(TypeDescriptor::enumeration("kind", vec!["A".into()]));
		let java = aliases.resolve("kind");
		assert!(registry.resolve(Some(&java), None, &aliases).is_ok());
	}

	#[test]
	fn test_supertype_walk() {
		let registry = TypeHandlerRegistry::new();
		let mut aliases = TypeAliasRegistry::new();
		aliases.register_type(TypeDescriptor::new("base"));
		aliases.register_type(TypeDescriptor::new("derived").parent("base"));
		// neither is registered with a handler and neither is an enum
		let java = aliases.resolve("derived");
		assert!(registry.resolve(Some(&java), None, &aliases).is_err());
	}

	#[test]
	fn test_unresolvable_pair_fails() {
		let registry = TypeHandlerRegistry::new();
		let aliases = TypeAliasRegistry::new();
		let err = registry.resolve(Some(&JavaType::named("ghost")), None, &aliases);
		assert!(matches!(err, Err(TypeError::NoHandler { .. })));
	}
}
