//! Per-invocation bound SQL and row bounds.

use grappelli_core::meta::{self, MetaValue};
use grappelli_core::value::Value;
use indexmap::IndexMap;

use crate::parameter::ParameterMapping;

/// The concrete SQL and ordered bindings produced for one invocation.
#[derive(Debug, Clone)]
pub struct BoundSql {
	pub sql: String,
	pub parameter_mappings: Vec<ParameterMapping>,
	pub parameter: Value,
	/// Bindings introduced by `bind` and `foreach`, looked up before the
	/// parameter object.
	pub additional_parameters: IndexMap<String, Value>,
}

impl BoundSql {
	pub fn new(sql: String, parameter_mappings: Vec<ParameterMapping>, parameter: Value) -> Self {
		Self { sql, parameter_mappings, parameter, additional_parameters: IndexMap::new() }
	}

	pub fn set_additional_parameter(&mut self, name: &str, value: Value) {
		self.additional_parameters.insert(name.to_string(), value);
	}

	pub fn has_additional_parameter(&self, name: &str) -> bool {
		let root = name.split(['.', '[']).next().unwrap_or(name);
		self.additional_parameters.contains_key(root)
	}

	/// Resolves a property path against the additional bindings first, then
	/// the parameter object.
	pub fn parameter_value(&self, property: &str) -> Value {
		if self.has_additional_parameter(property) {
			let wrapped = Value::Object(self.additional_parameters.clone());
			return MetaValue::new(&wrapped).get(property).cloned().unwrap_or(Value::Null);
		}
		if property.is_empty() {
			return self.parameter.clone();
		}
		match &self.parameter {
			Value::Null => Value::Null,
			scalar if scalar.as_object().is_none() && scalar.as_array().is_none() => {
				// a bare scalar parameter binds regardless of the property name
				scalar.clone()
			}
			object => MetaValue::new(object).get(property).cloned().unwrap_or(Value::Null),
		}
	}

	pub fn write_back(&mut self, property: &str, value: Value) {
		meta::set_path(&mut self.parameter, property, value);
	}
}

/// Offset/limit window applied while reading rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBounds {
	pub offset: usize,
	pub limit: usize,
}

impl RowBounds {
	pub const DEFAULT: RowBounds = RowBounds { offset: 0, limit: usize::MAX };

	pub fn new(offset: usize, limit: usize) -> Self {
		Self { offset, limit }
	}

	pub fn is_default(&self) -> bool {
		*self == Self::DEFAULT
	}
}

impl Default for RowBounds {
	fn default() -> Self {
		Self::DEFAULT
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parameter_value_prefers_additional_bindings() {
		let mut object = IndexMap::new();
		object.insert("id".to_string(), Value::Int(1));
		let mut bound = BoundSql::new("?".into(), vec![], Value::Object(object));
		bound.set_additional_parameter("id", Value::Int(99));
		assert_eq!(bound.parameter_value("id"), Value::Int(99));
	}

	#[test]
	fn test_scalar_parameter_binds_under_any_name() {
		let bound = BoundSql::new("?".into(), vec![], Value::Int(5));
		assert_eq!(bound.parameter_value("id"), Value::Int(5));
	}

	#[test]
	fn test_missing_property_is_null() {
		let bound =
			BoundSql::new("?".into(), vec![], Value::Object(IndexMap::new()));
		assert_eq!(bound.parameter_value("ghost"), Value::Null);
	}
}
