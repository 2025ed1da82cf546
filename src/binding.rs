//! Descriptor-table mapper dispatch and parameter-name resolution.
//!
//! No proxies: a mapper call names its namespace and method, the registered
//! descriptor resolves the statement id and result disposition, and the
//! arguments canonicalize into one parameter object with both user names
//! and positional `param1…` aliases.

use grappelli_core::value::{Value, ValueMap};
use grappelli_executor::Cursor;
use grappelli_mapping::{MethodDescriptor, ResultDisposition, RowBounds};
use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::session::SqlSession;

/// Arguments for one mapper call. Row bounds travel beside the parameters,
/// never inside them.
#[derive(Default)]
pub struct MapperArgs {
	positional: Vec<(Option<String>, Value)>,
	row_bounds: Option<RowBounds>,
}

impl MapperArgs {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn arg<T: Serialize>(mut self, value: &T) -> Result<Self> {
		self.positional.push((None, Value::encode(value)?));
		Ok(self)
	}

	/// An explicitly named argument, the `Param` annotation analog.
	pub fn named<T: Serialize>(mut self, name: &str, value: &T) -> Result<Self> {
		self.positional.push((Some(name.to_string()), Value::encode(value)?));
		Ok(self)
	}

	pub fn bounds(mut self, row_bounds: RowBounds) -> Self {
		self.row_bounds = Some(row_bounds);
		self
	}
}

/// What a mapper call produced, shaped by the method's disposition.
pub enum MapperResult {
	One(Option<Value>),
	Many(Vec<Value>),
	Map(IndexMap<String, Value>),
	Cursor(Cursor),
	Affected(u64),
}

impl SqlSession {
	/// Dispatches a mapper method through its descriptor table.
	pub fn call_mapper(
		&mut self,
		namespace: &str,
		method: &str,
		args: MapperArgs,
	) -> Result<MapperResult> {
		let descriptor = self
			.configuration()
			.mapper_descriptor(namespace)
			.ok_or_else(|| Error::UnknownMapper { namespace: namespace.to_string() })?;
		let method_descriptor = descriptor.method(method).cloned().ok_or_else(|| {
			Error::UnknownMapperMethod {
				namespace: namespace.to_string(),
				method: method.to_string(),
			}
		})?;
		let use_actual = self.configuration().settings().use_actual_param_name;
		let row_bounds = args.row_bounds.unwrap_or_default();
		let parameter = resolve_parameters(&method_descriptor, args.positional, use_actual);
		let statement_id = method_descriptor.statement_id.clone();
		match &method_descriptor.disposition {
			ResultDisposition::One => {
				Ok(MapperResult::One(self.select_one_value(&statement_id, parameter)?))
			}
			ResultDisposition::Many => Ok(MapperResult::Many(
				self.select_list_value_bounded(&statement_id, parameter, row_bounds)?,
			)),
			ResultDisposition::MapByKey(key) => {
				Ok(MapperResult::Map(self.select_map_value(&statement_id, parameter, key)?))
			}
			ResultDisposition::Cursor => Ok(MapperResult::Cursor(
				self.select_cursor_value_bounded(&statement_id, parameter, row_bounds)?,
			)),
			ResultDisposition::Affected => {
				let mut parameter = parameter;
				Ok(MapperResult::Affected(self.update_value(&statement_id, &mut parameter)?))
			}
		}
	}
}

/// Canonicalizes method arguments into one parameter object.
///
/// A single unnamed argument passes through unwrapped, except that arrays
/// also answer to `collection`, `list`, and `array`. Named or multiple
/// arguments build an ordered map carrying both the user names and the
/// synthetic `param1, param2, …` aliases.
pub fn resolve_parameters(
	method: &MethodDescriptor,
	positional: Vec<(Option<String>, Value)>,
	use_actual_param_name: bool,
) -> Value {
	if positional.is_empty() {
		return Value::Null;
	}
	let named: Vec<(Option<String>, Value)> = positional
		.into_iter()
		.enumerate()
		.map(|(i, (explicit, value))| {
			let declared = if use_actual_param_name {
				method.param_names.get(i).cloned().flatten()
			} else {
				None
			};
			(explicit.or(declared), value)
		})
		.collect();
	if named.len() == 1 && named[0].0.is_none() {
		let (_, value) = named.into_iter().next().expect("single argument");
		return wrap_collection(value);
	}
	let mut object = ValueMap::new();
	for (i, (name, value)) in named.into_iter().enumerate() {
		let alias = format!("param{}", i + 1);
		if let Some(name) = name {
			object.insert(name, value.clone());
		} else {
			object.insert(format!("arg{i}"), value.clone());
		}
		object.entry(alias).or_insert(value);
	}
	Value::Object(object)
}

fn wrap_collection(value: Value) -> Value {
	match value {
		Value::Array(items) => {
			let mut object = ValueMap::new();
			let array = Value::Array(items);
			object.insert("collection".to_string(), array.clone());
			object.insert("list".to_string(), array.clone());
			object.insert("array".to_string(), array);
			Value::Object(object)
		}
		other => other,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn method(names: &[Option<&str>]) -> MethodDescriptor {
		MethodDescriptor::new("m", "ns.m")
			.param_names(names.iter().map(|n| n.map(String::from)).collect())
	}

	#[test]
	fn test_single_unnamed_scalar_passes_through() {
		let resolved =
			resolve_parameters(&method(&[None]), vec![(None, Value::Int(5))], true);
		assert_eq!(resolved, Value::Int(5));
	}

	#[test]
	fn test_single_array_wraps_as_collection() {
		let resolved = resolve_parameters(
			&method(&[None]),
			vec![(None, Value::from(vec![1i64, 2]))],
			true,
		);
		let object = resolved.as_object().unwrap();
		assert!(object.contains_key("collection"));
		assert!(object.contains_key("list"));
		assert!(object.contains_key("array"));
	}

	#[test]
	fn test_multiple_args_get_names_and_aliases() {
		let resolved = resolve_parameters(
			&method(&[Some("title"), Some("author")]),
			vec![(None, Value::from("a")), (None, Value::from("b"))],
			true,
		);
		let object = resolved.as_object().unwrap();
		assert_eq!(object.get("title"), Some(&Value::from("a")));
		assert_eq!(object.get("author"), Some(&Value::from("b")));
		assert_eq!(object.get("param1"), Some(&Value::from("a")));
		assert_eq!(object.get("param2"), Some(&Value::from("b")));
	}

	#[test]
	fn test_declared_names_ignored_without_use_actual() {
		let resolved = resolve_parameters(
			&method(&[Some("title"), Some("author")]),
			vec![(None, Value::from("a")), (None, Value::from("b"))],
			false,
		);
		let object = resolved.as_object().unwrap();
		assert!(object.get("title").is_none());
		assert_eq!(object.get("arg0"), Some(&Value::from("a")));
		assert_eq!(object.get("param1"), Some(&Value::from("a")));
	}

	#[test]
	fn test_explicit_name_wins_over_declared() {
		let resolved = resolve_parameters(
			&method(&[Some("declared")]),
			vec![(Some("explicit".to_string()), Value::Int(1))],
			true,
		);
		let object = resolved.as_object().unwrap();
		assert_eq!(object.get("explicit"), Some(&Value::Int(1)));
		assert!(object.get("declared").is_none());
	}

	#[test]
	fn test_single_named_argument_builds_a_map() {
		let resolved = resolve_parameters(
			&method(&[Some("id")]),
			vec![(None, Value::Int(9))],
			true,
		);
		let object = resolved.as_object().unwrap();
		assert_eq!(object.get("id"), Some(&Value::Int(9)));
		assert_eq!(object.get("param1"), Some(&Value::Int(9)));
	}
}
