//! Built-in type handlers for the standard scalar and temporal range.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use uuid::Uuid;

use crate::driver::{ResultSet, Statement};
use crate::meta::{TypeDescriptor, TypeKind};
use crate::types::{JdbcType, TypeError, TypeHandler};
use crate::value::Value;

macro_rules! simple_handler {
	($name:ident) => {
		#[derive(Debug, Default, Clone, Copy)]
		pub struct $name;
	};
}

simple_handler!(BooleanTypeHandler);
simple_handler!(IntegerTypeHandler);
simple_handler!(DoubleTypeHandler);
simple_handler!(StringTypeHandler);
simple_handler!(BytesTypeHandler);
simple_handler!(DateTypeHandler);
simple_handler!(TimeTypeHandler);
simple_handler!(DateTimeTypeHandler);
simple_handler!(UuidTypeHandler);
simple_handler!(ObjectTypeHandler);

impl BooleanTypeHandler {
	fn normalize(value: &Value) -> Result<Value, TypeError> {
		match value {
			Value::Null => Ok(Value::Null),
			Value::Bool(_) => Ok(value.clone()),
			Value::Int(i) => Ok(Value::Bool(*i != 0)),
			Value::String(s) if s.eq_ignore_ascii_case("true") || s == "1" => {
				Ok(Value::Bool(true))
			}
			Value::String(s) if s.eq_ignore_ascii_case("false") || s == "0" => {
				Ok(Value::Bool(false))
			}
			other => Err(TypeError::conversion("bool", other, "not a boolean column value")),
		}
	}
}

impl TypeHandler for BooleanTypeHandler {
	fn set_parameter(
		&self,
		stmt: &mut dyn Statement,
		index: usize,
		value: &Value,
		_jdbc_type: Option<JdbcType>,
	) -> Result<(), TypeError> {
		Ok(stmt.bind(index, Self::normalize(value)?)?)
	}

	fn get_result(&self, rs: &dyn ResultSet, column: usize) -> Result<Value, TypeError> {
		Self::normalize(&rs.get(column)?)
	}
}

impl IntegerTypeHandler {
	fn normalize(value: &Value) -> Result<Value, TypeError> {
		match value {
			Value::Null => Ok(Value::Null),
			Value::Int(_) => Ok(value.clone()),
			Value::Bool(b) => Ok(Value::Int(*b as i64)),
			Value::Double(d) if d.fract() == 0.0 => Ok(Value::Int(*d as i64)),
			Value::String(s) => s
				.trim()
				.parse::<i64>()
				.map(Value::Int)
				.map_err(|e| TypeError::conversion("int", value, e.to_string())),
			other => Err(TypeError::conversion("int", other, "not an integer column value")),
		}
	}
}

impl TypeHandler for IntegerTypeHandler {
	fn set_parameter(
		&self,
		stmt: &mut dyn Statement,
		index: usize,
		value: &Value,
		_jdbc_type: Option<JdbcType>,
	) -> Result<(), TypeError> {
		Ok(stmt.bind(index, Self::normalize(value)?)?)
	}

	fn get_result(&self, rs: &dyn ResultSet, column: usize) -> Result<Value, TypeError> {
		Self::normalize(&rs.get(column)?)
	}
}

impl DoubleTypeHandler {
	fn normalize(value: &Value) -> Result<Value, TypeError> {
		match value {
			Value::Null => Ok(Value::Null),
			Value::Double(_) => Ok(value.clone()),
			Value::Int(i) => Ok(Value::Double(*i as f64)),
			Value::String(s) => s
				.trim()
				.parse::<f64>()
				.map(Value::Double)
				.map_err(|e| TypeError::conversion("double", value, e.to_string())),
			other => Err(TypeError::conversion("double", other, "not a numeric column value")),
		}
	}
}

impl TypeHandler for DoubleTypeHandler {
	fn set_parameter(
		&self,
		stmt: &mut dyn Statement,
		index: usize,
		value: &Value,
		_jdbc_type: Option<JdbcType>,
	) -> Result<(), TypeError> {
		Ok(stmt.bind(index, Self::normalize(value)?)?)
	}

	fn get_result(&self, rs: &dyn ResultSet, column: usize) -> Result<Value, TypeError> {
		Self::normalize(&rs.get(column)?)
	}
}

impl TypeHandler for StringTypeHandler {
	fn set_parameter(
		&self,
		stmt: &mut dyn Statement,
		index: usize,
		value: &Value,
		_jdbc_type: Option<JdbcType>,
	) -> Result<(), TypeError> {
		let bound = match value {
			Value::String(_) => value.clone(),
			Value::Array(_) | Value::Object(_) | Value::Bytes(_) => {
				return Err(TypeError::conversion("string", value, "not a scalar"));
			}
			scalar => Value::String(scalar.to_string()),
		};
		Ok(stmt.bind(index, bound)?)
	}

	fn get_result(&self, rs: &dyn ResultSet, column: usize) -> Result<Value, TypeError> {
		match rs.get(column)? {
			Value::Null => Ok(Value::Null),
			Value::String(s) => Ok(Value::String(s)),
			scalar @ (Value::Bool(_)
			| Value::Int(_)
			| Value::Double(_)
			| Value::Date(_)
			| Value::Time(_)
			| Value::DateTime(_)
			| Value::Uuid(_)) => Ok(Value::String(scalar.to_string())),
			other => Err(TypeError::conversion("string", &other, "not a scalar column value")),
		}
	}
}

impl TypeHandler for BytesTypeHandler {
	fn set_parameter(
		&self,
		stmt: &mut dyn Statement,
		index: usize,
		value: &Value,
		_jdbc_type: Option<JdbcType>,
	) -> Result<(), TypeError> {
		match value {
			Value::Bytes(_) => Ok(stmt.bind(index, value.clone())?),
			Value::String(s) => Ok(stmt.bind(index, Value::Bytes(s.clone().into_bytes()))?),
			other => Err(TypeError::conversion("bytes", other, "not binary data")),
		}
	}

	fn get_result(&self, rs: &dyn ResultSet, column: usize) -> Result<Value, TypeError> {
		match rs.get(column)? {
			Value::Null => Ok(Value::Null),
			Value::Bytes(b) => Ok(Value::Bytes(b)),
			Value::String(s) => Ok(Value::Bytes(s.into_bytes())),
			other => Err(TypeError::conversion("bytes", &other, "not a binary column value")),
		}
	}
}

impl DateTypeHandler {
	fn normalize(value: &Value) -> Result<Value, TypeError> {
		match value {
			Value::Null => Ok(Value::Null),
			Value::Date(_) => Ok(value.clone()),
			Value::DateTime(dt) => Ok(Value::Date(dt.date())),
			Value::String(s) => s
				.parse::<NaiveDate>()
				.map(Value::Date)
				.map_err(|e| TypeError::conversion("date", value, e.to_string())),
			other => Err(TypeError::conversion("date", other, "not a date column value")),
		}
	}
}

impl TypeHandler for DateTypeHandler {
	fn set_parameter(
		&self,
		stmt: &mut dyn Statement,
		index: usize,
		value: &Value,
		_jdbc_type: Option<JdbcType>,
	) -> Result<(), TypeError> {
		Ok(stmt.bind(index, Self::normalize(value)?)?)
	}

	fn get_result(&self, rs: &dyn ResultSet, column: usize) -> Result<Value, TypeError> {
		Self::normalize(&rs.get(column)?)
	}
}

impl TimeTypeHandler {
	fn normalize(value: &Value) -> Result<Value, TypeError> {
		match value {
			Value::Null => Ok(Value::Null),
			Value::Time(_) => Ok(value.clone()),
			Value::DateTime(dt) => Ok(Value::Time(dt.time())),
			Value::String(s) => s
				.parse::<NaiveTime>()
				.map(Value::Time)
				.map_err(|e| TypeError::conversion("time", value, e.to_string())),
			other => Err(TypeError::conversion("time", other, "not a time column value")),
		}
	}
}

impl TypeHandler for TimeTypeHandler {
	fn set_parameter(
		&self,
		stmt: &mut dyn Statement,
		index: usize,
		value: &Value,
		_jdbc_type: Option<JdbcType>,
	) -> Result<(), TypeError> {
		Ok(stmt.bind(index, Self::normalize(value)?)?)
	}

	fn get_result(&self, rs: &dyn ResultSet, column: usize) -> Result<Value, TypeError> {
		Self::normalize(&rs.get(column)?)
	}
}

impl DateTimeTypeHandler {
	fn normalize(value: &Value) -> Result<Value, TypeError> {
		match value {
			Value::Null => Ok(Value::Null),
			Value::DateTime(_) => Ok(value.clone()),
			Value::Date(d) => Ok(Value::DateTime(d.and_hms_opt(0, 0, 0).unwrap_or_default())),
			Value::String(s) => parse_datetime(s)
				.map(Value::DateTime)
				.ok_or_else(|| TypeError::conversion("datetime", value, "unrecognized format")),
			other => Err(TypeError::conversion("datetime", other, "not a timestamp column value")),
		}
	}
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
	s.parse::<NaiveDateTime>()
		.ok()
		.or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok())
		.or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok())
}

impl TypeHandler for DateTimeTypeHandler {
	fn set_parameter(
		&self,
		stmt: &mut dyn Statement,
		index: usize,
		value: &Value,
		_jdbc_type: Option<JdbcType>,
	) -> Result<(), TypeError> {
		Ok(stmt.bind(index, Self::normalize(value)?)?)
	}

	fn get_result(&self, rs: &dyn ResultSet, column: usize) -> Result<Value, TypeError> {
		Self::normalize(&rs.get(column)?)
	}
}

impl UuidTypeHandler {
	fn normalize(value: &Value) -> Result<Value, TypeError> {
		match value {
			Value::Null => Ok(Value::Null),
			Value::Uuid(_) => Ok(value.clone()),
			Value::String(s) => Uuid::parse_str(s)
				.map(Value::Uuid)
				.map_err(|e| TypeError::conversion("uuid", value, e.to_string())),
			other => Err(TypeError::conversion("uuid", other, "not a uuid column value")),
		}
	}
}

impl TypeHandler for UuidTypeHandler {
	fn set_parameter(
		&self,
		stmt: &mut dyn Statement,
		index: usize,
		value: &Value,
		_jdbc_type: Option<JdbcType>,
	) -> Result<(), TypeError> {
		Ok(stmt.bind(index, Self::normalize(value)?)?)
	}

	fn get_result(&self, rs: &dyn ResultSet, column: usize) -> Result<Value, TypeError> {
		Self::normalize(&rs.get(column)?)
	}
}

/// Passes values through untouched, for `object`/`map`/json columns.
impl TypeHandler for ObjectTypeHandler {
	fn set_parameter(
		&self,
		stmt: &mut dyn Statement,
		index: usize,
		value: &Value,
		_jdbc_type: Option<JdbcType>,
	) -> Result<(), TypeError> {
		Ok(stmt.bind(index, value.clone())?)
	}

	fn get_result(&self, rs: &dyn ResultSet, column: usize) -> Result<Value, TypeError> {
		Ok(rs.get(column)?)
	}
}

/// Converts enum columns by variant name.
#[derive(Debug, Clone)]
pub struct EnumTypeHandler {
	descriptor: Arc<TypeDescriptor>,
}

impl EnumTypeHandler {
	pub fn new(descriptor: Arc<TypeDescriptor>) -> Self {
		debug_assert_eq!(descriptor.kind, TypeKind::Enum);
		Self { descriptor }
	}

	fn variant(&self, name: &str, value: &Value) -> Result<Value, TypeError> {
		self.descriptor
			.variants
			.iter()
			.find(|v| v.as_str() == name)
			.map(|v| Value::String(v.clone()))
			.ok_or_else(|| {
				TypeError::conversion(
					"enum",
					value,
					format!("'{name}' is not a variant of {}", self.descriptor.name),
				)
			})
	}
}

impl TypeHandler for EnumTypeHandler {
	fn set_parameter(
		&self,
		stmt: &mut dyn Statement,
		index: usize,
		value: &Value,
		_jdbc_type: Option<JdbcType>,
	) -> Result<(), TypeError> {
		match value {
			Value::String(s) => Ok(stmt.bind(index, self.variant(s, value)?)?),
			other => Err(TypeError::conversion("enum", other, "expected variant name")),
		}
	}

	fn get_result(&self, rs: &dyn ResultSet, column: usize) -> Result<Value, TypeError> {
		match rs.get(column)? {
			Value::Null => Ok(Value::Null),
			Value::String(s) => self.variant(&s, &Value::String(s.clone())),
			other => Err(TypeError::conversion("enum", &other, "expected variant name column")),
		}
	}
}

/// Converts enum columns by declaration-order ordinal.
#[derive(Debug, Clone)]
pub struct EnumOrdinalTypeHandler {
	descriptor: Arc<TypeDescriptor>,
}

impl EnumOrdinalTypeHandler {
	pub fn new(descriptor: Arc<TypeDescriptor>) -> Self {
		debug_assert_eq!(descriptor.kind, TypeKind::Enum);
		Self { descriptor }
	}
}

impl TypeHandler for EnumOrdinalTypeHandler {
	fn set_parameter(
		&self,
		stmt: &mut dyn Statement,
		index: usize,
		value: &Value,
		_jdbc_type: Option<JdbcType>,
	) -> Result<(), TypeError> {
		match value {
			Value::String(s) => {
				let ordinal = self
					.descriptor
					.variants
					.iter()
					.position(|v| v == s)
					.ok_or_else(|| {
						TypeError::conversion(
							"enum",
							value,
							format!("'{s}' is not a variant of {}", self.descriptor.name),
						)
					})?;
				Ok(stmt.bind(index, Value::Int(ordinal as i64))?)
			}
			other => Err(TypeError::conversion("enum", other, "expected variant name")),
		}
	}

	fn get_result(&self, rs: &dyn ResultSet, column: usize) -> Result<Value, TypeError> {
		match rs.get(column)? {
			Value::Null => Ok(Value::Null),
			ref v @ Value::Int(i) => self
				.descriptor
				.variants
				.get(i as usize)
				.map(|name| Value::String(name.clone()))
				.ok_or_else(|| {
					TypeError::conversion(
						"enum",
						v,
						format!("ordinal {i} out of range for {}", self.descriptor.name),
					)
				}),
			other => Err(TypeError::conversion("enum", &other, "expected ordinal column")),
		}
	}
}

static BOOLEAN: Lazy<Arc<dyn TypeHandler>> = Lazy::new(|| Arc::new(BooleanTypeHandler));
static INTEGER: Lazy<Arc<dyn TypeHandler>> = Lazy::new(|| Arc::new(IntegerTypeHandler));
static DOUBLE: Lazy<Arc<dyn TypeHandler>> = Lazy::new(|| Arc::new(DoubleTypeHandler));
static STRING: Lazy<Arc<dyn TypeHandler>> = Lazy::new(|| Arc::new(StringTypeHandler));
static BYTES: Lazy<Arc<dyn TypeHandler>> = Lazy::new(|| Arc::new(BytesTypeHandler));
static DATE: Lazy<Arc<dyn TypeHandler>> = Lazy::new(|| Arc::new(DateTypeHandler));
static TIME: Lazy<Arc<dyn TypeHandler>> = Lazy::new(|| Arc::new(TimeTypeHandler));
static DATETIME: Lazy<Arc<dyn TypeHandler>> = Lazy::new(|| Arc::new(DateTimeTypeHandler));
static UUID: Lazy<Arc<dyn TypeHandler>> = Lazy::new(|| Arc::new(UuidTypeHandler));
static OBJECT: Lazy<Arc<dyn TypeHandler>> = Lazy::new(|| Arc::new(ObjectTypeHandler));

/// Handler implied by the runtime type of an actual value.
pub fn handler_for_value(value: &Value) -> Arc<dyn TypeHandler> {
	let handler = match value {
		Value::Bool(_) => &BOOLEAN,
		Value::Int(_) => &INTEGER,
		Value::Double(_) => &DOUBLE,
		Value::String(_) => &STRING,
		Value::Bytes(_) => &BYTES,
		Value::Date(_) => &DATE,
		Value::Time(_) => &TIME,
		Value::DateTime(_) => &DATETIME,
		Value::Uuid(_) => &UUID,
		_ => &OBJECT,
	};
	Arc::clone(handler)
}

/// Handler implied by a column's jdbc type.
pub fn handler_for_jdbc(jdbc: JdbcType) -> Arc<dyn TypeHandler> {
	let handler = match jdbc {
		JdbcType::Bit | JdbcType::Boolean => &BOOLEAN,
		JdbcType::TinyInt | JdbcType::SmallInt | JdbcType::Integer | JdbcType::BigInt => &INTEGER,
		JdbcType::Float
		| JdbcType::Real
		| JdbcType::Double
		| JdbcType::Numeric
		| JdbcType::Decimal => &DOUBLE,
		JdbcType::Char
		| JdbcType::Varchar
		| JdbcType::LongVarchar
		| JdbcType::NChar
		| JdbcType::NVarchar
		| JdbcType::Clob
		| JdbcType::NClob => &STRING,
		JdbcType::Date => &DATE,
		JdbcType::Time => &TIME,
		JdbcType::Timestamp => &DATETIME,
		JdbcType::Binary | JdbcType::VarBinary | JdbcType::LongVarBinary | JdbcType::Blob => {
			&BYTES
		}
		_ => &OBJECT,
	};
	Arc::clone(handler)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_integer_normalization() {
		assert_eq!(IntegerTypeHandler::normalize(&Value::from("42")).unwrap(), Value::Int(42));
		assert_eq!(IntegerTypeHandler::normalize(&Value::Double(3.0)).unwrap(), Value::Int(3));
		assert!(IntegerTypeHandler::normalize(&Value::Double(3.5)).is_err());
		assert!(IntegerTypeHandler::normalize(&Value::from("abc")).is_err());
	}

	#[test]
	fn test_datetime_accepts_common_formats() {
		assert!(DateTimeTypeHandler::normalize(&Value::from("2024-01-02 10:30:00")).is_ok());
		assert!(DateTimeTypeHandler::normalize(&Value::from("2024-01-02T10:30:00.250")).is_ok());
		assert!(DateTimeTypeHandler::normalize(&Value::from("not a date")).is_err());
	}

	#[test]
	fn test_enum_by_name_and_ordinal() {
		let descriptor = Arc::new(TypeDescriptor::enumeration(
			"vehicleKind",
			vec!["CAR".into(), "TRUCK".into()],
		));
		let by_name = EnumTypeHandler::new(Arc::clone(&descriptor));
		assert_eq!(by_name.variant("TRUCK", &Value::Null).unwrap(), Value::from("TRUCK"));
		assert!(by_name.variant("BOAT", &Value::Null).is_err());

		let _by_ordinal = EnumOrdinalTypeHandler::new(descriptor);
	}

	#[test]
	fn test_value_implied_handlers() {
		let h = handler_for_value(&Value::Int(1));
		// handler existence is the contract; conversion is covered above
		let _ = h;
	}
}
