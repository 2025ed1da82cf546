//! The runtime value tree.
//!
//! Parameter objects and projected rows travel through the runtime as
//! [`Value`] trees. User domain types enter via [`Value::encode`] and leave
//! via [`Value::decode`], bridging through `serde_json`; temporal and UUID
//! values bridge as their canonical string forms.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use uuid::Uuid;

/// Ordered property map used by [`Value::Object`].
pub type ValueMap = IndexMap<String, Value>;

/// A dynamically typed runtime value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
	#[default]
	Null,
	Bool(bool),
	Int(i64),
	Double(f64),
	String(String),
	Bytes(Vec<u8>),
	Date(NaiveDate),
	Time(NaiveTime),
	DateTime(NaiveDateTime),
	Uuid(Uuid),
	Array(Vec<Value>),
	Object(ValueMap),
}

#[derive(Debug, thiserror::Error)]
pub enum ValueError {
	/// Serde bridge failure while encoding or decoding a domain type.
	#[error("value conversion failed: {0}")]
	Conversion(#[from] serde_json::Error),
}

impl Value {
	/// Encodes any serializable domain object into a value tree.
	pub fn encode<T: serde::Serialize>(object: &T) -> Result<Value, ValueError> {
		Ok(Value::from_json(serde_json::to_value(object)?))
	}

	/// Decodes the value tree into a concrete domain type.
	pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, ValueError> {
		Ok(serde_json::from_value(self.to_json())?)
	}

	pub fn from_json(json: serde_json::Value) -> Value {
		match json {
			serde_json::Value::Null => Value::Null,
			serde_json::Value::Bool(b) => Value::Bool(b),
			serde_json::Value::Number(n) => {
				if let Some(i) = n.as_i64() {
					Value::Int(i)
				} else {
					Value::Double(n.as_f64().unwrap_or(f64::NAN))
				}
			}
			serde_json::Value::String(s) => Value::String(s),
			serde_json::Value::Array(items) => {
				Value::Array(items.into_iter().map(Value::from_json).collect())
			}
			serde_json::Value::Object(map) => Value::Object(
				map.into_iter().map(|(k, v)| (k, Value::from_json(v))).collect(),
			),
		}
	}

	pub fn to_json(&self) -> serde_json::Value {
		match self {
			Value::Null => serde_json::Value::Null,
			Value::Bool(b) => serde_json::Value::Bool(*b),
			Value::Int(i) => serde_json::Value::from(*i),
			Value::Double(d) => serde_json::Value::from(*d),
			Value::String(s) => serde_json::Value::String(s.clone()),
			Value::Bytes(b) => serde_json::Value::Array(
				b.iter().map(|byte| serde_json::Value::from(*byte)).collect(),
			),
			Value::Date(d) => serde_json::Value::String(d.to_string()),
			Value::Time(t) => serde_json::Value::String(t.to_string()),
			Value::DateTime(dt) => serde_json::Value::String(format!("{}", dt.format("%Y-%m-%dT%H:%M:%S%.f"))),
			Value::Uuid(u) => serde_json::Value::String(u.to_string()),
			Value::Array(items) => {
				serde_json::Value::Array(items.iter().map(Value::to_json).collect())
			}
			Value::Object(map) => serde_json::Value::Object(
				map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
			),
		}
	}

	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	/// Truthiness used by dynamic `test` expressions: null is false, numbers
	/// are true when nonzero, strings when nonempty with `"0"` and `"false"`
	/// coercing to false, containers when nonempty.
	pub fn is_truthy(&self) -> bool {
		match self {
			Value::Null => false,
			Value::Bool(b) => *b,
			Value::Int(i) => *i != 0,
			Value::Double(d) => *d != 0.0,
			Value::String(s) => !s.is_empty() && s != "0" && !s.eq_ignore_ascii_case("false"),
			Value::Array(items) => !items.is_empty(),
			Value::Object(map) => !map.is_empty(),
			_ => true,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(b) => Some(*b),
			_ => None,
		}
	}

	pub fn as_i64(&self) -> Option<i64> {
		match self {
			Value::Int(i) => Some(*i),
			Value::Double(d) if d.fract() == 0.0 => Some(*d as i64),
			_ => None,
		}
	}

	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Value::Int(i) => Some(*i as f64),
			Value::Double(d) => Some(*d),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::String(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_array(&self) -> Option<&[Value]> {
		match self {
			Value::Array(items) => Some(items),
			_ => None,
		}
	}

	pub fn as_object(&self) -> Option<&ValueMap> {
		match self {
			Value::Object(map) => Some(map),
			_ => None,
		}
	}

	pub fn as_object_mut(&mut self) -> Option<&mut ValueMap> {
		match self {
			Value::Object(map) => Some(map),
			_ => None,
		}
	}

	/// Number of elements when the value is a collection, map, or string.
	pub fn len(&self) -> Option<usize> {
		match self {
			Value::Array(items) => Some(items.len()),
			Value::Object(map) => Some(map.len()),
			Value::String(s) => Some(s.chars().count()),
			_ => None,
		}
	}

	pub fn type_name(&self) -> &'static str {
		match self {
			Value::Null => "null",
			Value::Bool(_) => "bool",
			Value::Int(_) => "int",
			Value::Double(_) => "double",
			Value::String(_) => "string",
			Value::Bytes(_) => "bytes",
			Value::Date(_) => "date",
			Value::Time(_) => "time",
			Value::DateTime(_) => "datetime",
			Value::Uuid(_) => "uuid",
			Value::Array(_) => "array",
			Value::Object(_) => "object",
		}
	}

	/// Stable canonical form used for cache-key parts. Equal values (after
	/// handler normalization) must produce equal strings.
	pub fn canonical(&self) -> String {
		match self {
			Value::Null => "null".to_string(),
			Value::Bool(b) => format!("b:{b}"),
			Value::Int(i) => format!("i:{i}"),
			Value::Double(d) => format!("d:{}", d.to_bits()),
			Value::String(s) => format!("s:{s}"),
			Value::Bytes(b) => {
				let mut out = String::with_capacity(2 + b.len() * 2);
				out.push_str("x:");
				for byte in b {
					out.push_str(&format!("{byte:02x}"));
				}
				out
			}
			Value::Date(d) => format!("D:{d}"),
			Value::Time(t) => format!("T:{t}"),
			Value::DateTime(dt) => format!("dt:{dt}"),
			Value::Uuid(u) => format!("u:{u}"),
			Value::Array(items) => {
				let parts: Vec<String> = items.iter().map(Value::canonical).collect();
				format!("a:[{}]", parts.join(","))
			}
			Value::Object(map) => {
				let parts: Vec<String> =
					map.iter().map(|(k, v)| format!("{k}={}", v.canonical())).collect();
				format!("o:{{{}}}", parts.join(","))
			}
		}
	}
}

impl std::fmt::Display for Value {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Value::Null => write!(f, "null"),
			Value::Bool(b) => write!(f, "{b}"),
			Value::Int(i) => write!(f, "{i}"),
			Value::Double(d) => write!(f, "{d}"),
			Value::String(s) => write!(f, "{s}"),
			Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
			Value::Date(d) => write!(f, "{d}"),
			Value::Time(t) => write!(f, "{t}"),
			Value::DateTime(dt) => write!(f, "{dt}"),
			Value::Uuid(u) => write!(f, "{u}"),
			Value::Array(items) => {
				let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
				write!(f, "[{}]", parts.join(", "))
			}
			Value::Object(_) => write!(f, "{}", self.to_json()),
		}
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Value::Bool(v)
	}
}

impl From<i32> for Value {
	fn from(v: i32) -> Self {
		Value::Int(v as i64)
	}
}

impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Value::Int(v)
	}
}

impl From<f64> for Value {
	fn from(v: f64) -> Self {
		Value::Double(v)
	}
}

impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Value::String(v.to_string())
	}
}

impl From<String> for Value {
	fn from(v: String) -> Self {
		Value::String(v)
	}
}

impl From<Uuid> for Value {
	fn from(v: Uuid) -> Self {
		Value::Uuid(v)
	}
}

impl From<NaiveDate> for Value {
	fn from(v: NaiveDate) -> Self {
		Value::Date(v)
	}
}

impl From<NaiveDateTime> for Value {
	fn from(v: NaiveDateTime) -> Self {
		Value::DateTime(v)
	}
}

impl<T: Into<Value>> From<Vec<T>> for Value {
	fn from(items: Vec<T>) -> Self {
		Value::Array(items.into_iter().map(Into::into).collect())
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(v: Option<T>) -> Self {
		v.map(Into::into).unwrap_or(Value::Null)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_truthiness_table() {
		assert!(!Value::Null.is_truthy());
		assert!(!Value::Bool(false).is_truthy());
		assert!(Value::Bool(true).is_truthy());
		assert!(!Value::Int(0).is_truthy());
		assert!(Value::Int(7).is_truthy());
		assert!(!Value::String(String::new()).is_truthy());
		assert!(!Value::from("0").is_truthy());
		assert!(!Value::from("false").is_truthy());
		assert!(Value::from("yes").is_truthy());
		assert!(!Value::Array(vec![]).is_truthy());
		assert!(Value::from(vec![1i64]).is_truthy());
	}

	#[test]
	fn test_encode_decode_round_trip() {
		#[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
		struct Blog {
			id: i64,
			title: String,
			draft: bool,
		}
		let blog = Blog { id: 3, title: "jazz".into(), draft: false };
		let value = Value::encode(&blog).unwrap();
		assert_eq!(value.as_object().unwrap().get("title"), Some(&Value::from("jazz")));
		let back: Blog = value.decode().unwrap();
		assert_eq!(back, blog);
	}

	#[test]
	fn test_canonical_distinguishes_types() {
		assert_ne!(Value::Int(1).canonical(), Value::from("1").canonical());
		assert_ne!(Value::Null.canonical(), Value::from("null").canonical());
		assert_eq!(Value::Int(5).canonical(), Value::Int(5).canonical());
	}

	#[test]
	fn test_temporal_json_bridge() {
		let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
		assert_eq!(Value::Date(date).to_json(), serde_json::Value::String("2024-03-09".into()));
	}
}
