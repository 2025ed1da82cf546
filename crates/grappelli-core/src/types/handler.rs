//! The type-handler seam.

use crate::driver::{DriverError, ResultSet, Statement};
use crate::types::{JavaType, JdbcType};
use crate::value::{Value, ValueError};

#[derive(Debug, thiserror::Error)]
pub enum TypeError {
	#[error("no type handler for java type {java:?} / jdbc type {jdbc:?}")]
	NoHandler { java: Option<JavaType>, jdbc: Option<JdbcType> },
	#[error("cannot convert {actual} value to {expected}: {detail}")]
	Conversion { expected: &'static str, actual: &'static str, detail: String },
	#[error("null parameter at index {index} has no jdbc type; set one on the mapping or via jdbcTypeForNull")]
	UntypedNull { index: usize },
	#[error(transparent)]
	Driver(#[from] DriverError),
	#[error(transparent)]
	Value(#[from] ValueError),
}

impl TypeError {
	pub fn conversion(expected: &'static str, value: &Value, detail: impl Into<String>) -> Self {
		TypeError::Conversion {
			expected,
			actual: value.type_name(),
			detail: detail.into(),
		}
	}
}

/// Converts between runtime values and column values, both directions.
///
/// `set_parameter` receives a non-null value (the parameter handler routes
/// nulls to `bind_null` with the effective jdbc type); `get_result` returns
/// the value normalized to the handler's java type, `Null` for SQL null.
pub trait TypeHandler: Send + Sync {
	fn set_parameter(
		&self,
		stmt: &mut dyn Statement,
		index: usize,
		value: &Value,
		jdbc_type: Option<JdbcType>,
	) -> Result<(), TypeError>;

	fn get_result(&self, rs: &dyn ResultSet, column: usize) -> Result<Value, TypeError>;
}
