//! The bidirectional type system: declared Java-side types, column-side
//! JDBC types, and the handlers converting between them.

mod alias;
mod handler;
mod handlers;
mod jdbc;
mod registry;

pub use alias::TypeAliasRegistry;
pub use handler::{TypeError, TypeHandler};
pub use handlers::{
	BooleanTypeHandler, BytesTypeHandler, DateTimeTypeHandler, DateTypeHandler,
	DoubleTypeHandler, EnumOrdinalTypeHandler, EnumTypeHandler, IntegerTypeHandler,
	ObjectTypeHandler, StringTypeHandler, TimeTypeHandler, UuidTypeHandler,
	handler_for_jdbc, handler_for_value,
};
pub use jdbc::JdbcType;
pub use registry::{TypeHandlerRegistry, UnknownTypeHandler};

/// Declared type of a property, parameter, or result target. `Named` covers
/// user-registered descriptors (including enums).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JavaType {
	Bool,
	Int,
	Long,
	Float,
	Double,
	String,
	Bytes,
	Date,
	Time,
	DateTime,
	Uuid,
	Map,
	List,
	Object,
	Named(String),
}

impl JavaType {
	pub fn named(name: impl Into<String>) -> Self {
		JavaType::Named(name.into())
	}

	pub fn name(&self) -> std::borrow::Cow<'_, str> {
		match self {
			JavaType::Bool => "boolean".into(),
			JavaType::Int => "int".into(),
			JavaType::Long => "long".into(),
			JavaType::Float => "float".into(),
			JavaType::Double => "double".into(),
			JavaType::String => "string".into(),
			JavaType::Bytes => "bytes".into(),
			JavaType::Date => "date".into(),
			JavaType::Time => "time".into(),
			JavaType::DateTime => "datetime".into(),
			JavaType::Uuid => "uuid".into(),
			JavaType::Map => "map".into(),
			JavaType::List => "list".into(),
			JavaType::Object => "object".into(),
			JavaType::Named(n) => n.as_str().into(),
		}
	}
}

impl std::fmt::Display for JavaType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.name())
	}
}
