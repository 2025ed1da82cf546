//! Column-side type tags, mirroring the standard JDBC set.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JdbcType {
	Bit,
	TinyInt,
	SmallInt,
	Integer,
	BigInt,
	Float,
	Real,
	Double,
	Numeric,
	Decimal,
	Char,
	Varchar,
	LongVarchar,
	NChar,
	NVarchar,
	Date,
	Time,
	Timestamp,
	Binary,
	VarBinary,
	LongVarBinary,
	Blob,
	Clob,
	NClob,
	Boolean,
	Array,
	Cursor,
	Other,
	Null,
	Undefined,
}

impl JdbcType {
	/// Parses the document/descriptor spelling, case-insensitively.
	pub fn parse(name: &str) -> Option<JdbcType> {
		Some(match name.to_ascii_uppercase().as_str() {
			"BIT" => JdbcType::Bit,
			"TINYINT" => JdbcType::TinyInt,
			"SMALLINT" => JdbcType::SmallInt,
			"INTEGER" | "INT" => JdbcType::Integer,
			"BIGINT" => JdbcType::BigInt,
			"FLOAT" => JdbcType::Float,
			"REAL" => JdbcType::Real,
			"DOUBLE" => JdbcType::Double,
			"NUMERIC" => JdbcType::Numeric,
			"DECIMAL" => JdbcType::Decimal,
			"CHAR" => JdbcType::Char,
			"VARCHAR" => JdbcType::Varchar,
			"LONGVARCHAR" => JdbcType::LongVarchar,
			"NCHAR" => JdbcType::NChar,
			"NVARCHAR" => JdbcType::NVarchar,
			"DATE" => JdbcType::Date,
			"TIME" => JdbcType::Time,
			"TIMESTAMP" => JdbcType::Timestamp,
			"BINARY" => JdbcType::Binary,
			"VARBINARY" => JdbcType::VarBinary,
			"LONGVARBINARY" => JdbcType::LongVarBinary,
			"BLOB" => JdbcType::Blob,
			"CLOB" => JdbcType::Clob,
			"NCLOB" => JdbcType::NClob,
			"BOOLEAN" => JdbcType::Boolean,
			"ARRAY" => JdbcType::Array,
			"CURSOR" => JdbcType::Cursor,
			"OTHER" => JdbcType::Other,
			"NULL" => JdbcType::Null,
			"UNDEFINED" => JdbcType::Undefined,
			_ => return None,
		})
	}
}

impl std::fmt::Display for JdbcType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{self:?}")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_is_case_insensitive() {
		assert_eq!(JdbcType::parse("varchar"), Some(JdbcType::Varchar));
		assert_eq!(JdbcType::parse("TIMESTAMP"), Some(JdbcType::Timestamp));
		assert_eq!(JdbcType::parse("nope"), None);
	}
}
