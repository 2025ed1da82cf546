//! Immutable mapped statements and their enumerations.

use std::sync::Arc;
use std::time::Duration;

use grappelli_cache::Cache;
use grappelli_core::types::JavaType;
use grappelli_core::value::Value;

use crate::bound::BoundSql;
use crate::config::Configuration;
use crate::error::BuildError;
use crate::source::SqlSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlCommandType {
	Select,
	Insert,
	Update,
	Delete,
	Flush,
}

impl SqlCommandType {
	pub fn is_write(&self) -> bool {
		matches!(self, SqlCommandType::Insert | SqlCommandType::Update | SqlCommandType::Delete)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatementType {
	/// Inline substitution, no driver-side parameters.
	Simple,
	#[default]
	Prepared,
	Callable,
}

impl StatementType {
	pub fn parse(name: &str) -> Option<StatementType> {
		Some(match name.to_ascii_uppercase().as_str() {
			"STATEMENT" | "SIMPLE" => StatementType::Simple,
			"PREPARED" => StatementType::Prepared,
			"CALLABLE" => StatementType::Callable,
			_ => return None,
		})
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSetType {
	ForwardOnly,
	ScrollInsensitive,
	ScrollSensitive,
}

impl ResultSetType {
	pub fn parse(name: &str) -> Option<ResultSetType> {
		Some(match name.to_ascii_uppercase().as_str() {
			"FORWARD_ONLY" => ResultSetType::ForwardOnly,
			"SCROLL_INSENSITIVE" => ResultSetType::ScrollInsensitive,
			"SCROLL_SENSITIVE" => ResultSetType::ScrollSensitive,
			_ => return None,
		})
	}
}

/// How generated keys are produced for an insert, fixed at build time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KeyGeneratorKind {
	#[default]
	None,
	/// Driver-returned generated keys read after the insert.
	Driver,
	/// An explicit select-key statement run before or after the insert.
	SelectKey { statement_id: String, execute_before: bool },
}

/// The compiled, immutable definition of one SQL operation.
pub struct MappedStatement {
	pub id: String,
	pub sql_command_type: SqlCommandType,
	pub statement_type: StatementType,
	pub sql_source: Arc<dyn SqlSource>,
	pub parameter_type: Option<JavaType>,
	pub result_type: Option<JavaType>,
	pub result_map_ids: Vec<String>,
	pub fetch_size: Option<u32>,
	pub timeout: Option<Duration>,
	pub flush_cache: bool,
	pub use_cache: bool,
	pub result_ordered: bool,
	pub key_generator: KeyGeneratorKind,
	pub key_properties: Vec<String>,
	pub key_columns: Vec<String>,
	pub database_id: Option<String>,
	/// Names for extra result sets, matched positionally after the first.
	pub result_sets: Vec<String>,
	pub result_set_type: Option<ResultSetType>,
	pub cache: Option<Arc<dyn Cache>>,
}

impl MappedStatement {
	pub fn builder(
		id: impl Into<String>,
		sql_command_type: SqlCommandType,
		sql_source: Arc<dyn SqlSource>,
	) -> MappedStatementBuilder {
		MappedStatementBuilder {
			statement: MappedStatement {
				id: id.into(),
				sql_command_type,
				statement_type: StatementType::Prepared,
				sql_source,
				parameter_type: None,
				result_type: None,
				result_map_ids: Vec::new(),
				fetch_size: None,
				timeout: None,
				flush_cache: !matches!(sql_command_type, SqlCommandType::Select),
				use_cache: matches!(sql_command_type, SqlCommandType::Select),
				result_ordered: false,
				key_generator: KeyGeneratorKind::None,
				key_properties: Vec::new(),
				key_columns: Vec::new(),
				database_id: None,
				result_sets: Vec::new(),
				result_set_type: None,
				cache: None,
			},
		}
	}

	pub fn namespace(&self) -> &str {
		self.id.rsplit_once('.').map(|(ns, _)| ns).unwrap_or("")
	}

	pub fn bound_sql(
		&self,
		configuration: &Configuration,
		parameter: &Value,
	) -> Result<BoundSql, BuildError> {
		self.sql_source
			.bound_sql(configuration, parameter)
			.map_err(|e| match e {
				already @ BuildError::Script { .. } => already,
				other => BuildError::script(&self.id, other.to_string()),
			})
	}
}

impl std::fmt::Debug for MappedStatement {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MappedStatement")
			.field("id", &self.id)
			.field("sql_command_type", &self.sql_command_type)
			.field("statement_type", &self.statement_type)
			.field("result_map_ids", &self.result_map_ids)
			.field("use_cache", &self.use_cache)
			.field("flush_cache", &self.flush_cache)
			.field("database_id", &self.database_id)
			.finish()
	}
}

pub struct MappedStatementBuilder {
	statement: MappedStatement,
}

impl MappedStatementBuilder {
	pub fn statement_type(mut self, value: StatementType) -> Self {
		self.statement.statement_type = value;
		self
	}

	pub fn parameter_type(mut self, value: Option<JavaType>) -> Self {
		self.statement.parameter_type = value;
		self
	}

	pub fn result_type(mut self, value: Option<JavaType>) -> Self {
		self.statement.result_type = value;
		self
	}

	pub fn result_map_ids(mut self, value: Vec<String>) -> Self {
		self.statement.result_map_ids = value;
		self
	}

	pub fn fetch_size(mut self, value: Option<u32>) -> Self {
		self.statement.fetch_size = value;
		self
	}

	pub fn timeout(mut self, value: Option<Duration>) -> Self {
		self.statement.timeout = value;
		self
	}

	pub fn flush_cache(mut self, value: bool) -> Self {
		self.statement.flush_cache = value;
		self
	}

	pub fn use_cache(mut self, value: bool) -> Self {
		self.statement.use_cache = value;
		self
	}

	pub fn result_ordered(mut self, value: bool) -> Self {
		self.statement.result_ordered = value;
		self
	}

	pub fn key_generator(mut self, value: KeyGeneratorKind) -> Self {
		self.statement.key_generator = value;
		self
	}

	pub fn key_properties(mut self, value: Vec<String>) -> Self {
		self.statement.key_properties = value;
		self
	}

	pub fn key_columns(mut self, value: Vec<String>) -> Self {
		self.statement.key_columns = value;
		self
	}

	pub fn database_id(mut self, value: Option<String>) -> Self {
		self.statement.database_id = value;
		self
	}

	pub fn result_sets(mut self, value: Vec<String>) -> Self {
		self.statement.result_sets = value;
		self
	}

	pub fn result_set_type(mut self, value: Option<ResultSetType>) -> Self {
		self.statement.result_set_type = value;
		self
	}

	pub fn cache(mut self, value: Option<Arc<dyn Cache>>) -> Self {
		self.statement.cache = value;
		self
	}

	pub fn build(self) -> MappedStatement {
		self.statement
	}
}
