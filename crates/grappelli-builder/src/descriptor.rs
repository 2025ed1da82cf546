//! Mapper modules: the code-declared registration path.
//!
//! Where documents are not wanted, a mapper declares its statements as a
//! [`MapperModule`] — one spec per method, carrying the SQL, options, and
//! result disposition. Registration builds the same immutable mapped
//! statements the document path produces, plus the descriptor table the
//! session facade dispatches through. A companion document with the same
//! namespace loads first when present; conflicting definitions are
//! rejected.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use grappelli_core::xml::{self, XmlElement, XmlNode};
use grappelli_mapping::{
	BuildError, Configuration, KeyGeneratorKind, MappedStatement, MapperDescriptor,
	MethodDescriptor, ResultDisposition, ResultMap, SqlCommandType, StatementType,
};

use crate::mapper::XmlMapperBuilder;
use crate::script;

/// One mapper method's statement definition.
pub struct StatementSpec {
	name: String,
	command: SqlCommandType,
	sql: String,
	database_id: Option<String>,
	statement_type: StatementType,
	parameter_names: Vec<Option<String>>,
	result_type: Option<String>,
	result_map: Option<String>,
	disposition: ResultDisposition,
	timeout: Option<Duration>,
	fetch_size: Option<u32>,
	flush_cache: Option<bool>,
	use_cache: Option<bool>,
	use_generated_keys: bool,
	key_property: Option<String>,
	key_column: Option<String>,
	select_key: Option<SelectKeySpec>,
	result_sets: Vec<String>,
}

struct SelectKeySpec {
	sql: String,
	key_property: String,
	result_type: Option<String>,
	before: bool,
}

impl StatementSpec {
	fn new(name: &str, command: SqlCommandType, sql: &str) -> Self {
		Self {
			name: name.to_string(),
			command,
			sql: sql.to_string(),
			database_id: None,
			statement_type: StatementType::Prepared,
			parameter_names: Vec::new(),
			result_type: None,
			result_map: None,
			disposition: match command {
				SqlCommandType::Select => ResultDisposition::Many,
				_ => ResultDisposition::Affected,
			},
			timeout: None,
			fetch_size: None,
			flush_cache: None,
			use_cache: None,
			use_generated_keys: false,
			key_property: None,
			key_column: None,
			select_key: None,
			result_sets: Vec::new(),
		}
	}

	pub fn select(name: &str, sql: &str) -> Self {
		Self::new(name, SqlCommandType::Select, sql)
	}

	pub fn insert(name: &str, sql: &str) -> Self {
		Self::new(name, SqlCommandType::Insert, sql)
	}

	pub fn update(name: &str, sql: &str) -> Self {
		Self::new(name, SqlCommandType::Update, sql)
	}

	pub fn delete(name: &str, sql: &str) -> Self {
		Self::new(name, SqlCommandType::Delete, sql)
	}

	pub fn database_id(mut self, id: &str) -> Self {
		self.database_id = Some(id.to_string());
		self
	}

	pub fn statement_type(mut self, statement_type: StatementType) -> Self {
		self.statement_type = statement_type;
		self
	}

	/// Declared parameter names, positionally; unnamed positions fall back
	/// to `param1…` aliases.
	pub fn params(mut self, names: &[&str]) -> Self {
		self.parameter_names = names.iter().map(|n| Some(n.to_string())).collect();
		self
	}

	pub fn result_type(mut self, alias: &str) -> Self {
		self.result_type = Some(alias.to_string());
		self
	}

	pub fn result_map(mut self, id: &str) -> Self {
		self.result_map = Some(id.to_string());
		self
	}

	pub fn one(mut self) -> Self {
		self.disposition = ResultDisposition::One;
		self
	}

	pub fn map_by_key(mut self, key: &str) -> Self {
		self.disposition = ResultDisposition::MapByKey(key.to_string());
		self
	}

	pub fn cursor(mut self) -> Self {
		self.disposition = ResultDisposition::Cursor;
		self
	}

	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);
		self
	}

	pub fn fetch_size(mut self, fetch_size: u32) -> Self {
		self.fetch_size = Some(fetch_size);
		self
	}

	pub fn flush_cache(mut self, flush: bool) -> Self {
		self.flush_cache = Some(flush);
		self
	}

	pub fn use_cache(mut self, use_cache: bool) -> Self {
		self.use_cache = Some(use_cache);
		self
	}

	pub fn generated_keys(mut self, key_property: &str) -> Self {
		self.use_generated_keys = true;
		self.key_property = Some(key_property.to_string());
		self
	}

	pub fn key_column(mut self, key_column: &str) -> Self {
		self.key_column = Some(key_column.to_string());
		self
	}

	pub fn select_key(mut self, sql: &str, key_property: &str, before: bool) -> Self {
		self.select_key = Some(SelectKeySpec {
			sql: sql.to_string(),
			key_property: key_property.to_string(),
			result_type: None,
			before,
		});
		self
	}

	pub fn result_sets(mut self, names: &[&str]) -> Self {
		self.result_sets = names.iter().map(|n| n.to_string()).collect();
		self
	}
}

/// A mapper namespace declared in code.
pub struct MapperModule {
	namespace: String,
	companion_resource: Option<String>,
	statements: Vec<StatementSpec>,
}

impl MapperModule {
	pub fn new(namespace: &str) -> Self {
		Self { namespace: namespace.to_string(), companion_resource: None, statements: Vec::new() }
	}

	/// Names a mapper document loaded before the module's own statements;
	/// definitions conflicting with it are rejected.
	pub fn companion_resource(mut self, resource: &str) -> Self {
		self.companion_resource = Some(resource.to_string());
		self
	}

	pub fn statement(mut self, spec: StatementSpec) -> Self {
		self.statements.push(spec);
		self
	}

	pub fn register(
		&self,
		configuration: &Configuration,
		resources: &HashMap<String, String>,
	) -> Result<(), BuildError> {
		if let Some(resource) = &self.companion_resource {
			let content = resources
				.get(resource)
				.cloned()
				.or_else(|| std::fs::read_to_string(resource).ok())
				.ok_or_else(|| {
					BuildError::message(format!(
						"companion resource '{resource}' for mapper '{}' not found",
						self.namespace
					))
				})?;
			let builder = XmlMapperBuilder::parse_document(&content)?;
			if builder.namespace() != self.namespace {
				return Err(BuildError::message(format!(
					"companion resource '{resource}' declares namespace '{}', expected '{}'",
					builder.namespace(),
					self.namespace
				)));
			}
			builder.parse_into(configuration)?;
		}
		let mut descriptor = MapperDescriptor::new(&self.namespace);
		for spec in &self.statements {
			let statement_id = format!("{}.{}", self.namespace, spec.name);
			if self.register_statement(configuration, spec, &statement_id)? {
				descriptor.add_method(
					MethodDescriptor::new(&spec.name, &statement_id)
						.param_names(spec.parameter_names.clone())
						.disposition(spec.disposition.clone()),
				);
			} else if configuration.has_statement(&statement_id) {
				// defined by the companion document; still dispatchable
				descriptor.add_method(
					MethodDescriptor::new(&spec.name, &statement_id)
						.param_names(spec.parameter_names.clone())
						.disposition(spec.disposition.clone()),
				);
			}
		}
		configuration.add_mapper_descriptor(Arc::new(descriptor))?;
		Ok(())
	}

	/// Returns whether the statement was installed (database-id filtering
	/// may skip it).
	fn register_statement(
		&self,
		configuration: &Configuration,
		spec: &StatementSpec,
		statement_id: &str,
	) -> Result<bool, BuildError> {
		match (configuration.database_id(), spec.database_id.as_deref()) {
			(None, Some(_)) => return Ok(false),
			(Some(active), Some(declared)) if active != declared => return Ok(false),
			_ => {}
		}
		let body = parse_sql_body(&spec.sql)?;
		let sql_source = script::build_sql_source(configuration, &body)?;

		let mut key_generator = KeyGeneratorKind::None;
		let mut key_properties: Vec<String> =
			spec.key_property.iter().map(|p| p.to_string()).collect();
		if let Some(select_key) = &spec.select_key {
			let key_statement_id = format!("{statement_id}!selectKey");
			let key_body = parse_sql_body(&select_key.sql)?;
			let key_source = script::build_sql_source(configuration, &key_body)?;
			let key_statement = MappedStatement::builder(
				&key_statement_id,
				SqlCommandType::Select,
				key_source,
			)
			.result_type(
				select_key
					.result_type
					.as_deref()
					.map(|t| configuration.type_aliases().resolve(t)),
			)
			.key_properties(vec![select_key.key_property.clone()])
			.use_cache(false)
			.build();
			configuration.add_mapped_statement(Arc::new(key_statement))?;
			key_generator = KeyGeneratorKind::SelectKey {
				statement_id: key_statement_id,
				execute_before: select_key.before,
			};
			key_properties = vec![select_key.key_property.clone()];
		} else if spec.use_generated_keys
			|| (configuration.settings().use_generated_keys
				&& spec.command == SqlCommandType::Insert && spec.key_property.is_some())
		{
			key_generator = KeyGeneratorKind::Driver;
		}

		let mut result_map_ids: Vec<String> = spec
			.result_map
			.as_deref()
			.map(|id| {
				if id.contains('.') {
					vec![id.to_string()]
				} else {
					vec![format!("{}.{id}", self.namespace)]
				}
			})
			.unwrap_or_default();
		let result_type =
			spec.result_type.as_deref().map(|t| configuration.type_aliases().resolve(t));
		if result_map_ids.is_empty() {
			if let Some(result_type) = &result_type {
				let inline_id = format!("{statement_id}-Inline");
				if !configuration.has_result_map(&inline_id) {
					configuration.add_result_map(
						ResultMap::builder(&inline_id, result_type.clone()).build()?,
					)?;
				}
				result_map_ids.push(inline_id);
			}
		}

		let is_select = spec.command == SqlCommandType::Select;
		let statement = MappedStatement::builder(statement_id, spec.command, sql_source)
			.statement_type(spec.statement_type)
			.result_type(result_type)
			.result_map_ids(result_map_ids)
			.timeout(spec.timeout)
			.fetch_size(spec.fetch_size)
			.flush_cache(spec.flush_cache.unwrap_or(!is_select))
			.use_cache(spec.use_cache.unwrap_or(is_select))
			.key_generator(key_generator.clone())
			.key_properties(key_properties)
			.key_columns(spec.key_column.iter().map(|c| c.to_string()).collect())
			.database_id(spec.database_id.clone())
			.result_sets(spec.result_sets.clone())
			.cache(configuration.effective_cache(&self.namespace))
			.build();
		configuration.add_key_generator(statement_id, key_generator);
		configuration.add_mapped_statement(Arc::new(statement))?;
		Ok(true)
	}
}

/// Plain SQL stays plain; a `<script>`-wrapped body parses for dynamic
/// tags, mirroring the annotation convention.
fn parse_sql_body(sql: &str) -> Result<XmlElement, BuildError> {
	let trimmed = sql.trim();
	if trimmed.starts_with("<script>") {
		return Ok(xml::parse_document(trimmed)?);
	}
	let mut element = XmlElement::new("script");
	element.children.push(XmlNode::Text(sql.to_string()));
	Ok(element)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_module_registers_statements_and_descriptor() {
		let configuration = Configuration::new();
		let module = MapperModule::new("BlogMapper")
			.statement(StatementSpec::select("findAll", "SELECT * FROM blog").result_type("map"))
			.statement(
				StatementSpec::select("findOne", "SELECT * FROM blog WHERE id = #{id}")
					.result_type("map")
					.params(&["id"])
					.one(),
			)
			.statement(
				StatementSpec::insert("create", "INSERT INTO blog (title) VALUES (#{title})")
					.generated_keys("id"),
			);
		module.register(&configuration, &HashMap::new()).unwrap();
		assert!(configuration.mapped_statement("BlogMapper.findAll").is_some());
		let descriptor = configuration.mapper_descriptor("BlogMapper").unwrap();
		assert_eq!(
			descriptor.method("findOne").unwrap().disposition,
			ResultDisposition::One
		);
		let insert = configuration.mapped_statement("BlogMapper.create").unwrap();
		assert_eq!(insert.key_generator, KeyGeneratorKind::Driver);
	}

	#[test]
	fn test_script_wrapped_sql_is_dynamic() {
		let configuration = Configuration::new();
		let module = MapperModule::new("m").statement(
			StatementSpec::select(
				"find",
				"<script>SELECT * FROM t <where><if test=\"a != null\">a = #{a}</if></where></script>",
			)
			.result_type("map"),
		);
		module.register(&configuration, &HashMap::new()).unwrap();
		let statement = configuration.mapped_statement("m.find").unwrap();
		let parameter = grappelli_core::value::Value::Object(Default::default());
		let bound = statement.bound_sql(&configuration, &parameter).unwrap();
		assert_eq!(bound.sql.trim(), "SELECT * FROM t");
	}

	#[test]
	fn test_conflicting_definition_rejected() {
		let configuration = Configuration::new();
		let module = MapperModule::new("m")
			.statement(StatementSpec::select("find", "SELECT 1").result_type("map"))
			.statement(StatementSpec::select("find", "SELECT 2").result_type("map"));
		assert!(module.register(&configuration, &HashMap::new()).is_err());
	}

	#[test]
	fn test_database_id_filtering_skips_mismatches() {
		let mut configuration = Configuration::new();
		configuration.set_database_id(Some("mysql".to_string()));
		let module = MapperModule::new("m")
			.statement(
				StatementSpec::select("now", "SELECT sysdate FROM dual")
					.result_type("string")
					.database_id("oracle"),
			)
			.statement(
				StatementSpec::select("now", "SELECT now()")
					.result_type("string")
					.database_id("mysql"),
			);
		module.register(&configuration, &HashMap::new()).unwrap();
		let statement = configuration.mapped_statement("m.now").unwrap();
		assert_eq!(statement.database_id.as_deref(), Some("mysql"));
	}
}
