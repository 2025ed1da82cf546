//! The configuration aggregate: settings and the registries every runtime
//! component reads from.
//!
//! Built once by a builder holding `&mut`, then shared behind an `Arc`.
//! Post-build mapper additions go through the interior locks; steady-state
//! readers only ever take read guards.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use grappelli_cache::Cache;
use grappelli_core::meta::ReflectorFactory;
use grappelli_core::types::{
	JavaType, JdbcType, TypeAliasRegistry, TypeError, TypeHandler, TypeHandlerRegistry,
};
use grappelli_core::xml::XmlElement;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};

use crate::binding::MapperDescriptor;
use crate::environment::Environment;
use crate::error::BuildError;
use crate::plugin::Interceptor;
use crate::result_map::ResultMap;
use crate::statement::{KeyGeneratorKind, MappedStatement, ResultSetType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutorType {
	#[default]
	Simple,
	Reuse,
	Batch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocalCacheScope {
	#[default]
	Session,
	Statement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoMappingBehavior {
	None,
	#[default]
	Partial,
	Full,
}

/// What to do with a discovered column that matches no writable property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoMappingUnknownColumnBehavior {
	#[default]
	None,
	Warning,
	Failing,
}

/// The enumerated flags of the configuration document, with their defaults.
#[derive(Debug, Clone)]
pub struct Settings {
	pub cache_enabled: bool,
	pub lazy_loading_enabled: bool,
	pub aggressive_lazy_loading: bool,
	pub multiple_result_sets_enabled: bool,
	pub use_column_label: bool,
	pub use_generated_keys: bool,
	pub auto_mapping_behavior: AutoMappingBehavior,
	pub auto_mapping_unknown_column_behavior: AutoMappingUnknownColumnBehavior,
	pub default_executor_type: ExecutorType,
	pub default_statement_timeout: Option<Duration>,
	pub default_fetch_size: Option<u32>,
	pub default_result_set_type: Option<ResultSetType>,
	pub safe_row_bounds_enabled: bool,
	pub safe_result_handler_enabled: bool,
	pub map_underscore_to_camel_case: bool,
	pub local_cache_scope: LocalCacheScope,
	pub jdbc_type_for_null: JdbcType,
	pub lazy_load_trigger_methods: HashSet<String>,
	pub default_scripting_language: String,
	pub default_enum_type_handler: String,
	pub call_setters_on_nulls: bool,
	pub use_actual_param_name: bool,
	pub return_instance_for_empty_row: bool,
	pub shrink_whitespaces_in_sql: bool,
	pub default_sql_provider_type: Option<String>,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			cache_enabled: true,
			lazy_loading_enabled: false,
			aggressive_lazy_loading: false,
			multiple_result_sets_enabled: true,
			use_column_label: true,
			use_generated_keys: false,
			auto_mapping_behavior: AutoMappingBehavior::Partial,
			auto_mapping_unknown_column_behavior: AutoMappingUnknownColumnBehavior::None,
			default_executor_type: ExecutorType::Simple,
			default_statement_timeout: None,
			default_fetch_size: None,
			default_result_set_type: None,
			safe_row_bounds_enabled: false,
			safe_result_handler_enabled: true,
			map_underscore_to_camel_case: false,
			local_cache_scope: LocalCacheScope::Session,
			jdbc_type_for_null: JdbcType::Other,
			lazy_load_trigger_methods: ["equals", "clone", "hashCode", "toString"]
				.into_iter()
				.map(String::from)
				.collect(),
			default_scripting_language: "xml".to_string(),
			default_enum_type_handler: "enum".to_string(),
			call_setters_on_nulls: false,
			use_actual_param_name: true,
			return_instance_for_empty_row: false,
			shrink_whitespaces_in_sql: false,
			default_sql_provider_type: None,
		}
	}
}

impl Settings {
	/// Applies one document setting by name. Unknown names and unparsable
	/// values are build errors.
	pub fn set(&mut self, name: &str, value: &str) -> Result<(), BuildError> {
		let invalid = || BuildError::InvalidSetting {
			name: name.to_string(),
			value: value.to_string(),
		};
		let parse_bool = |value: &str| match value {
			"true" => Ok(true),
			"false" => Ok(false),
			_ => Err(invalid()),
		};
		match name {
			"cacheEnabled" => self.cache_enabled = parse_bool(value)?,
			"lazyLoadingEnabled" => self.lazy_loading_enabled = parse_bool(value)?,
			"aggressiveLazyLoading" => self.aggressive_lazy_loading = parse_bool(value)?,
			"multipleResultSetsEnabled" => {
				self.multiple_result_sets_enabled = parse_bool(value)?;
			}
			"useColumnLabel" => self.use_column_label = parse_bool(value)?,
			"useGeneratedKeys" => self.use_generated_keys = parse_bool(value)?,
			"autoMappingBehavior" => {
				self.auto_mapping_behavior = match value.to_ascii_uppercase().as_str() {
					"NONE" => AutoMappingBehavior::None,
					"PARTIAL" => AutoMappingBehavior::Partial,
					"FULL" => AutoMappingBehavior::Full,
					_ => return Err(invalid()),
				};
			}
			"autoMappingUnknownColumnBehavior" => {
				self.auto_mapping_unknown_column_behavior =
					match value.to_ascii_uppercase().as_str() {
						"NONE" => AutoMappingUnknownColumnBehavior::None,
						"WARNING" => AutoMappingUnknownColumnBehavior::Warning,
						"FAILING" => AutoMappingUnknownColumnBehavior::Failing,
						_ => return Err(invalid()),
					};
			}
			"defaultExecutorType" => {
				self.default_executor_type = match value.to_ascii_uppercase().as_str() {
					"SIMPLE" => ExecutorType::Simple,
					"REUSE" => ExecutorType::Reuse,
					"BATCH" => ExecutorType::Batch,
					_ => return Err(invalid()),
				};
			}
			"defaultStatementTimeout" => {
				let seconds: u64 = value.parse().map_err(|_| invalid())?;
				self.default_statement_timeout = Some(Duration::from_secs(seconds));
			}
			"defaultFetchSize" => {
				self.default_fetch_size = Some(value.parse().map_err(|_| invalid())?);
			}
			"defaultResultSetType" => {
				self.default_result_set_type =
					Some(ResultSetType::parse(value).ok_or_else(invalid)?);
			}
			"safeRowBoundsEnabled" => self.safe_row_bounds_enabled = parse_bool(value)?,
			"safeResultHandlerEnabled" => {
				self.safe_result_handler_enabled = parse_bool(value)?;
			}
			"mapUnderscoreToCamelCase" => {
				self.map_underscore_to_camel_case = parse_bool(value)?;
			}
			"localCacheScope" => {
				self.local_cache_scope = match value.to_ascii_uppercase().as_str() {
					"SESSION" => LocalCacheScope::Session,
					"STATEMENT" => LocalCacheScope::Statement,
					_ => return Err(invalid()),
				};
			}
			"jdbcTypeForNull" => {
				self.jdbc_type_for_null = JdbcType::parse(value).ok_or_else(invalid)?;
			}
			"lazyLoadTriggerMethods" => {
				self.lazy_load_trigger_methods =
					value.split(',').map(|s| s.trim().to_string()).collect();
			}
			"defaultScriptingLanguage" => {
				self.default_scripting_language = value.to_string();
			}
			"defaultEnumTypeHandler" => {
				self.default_enum_type_handler = value.to_string();
			}
			"callSettersOnNulls" => self.call_setters_on_nulls = parse_bool(value)?,
			"useActualParamName" => self.use_actual_param_name = parse_bool(value)?,
			"returnInstanceForEmptyRow" => {
				self.return_instance_for_empty_row = parse_bool(value)?;
			}
			"shrinkWhitespacesInSql" => self.shrink_whitespaces_in_sql = parse_bool(value)?,
			"defaultSqlProviderType" => {
				self.default_sql_provider_type = Some(value.to_string());
			}
			other => return Err(BuildError::UnknownSetting { name: other.to_string() }),
		}
		Ok(())
	}
}

#[derive(Default)]
struct PendingReferences {
	references: Vec<String>,
}

/// Process-wide registry of everything the builders install.
pub struct Configuration {
	settings: Settings,
	variables: HashMap<String, String>,
	environment: Option<Environment>,
	database_id: Option<String>,
	type_aliases: RwLock<TypeAliasRegistry>,
	type_handlers: RwLock<TypeHandlerRegistry>,
	named_type_handlers: RwLock<HashMap<String, Arc<dyn TypeHandler>>>,
	reflectors: ReflectorFactory,
	mapped_statements: RwLock<HashMap<String, Arc<MappedStatement>>>,
	result_maps: RwLock<HashMap<String, Arc<ResultMap>>>,
	caches: RwLock<HashMap<String, Arc<dyn Cache>>>,
	cache_refs: RwLock<HashMap<String, String>>,
	sql_fragments: RwLock<HashMap<String, Arc<XmlElement>>>,
	key_generators: RwLock<HashMap<String, KeyGeneratorKind>>,
	mapper_descriptors: RwLock<HashMap<String, Arc<MapperDescriptor>>>,
	interceptors: Vec<Arc<dyn Interceptor>>,
	pending: Mutex<PendingReferences>,
}

impl Default for Configuration {
	fn default() -> Self {
		Self::new()
	}
}

impl Configuration {
	pub fn new() -> Self {
		Self {
			settings: Settings::default(),
			variables: HashMap::new(),
			environment: None,
			database_id: None,
			type_aliases: RwLock::new(TypeAliasRegistry::new()),
			type_handlers: RwLock::new(TypeHandlerRegistry::new()),
			named_type_handlers: RwLock::new(HashMap::new()),
			reflectors: ReflectorFactory::new(),
			mapped_statements: RwLock::new(HashMap::new()),
			result_maps: RwLock::new(HashMap::new()),
			caches: RwLock::new(HashMap::new()),
			cache_refs: RwLock::new(HashMap::new()),
			sql_fragments: RwLock::new(HashMap::new()),
			key_generators: RwLock::new(HashMap::new()),
			mapper_descriptors: RwLock::new(HashMap::new()),
			interceptors: Vec::new(),
			pending: Mutex::new(PendingReferences::default()),
		}
	}

	pub fn settings(&self) -> &Settings {
		&self.settings
	}

	pub fn settings_mut(&mut self) -> &mut Settings {
		&mut self.settings
	}

	pub fn variables(&self) -> &HashMap<String, String> {
		&self.variables
	}

	pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
		self.variables.insert(name.into(), value.into());
	}

	pub fn environment(&self) -> Option<&Environment> {
		self.environment.as_ref()
	}

	pub fn set_environment(&mut self, environment: Environment) {
		self.environment = Some(environment);
	}

	pub fn database_id(&self) -> Option<&str> {
		self.database_id.as_deref()
	}

	pub fn set_database_id(&mut self, database_id: Option<String>) {
		self.database_id = database_id;
	}

	pub fn type_aliases(&self) -> RwLockReadGuard<'_, TypeAliasRegistry> {
		self.type_aliases.read()
	}

	pub fn type_aliases_mut(&self) -> parking_lot::RwLockWriteGuard<'_, TypeAliasRegistry> {
		self.type_aliases.write()
	}

	pub fn type_handlers(&self) -> RwLockReadGuard<'_, TypeHandlerRegistry> {
		self.type_handlers.read()
	}

	pub fn type_handlers_mut(&self) -> parking_lot::RwLockWriteGuard<'_, TypeHandlerRegistry> {
		self.type_handlers.write()
	}

	pub fn reflectors(&self) -> &ReflectorFactory {
		&self.reflectors
	}

	/// Full registry lookup for a `(javaType, jdbcType)` pair.
	pub fn resolve_type_handler(
		&self,
		java_type: Option<&JavaType>,
		jdbc_type: Option<JdbcType>,
	) -> Result<Arc<dyn TypeHandler>, TypeError> {
		let aliases = self.type_aliases.read();
		self.type_handlers.read().resolve(java_type, jdbc_type, &aliases)
	}

	pub fn register_named_type_handler(&self, name: &str, handler: Arc<dyn TypeHandler>) {
		self.named_type_handlers.write().insert(name.to_string(), handler);
	}

	pub fn type_handler_by_name(&self, name: &str) -> Option<Arc<dyn TypeHandler>> {
		self.named_type_handlers.read().get(name).map(Arc::clone)
	}

	/// Installs a statement, honoring database-id precedence: a
	/// database-id-specific definition replaces an unspecified one with the
	/// same id, never the other way around.
	pub fn add_mapped_statement(
		&self,
		statement: Arc<MappedStatement>,
	) -> Result<(), BuildError> {
		let mut statements = self.mapped_statements.write();
		if let Some(existing) = statements.get(&statement.id) {
			let existing_specific = existing.database_id.is_some();
			let new_specific = statement.database_id.is_some();
			if existing_specific && !new_specific {
				return Ok(());
			}
			if existing_specific == new_specific {
				return Err(BuildError::DuplicateStatement { id: statement.id.clone() });
			}
		}
		statements.insert(statement.id.clone(), statement);
		Ok(())
	}

	pub fn mapped_statement(&self, id: &str) -> Option<Arc<MappedStatement>> {
		self.mapped_statements.read().get(id).map(Arc::clone)
	}

	pub fn has_statement(&self, id: &str) -> bool {
		self.mapped_statements.read().contains_key(id)
	}

	pub fn mapped_statement_ids(&self) -> Vec<String> {
		self.mapped_statements.read().keys().cloned().collect()
	}

	pub fn add_result_map(&self, result_map: ResultMap) -> Result<Arc<ResultMap>, BuildError> {
		let mut maps = self.result_maps.write();
		if maps.contains_key(&result_map.id) {
			return Err(BuildError::DuplicateResultMap { id: result_map.id.clone() });
		}
		let arc = Arc::new(result_map);
		maps.insert(arc.id.clone(), Arc::clone(&arc));
		Ok(arc)
	}

	pub fn result_map(&self, id: &str) -> Option<Arc<ResultMap>> {
		self.result_maps.read().get(id).map(Arc::clone)
	}

	pub fn has_result_map(&self, id: &str) -> bool {
		self.result_maps.read().contains_key(id)
	}

	pub fn add_cache(&self, cache: Arc<dyn Cache>) {
		self.caches.write().insert(cache.id().to_string(), cache);
	}

	pub fn cache(&self, namespace: &str) -> Option<Arc<dyn Cache>> {
		self.caches.read().get(namespace).map(Arc::clone)
	}

	pub fn add_cache_ref(&self, namespace: &str, referenced: &str) {
		self.cache_refs.write().insert(namespace.to_string(), referenced.to_string());
	}

	/// The cache a namespace actually uses, following `cache-ref` hops.
	pub fn effective_cache(&self, namespace: &str) -> Option<Arc<dyn Cache>> {
		let refs = self.cache_refs.read();
		let mut current = namespace;
		let mut hops = 0;
		while let Some(next) = refs.get(current) {
			current = next;
			hops += 1;
			if hops > refs.len() {
				// circular cache-ref chains are rejected at build; stop anyway
				return None;
			}
		}
		self.caches.read().get(current).map(Arc::clone)
	}

	pub fn add_sql_fragment(&self, id: &str, fragment: Arc<XmlElement>) {
		self.sql_fragments.write().insert(id.to_string(), fragment);
	}

	pub fn sql_fragment(&self, id: &str) -> Option<Arc<XmlElement>> {
		self.sql_fragments.read().get(id).map(Arc::clone)
	}

	pub fn add_key_generator(&self, id: &str, kind: KeyGeneratorKind) {
		self.key_generators.write().insert(id.to_string(), kind);
	}

	pub fn key_generator(&self, id: &str) -> Option<KeyGeneratorKind> {
		self.key_generators.read().get(id).cloned()
	}

	pub fn add_mapper_descriptor(
		&self,
		descriptor: Arc<MapperDescriptor>,
	) -> Result<(), BuildError> {
		let mut descriptors = self.mapper_descriptors.write();
		if descriptors.contains_key(&descriptor.namespace) {
			return Err(BuildError::message(format!(
				"mapper '{}' is already registered",
				descriptor.namespace
			)));
		}
		descriptors.insert(descriptor.namespace.clone(), descriptor);
		Ok(())
	}

	pub fn mapper_descriptor(&self, namespace: &str) -> Option<Arc<MapperDescriptor>> {
		self.mapper_descriptors.read().get(namespace).map(Arc::clone)
	}

	pub fn add_interceptor(&mut self, interceptor: Arc<dyn Interceptor>) {
		self.interceptors.push(interceptor);
	}

	pub fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
		&self.interceptors
	}

	/// Records a reference that failed to resolve; the builders retry and
	/// eventually call [`Configuration::assert_resolved`].
	pub fn stage_incomplete(&self, reference: impl Into<String>) {
		self.pending.lock().references.push(reference.into());
	}

	pub fn take_incomplete(&self) -> Vec<String> {
		std::mem::take(&mut self.pending.lock().references)
	}

	/// Fails loudly when references remain unresolved at end of build.
	pub fn assert_resolved(&self) -> Result<(), BuildError> {
		let pending = self.pending.lock();
		if pending.references.is_empty() {
			Ok(())
		} else {
			Err(BuildError::IncompleteReference { references: pending.references.clone() })
		}
	}
}

impl std::fmt::Debug for Configuration {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Configuration")
			.field("database_id", &self.database_id)
			.field("statements", &self.mapped_statements.read().len())
			.field("result_maps", &self.result_maps.read().len())
			.field("caches", &self.caches.read().len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::source::StaticSqlSource;
	use crate::statement::SqlCommandType;

	fn statement(id: &str, database_id: Option<&str>) -> Arc<MappedStatement> {
		Arc::new(
			MappedStatement::builder(
				id,
				SqlCommandType::Select,
				Arc::new(StaticSqlSource::new("SELECT 1".into(), vec![])),
			)
			.database_id(database_id.map(String::from))
			.build(),
		)
	}

	#[test]
	fn test_duplicate_statement_rejected() {
		let config = Configuration::new();
		config.add_mapped_statement(statement("ns.a", None)).unwrap();
		assert!(config.add_mapped_statement(statement("ns.a", None)).is_err());
	}

	#[test]
	fn test_database_id_precedence() {
		let config = Configuration::new();
		config.add_mapped_statement(statement("ns.a", None)).unwrap();
		// specific replaces unspecified
		config.add_mapped_statement(statement("ns.a", Some("mysql"))).unwrap();
		assert_eq!(
			config.mapped_statement("ns.a").unwrap().database_id.as_deref(),
			Some("mysql")
		);
		// unspecified never replaces specific
		config.add_mapped_statement(statement("ns.a", None)).unwrap();
		assert_eq!(
			config.mapped_statement("ns.a").unwrap().database_id.as_deref(),
			Some("mysql")
		);
	}

	#[test]
	fn test_cache_ref_resolution() {
		let config = Configuration::new();
		config.add_cache(Arc::new(grappelli_cache::PerpetualCache::new("shared")));
		config.add_cache_ref("other", "shared");
		assert_eq!(config.effective_cache("other").unwrap().id(), "shared");
		assert_eq!(config.effective_cache("shared").unwrap().id(), "shared");
		assert!(config.effective_cache("ghost").is_none());
	}

	#[test]
	fn test_unknown_setting_rejected() {
		let mut settings = Settings::default();
		assert!(matches!(
			settings.set("nope", "true"),
			Err(BuildError::UnknownSetting { .. })
		));
		settings.set("cacheEnabled", "false").unwrap();
		assert!(!settings.cache_enabled);
	}

	#[test]
	fn test_incomplete_references_fail_loudly() {
		let config = Configuration::new();
		config.stage_incomplete("result map 'ns.ghost'");
		assert!(matches!(
			config.assert_resolved(),
			Err(BuildError::IncompleteReference { .. })
		));
	}
}
