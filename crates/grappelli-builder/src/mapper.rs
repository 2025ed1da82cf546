//! Mapper document ingestion.
//!
//! A document builds in three phases so forward references across files can
//! settle: shared artifacts (cache, fragments) first, result maps second
//! (retried until their `extends`/case targets exist), statements last.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use grappelli_core::types::JavaType;
use grappelli_core::xml::{self, XmlElement, XmlNode};
use grappelli_mapping::{
	BuildError, Configuration, Discriminator, KeyGeneratorKind, MappedStatement, ResultMap,
	ResultMapping, ResultSetType, SqlCommandType, StatementType,
};
use tracing::debug;

use crate::assistant::{MapperBuilderAssistant, parse_composite_column};
use crate::script;

const SELECT_KEY_SUFFIX: &str = "!selectKey";
const MAX_INCLUDE_DEPTH: usize = 10;

pub struct XmlMapperBuilder {
	root: XmlElement,
	namespace: String,
}

impl XmlMapperBuilder {
	pub fn parse_document(text: &str) -> Result<Self, BuildError> {
		let root = xml::parse_document(text)?;
		if root.name != "mapper" {
			return Err(BuildError::message(format!(
				"mapper document root must be <mapper>, found <{}>",
				root.name
			)));
		}
		let namespace = root
			.attr("namespace")
			.filter(|ns| !ns.is_empty())
			.ok_or_else(|| BuildError::message("mapper namespace cannot be empty"))?
			.to_string();
		Ok(Self { root, namespace })
	}

	pub fn namespace(&self) -> &str {
		&self.namespace
	}

	/// Phase 1: the namespace cache and the named SQL fragments.
	pub fn register_shared(&self, configuration: &Configuration) -> Result<(), BuildError> {
		let mut assistant = MapperBuilderAssistant::new(configuration, &self.namespace);
		for element in self.root.elements() {
			match element.name.as_str() {
				"cache" => build_cache(&mut assistant, element)?,
				"sql" => {
					if !database_id_matches(configuration, element) {
						continue;
					}
					let id = required_attr(element, "id")?;
					let full = assistant.apply_namespace(&id);
					configuration.add_sql_fragment(&full, Arc::new(element.clone()));
				}
				_ => {}
			}
		}
		Ok(())
	}

	/// Phase 2: result maps. Maps whose `extends` or case targets are not
	/// registered yet come back for the caller to retry.
	pub fn build_result_maps(
		&self,
		configuration: &Configuration,
	) -> Result<Vec<(String, XmlElement)>, BuildError> {
		let mut pending: Vec<XmlElement> = self
			.root
			.elements()
			.filter(|e| e.name == "resultMap")
			.cloned()
			.collect();
		// local fixed-point pass; leftovers go to the cross-file retry
		loop {
			let before = pending.len();
			let mut still = Vec::new();
			for element in pending {
				if !try_build_result_map(configuration, &self.namespace, &element)? {
					still.push(element);
				}
			}
			pending = still;
			if pending.is_empty() || pending.len() == before {
				break;
			}
		}
		Ok(pending.into_iter().map(|e| (self.namespace.clone(), e)).collect())
	}

	/// Phase 3: statements, with the cache-ref now resolvable.
	pub fn build_statements(&self, configuration: &Configuration) -> Result<(), BuildError> {
		let mut assistant = MapperBuilderAssistant::new(configuration, &self.namespace);
		for element in self.root.elements() {
			if element.name == "cache-ref" {
				let referenced = required_attr(element, "namespace")?;
				if !assistant.use_cache_ref(&referenced) {
					configuration.stage_incomplete(format!(
						"cache-ref '{referenced}' from namespace '{}'",
						self.namespace
					));
				}
			}
		}
		for element in self.root.elements() {
			let command = match element.name.as_str() {
				"select" => SqlCommandType::Select,
				"insert" => SqlCommandType::Insert,
				"update" => SqlCommandType::Update,
				"delete" => SqlCommandType::Delete,
				_ => continue,
			};
			build_statement(configuration, &assistant, element, command)?;
		}
		Ok(())
	}

	/// All phases for a standalone single-document build.
	pub fn parse_into(&self, configuration: &Configuration) -> Result<(), BuildError> {
		self.register_shared(configuration)?;
		for (_, element) in self.build_result_maps(configuration)? {
			configuration.stage_incomplete(format!(
				"result map '{}' in namespace '{}'",
				element.attr("id").unwrap_or("<anonymous>"),
				self.namespace
			));
		}
		self.build_statements(configuration)
	}
}

fn build_cache(
	assistant: &mut MapperBuilderAssistant<'_>,
	element: &XmlElement,
) -> Result<(), BuildError> {
	let eviction = element.attr_or("eviction", "LRU");
	let flush_interval = element
		.attr("flushInterval")
		.map(|v| {
			v.parse::<u64>().map(Duration::from_millis).map_err(|_| {
				BuildError::message(format!("flushInterval '{v}' is not a number"))
			})
		})
		.transpose()?;
	let size = element
		.attr("size")
		.map(|v| {
			v.parse::<usize>()
				.map_err(|_| BuildError::message(format!("cache size '{v}' is not a number")))
		})
		.transpose()?;
	let read_only = element.attr("readOnly") == Some("true");
	let blocking = element.attr("blocking") == Some("true");
	assistant.use_new_cache(&eviction, flush_interval, size, read_only, blocking)?;
	debug!(namespace = assistant.namespace(), eviction = %eviction, "registered cache");
	Ok(())
}

/// Builds one `<resultMap>`; `Ok(false)` means a referenced map is not
/// registered yet and the element should be retried.
pub fn try_build_result_map(
	configuration: &Configuration,
	namespace: &str,
	element: &XmlElement,
) -> Result<bool, BuildError> {
	let assistant = MapperBuilderAssistant::new(configuration, namespace);
	let id = required_attr(element, "id")?;
	let full_id = assistant.apply_namespace(&id);
	let type_name = element
		.attr("type")
		.or_else(|| element.attr("ofType"))
		.or_else(|| element.attr("resultType"))
		.or_else(|| element.attr("javaType"))
		.ok_or_else(|| BuildError::message(format!("result map '{full_id}' requires a type")))?;
	let type_ = configuration.type_aliases().resolve(type_name);

	let mut mappings = Vec::new();
	if let Some(extends) = element.attr("extends") {
		let parent_id = assistant.apply_namespace(extends);
		let Some(parent) = configuration.result_map(&parent_id) else {
			return Ok(false);
		};
		mappings.extend(parent.result_mappings.iter().cloned());
	}
	let mut discriminator = None;
	for child in element.elements() {
		match child.name.as_str() {
			"constructor" => {
				for arg in child.elements() {
					let id_flag = arg.name == "idArg";
					let mut mapping =
						build_result_mapping(configuration, &assistant, arg, &full_id)?;
					mapping.constructor_flag = true;
					mapping.id_flag = id_flag;
					mapping.property = arg.attr("name").map(String::from).or(mapping.property);
					mappings.push(mapping);
				}
			}
			"id" | "result" => {
				let mut mapping =
					build_result_mapping(configuration, &assistant, child, &full_id)?;
				mapping.id_flag = child.name == "id";
				mappings.push(mapping);
			}
			"association" | "collection" => {
				let mapping = build_nested_mapping(
					configuration,
					&assistant,
					child,
					&full_id,
					child.name == "collection",
				)?;
				let Some(mapping) = mapping else { return Ok(false) };
				mappings.push(mapping);
			}
			"discriminator" => {
				match build_discriminator(configuration, &assistant, child, &full_id)? {
					Some(built) => discriminator = Some(built),
					None => return Ok(false),
				}
			}
			other => {
				return Err(BuildError::message(format!(
					"unexpected element <{other}> in result map '{full_id}'"
				)));
			}
		}
	}
	let auto_mapping = element.attr("autoMapping").map(|v| v == "true");
	let map = ResultMap::builder(full_id, type_)
		.mappings(mappings)
		.auto_mapping(auto_mapping);
	let map = match discriminator {
		Some(d) => map.discriminator(d),
		None => map,
	};
	configuration.add_result_map(map.build()?)?;
	Ok(true)
}

fn build_result_mapping(
	configuration: &Configuration,
	assistant: &MapperBuilderAssistant<'_>,
	element: &XmlElement,
	result_map_id: &str,
) -> Result<ResultMapping, BuildError> {
	let property = element.attr("property").map(String::from);
	let column_spec = element.attr("column").map(String::from);
	let mut mapping = ResultMapping::new(property, None);
	if let Some(spec) = &column_spec {
		match parse_composite_column(spec) {
			Some(composites) => mapping.composites = composites,
			None => mapping.column = Some(spec.clone()),
		}
	}
	mapping.java_type = assistant.resolve_java_type(element.attr("javaType"));
	mapping.jdbc_type = assistant.resolve_jdbc_type(element.attr("jdbcType"))?;
	mapping.type_handler = assistant.resolve_named_type_handler(element.attr("typeHandler"))?;
	if let Some(select) = element.attr("select") {
		mapping.nested_select_id = Some(assistant.apply_namespace(select));
	}
	if let Some(nested) = element.attr("resultMap") {
		mapping.nested_result_map_id = Some(assistant.apply_namespace(nested));
	}
	if let Some(columns) = element.attr("notNullColumn") {
		mapping.not_null_columns =
			columns.split(',').map(|c| c.trim().to_string()).collect();
	}
	mapping.column_prefix = element.attr("columnPrefix").map(String::from);
	mapping.foreign_column = element.attr("foreignColumn").map(String::from);
	mapping.result_set = element.attr("resultSet").map(String::from);
	mapping.lazy = match element.attr("fetchType") {
		Some("lazy") => true,
		Some("eager") => false,
		Some(other) => {
			return Err(BuildError::message(format!(
				"unknown fetchType '{other}' in result map '{result_map_id}'"
			)));
		}
		None => configuration.settings().lazy_loading_enabled,
	};
	Ok(mapping)
}

/// `<association>`/`<collection>`: an attribute reference to another map, a
/// nested select, or an inline body that becomes an anonymous map.
/// `Ok(None)` signals an unresolved reference to retry.
fn build_nested_mapping(
	configuration: &Configuration,
	assistant: &MapperBuilderAssistant<'_>,
	element: &XmlElement,
	result_map_id: &str,
	collection: bool,
) -> Result<Option<ResultMapping>, BuildError> {
	let mut mapping = build_result_mapping(configuration, assistant, element, result_map_id)?;
	if collection {
		mapping.java_type = Some(JavaType::List);
	}
	if mapping.nested_select_id.is_none() && mapping.nested_result_map_id.is_none() {
		// inline body: synthesize an anonymous nested map
		let property = mapping.property.clone().unwrap_or_else(|| "anonymous".to_string());
		let nested_id = format!("{result_map_id}_{}[{property}]", element.name);
		let mut nested = element.clone();
		nested.attributes.insert("id".to_string(), nested_id.clone());
		if collection {
			// the nested map's target type is the element type
			if let Some(of_type) = element.attr("ofType") {
				nested.attributes.insert("type".to_string(), of_type.to_string());
			}
		}
		nested.attributes.shift_remove("property");
		nested.attributes.shift_remove("column");
		nested.attributes.shift_remove("columnPrefix");
		// retries of the enclosing map must not re-register this one
		if !configuration.has_result_map(&nested_id)
			&& !try_build_result_map(configuration, assistant.namespace(), &nested)?
		{
			return Ok(None);
		}
		mapping.nested_result_map_id = Some(nested_id);
	}
	Ok(Some(mapping))
}

fn build_discriminator(
	configuration: &Configuration,
	assistant: &MapperBuilderAssistant<'_>,
	element: &XmlElement,
	result_map_id: &str,
) -> Result<Option<Discriminator>, BuildError> {
	let column = required_attr(element, "column")?;
	let mut cases = std::collections::HashMap::new();
	for (i, case) in element.elements().filter(|e| e.name == "case").enumerate() {
		let value = required_attr(case, "value")?;
		let target = match case.attr("resultMap") {
			Some(referenced) => assistant.apply_namespace(referenced),
			None => {
				// inline case body becomes an anonymous map
				let nested_id = format!("{result_map_id}_case[{i}]");
				let mut nested = case.clone();
				nested.attributes.insert("id".to_string(), nested_id.clone());
				if nested.attr("type").is_none() && nested.attr("resultType").is_none() {
					return Err(BuildError::message(format!(
						"inline discriminator case in '{result_map_id}' requires a resultType"
					)));
				}
				if !configuration.has_result_map(&nested_id)
					&& !try_build_result_map(configuration, assistant.namespace(), &nested)?
				{
					return Ok(None);
				}
				nested_id
			}
		};
		if cases.insert(value.clone(), target).is_some() {
			return Err(BuildError::message(format!(
				"duplicate discriminator case '{value}' in result map '{result_map_id}'"
			)));
		}
	}
	Ok(Some(Discriminator {
		column,
		java_type: assistant.resolve_java_type(element.attr("javaType")),
		jdbc_type: assistant.resolve_jdbc_type(element.attr("jdbcType"))?,
		type_handler: assistant.resolve_named_type_handler(element.attr("typeHandler"))?,
		cases,
	}))
}

/// Whether a statement-level element survives database-id filtering.
fn database_id_matches(configuration: &Configuration, element: &XmlElement) -> bool {
	match (configuration.database_id(), element.attr("databaseId")) {
		(_, None) => true,
		(None, Some(_)) => false,
		(Some(active), Some(declared)) => active == declared,
	}
}

fn build_statement(
	configuration: &Configuration,
	assistant: &MapperBuilderAssistant<'_>,
	element: &XmlElement,
	command: SqlCommandType,
) -> Result<(), BuildError> {
	if !database_id_matches(configuration, element) {
		return Ok(());
	}
	let id = required_attr(element, "id")?;
	let statement_id = assistant.apply_namespace(&id);
	let mut body = resolve_includes(configuration, assistant, element, 0)?;

	// select-key statements register before their owner and leave the body
	let mut key_generator = KeyGeneratorKind::None;
	let mut key_properties = split_list(element.attr("keyProperty"));
	let mut key_columns = split_list(element.attr("keyColumn"));
	let select_keys: Vec<XmlElement> = body
		.elements()
		.filter(|e| e.name == "selectKey")
		.cloned()
		.collect();
	body.children.retain(|c| !matches!(c, XmlNode::Element(e) if e.name == "selectKey"));
	for select_key in &select_keys {
		if !database_id_matches(configuration, select_key) {
			continue;
		}
		let built = build_select_key(configuration, assistant, &statement_id, select_key)?;
		key_generator = built.0;
		key_properties = built.1;
		key_columns = built.2;
	}
	if key_generator == KeyGeneratorKind::None {
		let use_generated = element.attr("useGeneratedKeys").map(|v| v == "true").unwrap_or(
			configuration.settings().use_generated_keys && command == SqlCommandType::Insert,
		);
		if use_generated && command == SqlCommandType::Insert {
			key_generator = KeyGeneratorKind::Driver;
		}
	}

	let sql_source = script::build_sql_source(configuration, &body)?;

	let mut result_map_ids: Vec<String> = split_list(element.attr("resultMap"))
		.into_iter()
		.map(|m| assistant.apply_namespace(&m))
		.collect();
	let result_type = element.attr("resultType").map(|t| configuration.type_aliases().resolve(t));
	if result_map_ids.is_empty() {
		if let Some(result_type) = &result_type {
			// inline map: auto-mapped projection onto the declared type
			let inline_id = format!("{statement_id}-Inline");
			configuration.add_result_map(
				ResultMap::builder(&inline_id, result_type.clone()).build()?,
			)?;
			result_map_ids.push(inline_id);
		}
	}

	let is_select = command == SqlCommandType::Select;
	let statement = MappedStatement::builder(&statement_id, command, sql_source)
		.statement_type(
			element
				.attr("statementType")
				.map(|v| {
					StatementType::parse(v).ok_or_else(|| {
						BuildError::message(format!("unknown statementType '{v}'"))
					})
				})
				.transpose()?
				.unwrap_or_default(),
		)
		.parameter_type(
			element.attr("parameterType").map(|t| configuration.type_aliases().resolve(t)),
		)
		.result_type(result_type)
		.result_map_ids(result_map_ids)
		.fetch_size(parse_number(element, "fetchSize")?)
		.timeout(parse_number(element, "timeout")?.map(|s: u64| Duration::from_secs(s)))
		.flush_cache(
			element.attr("flushCache").map(|v| v == "true").unwrap_or(!is_select),
		)
		.use_cache(element.attr("useCache").map(|v| v == "true").unwrap_or(is_select))
		.result_ordered(element.attr("resultOrdered") == Some("true"))
		.key_generator(key_generator.clone())
		.key_properties(key_properties)
		.key_columns(key_columns)
		.database_id(element.attr("databaseId").map(String::from))
		.result_sets(split_list(element.attr("resultSets")))
		.result_set_type(
			element
				.attr("resultSetType")
				.map(|v| {
					ResultSetType::parse(v).ok_or_else(|| {
						BuildError::message(format!("unknown resultSetType '{v}'"))
					})
				})
				.transpose()?
				.or(configuration.settings().default_result_set_type),
		)
		.cache(configuration.effective_cache(assistant.namespace()))
		.build();
	configuration.add_key_generator(&statement_id, key_generator);
	configuration.add_mapped_statement(Arc::new(statement))?;
	debug!(statement = %statement_id, "registered statement");
	Ok(())
}

type SelectKeyParts = (KeyGeneratorKind, Vec<String>, Vec<String>);

fn build_select_key(
	configuration: &Configuration,
	assistant: &MapperBuilderAssistant<'_>,
	owner_statement_id: &str,
	element: &XmlElement,
) -> Result<SelectKeyParts, BuildError> {
	let key_statement_id = format!("{owner_statement_id}{SELECT_KEY_SUFFIX}");
	let key_properties = split_list(element.attr("keyProperty"));
	if key_properties.is_empty() {
		return Err(BuildError::message(format!(
			"<selectKey> of '{owner_statement_id}' requires a keyProperty"
		)));
	}
	let key_columns = split_list(element.attr("keyColumn"));
	let execute_before = match element.attr_or("order", "AFTER").to_ascii_uppercase().as_str() {
		"BEFORE" => true,
		"AFTER" => false,
		other => {
			return Err(BuildError::message(format!(
				"unknown selectKey order '{other}' in '{owner_statement_id}'"
			)));
		}
	};
	let body = resolve_includes(configuration, assistant, element, 0)?;
	let sql_source = script::build_sql_source(configuration, &body)?;
	let statement =
		MappedStatement::builder(&key_statement_id, SqlCommandType::Select, sql_source)
			.statement_type(
				element
					.attr("statementType")
					.and_then(StatementType::parse)
					.unwrap_or_default(),
			)
			.result_type(
				element.attr("resultType").map(|t| configuration.type_aliases().resolve(t)),
			)
			.key_properties(key_properties.clone())
			.key_columns(key_columns.clone())
			.use_cache(false)
			.build();
	configuration.add_mapped_statement(Arc::new(statement))?;
	Ok((
		KeyGeneratorKind::SelectKey { statement_id: key_statement_id, execute_before },
		key_properties,
		key_columns,
	))
}

/// Splices `<include refid=…>` fragments, applying include-local property
/// overrides and configuration variables, recursively.
fn resolve_includes(
	configuration: &Configuration,
	assistant: &MapperBuilderAssistant<'_>,
	element: &XmlElement,
	depth: usize,
) -> Result<XmlElement, BuildError> {
	if depth > MAX_INCLUDE_DEPTH {
		return Err(BuildError::message("include nesting is too deep; circular <include>?"));
	}
	let mut resolved = XmlElement::new(element.name.clone());
	resolved.attributes = element.attributes.clone();
	for child in &element.children {
		match child {
			XmlNode::Text(text) => {
				resolved.children.push(XmlNode::Text(assistant.interpolate(text)?));
			}
			XmlNode::Element(inner) if inner.name == "include" => {
				let refid = assistant.interpolate(&required_attr(inner, "refid")?)?;
				let full = assistant.apply_namespace(&refid);
				let fragment = configuration
					.sql_fragment(&full)
					.or_else(|| configuration.sql_fragment(&refid))
					.ok_or_else(|| {
						BuildError::message(format!("unknown sql fragment '{refid}'"))
					})?;
				let overrides: Vec<(String, String)> = inner
					.elements()
					.filter(|e| e.name == "property")
					.map(|p| {
						Ok((
							required_attr(p, "name")?,
							assistant.interpolate(&p.attr_or("value", ""))?,
						))
					})
					.collect::<Result<_, BuildError>>()?;
				let substituted = substitute_fragment(&fragment, &overrides);
				let spliced =
					resolve_includes(configuration, assistant, &substituted, depth + 1)?;
				resolved.children.extend(spliced.children);
			}
			XmlNode::Element(inner) => {
				resolved
					.children
					.push(XmlNode::Element(resolve_includes(
						configuration,
						assistant,
						inner,
						depth + 1,
					)?));
			}
		}
	}
	Ok(resolved)
}

/// Applies include-local `${name}` overrides to a fragment's text and
/// attribute values; unknown names stay for the configuration pass.
fn substitute_fragment(fragment: &XmlElement, overrides: &[(String, String)]) -> XmlElement {
	let substitute = |text: &str| -> String {
		let mut out = text.to_string();
		for (name, value) in overrides {
			out = out.replace(&format!("${{{name}}}"), value);
		}
		out
	};
	let mut result = XmlElement::new(fragment.name.clone());
	for (key, value) in &fragment.attributes {
		result.attributes.insert(key.clone(), substitute(value));
	}
	for child in &fragment.children {
		match child {
			XmlNode::Text(text) => result.children.push(XmlNode::Text(substitute(text))),
			XmlNode::Element(inner) => {
				result.children.push(XmlNode::Element(substitute_fragment(inner, overrides)));
			}
		}
	}
	result
}

/// Final whole-configuration validation: every result map referenced by a
/// statement must exist.
pub fn validate_statement_references(configuration: &Configuration) -> Result<(), BuildError> {
	let mut missing = HashSet::new();
	for id in configuration.mapped_statement_ids() {
		let Some(statement) = configuration.mapped_statement(&id) else { continue };
		for map_id in &statement.result_map_ids {
			if !configuration.has_result_map(map_id) {
				missing.insert(format!("result map '{map_id}' referenced by '{id}'"));
			}
		}
	}
	for reference in missing {
		configuration.stage_incomplete(reference);
	}
	configuration.assert_resolved()
}

fn required_attr(element: &XmlElement, name: &str) -> Result<String, BuildError> {
	element.attr(name).map(String::from).ok_or_else(|| {
		BuildError::message(format!("<{}> requires a '{name}' attribute", element.name))
	})
}

fn split_list(spec: Option<&str>) -> Vec<String> {
	spec.map(|s| s.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect())
		.unwrap_or_default()
}

fn parse_number<N: std::str::FromStr>(
	element: &XmlElement,
	name: &str,
) -> Result<Option<N>, BuildError> {
	element
		.attr(name)
		.map(|v| {
			v.parse::<N>().map_err(|_| {
				BuildError::message(format!("attribute '{name}'='{v}' is not a number"))
			})
		})
		.transpose()
}

#[cfg(test)]
mod tests {
	use super::*;

	const BLOG_MAPPER: &str = r#"
	<mapper namespace="blog">
		<sql id="columns">id, title</sql>
		<resultMap id="blogMap" type="map">
			<id property="id" column="id"/>
			<result property="title" column="title"/>
		</resultMap>
		<select id="findAll" resultMap="blogMap">
			SELECT <include refid="columns"/> FROM blog
		</select>
		<select id="findOne" resultType="map">
			SELECT * FROM blog WHERE id = #{id}
		</select>
		<insert id="create" useGeneratedKeys="true" keyProperty="id">
			INSERT INTO blog (title) VALUES (#{title})
		</insert>
	</mapper>
	"#;

	fn build() -> Configuration {
		let configuration = Configuration::new();
		let builder = XmlMapperBuilder::parse_document(BLOG_MAPPER).unwrap();
		builder.parse_into(&configuration).unwrap();
		configuration.assert_resolved().unwrap();
		configuration
	}

	#[test]
	fn test_statements_registered_with_namespace() {
		let configuration = build();
		assert!(configuration.mapped_statement("blog.findAll").is_some());
		assert!(configuration.mapped_statement("blog.findOne").is_some());
		let insert = configuration.mapped_statement("blog.create").unwrap();
		assert_eq!(insert.key_generator, KeyGeneratorKind::Driver);
		assert_eq!(insert.key_properties, vec!["id".to_string()]);
	}

	#[test]
	fn test_include_fragment_spliced() {
		let configuration = build();
		let statement = configuration.mapped_statement("blog.findAll").unwrap();
		let bound = statement
			.bound_sql(&configuration, &grappelli_core::value::Value::Null)
			.unwrap();
		assert!(bound.sql.contains("id, title"));
	}

	#[test]
	fn test_inline_result_map_created_for_result_type() {
		let configuration = build();
		let statement = configuration.mapped_statement("blog.findOne").unwrap();
		assert_eq!(statement.result_map_ids, vec!["blog.findOne-Inline".to_string()]);
		assert!(configuration.result_map("blog.findOne-Inline").is_some());
	}

	#[test]
	fn test_database_id_filtering() {
		let mut configuration = Configuration::new();
		configuration.set_database_id(Some("mysql".to_string()));
		let doc = r#"
		<mapper namespace="m">
			<select id="now" databaseId="oracle" resultType="string">SELECT sysdate FROM dual</select>
			<select id="now" databaseId="mysql" resultType="string">SELECT now()</select>
			<select id="other" databaseId="postgres" resultType="string">SELECT 1</select>
		</mapper>
		"#;
		let builder = XmlMapperBuilder::parse_document(doc).unwrap();
		builder.parse_into(&configuration).unwrap();
		let statement = configuration.mapped_statement("m.now").unwrap();
		assert_eq!(statement.database_id.as_deref(), Some("mysql"));
		assert!(configuration.mapped_statement("m.other").is_none());
	}

	#[test]
	fn test_result_map_extends_pending_then_resolves() {
		let configuration = Configuration::new();
		let child = xml::parse_document(
			r#"<resultMap id="child" type="map" extends="base"><result property="b" column="b"/></resultMap>"#,
		)
		.unwrap();
		assert!(!try_build_result_map(&configuration, "m", &child).unwrap());
		let base = xml::parse_document(
			r#"<resultMap id="base" type="map"><id property="a" column="a"/></resultMap>"#,
		)
		.unwrap();
		assert!(try_build_result_map(&configuration, "m", &base).unwrap());
		assert!(try_build_result_map(&configuration, "m", &child).unwrap());
		let built = configuration.result_map("m.child").unwrap();
		assert_eq!(built.result_mappings.len(), 2);
	}

	#[test]
	fn test_select_key_registers_companion_statement() {
		let configuration = Configuration::new();
		let doc = r#"
		<mapper namespace="m">
			<insert id="create" keyProperty="id">
				<selectKey keyProperty="id" resultType="long" order="BEFORE">
					SELECT seq_blog.nextval
				</selectKey>
				INSERT INTO blog (id, title) VALUES (#{id}, #{title})
			</insert>
		</mapper>
		"#;
		let builder = XmlMapperBuilder::parse_document(doc).unwrap();
		builder.parse_into(&configuration).unwrap();
		let insert = configuration.mapped_statement("m.create").unwrap();
		assert_eq!(
			insert.key_generator,
			KeyGeneratorKind::SelectKey {
				statement_id: "m.create!selectKey".to_string(),
				execute_before: true,
			}
		);
		assert!(configuration.mapped_statement("m.create!selectKey").is_some());
		// the selectKey body must not leak into the insert SQL
		let bound = insert
			.bound_sql(&configuration, &grappelli_core::value::Value::Null)
			.unwrap();
		assert!(!bound.sql.contains("nextval"));
	}
}
