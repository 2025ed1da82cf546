//! Configuration document ingestion.
//!
//! Environment components, interceptors, type handlers, and mapper modules
//! are code, not class names, so the builder resolves the document's `type`
//! attributes against registries the embedding application fills before
//! parsing. The builder parses exactly once.

use std::collections::HashMap;
use std::sync::Arc;

use grappelli_core::driver::DataSource;
use grappelli_core::meta::TypeDescriptor;
use grappelli_core::transaction::TransactionFactory;
use grappelli_core::types::{JdbcType, TypeHandler};
use grappelli_core::xml::{self, XmlElement};
use grappelli_mapping::{
	BuildError, Configuration, DatabaseIdProvider, Environment, Interceptor,
	VendorDatabaseIdProvider,
};
use tracing::debug;

use crate::descriptor::MapperModule;
use crate::mapper::{self, XmlMapperBuilder};

/// Children of `<configuration>` in their required order; `properties`
/// leads and `mappers` closes.
const ELEMENT_ORDER: &[&str] = &[
	"properties",
	"settings",
	"typeAliases",
	"typeHandlers",
	"objectFactory",
	"objectWrapperFactory",
	"reflectorFactory",
	"plugins",
	"environments",
	"databaseIdProvider",
	"mappers",
];

#[derive(Default)]
pub struct XmlConfigBuilder {
	parsed: bool,
	data_sources: HashMap<String, Arc<dyn DataSource>>,
	transaction_factories: HashMap<String, Arc<dyn TransactionFactory>>,
	interceptors: HashMap<String, Arc<dyn Interceptor>>,
	type_handlers: HashMap<String, Arc<dyn TypeHandler>>,
	descriptor_batches: HashMap<String, Vec<TypeDescriptor>>,
	mapper_modules: HashMap<String, MapperModule>,
	module_packages: HashMap<String, Vec<String>>,
	resources: HashMap<String, String>,
}

impl XmlConfigBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a data source under the name `<dataSource type=…>` uses.
	pub fn data_source(mut self, name: &str, data_source: Arc<dyn DataSource>) -> Self {
		self.data_sources.insert(name.to_string(), data_source);
		self
	}

	pub fn transaction_factory(
		mut self,
		name: &str,
		factory: Arc<dyn TransactionFactory>,
	) -> Self {
		self.transaction_factories.insert(name.to_string(), factory);
		self
	}

	pub fn interceptor(mut self, name: &str, interceptor: Arc<dyn Interceptor>) -> Self {
		self.interceptors.insert(name.to_string(), interceptor);
		self
	}

	pub fn type_handler(mut self, name: &str, handler: Arc<dyn TypeHandler>) -> Self {
		self.type_handlers.insert(name.to_string(), handler);
		self
	}

	/// A batch of type descriptors selectable via `<package name=…>` under
	/// `<typeAliases>`.
	pub fn descriptor_batch(mut self, name: &str, descriptors: Vec<TypeDescriptor>) -> Self {
		self.descriptor_batches.insert(name.to_string(), descriptors);
		self
	}

	/// A mapper declared in code, selectable via `<mapper class=…>`.
	pub fn mapper_module(mut self, name: &str, module: MapperModule) -> Self {
		self.mapper_modules.insert(name.to_string(), module);
		self
	}

	/// A group of mapper modules selectable via `<package name=…>` under
	/// `<mappers>`.
	pub fn module_package(mut self, name: &str, modules: Vec<&str>) -> Self {
		self.module_packages
			.insert(name.to_string(), modules.iter().map(|m| m.to_string()).collect());
		self
	}

	/// Registers an in-memory resource for `resource=` references; the
	/// filesystem is consulted when no registered resource matches.
	pub fn resource(mut self, name: &str, content: &str) -> Self {
		self.resources.insert(name.to_string(), content.to_string());
		self
	}

	pub fn parse(mut self, document: &str) -> Result<Configuration, BuildError> {
		if self.parsed {
			return Err(BuildError::AlreadyParsed);
		}
		self.parsed = true;
		let root = xml::parse_document(document)?;
		if root.name != "configuration" {
			return Err(BuildError::message(format!(
				"configuration document root must be <configuration>, found <{}>",
				root.name
			)));
		}
		check_element_order(&root)?;
		let mut configuration = Configuration::new();

		if let Some(properties) = root.element("properties") {
			self.parse_properties(&mut configuration, properties)?;
		}
		if let Some(settings) = root.element("settings") {
			for setting in settings.elements().filter(|e| e.name == "setting") {
				let name = required_attr(setting, "name")?;
				let value = required_attr(setting, "value")?;
				configuration.settings_mut().set(&name, &value)?;
			}
		}
		if let Some(aliases) = root.element("typeAliases") {
			self.parse_type_aliases(&configuration, aliases)?;
		}
		if let Some(handlers) = root.element("typeHandlers") {
			self.parse_type_handlers(&configuration, handlers)?;
		}
		for knob in ["objectFactory", "objectWrapperFactory", "reflectorFactory"] {
			if let Some(element) = root.element(knob) {
				let type_name = required_attr(element, "type")?;
				if type_name != "DEFAULT" {
					return Err(BuildError::message(format!(
						"<{knob}> only supports the built-in DEFAULT implementation here, found '{type_name}'"
					)));
				}
			}
		}
		if let Some(plugins) = root.element("plugins") {
			for plugin in plugins.elements().filter(|e| e.name == "plugin") {
				let name = required_attr(plugin, "interceptor")?;
				let interceptor = self.interceptors.get(&name).ok_or_else(|| {
					BuildError::message(format!("no interceptor registered as '{name}'"))
				})?;
				configuration.add_interceptor(Arc::clone(interceptor));
			}
		}
		if let Some(environments) = root.element("environments") {
			self.parse_environments(&mut configuration, environments)?;
		}
		if let Some(provider) = root.element("databaseIdProvider") {
			self.parse_database_id_provider(&mut configuration, provider)?;
		}
		if let Some(mappers) = root.element("mappers") {
			self.parse_mappers(&configuration, mappers)?;
		}
		mapper::validate_statement_references(&configuration)?;
		Ok(configuration)
	}

	fn parse_properties(
		&self,
		configuration: &mut Configuration,
		element: &XmlElement,
	) -> Result<(), BuildError> {
		let resource = element.attr("resource");
		let url = element.attr("url");
		if resource.is_some() && url.is_some() {
			return Err(BuildError::message(
				"<properties> cannot carry both a resource and a url",
			));
		}
		if let Some(location) = resource {
			let content = self.load_resource(location)?;
			for (key, value) in parse_properties_file(&content) {
				configuration.set_variable(key, value);
			}
		} else if let Some(location) = url {
			let path = location.strip_prefix("file://").ok_or_else(|| {
				BuildError::message(format!("unsupported properties url '{location}'"))
			})?;
			let content = std::fs::read_to_string(path).map_err(|e| {
				BuildError::message(format!("cannot read properties url '{location}': {e}"))
			})?;
			for (key, value) in parse_properties_file(&content) {
				configuration.set_variable(key, value);
			}
		}
		// inline entries override loaded ones
		for property in element.elements().filter(|e| e.name == "property") {
			let name = required_attr(property, "name")?;
			let value = required_attr(property, "value")?;
			configuration.set_variable(name, value);
		}
		Ok(())
	}

	fn parse_type_aliases(
		&self,
		configuration: &Configuration,
		element: &XmlElement,
	) -> Result<(), BuildError> {
		for child in element.elements() {
			match child.name.as_str() {
				"typeAlias" => {
					let alias = required_attr(child, "alias")?;
					let type_name = required_attr(child, "type")?;
					let resolved = configuration.type_aliases().resolve(&type_name);
					configuration.type_aliases_mut().register_alias(&alias, resolved);
				}
				"package" => {
					let name = required_attr(child, "name")?;
					let batch = self.descriptor_batches.get(&name).ok_or_else(|| {
						BuildError::message(format!(
							"no descriptor batch registered as '{name}'"
						))
					})?;
					let mut aliases = configuration.type_aliases_mut();
					for descriptor in batch {
						aliases.register_type(descriptor.clone());
					}
				}
				other => {
					return Err(BuildError::message(format!(
						"unexpected element <{other}> in <typeAliases>"
					)));
				}
			}
		}
		Ok(())
	}

	fn parse_type_handlers(
		&self,
		configuration: &Configuration,
		element: &XmlElement,
	) -> Result<(), BuildError> {
		for child in element.elements().filter(|e| e.name == "typeHandler") {
			let name = required_attr(child, "handler")?;
			let handler = self.type_handlers.get(&name).ok_or_else(|| {
				BuildError::message(format!("no type handler registered as '{name}'"))
			})?;
			configuration.register_named_type_handler(&name, Arc::clone(handler));
			if let Some(java) = child.attr("javaType") {
				let java = configuration.type_aliases().resolve(java);
				let jdbc = child
					.attr("jdbcType")
					.map(|j| {
						JdbcType::parse(j).ok_or_else(|| {
							BuildError::message(format!("unknown jdbcType '{j}'"))
						})
					})
					.transpose()?;
				configuration.type_handlers_mut().register(java, jdbc, Arc::clone(handler));
			}
		}
		Ok(())
	}

	fn parse_environments(
		&self,
		configuration: &mut Configuration,
		element: &XmlElement,
	) -> Result<(), BuildError> {
		let default = required_attr(element, "default")?;
		for environment in element.elements().filter(|e| e.name == "environment") {
			let id = required_attr(environment, "id")?;
			if id != default {
				continue;
			}
			let tx_element = environment.element("transactionManager").ok_or_else(|| {
				BuildError::message(format!("environment '{id}' lacks a transactionManager"))
			})?;
			let tx_type = required_attr(tx_element, "type")?;
			let factory = self.transaction_factories.get(&tx_type).ok_or_else(|| {
				BuildError::message(format!("no transaction factory registered as '{tx_type}'"))
			})?;
			let ds_element = environment.element("dataSource").ok_or_else(|| {
				BuildError::message(format!("environment '{id}' lacks a dataSource"))
			})?;
			let ds_type = required_attr(ds_element, "type")?;
			let data_source = self.data_sources.get(&ds_type).ok_or_else(|| {
				BuildError::message(format!("no data source registered as '{ds_type}'"))
			})?;
			configuration.set_environment(Environment::new(
				id,
				Arc::clone(factory),
				Arc::clone(data_source),
			));
			return Ok(());
		}
		Err(BuildError::message(format!(
			"default environment '{default}' was not declared"
		)))
	}

	fn parse_database_id_provider(
		&self,
		configuration: &mut Configuration,
		element: &XmlElement,
	) -> Result<(), BuildError> {
		let provider_type = required_attr(element, "type")?;
		if provider_type != "DB_VENDOR" {
			return Err(BuildError::message(format!(
				"unknown databaseIdProvider type '{provider_type}'"
			)));
		}
		let entries: Vec<(String, String)> = element
			.elements()
			.filter(|e| e.name == "property")
			.map(|p| Ok((required_attr(p, "name")?, required_attr(p, "value")?)))
			.collect::<Result<_, BuildError>>()?;
		let provider = VendorDatabaseIdProvider::new(entries);
		let Some(environment) = configuration.environment() else {
			return Ok(());
		};
		let database_id = provider
			.database_id(environment.data_source.as_ref())
			.map_err(|e| BuildError::message(format!("databaseIdProvider failed: {e}")))?;
		debug!(?database_id, "resolved database id");
		configuration.set_database_id(database_id);
		Ok(())
	}

	fn parse_mappers(
		&self,
		configuration: &Configuration,
		element: &XmlElement,
	) -> Result<(), BuildError> {
		let mut documents = Vec::new();
		let mut modules: Vec<&MapperModule> = Vec::new();
		for entry in element.elements() {
			match entry.name.as_str() {
				"mapper" => {
					let sources = [
						entry.attr("resource"),
						entry.attr("url"),
						entry.attr("class"),
					];
					if sources.iter().flatten().count() != 1 {
						return Err(BuildError::message(
							"<mapper> requires exactly one of resource, url, or class",
						));
					}
					if let Some(location) = entry.attr("resource") {
						let content = self.load_resource(location)?;
						documents.push(XmlMapperBuilder::parse_document(&content)?);
					} else if let Some(location) = entry.attr("url") {
						let path = location.strip_prefix("file://").ok_or_else(|| {
							BuildError::message(format!("unsupported mapper url '{location}'"))
						})?;
						let content = std::fs::read_to_string(path).map_err(|e| {
							BuildError::message(format!(
								"cannot read mapper url '{location}': {e}"
							))
						})?;
						documents.push(XmlMapperBuilder::parse_document(&content)?);
					} else if let Some(class) = entry.attr("class") {
						modules.push(self.mapper_modules.get(class).ok_or_else(|| {
							BuildError::message(format!(
								"no mapper module registered as '{class}'"
							))
						})?);
					}
				}
				"package" => {
					let name = required_attr(entry, "name")?;
					let members = self.module_packages.get(&name).ok_or_else(|| {
						BuildError::message(format!("no module package registered as '{name}'"))
					})?;
					for member in members {
						modules.push(self.mapper_modules.get(member).ok_or_else(|| {
							BuildError::message(format!(
								"module package '{name}' names unregistered module '{member}'"
							))
						})?);
					}
				}
				other => {
					return Err(BuildError::message(format!(
						"unexpected element <{other}> in <mappers>"
					)));
				}
			}
		}
		// phase 1 across all documents, so cross-file references can land
		for document in &documents {
			document.register_shared(configuration)?;
		}
		// phase 2 with a cross-file fixed-point retry
		let mut pending = Vec::new();
		for document in &documents {
			pending.extend(document.build_result_maps(configuration)?);
		}
		loop {
			let before = pending.len();
			let mut still = Vec::new();
			for (namespace, element) in pending {
				if !mapper::try_build_result_map(configuration, &namespace, &element)? {
					still.push((namespace, element));
				}
			}
			pending = still;
			if pending.is_empty() || pending.len() == before {
				break;
			}
		}
		for (namespace, element) in pending {
			configuration.stage_incomplete(format!(
				"result map '{}' in namespace '{namespace}'",
				element.attr("id").unwrap_or("<anonymous>")
			));
		}
		// phase 3
		for document in &documents {
			document.build_statements(configuration)?;
		}
		for module in modules {
			module.register(configuration, &self.resources)?;
		}
		Ok(())
	}

	fn load_resource(&self, location: &str) -> Result<String, BuildError> {
		if let Some(registered) = self.resources.get(location) {
			return Ok(registered.clone());
		}
		std::fs::read_to_string(location).map_err(|e| {
			BuildError::message(format!("cannot read resource '{location}': {e}"))
		})
	}
}

fn check_element_order(root: &XmlElement) -> Result<(), BuildError> {
	let mut last_rank = 0usize;
	for element in root.elements() {
		let Some(rank) = ELEMENT_ORDER.iter().position(|n| *n == element.name) else {
			return Err(BuildError::message(format!(
				"unexpected element <{}> in <configuration>",
				element.name
			)));
		};
		if rank < last_rank {
			return Err(BuildError::message(format!(
				"<{}> is out of order; configuration children follow the order {ELEMENT_ORDER:?}",
				element.name
			)));
		}
		last_rank = rank;
	}
	Ok(())
}

/// `key=value` lines; `#` and `!` comment lines and blanks are skipped.
fn parse_properties_file(content: &str) -> Vec<(String, String)> {
	content
		.lines()
		.map(str::trim)
		.filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
		.filter_map(|line| {
			line.split_once('=')
				.map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
		})
		.collect()
}

fn required_attr(element: &XmlElement, name: &str) -> Result<String, BuildError> {
	element.attr(name).map(String::from).ok_or_else(|| {
		BuildError::message(format!("<{}> requires a '{name}' attribute", element.name))
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_element_order_enforced() {
		let root = xml::parse_document(
			"<configuration><settings></settings><properties></properties></configuration>",
		)
		.unwrap();
		assert!(check_element_order(&root).is_err());
	}

	#[test]
	fn test_properties_file_parse() {
		let parsed = parse_properties_file("# comment\nuser=sa\n\npassword = secret\n");
		assert_eq!(
			parsed,
			vec![
				("user".to_string(), "sa".to_string()),
				("password".to_string(), "secret".to_string()),
			]
		);
	}

	#[test]
	fn test_parse_is_single_use() {
		let mut builder = XmlConfigBuilder::new();
		builder.parsed = true;
		assert!(matches!(
			builder.parse("<configuration></configuration>"),
			Err(BuildError::AlreadyParsed)
		));
	}

	#[test]
	fn test_settings_applied() {
		let document = r#"
		<configuration>
			<settings>
				<setting name="cacheEnabled" value="false"/>
				<setting name="mapUnderscoreToCamelCase" value="true"/>
			</settings>
		</configuration>
		"#;
		let configuration = XmlConfigBuilder::new().parse(document).unwrap();
		assert!(!configuration.settings().cache_enabled);
		assert!(configuration.settings().map_underscore_to_camel_case);
	}

	#[test]
	fn test_unknown_setting_is_fatal() {
		let document = r#"
		<configuration>
			<settings><setting name="numberOfPonies" value="7"/></settings>
		</configuration>
		"#;
		assert!(XmlConfigBuilder::new().parse(document).is_err());
	}

	#[test]
	fn test_mapper_resource_falls_back_to_the_filesystem() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("fs-mapper.xml");
		std::fs::write(
			&path,
			r#"<mapper namespace="fs"><select id="one" resultType="map">SELECT 1</select></mapper>"#,
		)
		.unwrap();
		let document = format!(
			r#"<configuration><mappers><mapper resource="{}"/></mappers></configuration>"#,
			path.display()
		);
		let configuration = XmlConfigBuilder::new().parse(&document).unwrap();
		assert!(configuration.mapped_statement("fs.one").is_some());
	}

	#[test]
	fn test_properties_resource_and_url_are_exclusive() {
		let document = r#"
		<configuration>
			<properties resource="a.properties" url="file:///b.properties"/>
		</configuration>
		"#;
		let builder = XmlConfigBuilder::new().resource("a.properties", "x=1");
		assert!(builder.parse(document).is_err());
	}
}
