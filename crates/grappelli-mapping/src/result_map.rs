//! Result maps: declarative projections from columns to target types, with
//! nested and discriminated variants.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use grappelli_core::types::{JavaType, JdbcType, TypeHandler};

use crate::error::BuildError;

/// One column-to-property rule inside a result map.
#[derive(Clone)]
pub struct ResultMapping {
	/// Target property, or constructor argument name for constructor rules.
	pub property: Option<String>,
	pub column: Option<String>,
	pub java_type: Option<JavaType>,
	pub jdbc_type: Option<JdbcType>,
	pub type_handler: Option<Arc<dyn TypeHandler>>,
	/// Statement executed to fetch this property (lazy association).
	pub nested_select_id: Option<String>,
	/// Result map applied to joined columns of the same row (eager join).
	pub nested_result_map_id: Option<String>,
	/// Columns that must all be non-null for a nested row to be created.
	pub not_null_columns: HashSet<String>,
	pub column_prefix: Option<String>,
	/// `{prop=col,…}` composite columns feeding a nested select.
	pub composites: Vec<(String, String)>,
	/// Links rows of a named extra result set back to this property.
	pub result_set: Option<String>,
	pub foreign_column: Option<String>,
	pub id_flag: bool,
	pub constructor_flag: bool,
	pub lazy: bool,
}

impl ResultMapping {
	pub fn new(property: Option<String>, column: Option<String>) -> Self {
		Self {
			property,
			column,
			java_type: None,
			jdbc_type: None,
			type_handler: None,
			nested_select_id: None,
			nested_result_map_id: None,
			not_null_columns: HashSet::new(),
			column_prefix: None,
			composites: Vec::new(),
			result_set: None,
			foreign_column: None,
			id_flag: false,
			constructor_flag: false,
			lazy: false,
		}
	}

	pub fn validate(&self, result_map_id: &str) -> Result<(), BuildError> {
		if self.nested_select_id.is_some() && self.nested_result_map_id.is_some() {
			return Err(BuildError::message(format!(
				"mapping for '{}' in result map '{result_map_id}' declares both a nested select and a nested result map",
				self.property.as_deref().unwrap_or("<constructor arg>"),
			)));
		}
		if !self.constructor_flag && self.property.is_none() && self.result_set.is_none() {
			return Err(BuildError::message(format!(
				"mapping in result map '{result_map_id}' has no target property"
			)));
		}
		Ok(())
	}
}

impl std::fmt::Debug for ResultMapping {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ResultMapping")
			.field("property", &self.property)
			.field("column", &self.column)
			.field("nested_select_id", &self.nested_select_id)
			.field("nested_result_map_id", &self.nested_result_map_id)
			.field("id_flag", &self.id_flag)
			.field("constructor_flag", &self.constructor_flag)
			.field("lazy", &self.lazy)
			.finish()
	}
}

/// Selects a sub-result-map from a column value.
#[derive(Clone)]
pub struct Discriminator {
	pub column: String,
	pub java_type: Option<JavaType>,
	pub jdbc_type: Option<JdbcType>,
	pub type_handler: Option<Arc<dyn TypeHandler>>,
	/// Column value → result map id; cases are disjoint by construction.
	pub cases: HashMap<String, String>,
}

impl std::fmt::Debug for Discriminator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Discriminator")
			.field("column", &self.column)
			.field("cases", &self.cases)
			.finish()
	}
}

/// An immutable projection tree.
#[derive(Debug, Clone)]
pub struct ResultMap {
	pub id: String,
	pub type_: JavaType,
	pub result_mappings: Vec<ResultMapping>,
	pub discriminator: Option<Discriminator>,
	/// Per-map auto-mapping override; None falls back to the global setting.
	pub auto_mapping: Option<bool>,
	// derived views, computed once at build
	id_indexes: Vec<usize>,
	constructor_indexes: Vec<usize>,
	property_indexes: Vec<usize>,
	mapped_columns: HashSet<String>,
	mapped_properties: HashSet<String>,
	has_nested_result_maps: bool,
	has_nested_selects: bool,
}

impl ResultMap {
	pub fn builder(id: impl Into<String>, type_: JavaType) -> ResultMapBuilder {
		ResultMapBuilder {
			id: id.into(),
			type_,
			result_mappings: Vec::new(),
			discriminator: None,
			auto_mapping: None,
		}
	}

	pub fn id_mappings(&self) -> impl Iterator<Item = &ResultMapping> {
		self.id_indexes.iter().map(|i| &self.result_mappings[*i])
	}

	/// ID rules, falling back to all property rules when none are declared.
	pub fn grouping_mappings(&self) -> Vec<&ResultMapping> {
		if self.id_indexes.is_empty() {
			self.property_mappings().collect()
		} else {
			self.id_mappings().collect()
		}
	}

	pub fn constructor_mappings(&self) -> impl Iterator<Item = &ResultMapping> {
		self.constructor_indexes.iter().map(|i| &self.result_mappings[*i])
	}

	pub fn property_mappings(&self) -> impl Iterator<Item = &ResultMapping> {
		self.property_indexes.iter().map(|i| &self.result_mappings[*i])
	}

	pub fn has_mapped_column(&self, column: &str) -> bool {
		self.mapped_columns.contains(&column.to_uppercase())
	}

	pub fn has_mapped_property(&self, property: &str) -> bool {
		self.mapped_properties.contains(property)
	}

	pub fn has_nested_result_maps(&self) -> bool {
		self.has_nested_result_maps
	}

	pub fn has_nested_selects(&self) -> bool {
		self.has_nested_selects
	}
}

pub struct ResultMapBuilder {
	id: String,
	type_: JavaType,
	result_mappings: Vec<ResultMapping>,
	discriminator: Option<Discriminator>,
	auto_mapping: Option<bool>,
}

impl ResultMapBuilder {
	pub fn mapping(mut self, mapping: ResultMapping) -> Self {
		self.result_mappings.push(mapping);
		self
	}

	pub fn mappings(mut self, mappings: Vec<ResultMapping>) -> Self {
		self.result_mappings.extend(mappings);
		self
	}

	pub fn discriminator(mut self, discriminator: Discriminator) -> Self {
		self.discriminator = Some(discriminator);
		self
	}

	pub fn auto_mapping(mut self, auto_mapping: Option<bool>) -> Self {
		self.auto_mapping = auto_mapping;
		self
	}

	pub fn build(self) -> Result<ResultMap, BuildError> {
		let mut id_indexes = Vec::new();
		let mut constructor_indexes = Vec::new();
		let mut property_indexes = Vec::new();
		let mut mapped_columns = HashSet::new();
		let mut mapped_properties = HashSet::new();
		let mut has_nested_result_maps = false;
		let mut has_nested_selects = false;
		for (i, mapping) in self.result_mappings.iter().enumerate() {
			mapping.validate(&self.id)?;
			if mapping.id_flag {
				id_indexes.push(i);
			}
			if mapping.constructor_flag {
				constructor_indexes.push(i);
			} else {
				property_indexes.push(i);
			}
			if let Some(column) = &mapping.column {
				mapped_columns.insert(column.to_uppercase());
			}
			for (_, column) in &mapping.composites {
				mapped_columns.insert(column.to_uppercase());
			}
			if let Some(property) = &mapping.property {
				mapped_properties.insert(property.clone());
			}
			// linked extra-result-set mappings resolve from another result
			// set, not from joined columns of this one
			has_nested_result_maps |=
				mapping.nested_result_map_id.is_some() && mapping.result_set.is_none();
			has_nested_selects |= mapping.nested_select_id.is_some();
		}
		Ok(ResultMap {
			id: self.id,
			type_: self.type_,
			result_mappings: self.result_mappings,
			discriminator: self.discriminator,
			auto_mapping: self.auto_mapping,
			id_indexes,
			constructor_indexes,
			property_indexes,
			mapped_columns,
			mapped_properties,
			has_nested_result_maps,
			has_nested_selects,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_builder_partitions_mappings() {
		let mut id_rule = ResultMapping::new(Some("id".into()), Some("id".into()));
		id_rule.id_flag = true;
		let mut ctor = ResultMapping::new(Some("title".into()), Some("title".into()));
		ctor.constructor_flag = true;
		let plain = ResultMapping::new(Some("body".into()), Some("body".into()));
		let map = ResultMap::builder("blog", JavaType::named("blog"))
			.mapping(id_rule)
			.mapping(ctor)
			.mapping(plain)
			.build()
			.unwrap();
		assert_eq!(map.id_mappings().count(), 1);
		assert_eq!(map.constructor_mappings().count(), 1);
		assert_eq!(map.property_mappings().count(), 2);
		assert!(map.has_mapped_column("TITLE"));
		assert!(map.has_mapped_property("body"));
	}

	#[test]
	fn test_both_nested_forms_rejected() {
		let mut bad = ResultMapping::new(Some("author".into()), Some("author_id".into()));
		bad.nested_select_id = Some("findAuthor".into());
		bad.nested_result_map_id = Some("authorMap".into());
		let result = ResultMap::builder("blog", JavaType::named("blog")).mapping(bad).build();
		assert!(result.is_err());
	}
}
