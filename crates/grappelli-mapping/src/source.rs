//! SQL sources: from parsed script to per-invocation bound SQL.
//!
//! A raw source renders once at build time; a dynamic source renders per
//! invocation. Both finish with the same pass that swaps each `#{…}` token
//! for a positional marker and records an ordered parameter mapping.

use grappelli_core::token::TokenParser;
use grappelli_core::value::Value;
use indexmap::IndexMap;

use crate::bound::BoundSql;
use crate::config::Configuration;
use crate::dynamic::{DynamicContext, SqlNode};
use crate::error::BuildError;
use crate::parameter::{ParameterMapping, ParameterMode};

/// Produces the bound SQL for one invocation.
pub trait SqlSource: Send + Sync {
	fn bound_sql(
		&self,
		configuration: &Configuration,
		parameter: &Value,
	) -> Result<BoundSql, BuildError>;
}

/// Fully compiled SQL with its parameter mappings, ready to bind.
pub struct StaticSqlSource {
	pub sql: String,
	pub parameter_mappings: Vec<ParameterMapping>,
}

impl StaticSqlSource {
	pub fn new(sql: String, parameter_mappings: Vec<ParameterMapping>) -> Self {
		Self { sql, parameter_mappings }
	}
}

impl SqlSource for StaticSqlSource {
	fn bound_sql(
		&self,
		_configuration: &Configuration,
		parameter: &Value,
	) -> Result<BoundSql, BuildError> {
		Ok(BoundSql::new(self.sql.clone(), self.parameter_mappings.clone(), parameter.clone()))
	}
}

/// A script without dynamic tags: rendered and compiled once at build.
pub struct RawSqlSource {
	delegate: StaticSqlSource,
}

impl RawSqlSource {
	pub fn new(configuration: &Configuration, root: &SqlNode) -> Result<Self, BuildError> {
		let mut ctx = DynamicContext::new(&Value::Null, configuration.database_id());
		root.apply(&mut ctx)?;
		let (sql, parameter_mappings) =
			SqlSourceBuilder::parse(configuration, &ctx.sql(), ctx.bindings())?;
		Ok(Self { delegate: StaticSqlSource::new(sql, parameter_mappings) })
	}
}

impl SqlSource for RawSqlSource {
	fn bound_sql(
		&self,
		configuration: &Configuration,
		parameter: &Value,
	) -> Result<BoundSql, BuildError> {
		self.delegate.bound_sql(configuration, parameter)
	}
}

/// A script with dynamic tags: the node tree renders on every invocation.
pub struct DynamicSqlSource {
	root: SqlNode,
}

impl DynamicSqlSource {
	pub fn new(root: SqlNode) -> Self {
		Self { root }
	}
}

impl SqlSource for DynamicSqlSource {
	fn bound_sql(
		&self,
		configuration: &Configuration,
		parameter: &Value,
	) -> Result<BoundSql, BuildError> {
		let mut ctx = DynamicContext::new(parameter, configuration.database_id());
		self.root.apply(&mut ctx)?;
		let (sql, parameter_mappings) =
			SqlSourceBuilder::parse(configuration, &ctx.sql(), ctx.bindings())?;
		let mut bound = BoundSql::new(sql, parameter_mappings, parameter.clone());
		for (name, value) in ctx.bindings() {
			bound.set_additional_parameter(name, value.clone());
		}
		Ok(bound)
	}
}

const PARAMETER_PROPERTIES: &str =
	"javaType,jdbcType,mode,numericScale,resultMap,typeHandler,jdbcTypeName";

/// The `#{…}` placeholder compiler.
pub struct SqlSourceBuilder;

impl SqlSourceBuilder {
	/// Replaces each `#{…}` with `?` and returns the ordered mappings.
	pub fn parse(
		configuration: &Configuration,
		sql: &str,
		_additional: &IndexMap<String, Value>,
	) -> Result<(String, Vec<ParameterMapping>), BuildError> {
		let source = if configuration.settings().shrink_whitespaces_in_sql {
			shrink_whitespaces(sql)
		} else {
			sql.to_string()
		};
		let mut mappings = Vec::new();
		let compiled = TokenParser::new("#{", "}").parse(&source, |content| {
			mappings.push(Self::build_parameter_mapping(configuration, content)?);
			Ok::<String, BuildError>("?".to_string())
		})?;
		Ok((compiled, mappings))
	}

	fn build_parameter_mapping(
		configuration: &Configuration,
		content: &str,
	) -> Result<ParameterMapping, BuildError> {
		let mut pieces = content.split(',');
		let property = pieces.next().unwrap_or("").trim();
		if property.is_empty() {
			return Err(BuildError::message(format!(
				"empty property in parameter mapping #{{{content}}}"
			)));
		}
		let mut mapping = ParameterMapping::new(property);
		for piece in pieces {
			let Some((name, value)) = piece.split_once('=') else {
				return Err(BuildError::message(format!(
					"malformed attribute '{piece}' in parameter mapping #{{{content}}}; expected name=value"
				)));
			};
			let name = name.trim();
			let value = value.trim();
			match name {
				"javaType" => {
					mapping.java_type = Some(configuration.type_aliases().resolve(value));
				}
				"jdbcType" => {
					mapping.jdbc_type =
						Some(grappelli_core::types::JdbcType::parse(value).ok_or_else(
							|| {
								BuildError::message(format!(
									"unknown jdbcType '{value}' in #{{{content}}}"
								))
							},
						)?);
				}
				"mode" => {
					mapping.mode = ParameterMode::parse(value).ok_or_else(|| {
						BuildError::message(format!("unknown mode '{value}' in #{{{content}}}"))
					})?;
				}
				"numericScale" => {
					mapping.numeric_scale = Some(value.parse().map_err(|_| {
						BuildError::message(format!(
							"numericScale '{value}' is not a number in #{{{content}}}"
						))
					})?);
				}
				"resultMap" => {
					mapping.result_map_id = Some(value.to_string());
				}
				"typeHandler" => {
					mapping.type_handler =
						Some(configuration.type_handler_by_name(value).ok_or_else(|| {
							BuildError::message(format!(
								"unknown typeHandler '{value}' in #{{{content}}}"
							))
						})?);
				}
				"jdbcTypeName" => {
					mapping.jdbc_type_name = Some(value.to_string());
				}
				"expression" => {
					return Err(BuildError::message(
						"expression based parameters are not supported",
					));
				}
				other => {
					return Err(BuildError::message(format!(
						"invalid property '{other}' in mapping #{{{content}}}; valid properties are {PARAMETER_PROPERTIES}"
					)));
				}
			}
		}
		Ok(mapping)
	}
}

/// Collapses all whitespace runs to single spaces.
pub fn shrink_whitespaces(original: &str) -> String {
	original.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::Configuration;
	use grappelli_core::types::JdbcType;

	#[test]
	fn test_placeholders_become_positional_markers() {
		let config = Configuration::new();
		let (sql, mappings) = SqlSourceBuilder::parse(
			&config,
			"SELECT * FROM t WHERE a = #{a} AND b = #{b,jdbcType=VARCHAR}",
			&IndexMap::new(),
		)
		.unwrap();
		assert_eq!(sql, "SELECT * FROM t WHERE a = ? AND b = ?");
		assert_eq!(mappings.len(), 2);
		assert_eq!(mappings[0].property, "a");
		assert_eq!(mappings[1].jdbc_type, Some(JdbcType::Varchar));
	}

	#[test]
	fn test_full_attribute_set() {
		let config = Configuration::new();
		let (_, mappings) = SqlSourceBuilder::parse(
			&config,
			"#{dept, javaType=int, jdbcType=NUMERIC, mode=INOUT, numericScale=2}",
			&IndexMap::new(),
		)
		.unwrap();
		assert_eq!(mappings[0].mode, ParameterMode::InOut);
		assert_eq!(mappings[0].numeric_scale, Some(2));
	}

	#[test]
	fn test_expression_attribute_rejected() {
		let config = Configuration::new();
		assert!(SqlSourceBuilder::parse(&config, "#{a,expression=b}", &IndexMap::new()).is_err());
	}

	#[test]
	fn test_unknown_attribute_rejected() {
		let config = Configuration::new();
		assert!(SqlSourceBuilder::parse(&config, "#{a,bogus=1}", &IndexMap::new()).is_err());
	}

	#[test]
	fn test_shrink_whitespaces() {
		assert_eq!(shrink_whitespaces("a \n\t b   c"), "a b c");
	}
}
