//! Binds the ordered parameter mappings onto a prepared statement.

use grappelli_core::driver::Statement;
use grappelli_core::types::TypeHandler;
use grappelli_mapping::{BoundSql, Configuration, ParameterMode};

use crate::error::ExecutorError;

pub struct ParameterHandler<'a> {
	configuration: &'a Configuration,
	statement_id: &'a str,
	bound: &'a BoundSql,
}

impl<'a> ParameterHandler<'a> {
	pub fn new(
		configuration: &'a Configuration,
		statement_id: &'a str,
		bound: &'a BoundSql,
	) -> Self {
		Self { configuration, statement_id, bound }
	}

	/// Binds one value per IN/INOUT mapping, positionally. Nulls bind
	/// through the mapping's jdbc type, falling back to `jdbcTypeForNull`.
	pub fn set_parameters(&self, stmt: &mut dyn Statement) -> Result<(), ExecutorError> {
		for (index, mapping) in self.bound.parameter_mappings.iter().enumerate() {
			if mapping.mode == ParameterMode::Out {
				continue;
			}
			let value = self.bound.parameter_value(&mapping.property);
			if value.is_null() {
				let jdbc = mapping
					.jdbc_type
					.unwrap_or(self.configuration.settings().jdbc_type_for_null);
				stmt.bind_null(index, jdbc)
					.map_err(|e| ExecutorError::driver(self.statement_id, &self.bound.sql, e))?;
				continue;
			}
			let handler = self.resolve_handler(mapping)?;
			handler
				.set_parameter(stmt, index, &value, mapping.jdbc_type)
				.map_err(|e| ExecutorError::type_error(self.statement_id, e))?;
		}
		Ok(())
	}

	fn resolve_handler(
		&self,
		mapping: &grappelli_mapping::ParameterMapping,
	) -> Result<std::sync::Arc<dyn TypeHandler>, ExecutorError> {
		if let Some(explicit) = &mapping.type_handler {
			return Ok(std::sync::Arc::clone(explicit));
		}
		if mapping.java_type.is_none() {
			// runtime resolution from the actual value
			return Ok(self.configuration.type_handlers().unknown());
		}
		self.configuration
			.resolve_type_handler(mapping.java_type.as_ref(), mapping.jdbc_type)
			.map_err(|e| ExecutorError::type_error(self.statement_id, e))
	}
}
