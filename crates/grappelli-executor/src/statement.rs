//! Statement handlers: one per statement kind, owning the bound SQL and
//! driving prepare / parameterize / execute against the driver.

use std::sync::Arc;
use std::time::Duration;

use grappelli_core::driver::{Connection, ResultSet, Statement};
use grappelli_core::meta;
use grappelli_core::value::Value;
use grappelli_mapping::{BoundSql, Configuration, MappedStatement, StatementType};

use crate::error::ExecutorError;
use crate::parameter::ParameterHandler;

pub trait StatementHandler {
	fn bound_sql(&self) -> &BoundSql;

	/// Prepares the driver statement and applies timeout/fetch-size hints.
	/// The per-statement timeout is clamped to the remaining transaction
	/// budget when one is set.
	fn prepare(
		&self,
		connection: &mut dyn Connection,
		transaction_timeout: Option<Duration>,
	) -> Result<Box<dyn Statement>, ExecutorError>;

	fn parameterize(&self, stmt: &mut dyn Statement) -> Result<(), ExecutorError>;

	fn query(&self, stmt: &mut dyn Statement) -> Result<Box<dyn ResultSet>, ExecutorError>;

	fn update(&self, stmt: &mut dyn Statement) -> Result<u64, ExecutorError>;

	fn batch(&self, stmt: &mut dyn Statement) -> Result<(), ExecutorError>;

	/// Reads OUT parameter values back into the parameter object after
	/// execution. A no-op except for callable statements.
	fn process_output(
		&self,
		_stmt: &mut dyn Statement,
		_parameter: &mut Value,
	) -> Result<(), ExecutorError> {
		Ok(())
	}
}

/// Routes to the handler matching the statement kind.
pub fn new_statement_handler(
	configuration: Arc<Configuration>,
	ms: Arc<MappedStatement>,
	bound: BoundSql,
) -> Result<Box<dyn StatementHandler>, ExecutorError> {
	let base = BaseStatementHandler { configuration, ms, bound };
	Ok(match base.ms.statement_type {
		StatementType::Simple => Box::new(SimpleStatementHandler { base }),
		StatementType::Prepared => Box::new(PreparedStatementHandler { base }),
		StatementType::Callable => Box::new(CallableStatementHandler { base }),
	})
}

struct BaseStatementHandler {
	configuration: Arc<Configuration>,
	ms: Arc<MappedStatement>,
	bound: BoundSql,
}

impl BaseStatementHandler {
	fn prepare(
		&self,
		connection: &mut dyn Connection,
		transaction_timeout: Option<Duration>,
	) -> Result<Box<dyn Statement>, ExecutorError> {
		let mut stmt = connection
			.prepare(&self.bound.sql)
			.map_err(|e| ExecutorError::driver(&self.ms.id, &self.bound.sql, e))?;
		let configured = self
			.ms
			.timeout
			.or(self.configuration.settings().default_statement_timeout);
		let effective = match (configured, transaction_timeout) {
			(Some(statement), Some(budget)) => Some(statement.min(budget)),
			(Some(statement), None) => Some(statement),
			(None, budget) => budget,
		};
		stmt.set_timeout(effective)
			.map_err(|e| ExecutorError::driver(&self.ms.id, &self.bound.sql, e))?;
		let fetch_size =
			self.ms.fetch_size.or(self.configuration.settings().default_fetch_size);
		stmt.set_fetch_size(fetch_size)
			.map_err(|e| ExecutorError::driver(&self.ms.id, &self.bound.sql, e))?;
		Ok(stmt)
	}

	fn driver_err(&self, e: grappelli_core::driver::DriverError) -> ExecutorError {
		ExecutorError::driver(&self.ms.id, &self.bound.sql, e)
	}
}

/// Positional placeholders bound through type handlers. The default.
struct PreparedStatementHandler {
	base: BaseStatementHandler,
}

impl StatementHandler for PreparedStatementHandler {
	fn bound_sql(&self) -> &BoundSql {
		&self.base.bound
	}

	fn prepare(
		&self,
		connection: &mut dyn Connection,
		transaction_timeout: Option<Duration>,
	) -> Result<Box<dyn Statement>, ExecutorError> {
		self.base.prepare(connection, transaction_timeout)
	}

	fn parameterize(&self, stmt: &mut dyn Statement) -> Result<(), ExecutorError> {
		ParameterHandler::new(&self.base.configuration, &self.base.ms.id, &self.base.bound)
			.set_parameters(stmt)
	}

	fn query(&self, stmt: &mut dyn Statement) -> Result<Box<dyn ResultSet>, ExecutorError> {
		stmt.execute_query().map_err(|e| self.base.driver_err(e))
	}

	fn update(&self, stmt: &mut dyn Statement) -> Result<u64, ExecutorError> {
		stmt.execute_update().map_err(|e| self.base.driver_err(e))
	}

	fn batch(&self, stmt: &mut dyn Statement) -> Result<(), ExecutorError> {
		stmt.add_batch().map_err(|e| self.base.driver_err(e))
	}
}

/// Raw SQL with substitutions already inlined; only valid when the body
/// produced no `#{…}` bindings.
struct SimpleStatementHandler {
	base: BaseStatementHandler,
}

impl StatementHandler for SimpleStatementHandler {
	fn bound_sql(&self) -> &BoundSql {
		&self.base.bound
	}

	fn prepare(
		&self,
		connection: &mut dyn Connection,
		transaction_timeout: Option<Duration>,
	) -> Result<Box<dyn Statement>, ExecutorError> {
		if !self.base.bound.parameter_mappings.is_empty() {
			return Err(ExecutorError::mapping(
				&self.base.ms.id,
				"statementType=SIMPLE cannot carry #{…} bindings; use ${…} substitution or PREPARED",
			));
		}
		self.base.prepare(connection, transaction_timeout)
	}

	fn parameterize(&self, _stmt: &mut dyn Statement) -> Result<(), ExecutorError> {
		Ok(())
	}

	fn query(&self, stmt: &mut dyn Statement) -> Result<Box<dyn ResultSet>, ExecutorError> {
		stmt.execute_query().map_err(|e| self.base.driver_err(e))
	}

	fn update(&self, stmt: &mut dyn Statement) -> Result<u64, ExecutorError> {
		stmt.execute_update().map_err(|e| self.base.driver_err(e))
	}

	fn batch(&self, stmt: &mut dyn Statement) -> Result<(), ExecutorError> {
		stmt.add_batch().map_err(|e| self.base.driver_err(e))
	}
}

/// Stored-procedure calls with IN/OUT/INOUT parameter registration and
/// output retrieval into the parameter object.
struct CallableStatementHandler {
	base: BaseStatementHandler,
}

impl StatementHandler for CallableStatementHandler {
	fn bound_sql(&self) -> &BoundSql {
		&self.base.bound
	}

	fn prepare(
		&self,
		connection: &mut dyn Connection,
		transaction_timeout: Option<Duration>,
	) -> Result<Box<dyn Statement>, ExecutorError> {
		self.base.prepare(connection, transaction_timeout)
	}

	fn parameterize(&self, stmt: &mut dyn Statement) -> Result<(), ExecutorError> {
		for (index, mapping) in self.base.bound.parameter_mappings.iter().enumerate() {
			if mapping.mode.is_out() {
				let jdbc = mapping.jdbc_type.ok_or_else(|| {
					ExecutorError::mapping(
						&self.base.ms.id,
						format!(
							"OUT parameter '{}' requires an explicit jdbcType",
							mapping.property
						),
					)
				})?;
				stmt.register_out(index, jdbc).map_err(|e| self.base.driver_err(e))?;
			}
		}
		ParameterHandler::new(&self.base.configuration, &self.base.ms.id, &self.base.bound)
			.set_parameters(stmt)
	}

	fn query(&self, stmt: &mut dyn Statement) -> Result<Box<dyn ResultSet>, ExecutorError> {
		stmt.execute_query().map_err(|e| self.base.driver_err(e))
	}

	fn update(&self, stmt: &mut dyn Statement) -> Result<u64, ExecutorError> {
		stmt.execute_update().map_err(|e| self.base.driver_err(e))
	}

	fn batch(&self, stmt: &mut dyn Statement) -> Result<(), ExecutorError> {
		stmt.add_batch().map_err(|e| self.base.driver_err(e))
	}

	fn process_output(
		&self,
		stmt: &mut dyn Statement,
		parameter: &mut Value,
	) -> Result<(), ExecutorError> {
		for (index, mapping) in self.base.bound.parameter_mappings.iter().enumerate() {
			if !mapping.mode.is_out() {
				continue;
			}
			let value = stmt.out_value(index).map_err(|e| self.base.driver_err(e))?;
			meta::set_path(parameter, &mapping.property, value);
		}
		Ok(())
	}
}
