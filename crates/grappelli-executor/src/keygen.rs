//! Key generation: driver-returned generated keys and explicit select-key
//! statements, both writing back into the parameter object.

use grappelli_core::driver::{ResultSet, Statement};
use grappelli_core::meta;
use grappelli_core::transaction::Transaction;
use grappelli_core::value::Value;
use grappelli_mapping::{Configuration, KeyGeneratorKind, MappedStatement};
use tracing::debug;

use crate::error::ExecutorError;
use crate::parameter::ParameterHandler;

/// Runs a BEFORE select-key statement, if the mapping declares one.
pub fn process_before(
	configuration: &Configuration,
	transaction: &mut dyn Transaction,
	ms: &MappedStatement,
	parameter: &mut Value,
) -> Result<(), ExecutorError> {
	if let KeyGeneratorKind::SelectKey { statement_id, execute_before: true } = &ms.key_generator
	{
		run_select_key(configuration, transaction, statement_id, parameter)?;
	}
	Ok(())
}

/// Applies AFTER key generation: either the driver's generated keys or an
/// AFTER select-key statement.
pub fn process_after(
	configuration: &Configuration,
	transaction: &mut dyn Transaction,
	ms: &MappedStatement,
	stmt: &mut dyn Statement,
	parameter: &mut Value,
) -> Result<(), ExecutorError> {
	match &ms.key_generator {
		KeyGeneratorKind::None => Ok(()),
		KeyGeneratorKind::Driver => assign_generated_keys(stmt, ms, parameter),
		KeyGeneratorKind::SelectKey { statement_id, execute_before: false } => {
			run_select_key(configuration, transaction, statement_id, parameter)
		}
		KeyGeneratorKind::SelectKey { .. } => Ok(()),
	}
}

/// Batch-flush variant of [`process_after`]: driver keys distribute one row
/// per enqueued parameter set; select-key statements run once per set.
pub fn process_after_batch(
	configuration: &Configuration,
	transaction: &mut dyn Transaction,
	ms: &MappedStatement,
	stmt: &mut dyn Statement,
	parameters: &mut [Value],
) -> Result<(), ExecutorError> {
	match &ms.key_generator {
		KeyGeneratorKind::None => Ok(()),
		KeyGeneratorKind::Driver => assign_generated_keys_batch(stmt, ms, parameters),
		KeyGeneratorKind::SelectKey { statement_id, execute_before: false } => {
			for parameter in parameters.iter_mut() {
				run_select_key(configuration, transaction, statement_id, parameter)?;
			}
			Ok(())
		}
		KeyGeneratorKind::SelectKey { .. } => Ok(()),
	}
}

/// Executes the select-key statement on the session's connection and writes
/// its columns back at the declared key properties.
fn run_select_key(
	configuration: &Configuration,
	transaction: &mut dyn Transaction,
	key_statement_id: &str,
	parameter: &mut Value,
) -> Result<(), ExecutorError> {
	let key_ms = configuration.mapped_statement(key_statement_id).ok_or_else(|| {
		ExecutorError::mapping(key_statement_id, "select-key statement is not registered")
	})?;
	let bound = key_ms.bound_sql(configuration, parameter)?;
	let connection = transaction
		.connection()
		.map_err(|e| ExecutorError::driver(&key_ms.id, &bound.sql, e))?;
	let mut stmt = connection
		.prepare(&bound.sql)
		.map_err(|e| ExecutorError::driver(&key_ms.id, &bound.sql, e))?;
	ParameterHandler::new(configuration, &key_ms.id, &bound).set_parameters(stmt.as_mut())?;
	let mut rs = stmt
		.execute_query()
		.map_err(|e| ExecutorError::driver(&key_ms.id, &bound.sql, e))?;
	if rs.next().map_err(|e| ExecutorError::driver(&key_ms.id, &bound.sql, e))? {
		write_key_row(rs.as_ref(), &key_ms.key_properties, &key_ms.key_columns, parameter)
			.map_err(|detail| ExecutorError::mapping(&key_ms.id, detail))?;
		debug!(statement = %key_ms.id, "applied select-key result");
	}
	let _ = rs.close();
	let _ = stmt.close();
	Ok(())
}

/// Reads driver-returned generated keys into the parameter object before
/// the insert call returns.
pub fn assign_generated_keys(
	stmt: &mut dyn Statement,
	ms: &MappedStatement,
	parameter: &mut Value,
) -> Result<(), ExecutorError> {
	let Some(mut rs) = stmt
		.generated_keys()
		.map_err(|e| ExecutorError::driver(&ms.id, "<generated keys>", e))?
	else {
		return Ok(());
	};
	if rs.next().map_err(|e| ExecutorError::driver(&ms.id, "<generated keys>", e))? {
		write_key_row(rs.as_ref(), &ms.key_properties, &ms.key_columns, parameter)
			.map_err(|detail| ExecutorError::mapping(&ms.id, detail))?;
	}
	let _ = rs.close();
	Ok(())
}

/// Batch flush variant: one generated-key row per enqueued parameter set.
pub fn assign_generated_keys_batch(
	stmt: &mut dyn Statement,
	ms: &MappedStatement,
	parameters: &mut [Value],
) -> Result<(), ExecutorError> {
	let Some(mut rs) = stmt
		.generated_keys()
		.map_err(|e| ExecutorError::driver(&ms.id, "<generated keys>", e))?
	else {
		return Ok(());
	};
	for parameter in parameters.iter_mut() {
		if !rs.next().map_err(|e| ExecutorError::driver(&ms.id, "<generated keys>", e))? {
			break;
		}
		write_key_row(rs.as_ref(), &ms.key_properties, &ms.key_columns, parameter)
			.map_err(|detail| ExecutorError::mapping(&ms.id, detail))?;
	}
	let _ = rs.close();
	Ok(())
}

fn write_key_row(
	rs: &dyn ResultSet,
	key_properties: &[String],
	key_columns: &[String],
	parameter: &mut Value,
) -> Result<(), String> {
	if key_properties.is_empty() {
		return Err("no key properties declared".to_string());
	}
	for (i, property) in key_properties.iter().enumerate() {
		let column_index = if let Some(column) = key_columns.get(i) {
			rs.columns()
				.iter()
				.position(|c| c.label.eq_ignore_ascii_case(column))
				.ok_or_else(|| format!("key column '{column}' not found in key result"))?
		} else {
			i
		};
		let value = rs.get(column_index).map_err(|e| e.to_string())?;
		meta::set_path(parameter, property, value);
	}
	Ok(())
}
