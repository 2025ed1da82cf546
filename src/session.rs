//! The session facade: one transaction, one executor, used by one caller
//! at a time and closed exactly once.

use std::sync::Arc;

use grappelli_core::value::Value;
use grappelli_executor::executor::{new_executor, BatchResult, Executor};
use grappelli_executor::{Cursor, LazyRow, ResultHandler};
use grappelli_mapping::{Configuration, ExecutorType, MappedStatement, RowBounds};
use indexmap::IndexMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Error, Result};

pub struct SqlSessionFactoryBuilder;

impl SqlSessionFactoryBuilder {
	pub fn build(configuration: Configuration) -> SqlSessionFactory {
		SqlSessionFactory { configuration: Arc::new(configuration) }
	}
}

/// Built once per configuration; hands out sessions.
#[derive(Clone)]
pub struct SqlSessionFactory {
	configuration: Arc<Configuration>,
}

impl SqlSessionFactory {
	pub fn configuration(&self) -> &Arc<Configuration> {
		&self.configuration
	}

	pub fn open_session(&self) -> Result<SqlSession> {
		self.open_session_with(self.configuration.settings().default_executor_type, false)
	}

	pub fn open_session_with(
		&self,
		executor_type: ExecutorType,
		auto_commit: bool,
	) -> Result<SqlSession> {
		let environment = self.configuration.environment().ok_or(Error::NoEnvironment)?;
		let transaction = environment
			.transaction_factory
			.new_transaction(environment.data_source.as_ref(), auto_commit)?;
		let executor =
			new_executor(Arc::clone(&self.configuration), transaction, executor_type);
		debug!(?executor_type, auto_commit, "opened session");
		Ok(SqlSession {
			configuration: Arc::clone(&self.configuration),
			executor,
			auto_commit,
			dirty: false,
			closed: false,
		})
	}
}

/// A single-caller unit of work over one transaction.
pub struct SqlSession {
	configuration: Arc<Configuration>,
	executor: Box<dyn Executor>,
	auto_commit: bool,
	dirty: bool,
	closed: bool,
}

impl SqlSession {
	pub fn configuration(&self) -> &Arc<Configuration> {
		&self.configuration
	}

	pub(crate) fn executor_mut(&mut self) -> &mut dyn Executor {
		self.executor.as_mut()
	}

	fn check_open(&self) -> Result<()> {
		if self.closed { Err(Error::SessionClosed) } else { Ok(()) }
	}

	fn statement(&self, statement_id: &str) -> Result<Arc<MappedStatement>> {
		self.configuration.mapped_statement(statement_id).ok_or_else(|| {
			Error::UnknownStatement { statement_id: statement_id.to_string() }
		})
	}

	fn guard_nested_safety(
		&self,
		ms: &MappedStatement,
		row_bounds: RowBounds,
		with_handler: bool,
	) -> Result<()> {
		let has_nested = ms
			.result_map_ids
			.first()
			.and_then(|id| self.configuration.result_map(id))
			.is_some_and(|map| map.has_nested_result_maps());
		if !has_nested {
			return Ok(());
		}
		let settings = self.configuration.settings();
		if settings.safe_row_bounds_enabled && !row_bounds.is_default() {
			return Err(grappelli_executor::ExecutorError::UnsafeRowBounds.into());
		}
		if settings.safe_result_handler_enabled && with_handler && !ms.result_ordered {
			return Err(grappelli_executor::ExecutorError::UnsafeResultHandler.into());
		}
		Ok(())
	}

	// value-level API

	pub fn select_list_value(
		&mut self,
		statement_id: &str,
		parameter: Value,
	) -> Result<Vec<Value>> {
		self.select_list_value_bounded(statement_id, parameter, RowBounds::DEFAULT)
	}

	pub fn select_list_value_bounded(
		&mut self,
		statement_id: &str,
		mut parameter: Value,
		row_bounds: RowBounds,
	) -> Result<Vec<Value>> {
		self.check_open()?;
		let ms = self.statement(statement_id)?;
		self.guard_nested_safety(&ms, row_bounds, false)?;
		let outcome = self.executor.query(&ms, &mut parameter, row_bounds, None)?;
		Ok(outcome.rows)
	}

	pub fn select_one_value(
		&mut self,
		statement_id: &str,
		parameter: Value,
	) -> Result<Option<Value>> {
		let mut rows = self.select_list_value(statement_id, parameter)?;
		match rows.len() {
			0 => Ok(None),
			1 => Ok(Some(rows.remove(0))),
			count => Err(Error::TooManyResults {
				statement_id: statement_id.to_string(),
				count,
			}),
		}
	}

	/// Rows keyed by one of their properties, in first-seen order.
	pub fn select_map_value(
		&mut self,
		statement_id: &str,
		parameter: Value,
		map_key: &str,
	) -> Result<IndexMap<String, Value>> {
		let rows = self.select_list_value(statement_id, parameter)?;
		let mut keyed = IndexMap::new();
		for row in rows {
			let key = grappelli_core::meta::MetaValue::new(&row)
				.get(map_key)
				.cloned()
				.ok_or_else(|| Error::MissingMapKey {
					statement_id: statement_id.to_string(),
					key: map_key.to_string(),
				})?;
			keyed.insert(key.to_string(), row);
		}
		Ok(keyed)
	}

	pub fn select_cursor_value(
		&mut self,
		statement_id: &str,
		parameter: Value,
	) -> Result<Cursor> {
		self.select_cursor_value_bounded(statement_id, parameter, RowBounds::DEFAULT)
	}

	pub fn select_cursor_value_bounded(
		&mut self,
		statement_id: &str,
		parameter: Value,
		row_bounds: RowBounds,
	) -> Result<Cursor> {
		self.check_open()?;
		let ms = self.statement(statement_id)?;
		Ok(self.executor.query_cursor(&ms, parameter, row_bounds)?)
	}

	/// Like `select_list_value`, but rows with lazy associations come back
	/// as [`LazyRow`]s the caller materializes explicitly.
	pub fn select_lazy(
		&mut self,
		statement_id: &str,
		mut parameter: Value,
	) -> Result<Vec<LazyRow>> {
		self.check_open()?;
		let ms = self.statement(statement_id)?;
		let outcome =
			self.executor.query(&ms, &mut parameter, RowBounds::DEFAULT, None)?;
		let mut loaders_by_row: Vec<Vec<grappelli_executor::ResultLoader>> =
			outcome.rows.iter().map(|_| Vec::new()).collect();
		for loader in outcome.loaders {
			if let Some(slot) = loaders_by_row.get_mut(loader.row) {
				slot.push(loader);
			}
		}
		Ok(outcome
			.rows
			.into_iter()
			.zip(loaders_by_row)
			.map(|(row, loaders)| LazyRow::new(row, loaders))
			.collect())
	}

	/// Materializes everything pending on a lazy row within this session.
	pub fn load_lazy(&mut self, row: &mut LazyRow) -> Result<()> {
		self.check_open()?;
		Ok(row.load_all(self.executor.as_mut())?)
	}

	pub fn select_with_handler(
		&mut self,
		statement_id: &str,
		mut parameter: Value,
		row_bounds: RowBounds,
		handler: &mut dyn ResultHandler,
	) -> Result<()> {
		self.check_open()?;
		let ms = self.statement(statement_id)?;
		self.guard_nested_safety(&ms, row_bounds, true)?;
		self.executor.query(&ms, &mut parameter, row_bounds, Some(handler))?;
		Ok(())
	}

	/// Runs a write; generated keys land back in `parameter` before this
	/// returns.
	pub fn update_value(&mut self, statement_id: &str, parameter: &mut Value) -> Result<u64> {
		self.check_open()?;
		let ms = self.statement(statement_id)?;
		self.dirty = true;
		Ok(self.executor.update(&ms, parameter)?)
	}

	// typed wrappers

	pub fn select_list<T: DeserializeOwned, P: Serialize>(
		&mut self,
		statement_id: &str,
		parameter: &P,
	) -> Result<Vec<T>> {
		let rows = self.select_list_value(statement_id, Value::encode(parameter)?)?;
		rows.iter().map(|row| Ok(row.decode()?)).collect()
	}

	pub fn select_one<T: DeserializeOwned, P: Serialize>(
		&mut self,
		statement_id: &str,
		parameter: &P,
	) -> Result<Option<T>> {
		match self.select_one_value(statement_id, Value::encode(parameter)?)? {
			None => Ok(None),
			Some(row) => Ok(Some(row.decode()?)),
		}
	}

	pub fn insert<P: Serialize>(&mut self, statement_id: &str, parameter: &P) -> Result<u64> {
		let mut value = Value::encode(parameter)?;
		self.update_value(statement_id, &mut value)
	}

	/// Insert returning the parameter object as mutated by key generation.
	pub fn insert_returning<P: Serialize>(
		&mut self,
		statement_id: &str,
		parameter: &P,
	) -> Result<(u64, Value)> {
		let mut value = Value::encode(parameter)?;
		let affected = self.update_value(statement_id, &mut value)?;
		Ok((affected, value))
	}

	pub fn update<P: Serialize>(&mut self, statement_id: &str, parameter: &P) -> Result<u64> {
		let mut value = Value::encode(parameter)?;
		self.update_value(statement_id, &mut value)
	}

	pub fn delete<P: Serialize>(&mut self, statement_id: &str, parameter: &P) -> Result<u64> {
		let mut value = Value::encode(parameter)?;
		self.update_value(statement_id, &mut value)
	}

	// lifecycle

	pub fn flush_statements(&mut self) -> Result<Vec<BatchResult>> {
		self.check_open()?;
		Ok(self.executor.flush_statements()?)
	}

	fn commit_or_rollback_required(&self, force: bool) -> bool {
		(!self.auto_commit && self.dirty) || force
	}

	pub fn commit(&mut self) -> Result<()> {
		self.commit_force(false)
	}

	pub fn commit_force(&mut self, force: bool) -> Result<()> {
		self.check_open()?;
		self.executor.commit(self.commit_or_rollback_required(force))?;
		self.dirty = false;
		Ok(())
	}

	pub fn rollback(&mut self) -> Result<()> {
		self.rollback_force(false)
	}

	pub fn rollback_force(&mut self, force: bool) -> Result<()> {
		self.check_open()?;
		self.executor.rollback(self.commit_or_rollback_required(force))?;
		self.dirty = false;
		Ok(())
	}

	/// Closes the session; uncommitted work rolls back, staged cache
	/// entries unwind. Closing twice is a no-op.
	pub fn close(&mut self) -> Result<()> {
		if self.closed {
			return Ok(());
		}
		let force_rollback = self.commit_or_rollback_required(false);
		let result = self.executor.close(force_rollback);
		self.closed = true;
		self.dirty = false;
		result.map_err(Error::from)
	}
}

impl Drop for SqlSession {
	fn drop(&mut self) {
		let _ = self.close();
	}
}
