//! Shared executor state and behavior.
//!
//! The concrete executors implement [`ExecutorImpl`] (the `do_*`
//! operations) and delegate the [`Executor`] surface to the generic
//! functions here: first-level caching with an in-progress sentinel,
//! deferred-load draining, interceptor dispatch, and the transaction
//! lifecycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use grappelli_cache::CacheKey;
use grappelli_core::driver::Statement;
use grappelli_core::transaction::Transaction;
use grappelli_core::value::Value;
use grappelli_mapping::{
	BoundSql, Configuration, InvocationContext, LocalCacheScope, MappedStatement, ParameterMode,
	RowBounds, StatementType,
};
use tracing::{debug, warn};

use crate::cursor::Cursor;
use crate::error::ExecutorError;
use crate::executor::{BatchResult, Executor, QueryOutcome};
use crate::keygen;
use crate::loader;
use crate::result::{HandledResults, ResultHandler};
use crate::statement::StatementHandler;

pub(crate) enum LocalEntry {
	/// The query for this key is executing right now.
	InProgress,
	Rows(Vec<Value>),
}

pub(crate) struct BaseExecutor {
	pub configuration: Arc<Configuration>,
	pub transaction: Box<dyn Transaction>,
	pub local_cache: HashMap<CacheKey, LocalEntry>,
	/// Parameter objects captured after OUT retrieval, replayed on local
	/// cache hits of callable statements.
	pub local_output_cache: HashMap<CacheKey, Value>,
	pub query_stack: u32,
	pub closed: bool,
}

impl BaseExecutor {
	pub fn new(configuration: Arc<Configuration>, transaction: Box<dyn Transaction>) -> Self {
		Self {
			configuration,
			transaction,
			local_cache: HashMap::new(),
			local_output_cache: HashMap::new(),
			query_stack: 0,
			closed: false,
		}
	}

	pub fn clear_caches(&mut self) {
		self.local_cache.clear();
		self.local_output_cache.clear();
	}

	pub fn prepare(
		&mut self,
		handler: &dyn StatementHandler,
	) -> Result<Box<dyn Statement>, ExecutorError> {
		let budget = self.transaction.timeout();
		let statement_id = "<prepare>";
		let connection = self
			.transaction
			.connection()
			.map_err(|e| ExecutorError::driver(statement_id, &handler.bound_sql().sql, e))?;
		handler.prepare(connection, budget)
	}

	pub fn keygen_before(
		&mut self,
		ms: &MappedStatement,
		parameter: &mut Value,
	) -> Result<(), ExecutorError> {
		keygen::process_before(&self.configuration, self.transaction.as_mut(), ms, parameter)
	}

	pub fn keygen_after(
		&mut self,
		ms: &MappedStatement,
		stmt: &mut dyn Statement,
		parameter: &mut Value,
	) -> Result<(), ExecutorError> {
		keygen::process_after(
			&self.configuration,
			self.transaction.as_mut(),
			ms,
			stmt,
			parameter,
		)
	}
}

/// The seam each concrete executor provides; everything else delegates to
/// the `*_with` functions below.
pub(crate) trait ExecutorImpl {
	fn base(&self) -> &BaseExecutor;

	fn base_mut(&mut self) -> &mut BaseExecutor;

	fn do_update(
		&mut self,
		ms: &Arc<MappedStatement>,
		parameter: &mut Value,
	) -> Result<u64, ExecutorError>;

	fn do_query(
		&mut self,
		ms: &Arc<MappedStatement>,
		parameter: &mut Value,
		row_bounds: RowBounds,
		result_handler: Option<&mut dyn ResultHandler>,
		bound: &BoundSql,
	) -> Result<HandledResults, ExecutorError>;

	fn do_query_cursor(
		&mut self,
		ms: &Arc<MappedStatement>,
		parameter: Value,
		row_bounds: RowBounds,
		bound: BoundSql,
	) -> Result<Cursor, ExecutorError>;

	fn do_flush(&mut self, is_rollback: bool) -> Result<Vec<BatchResult>, ExecutorError>;
}

pub(crate) fn update_with<T: ExecutorImpl + Executor>(
	executor: &mut T,
	ms: &Arc<MappedStatement>,
	parameter: &mut Value,
) -> Result<u64, ExecutorError> {
	if executor.base().closed {
		return Err(ExecutorError::Closed);
	}
	let configuration = Arc::clone(&executor.base().configuration);
	for interceptor in configuration.interceptors() {
		interceptor.before_update(&InvocationContext {
			statement_id: &ms.id,
			command: ms.sql_command_type,
			sql: None,
			parameter,
		});
	}
	// any write invalidates the whole session cache
	executor.base_mut().clear_caches();
	let affected = executor.do_update(ms, parameter)?;
	for interceptor in configuration.interceptors() {
		interceptor.after_update(
			&InvocationContext {
				statement_id: &ms.id,
				command: ms.sql_command_type,
				sql: None,
				parameter,
			},
			affected,
		);
	}
	Ok(affected)
}

pub(crate) fn query_with<T: ExecutorImpl + Executor>(
	executor: &mut T,
	ms: &Arc<MappedStatement>,
	parameter: &mut Value,
	row_bounds: RowBounds,
	result_handler: Option<&mut dyn ResultHandler>,
) -> Result<QueryOutcome, ExecutorError> {
	if executor.base().closed {
		return Err(ExecutorError::Closed);
	}
	let configuration = Arc::clone(&executor.base().configuration);
	let bound = ms.bound_sql(&configuration, parameter)?;
	let key = create_cache_key_with(executor, ms, row_bounds, &bound);
	for interceptor in configuration.interceptors() {
		interceptor.before_query(&InvocationContext {
			statement_id: &ms.id,
			command: ms.sql_command_type,
			sql: Some(&bound.sql),
			parameter,
		});
	}
	if executor.base().query_stack == 0 && ms.flush_cache {
		executor.base_mut().clear_caches();
	}
	let mut cached_rows = None;
	if result_handler.is_none() {
		if let Some(LocalEntry::Rows(rows)) = executor.base().local_cache.get(&key) {
			debug!(statement = %ms.id, "first-level cache hit");
			cached_rows = Some(rows.clone());
			if ms.statement_type == StatementType::Callable {
				if let Some(cached) = executor.base().local_output_cache.get(&key) {
					*parameter = cached.clone();
				}
			}
		}
	}
	let outcome = match cached_rows {
		Some(rows) => QueryOutcome::rows_only(rows),
		None => query_from_database(
			executor,
			&configuration,
			ms,
			parameter,
			row_bounds,
			result_handler,
			&bound,
			key,
		)?,
	};
	for interceptor in configuration.interceptors() {
		interceptor.after_query(
			&InvocationContext {
				statement_id: &ms.id,
				command: ms.sql_command_type,
				sql: Some(&bound.sql),
				parameter,
			},
			outcome.rows.len(),
		);
	}
	Ok(outcome)
}

pub(crate) fn query_cursor_with<T: ExecutorImpl>(
	executor: &mut T,
	ms: &Arc<MappedStatement>,
	parameter: Value,
	row_bounds: RowBounds,
) -> Result<Cursor, ExecutorError> {
	if executor.base().closed {
		return Err(ExecutorError::Closed);
	}
	let configuration = Arc::clone(&executor.base().configuration);
	let bound = ms.bound_sql(&configuration, &parameter)?;
	executor.do_query_cursor(ms, parameter, row_bounds, bound)
}

pub(crate) fn flush_with<T: ExecutorImpl>(
	executor: &mut T,
) -> Result<Vec<BatchResult>, ExecutorError> {
	if executor.base().closed {
		return Err(ExecutorError::Closed);
	}
	executor.do_flush(false)
}

pub(crate) fn commit_with<T: ExecutorImpl>(
	executor: &mut T,
	required: bool,
) -> Result<(), ExecutorError> {
	if executor.base().closed {
		return Err(ExecutorError::Closed);
	}
	executor.base_mut().clear_caches();
	executor.do_flush(false)?;
	if required {
		executor
			.base_mut()
			.transaction
			.commit()
			.map_err(|e| ExecutorError::driver("<commit>", "", e))?;
	}
	Ok(())
}

pub(crate) fn rollback_with<T: ExecutorImpl>(
	executor: &mut T,
	required: bool,
) -> Result<(), ExecutorError> {
	if executor.base().closed {
		return Ok(());
	}
	executor.base_mut().clear_caches();
	let flushed = executor.do_flush(true);
	// the transaction rolls back even when discarding the batch failed
	let rolled_back = if required {
		executor
			.base_mut()
			.transaction
			.rollback()
			.map_err(|e| ExecutorError::driver("<rollback>", "", e))
	} else {
		Ok(())
	};
	flushed?;
	rolled_back
}

pub(crate) fn close_with<T: ExecutorImpl>(
	executor: &mut T,
	force_rollback: bool,
) -> Result<(), ExecutorError> {
	if executor.base().closed {
		return Ok(());
	}
	let rollback_result = rollback_with(executor, force_rollback);
	let close_result = executor
		.base_mut()
		.transaction
		.close()
		.map_err(|e| ExecutorError::driver("<close>", "", e));
	executor.base_mut().closed = true;
	executor.base_mut().clear_caches();
	rollback_result.and(close_result)
}

pub(crate) fn clear_local_cache_with<T: ExecutorImpl>(executor: &mut T) {
	if !executor.base().closed {
		executor.base_mut().clear_caches();
	}
}

pub(crate) fn create_cache_key_with<T: ExecutorImpl>(
	executor: &T,
	ms: &Arc<MappedStatement>,
	row_bounds: RowBounds,
	bound: &BoundSql,
) -> CacheKey {
	let mut key = CacheKey::new();
	key.update(&ms.id);
	key.update(row_bounds.offset.to_string());
	key.update(row_bounds.limit.to_string());
	key.update(&bound.sql);
	for mapping in &bound.parameter_mappings {
		if mapping.mode == ParameterMode::Out {
			continue;
		}
		key.update_value(&bound.parameter_value(&mapping.property));
	}
	if let Some(environment) = executor.base().configuration.environment() {
		key.update(&environment.id);
	}
	key
}

pub(crate) fn is_in_flight_with<T: ExecutorImpl>(executor: &T, key: &CacheKey) -> bool {
	matches!(executor.base().local_cache.get(key), Some(LocalEntry::InProgress))
}

pub(crate) fn transaction_timeout_with<T: ExecutorImpl>(executor: &T) -> Option<Duration> {
	executor.base().transaction.timeout()
}

#[allow(clippy::too_many_arguments)]
fn query_from_database<T: ExecutorImpl>(
	executor: &mut T,
	configuration: &Arc<Configuration>,
	ms: &Arc<MappedStatement>,
	parameter: &mut Value,
	row_bounds: RowBounds,
	result_handler: Option<&mut dyn ResultHandler>,
	bound: &BoundSql,
	key: CacheKey,
) -> Result<QueryOutcome, ExecutorError> {
	executor.base_mut().query_stack += 1;
	executor.base_mut().local_cache.insert(key.clone(), LocalEntry::InProgress);
	let result = executor.do_query(ms, parameter, row_bounds, result_handler, bound);
	executor.base_mut().query_stack -= 1;
	executor.base_mut().local_cache.remove(&key);
	let handled = result?;
	let mut outcome = QueryOutcome {
		rows: handled.rows,
		deferred: handled.deferred,
		loaders: handled.loaders,
	};
	// cache before draining so self-referential deferred loads resolve,
	// then re-cache the patched rows
	executor
		.base_mut()
		.local_cache
		.insert(key.clone(), LocalEntry::Rows(outcome.rows.clone()));
	if executor.base().query_stack == 0 && !outcome.deferred.is_empty() {
		apply_deferred(&mut outcome, &executor.base().local_cache);
		executor
			.base_mut()
			.local_cache
			.insert(key.clone(), LocalEntry::Rows(outcome.rows.clone()));
	}
	if ms.statement_type == StatementType::Callable {
		executor.base_mut().local_output_cache.insert(key, parameter.clone());
	}
	if executor.base().query_stack == 0
		&& configuration.settings().local_cache_scope == LocalCacheScope::Statement
	{
		executor.base_mut().clear_caches();
	}
	Ok(outcome)
}

/// Resolves queued nested-select patches from the first-level cache once
/// the outer result is complete.
fn apply_deferred(outcome: &mut QueryOutcome, local_cache: &HashMap<CacheKey, LocalEntry>) {
	for patch in std::mem::take(&mut outcome.deferred) {
		let Some(LocalEntry::Rows(rows)) = local_cache.get(&patch.key) else {
			warn!(
				statement = %patch.statement_id,
				"deferred load could not be satisfied from the session cache"
			);
			continue;
		};
		let value = loader::shape_rows(rows.clone(), patch.single);
		let Some(row) = outcome.rows.get_mut(patch.row) else { continue };
		grappelli_core::meta::set_path(row, &patch.path, value);
	}
}

/// Wires the full [`Executor`] surface of a concrete executor to the
/// shared `*_with` functions.
macro_rules! delegate_executor {
	($name:ident) => {
		impl crate::executor::Executor for $name {
			fn configuration(&self) -> &std::sync::Arc<grappelli_mapping::Configuration> {
				&crate::executor::base::ExecutorImpl::base(self).configuration
			}

			fn update(
				&mut self,
				ms: &std::sync::Arc<grappelli_mapping::MappedStatement>,
				parameter: &mut grappelli_core::value::Value,
			) -> Result<u64, crate::error::ExecutorError> {
				crate::executor::base::update_with(self, ms, parameter)
			}

			fn query(
				&mut self,
				ms: &std::sync::Arc<grappelli_mapping::MappedStatement>,
				parameter: &mut grappelli_core::value::Value,
				row_bounds: grappelli_mapping::RowBounds,
				result_handler: Option<&mut dyn crate::result::ResultHandler>,
			) -> Result<crate::executor::QueryOutcome, crate::error::ExecutorError> {
				crate::executor::base::query_with(self, ms, parameter, row_bounds, result_handler)
			}

			fn query_cursor(
				&mut self,
				ms: &std::sync::Arc<grappelli_mapping::MappedStatement>,
				parameter: grappelli_core::value::Value,
				row_bounds: grappelli_mapping::RowBounds,
			) -> Result<crate::cursor::Cursor, crate::error::ExecutorError> {
				crate::executor::base::query_cursor_with(self, ms, parameter, row_bounds)
			}

			fn flush_statements(
				&mut self,
			) -> Result<Vec<crate::executor::BatchResult>, crate::error::ExecutorError> {
				crate::executor::base::flush_with(self)
			}

			fn commit(&mut self, required: bool) -> Result<(), crate::error::ExecutorError> {
				crate::executor::base::commit_with(self, required)
			}

			fn rollback(&mut self, required: bool) -> Result<(), crate::error::ExecutorError> {
				crate::executor::base::rollback_with(self, required)
			}

			fn close(&mut self, force_rollback: bool) -> Result<(), crate::error::ExecutorError> {
				crate::executor::base::close_with(self, force_rollback)
			}

			fn is_closed(&self) -> bool {
				crate::executor::base::ExecutorImpl::base(self).closed
			}

			fn clear_local_cache(&mut self) {
				crate::executor::base::clear_local_cache_with(self);
			}

			fn create_cache_key(
				&self,
				ms: &std::sync::Arc<grappelli_mapping::MappedStatement>,
				_parameter: &grappelli_core::value::Value,
				row_bounds: grappelli_mapping::RowBounds,
				bound: &grappelli_mapping::BoundSql,
			) -> grappelli_cache::CacheKey {
				crate::executor::base::create_cache_key_with(self, ms, row_bounds, bound)
			}

			fn is_in_flight(&self, key: &grappelli_cache::CacheKey) -> bool {
				crate::executor::base::is_in_flight_with(self, key)
			}

			fn transaction_timeout(&self) -> Option<std::time::Duration> {
				crate::executor::base::transaction_timeout_with(self)
			}
		}
	};
}

pub(crate) use delegate_executor;
