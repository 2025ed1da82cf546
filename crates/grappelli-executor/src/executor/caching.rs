//! Second-level cache decorator over any base executor.
//!
//! Reads consult the statement's declared cache through per-session
//! transactional staging; writes clear the staged entries. Every operation
//! reaches the delegate first, so first-level semantics are preserved.

use std::sync::Arc;
use std::time::Duration;

use grappelli_cache::cache::CacheValue;
use grappelli_cache::{CacheKey, TransactionalCacheManager};
use grappelli_core::value::Value;
use grappelli_mapping::{
	BoundSql, Configuration, MappedStatement, ParameterMode, RowBounds, StatementType,
};
use tracing::debug;

use crate::cursor::Cursor;
use crate::error::ExecutorError;
use crate::executor::{BatchResult, Executor, QueryOutcome};
use crate::result::ResultHandler;

pub struct CachingExecutor {
	delegate: Box<dyn Executor>,
	tcm: TransactionalCacheManager,
}

impl CachingExecutor {
	pub fn new(delegate: Box<dyn Executor>) -> Self {
		Self { delegate, tcm: TransactionalCacheManager::new() }
	}

	fn flush_cache_if_required(&mut self, ms: &MappedStatement) {
		if let Some(cache) = &ms.cache {
			if ms.flush_cache {
				self.tcm.clear(cache);
			}
		}
	}

	fn ensure_no_out_params(
		&self,
		ms: &MappedStatement,
		bound: &BoundSql,
	) -> Result<(), ExecutorError> {
		if ms.statement_type == StatementType::Callable
			&& bound
				.parameter_mappings
				.iter()
				.any(|mapping| mapping.mode != ParameterMode::In)
		{
			return Err(ExecutorError::OutParamsNotCacheable { statement_id: ms.id.clone() });
		}
		Ok(())
	}
}

impl Executor for CachingExecutor {
	fn configuration(&self) -> &Arc<Configuration> {
		self.delegate.configuration()
	}

	fn update(
		&mut self,
		ms: &Arc<MappedStatement>,
		parameter: &mut Value,
	) -> Result<u64, ExecutorError> {
		self.flush_cache_if_required(ms);
		self.delegate.update(ms, parameter)
	}

	fn query(
		&mut self,
		ms: &Arc<MappedStatement>,
		parameter: &mut Value,
		row_bounds: RowBounds,
		result_handler: Option<&mut dyn ResultHandler>,
	) -> Result<QueryOutcome, ExecutorError> {
		let Some(cache) = ms.cache.clone() else {
			return self.delegate.query(ms, parameter, row_bounds, result_handler);
		};
		self.flush_cache_if_required(ms);
		if !ms.use_cache || result_handler.is_some() {
			return self.delegate.query(ms, parameter, row_bounds, result_handler);
		}
		let bound = ms.bound_sql(self.delegate.configuration(), parameter)?;
		self.ensure_no_out_params(ms, &bound)?;
		let key = self.delegate.create_cache_key(ms, parameter, row_bounds, &bound);
		if let Some(cached) = self.tcm.get(&cache, &key)? {
			if let Some(rows) = cached.into_rows() {
				debug!(statement = %ms.id, "second-level cache hit");
				return Ok(QueryOutcome::rows_only(rows));
			}
		}
		let outcome = self.delegate.query(ms, parameter, row_bounds, None)?;
		self.tcm.put(&cache, key, CacheValue::rows(outcome.rows.clone()));
		Ok(outcome)
	}

	fn query_cursor(
		&mut self,
		ms: &Arc<MappedStatement>,
		parameter: Value,
		row_bounds: RowBounds,
	) -> Result<Cursor, ExecutorError> {
		self.flush_cache_if_required(ms);
		self.delegate.query_cursor(ms, parameter, row_bounds)
	}

	fn flush_statements(&mut self) -> Result<Vec<BatchResult>, ExecutorError> {
		self.delegate.flush_statements()
	}

	fn commit(&mut self, required: bool) -> Result<(), ExecutorError> {
		self.delegate.commit(required)?;
		self.tcm.commit()?;
		Ok(())
	}

	fn rollback(&mut self, required: bool) -> Result<(), ExecutorError> {
		let result = self.delegate.rollback(required);
		if required {
			// staged entries always unwind, even when the delegate failed
			self.tcm.rollback();
		}
		result
	}

	fn close(&mut self, force_rollback: bool) -> Result<(), ExecutorError> {
		if force_rollback {
			self.tcm.rollback();
		} else if let Err(error) = self.tcm.commit() {
			self.tcm.rollback();
			let _ = self.delegate.close(true);
			return Err(error.into());
		}
		self.delegate.close(force_rollback)
	}

	fn is_closed(&self) -> bool {
		self.delegate.is_closed()
	}

	fn clear_local_cache(&mut self) {
		self.delegate.clear_local_cache();
	}

	fn create_cache_key(
		&self,
		ms: &Arc<MappedStatement>,
		parameter: &Value,
		row_bounds: RowBounds,
		bound: &BoundSql,
	) -> CacheKey {
		self.delegate.create_cache_key(ms, parameter, row_bounds, bound)
	}

	fn is_in_flight(&self, key: &CacheKey) -> bool {
		self.delegate.is_in_flight(key)
	}

	fn transaction_timeout(&self) -> Option<Duration> {
		self.delegate.transaction_timeout()
	}
}
