//! The layered executor stack.
//!
//! Simple, reuse, and batch executors share the first-level cache and
//! deferred-load plumbing through [`base::BaseExecutor`]; the caching
//! executor decorates any of them with second-level cache semantics.

mod base;
mod batch;
mod caching;
mod reuse;
mod simple;

use std::sync::Arc;
use std::time::Duration;

use grappelli_cache::CacheKey;
use grappelli_core::transaction::Transaction;
use grappelli_core::value::Value;
use grappelli_mapping::{BoundSql, Configuration, ExecutorType, MappedStatement, RowBounds};

pub use batch::BatchExecutor;
pub use caching::CachingExecutor;
pub use reuse::ReuseExecutor;
pub use simple::SimpleExecutor;

use crate::cursor::Cursor;
use crate::error::ExecutorError;
use crate::loader::ResultLoader;
use crate::result::ResultHandler;

/// Sentinel returned by batch-executor updates; real counts arrive from
/// [`Executor::flush_statements`].
pub const PENDING_UPDATE_COUNT: u64 = u64::MAX;

/// Rows plus whatever could not be resolved while they were built.
///
/// `deferred` is only non-empty while a query is nested inside another;
/// the top-level query drains it before returning. `loaders` carry lazy
/// associations for the caller to materialize.
pub struct QueryOutcome {
	pub rows: Vec<Value>,
	pub deferred: Vec<DeferredPatch>,
	pub loaders: Vec<ResultLoader>,
}

impl QueryOutcome {
	pub fn rows_only(rows: Vec<Value>) -> Self {
		Self { rows, deferred: Vec::new(), loaders: Vec::new() }
	}
}

/// A nested-select load postponed because its prerequisite rows were still
/// being materialized; applied from the first-level cache when the query
/// stack unwinds.
#[derive(Debug, Clone)]
pub struct DeferredPatch {
	pub row: usize,
	pub path: String,
	pub key: CacheKey,
	pub statement_id: String,
	pub single: bool,
}

/// Per-statement outcome of one batch flush.
#[derive(Debug, Clone)]
pub struct BatchResult {
	pub statement_id: String,
	pub sql: String,
	pub parameters: Vec<Value>,
	pub update_counts: Vec<u64>,
}

pub trait Executor {
	fn configuration(&self) -> &Arc<Configuration>;

	fn update(
		&mut self,
		ms: &Arc<MappedStatement>,
		parameter: &mut Value,
	) -> Result<u64, ExecutorError>;

	fn query(
		&mut self,
		ms: &Arc<MappedStatement>,
		parameter: &mut Value,
		row_bounds: RowBounds,
		result_handler: Option<&mut dyn ResultHandler>,
	) -> Result<QueryOutcome, ExecutorError>;

	fn query_cursor(
		&mut self,
		ms: &Arc<MappedStatement>,
		parameter: Value,
		row_bounds: RowBounds,
	) -> Result<Cursor, ExecutorError>;

	fn flush_statements(&mut self) -> Result<Vec<BatchResult>, ExecutorError>;

	fn commit(&mut self, required: bool) -> Result<(), ExecutorError>;

	fn rollback(&mut self, required: bool) -> Result<(), ExecutorError>;

	fn close(&mut self, force_rollback: bool) -> Result<(), ExecutorError>;

	fn is_closed(&self) -> bool;

	fn clear_local_cache(&mut self);

	fn create_cache_key(
		&self,
		ms: &Arc<MappedStatement>,
		parameter: &Value,
		row_bounds: RowBounds,
		bound: &BoundSql,
	) -> CacheKey;

	/// Whether the key belongs to a query currently being materialized in
	/// this session, which forces dependent nested selects to defer.
	fn is_in_flight(&self, key: &CacheKey) -> bool;

	/// Remaining transaction budget, if the transaction carries one.
	fn transaction_timeout(&self) -> Option<Duration>;
}

/// Builds the session's executor, wrapping it with the second-level cache
/// decorator when caching is enabled.
pub fn new_executor(
	configuration: Arc<Configuration>,
	transaction: Box<dyn Transaction>,
	executor_type: ExecutorType,
) -> Box<dyn Executor> {
	let inner: Box<dyn Executor> = match executor_type {
		ExecutorType::Simple => Box::new(SimpleExecutor::new(configuration.clone(), transaction)),
		ExecutorType::Reuse => Box::new(ReuseExecutor::new(configuration.clone(), transaction)),
		ExecutorType::Batch => Box::new(BatchExecutor::new(configuration.clone(), transaction)),
	};
	if configuration.settings().cache_enabled {
		Box::new(CachingExecutor::new(inner))
	} else {
		inner
	}
}
