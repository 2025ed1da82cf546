//! Enqueues parameter sets on shared prepared statements and flushes on
//! read, explicit flush, commit, or close.

use std::sync::Arc;

use grappelli_core::driver::Statement;
use grappelli_core::transaction::Transaction;
use grappelli_core::value::Value;
use grappelli_mapping::{BoundSql, Configuration, MappedStatement, RowBounds};
use tracing::debug;

use crate::cursor::Cursor;
use crate::error::ExecutorError;
use crate::executor::base::{delegate_executor, BaseExecutor, ExecutorImpl};
use crate::executor::{BatchResult, PENDING_UPDATE_COUNT};
use crate::keygen;
use crate::result::{DefaultResultSetHandler, HandledResults, ResultHandler};
use crate::statement::new_statement_handler;

struct BatchEntry {
	ms: Arc<MappedStatement>,
	stmt: Box<dyn Statement>,
	sql: String,
	parameters: Vec<Value>,
}

pub struct BatchExecutor {
	base: BaseExecutor,
	entries: Vec<BatchEntry>,
}

impl BatchExecutor {
	pub fn new(configuration: Arc<Configuration>, transaction: Box<dyn Transaction>) -> Self {
		Self { base: BaseExecutor::new(configuration, transaction), entries: Vec::new() }
	}
}

delegate_executor!(BatchExecutor);

impl ExecutorImpl for BatchExecutor {
	fn base(&self) -> &BaseExecutor {
		&self.base
	}

	fn base_mut(&mut self) -> &mut BaseExecutor {
		&mut self.base
	}

	fn do_update(
		&mut self,
		ms: &Arc<MappedStatement>,
		parameter: &mut Value,
	) -> Result<u64, ExecutorError> {
		self.base.keygen_before(ms, parameter)?;
		let configuration = Arc::clone(&self.base.configuration);
		let bound = ms.bound_sql(&configuration, parameter)?;
		let sql = bound.sql.clone();
		let handler = new_statement_handler(configuration, Arc::clone(ms), bound)?;
		let reusable = self
			.entries
			.last()
			.is_some_and(|entry| entry.sql == sql && entry.ms.id == ms.id);
		if reusable {
			let entry = self.entries.last_mut().expect("entry just matched");
			handler.parameterize(entry.stmt.as_mut())?;
			handler.batch(entry.stmt.as_mut())?;
			entry.parameters.push(parameter.clone());
		} else {
			let mut stmt = self.base.prepare(handler.as_ref())?;
			handler.parameterize(stmt.as_mut())?;
			handler.batch(stmt.as_mut())?;
			self.entries.push(BatchEntry {
				ms: Arc::clone(ms),
				stmt,
				sql,
				parameters: vec![parameter.clone()],
			});
		}
		Ok(PENDING_UPDATE_COUNT)
	}

	fn do_query(
		&mut self,
		ms: &Arc<MappedStatement>,
		parameter: &mut Value,
		row_bounds: RowBounds,
		result_handler: Option<&mut dyn ResultHandler>,
		bound: &BoundSql,
	) -> Result<HandledResults, ExecutorError> {
		// queued writes must land before the read observes them
		self.do_flush(false)?;
		let configuration = Arc::clone(&self.base.configuration);
		let handler =
			new_statement_handler(Arc::clone(&configuration), Arc::clone(ms), bound.clone())?;
		let mut stmt = self.base.prepare(handler.as_ref())?;
		handler.parameterize(stmt.as_mut())?;
		let rs = handler.query(stmt.as_mut())?;
		let rsh = DefaultResultSetHandler::new(configuration, Arc::clone(ms), row_bounds);
		let results = rsh.handle_result_sets(rs, stmt.as_mut(), self, result_handler)?;
		handler.process_output(stmt.as_mut(), parameter)?;
		let _ = stmt.close();
		Ok(results)
	}

	fn do_query_cursor(
		&mut self,
		ms: &Arc<MappedStatement>,
		_parameter: Value,
		row_bounds: RowBounds,
		bound: BoundSql,
	) -> Result<Cursor, ExecutorError> {
		self.do_flush(false)?;
		let configuration = Arc::clone(&self.base.configuration);
		let handler = new_statement_handler(Arc::clone(&configuration), Arc::clone(ms), bound)?;
		let mut stmt = self.base.prepare(handler.as_ref())?;
		handler.parameterize(stmt.as_mut())?;
		let rs = handler.query(stmt.as_mut())?;
		Cursor::new(configuration, Arc::clone(ms), stmt, rs, row_bounds)
	}

	fn do_flush(&mut self, is_rollback: bool) -> Result<Vec<BatchResult>, ExecutorError> {
		let entries = std::mem::take(&mut self.entries);
		if is_rollback {
			for mut entry in entries {
				let _ = entry.stmt.close();
			}
			return Ok(Vec::new());
		}
		let mut results = Vec::with_capacity(entries.len());
		for mut entry in entries {
			let update_counts = entry.stmt.execute_batch().map_err(|e| {
				// the enqueued batch is already discarded at this point
				ExecutorError::Batch {
					statement_id: entry.ms.id.clone(),
					detail: e.to_string(),
				}
			})?;
			keygen::process_after_batch(
				&self.base.configuration,
				self.base.transaction.as_mut(),
				&entry.ms,
				entry.stmt.as_mut(),
				&mut entry.parameters,
			)?;
			let _ = entry.stmt.close();
			debug!(statement = %entry.ms.id, batch_size = entry.parameters.len(), "flushed batch");
			results.push(BatchResult {
				statement_id: entry.ms.id.clone(),
				sql: entry.sql,
				parameters: entry.parameters,
				update_counts,
			});
		}
		Ok(results)
	}
}
