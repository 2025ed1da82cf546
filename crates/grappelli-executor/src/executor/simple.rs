//! Prepares and closes a fresh statement for every call.

use std::sync::Arc;

use grappelli_core::transaction::Transaction;
use grappelli_core::value::Value;
use grappelli_mapping::{BoundSql, Configuration, MappedStatement, RowBounds};

use crate::cursor::Cursor;
use crate::error::ExecutorError;
use crate::executor::base::{delegate_executor, BaseExecutor, ExecutorImpl};
use crate::executor::BatchResult;
use crate::result::{DefaultResultSetHandler, HandledResults, ResultHandler};
use crate::statement::new_statement_handler;

pub struct SimpleExecutor {
	base: BaseExecutor,
}

impl SimpleExecutor {
	pub fn new(configuration: Arc<Configuration>, transaction: Box<dyn Transaction>) -> Self {
		Self { base: BaseExecutor::new(configuration, transaction) }
	}
}

delegate_executor!(SimpleExecutor);

impl ExecutorImpl for SimpleExecutor {
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
		let handler = new_statement_handler(configuration, Arc::clone(ms), bound)?;
		let mut stmt = self.base.prepare(handler.as_ref())?;
		handler.parameterize(stmt.as_mut())?;
		let affected = handler.update(stmt.as_mut())?;
		handler.process_output(stmt.as_mut(), parameter)?;
		self.base.keygen_after(ms, stmt.as_mut(), parameter)?;
		let _ = stmt.close();
		Ok(affected)
	}

	fn do_query(
		&mut self,
		ms: &Arc<MappedStatement>,
		parameter: &mut Value,
		row_bounds: RowBounds,
		result_handler: Option<&mut dyn ResultHandler>,
		bound: &BoundSql,
	) -> Result<HandledResults, ExecutorError> {
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
		let configuration = Arc::clone(&self.base.configuration);
		let handler = new_statement_handler(Arc::clone(&configuration), Arc::clone(ms), bound)?;
		let mut stmt = self.base.prepare(handler.as_ref())?;
		handler.parameterize(stmt.as_mut())?;
		let rs = handler.query(stmt.as_mut())?;
		Cursor::new(configuration, Arc::clone(ms), stmt, rs, row_bounds)
	}

	fn do_flush(&mut self, _is_rollback: bool) -> Result<Vec<BatchResult>, ExecutorError> {
		Ok(Vec::new())
	}
}
