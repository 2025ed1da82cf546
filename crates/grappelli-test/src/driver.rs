//! The stub driver. Every handle shares one [`StubState`] behind an `Arc`,
//! so boxed statements stay valid independently of their connection, as the
//! driver contract requires.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use grappelli_core::driver::{
	ColumnInfo, Connection, DataSource, DriverError, DriverResult, ResultSet, Statement,
};
use grappelli_core::types::JdbcType;
use grappelli_core::value::Value;
use parking_lot::Mutex;

#[derive(Clone, Default)]
struct ResponseSpec {
	result_sets: Vec<ResultSetSpec>,
	affected: u64,
	generated_keys: Option<ResultSetSpec>,
	out_values: Vec<(usize, Value)>,
}

#[derive(Clone)]
struct ResultSetSpec {
	columns: Vec<ColumnInfo>,
	rows: Vec<Vec<Value>>,
}

struct ScriptEntry {
	pattern: String,
	response: ResponseSpec,
}

/// One statement execution the stub recorded.
#[derive(Debug, Clone)]
pub struct ExecutedStatement {
	pub sql: String,
	pub parameters: Vec<Value>,
	pub batched: bool,
}

#[derive(Default)]
struct StubState {
	scripts: Mutex<Vec<ScriptEntry>>,
	log: Mutex<Vec<ExecutedStatement>>,
	commits: Mutex<usize>,
	rollbacks: Mutex<usize>,
	product: Mutex<String>,
}

impl StubState {
	fn response_for(&self, sql: &str) -> ResponseSpec {
		let scripts = self.scripts.lock();
		scripts
			.iter()
			.find(|entry| sql.contains(&entry.pattern))
			.map(|entry| entry.response.clone())
			.unwrap_or_default()
	}
}

/// A scriptable data source for driving the runtime in tests.
#[derive(Clone, Default)]
pub struct StubDataSource {
	state: Arc<StubState>,
}

impl StubDataSource {
	pub fn new() -> Self {
		let ds = Self { state: Arc::new(StubState::default()) };
		*ds.state.product.lock() = "StubSQL".to_string();
		ds
	}

	pub fn with_product(name: &str) -> Self {
		let ds = Self::new();
		*ds.state.product.lock() = name.to_string();
		ds
	}

	/// Scripts the response for statements whose SQL contains `pattern`.
	/// Earlier scripts win when several match.
	pub fn when(&self, pattern: &str) -> ResponseBuilder {
		let mut scripts = self.state.scripts.lock();
		scripts.push(ScriptEntry {
			pattern: pattern.to_string(),
			response: ResponseSpec::default(),
		});
		let index = scripts.len() - 1;
		drop(scripts);
		ResponseBuilder { state: Arc::clone(&self.state), index }
	}

	pub fn executed(&self) -> Vec<ExecutedStatement> {
		self.state.log.lock().clone()
	}

	/// How many recorded executions contain the given SQL fragment.
	pub fn execution_count(&self, pattern: &str) -> usize {
		self.state.log.lock().iter().filter(|e| e.sql.contains(pattern)).count()
	}

	pub fn commits(&self) -> usize {
		*self.state.commits.lock()
	}

	pub fn rollbacks(&self) -> usize {
		*self.state.rollbacks.lock()
	}

	pub fn clear_log(&self) {
		self.state.log.lock().clear();
	}
}

impl DataSource for StubDataSource {
	fn connection(&self) -> DriverResult<Box<dyn Connection>> {
		Ok(Box::new(StubConnection {
			state: Arc::clone(&self.state),
			auto_commit: true,
			closed: false,
		}))
	}
}

/// Fluent scripting handle returned by [`StubDataSource::when`].
pub struct ResponseBuilder {
	state: Arc<StubState>,
	index: usize,
}

impl ResponseBuilder {
	fn mutate(self, f: impl FnOnce(&mut ResponseSpec)) -> Self {
		{
			let mut scripts = self.state.scripts.lock();
			f(&mut scripts[self.index].response);
		}
		self
	}

	/// Appends one result set; call again for multi-result statements.
	pub fn rows(self, columns: &[(&str, JdbcType)], rows: Vec<Vec<Value>>) -> Self {
		let spec = ResultSetSpec { columns: column_infos(columns), rows };
		self.mutate(|r| r.result_sets.push(spec))
	}

	pub fn affected(self, count: u64) -> Self {
		self.mutate(|r| r.affected = count)
	}

	pub fn generated_keys(self, columns: &[(&str, JdbcType)], rows: Vec<Vec<Value>>) -> Self {
		let spec = ResultSetSpec { columns: column_infos(columns), rows };
		self.mutate(|r| r.generated_keys = Some(spec))
	}

	pub fn out_value(self, index: usize, value: Value) -> Self {
		self.mutate(|r| r.out_values.push((index, value)))
	}
}

fn column_infos(columns: &[(&str, JdbcType)]) -> Vec<ColumnInfo> {
	columns.iter().map(|(name, jdbc)| ColumnInfo::new(*name, *jdbc)).collect()
}

struct StubConnection {
	state: Arc<StubState>,
	auto_commit: bool,
	closed: bool,
}

impl Connection for StubConnection {
	fn prepare(&mut self, sql: &str) -> DriverResult<Box<dyn Statement>> {
		if self.closed {
			return Err(DriverError::ConnectionClosed);
		}
		Ok(Box::new(StubStatement {
			state: Arc::clone(&self.state),
			sql: sql.to_string(),
			bindings: Vec::new(),
			batch: Vec::new(),
			remaining_sets: VecDeque::new(),
			response: None,
			closed: false,
		}))
	}

	fn set_auto_commit(&mut self, auto_commit: bool) -> DriverResult<()> {
		self.auto_commit = auto_commit;
		Ok(())
	}

	fn auto_commit(&self) -> bool {
		self.auto_commit
	}

	fn commit(&mut self) -> DriverResult<()> {
		*self.state.commits.lock() += 1;
		Ok(())
	}

	fn rollback(&mut self) -> DriverResult<()> {
		*self.state.rollbacks.lock() += 1;
		Ok(())
	}

	fn close(&mut self) -> DriverResult<()> {
		self.closed = true;
		Ok(())
	}

	fn product_name(&self) -> DriverResult<String> {
		Ok(self.state.product.lock().clone())
	}
}

struct StubStatement {
	state: Arc<StubState>,
	sql: String,
	bindings: Vec<Option<Value>>,
	batch: Vec<Vec<Value>>,
	remaining_sets: VecDeque<ResultSetSpec>,
	response: Option<ResponseSpec>,
	closed: bool,
}

impl StubStatement {
	fn check_open(&self) -> DriverResult<()> {
		if self.closed { Err(DriverError::StatementClosed) } else { Ok(()) }
	}

	fn bind_at(&mut self, index: usize, value: Value) {
		if self.bindings.len() <= index {
			self.bindings.resize(index + 1, None);
		}
		self.bindings[index] = Some(value);
	}

	fn current_parameters(&self) -> Vec<Value> {
		self.bindings.iter().map(|v| v.clone().unwrap_or(Value::Null)).collect()
	}

	fn record(&self, batched: bool) {
		self.state.log.lock().push(ExecutedStatement {
			sql: self.sql.clone(),
			parameters: self.current_parameters(),
			batched,
		});
	}

	fn resolve(&mut self) -> ResponseSpec {
		let response = self.state.response_for(&self.sql);
		self.response = Some(response.clone());
		response
	}
}

impl Statement for StubStatement {
	fn set_timeout(&mut self, _timeout: Option<Duration>) -> DriverResult<()> {
		self.check_open()
	}

	fn set_fetch_size(&mut self, _fetch_size: Option<u32>) -> DriverResult<()> {
		self.check_open()
	}

	fn bind(&mut self, index: usize, value: Value) -> DriverResult<()> {
		self.check_open()?;
		self.bind_at(index, value);
		Ok(())
	}

	fn bind_null(&mut self, index: usize, _jdbc_type: JdbcType) -> DriverResult<()> {
		self.check_open()?;
		self.bind_at(index, Value::Null);
		Ok(())
	}

	fn register_out(&mut self, _index: usize, _jdbc_type: JdbcType) -> DriverResult<()> {
		self.check_open()
	}

	fn out_value(&self, index: usize) -> DriverResult<Value> {
		let response = self.response.clone().unwrap_or_default();
		response
			.out_values
			.iter()
			.find(|(i, _)| *i == index)
			.map(|(_, v)| v.clone())
			.ok_or(DriverError::BadParameterIndex(index))
	}

	fn execute_query(&mut self) -> DriverResult<Box<dyn ResultSet>> {
		self.check_open()?;
		self.record(false);
		let response = self.resolve();
		let mut sets: VecDeque<ResultSetSpec> = response.result_sets.into();
		let first = sets.pop_front().unwrap_or(ResultSetSpec {
			columns: Vec::new(),
			rows: Vec::new(),
		});
		self.remaining_sets = sets;
		Ok(Box::new(StubResultSet::new(first)))
	}

	fn execute_update(&mut self) -> DriverResult<u64> {
		self.check_open()?;
		self.record(false);
		let response = self.resolve();
		Ok(response.affected)
	}

	fn more_results(&mut self) -> DriverResult<Option<Box<dyn ResultSet>>> {
		self.check_open()?;
		Ok(self
			.remaining_sets
			.pop_front()
			.map(|spec| Box::new(StubResultSet::new(spec)) as Box<dyn ResultSet>))
	}

	fn add_batch(&mut self) -> DriverResult<()> {
		self.check_open()?;
		self.record(true);
		let parameters = self.current_parameters();
		self.batch.push(parameters);
		self.bindings.clear();
		Ok(())
	}

	fn execute_batch(&mut self) -> DriverResult<Vec<u64>> {
		self.check_open()?;
		let response = self.resolve();
		let counts = vec![response.affected; self.batch.len()];
		self.batch.clear();
		Ok(counts)
	}

	fn generated_keys(&mut self) -> DriverResult<Option<Box<dyn ResultSet>>> {
		self.check_open()?;
		let response = self.response.clone().unwrap_or_default();
		Ok(response
			.generated_keys
			.map(|spec| Box::new(StubResultSet::new(spec)) as Box<dyn ResultSet>))
	}

	fn close(&mut self) -> DriverResult<()> {
		self.closed = true;
		Ok(())
	}
}

struct StubResultSet {
	columns: Vec<ColumnInfo>,
	rows: Vec<Vec<Value>>,
	cursor: Option<usize>,
	closed: bool,
}

impl StubResultSet {
	fn new(spec: ResultSetSpec) -> Self {
		Self { columns: spec.columns, rows: spec.rows, cursor: None, closed: false }
	}
}

impl ResultSet for StubResultSet {
	fn columns(&self) -> &[ColumnInfo] {
		&self.columns
	}

	fn next(&mut self) -> DriverResult<bool> {
		if self.closed {
			return Err(DriverError::StatementClosed);
		}
		let next = self.cursor.map_or(0, |c| c + 1);
		if next < self.rows.len() {
			self.cursor = Some(next);
			Ok(true)
		} else {
			self.cursor = Some(self.rows.len());
			Ok(false)
		}
	}

	fn get(&self, index: usize) -> DriverResult<Value> {
		let row = self
			.cursor
			.and_then(|c| self.rows.get(c))
			.ok_or(DriverError::BadColumnIndex(index))?;
		row.get(index).cloned().ok_or(DriverError::BadColumnIndex(index))
	}

	fn close(&mut self) -> DriverResult<()> {
		self.closed = true;
		Ok(())
	}
}
