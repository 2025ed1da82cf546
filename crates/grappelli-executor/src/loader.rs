//! Deferred and lazy loading, without proxies.
//!
//! A [`ResultLoader`] is an unresolved association: the statement to run,
//! the canonicalized parameter, and where in the owning row the result
//! lands. [`LazyRow`] pairs a projected row with its unresolved loaders;
//! callers materialize properties explicitly (or through the configured
//! trigger names) by lending the owning session's executor.

use grappelli_core::meta::{self, MetaValue};
use grappelli_core::value::Value;
use grappelli_mapping::RowBounds;

use crate::error::ExecutorError;
use crate::executor::Executor;

/// One unresolved association load.
#[derive(Debug, Clone)]
pub struct ResultLoader {
	pub statement_id: String,
	pub parameter: Value,
	/// Index of the owning row within the query result.
	pub row: usize,
	/// Property path inside the owning row.
	pub target_path: String,
	/// Single object vs collection shape for the loaded rows.
	pub single: bool,
}

impl ResultLoader {
	pub fn load(&self, executor: &mut dyn Executor) -> Result<Value, ExecutorError> {
		let statement = executor
			.configuration()
			.mapped_statement(&self.statement_id)
			.ok_or_else(|| {
				ExecutorError::mapping(
					&self.statement_id,
					"nested select statement is not registered",
				)
			})?;
		let mut parameter = self.parameter.clone();
		let outcome = executor.query(&statement, &mut parameter, RowBounds::DEFAULT, None)?;
		Ok(shape_rows(outcome.rows, self.single))
	}
}

pub fn shape_rows(rows: Vec<Value>, single: bool) -> Value {
	if single {
		rows.into_iter().next().unwrap_or(Value::Null)
	} else {
		Value::Array(rows)
	}
}

/// A row whose lazy associations have not been fetched yet.
#[derive(Debug)]
pub struct LazyRow {
	value: Value,
	loaders: Vec<ResultLoader>,
}

impl LazyRow {
	pub fn new(value: Value, loaders: Vec<ResultLoader>) -> Self {
		Self { value, loaders }
	}

	pub fn value(&self) -> &Value {
		&self.value
	}

	pub fn is_fully_loaded(&self) -> bool {
		self.loaders.is_empty()
	}

	pub fn pending_properties(&self) -> Vec<&str> {
		self.loaders.iter().map(|l| l.target_path.as_str()).collect()
	}

	/// Materializes one property, if it has a pending loader.
	pub fn load_property(
		&mut self,
		executor: &mut dyn Executor,
		property: &str,
	) -> Result<(), ExecutorError> {
		if let Some(pos) = self.loaders.iter().position(|l| l.target_path == property) {
			let loader = self.loaders.remove(pos);
			let loaded = loader.load(executor)?;
			meta::set_path(&mut self.value, &loader.target_path, loaded);
		}
		Ok(())
	}

	/// Materializes everything still pending.
	pub fn load_all(&mut self, executor: &mut dyn Executor) -> Result<(), ExecutorError> {
		while let Some(loader) = self.loaders.pop() {
			let loaded = loader.load(executor)?;
			meta::set_path(&mut self.value, &loader.target_path, loaded);
		}
		Ok(())
	}

	/// Reads a property, materializing it first when lazy. With
	/// `aggressiveLazyLoading` the whole row loads on any touch.
	pub fn get(
		&mut self,
		executor: &mut dyn Executor,
		property: &str,
	) -> Result<Value, ExecutorError> {
		if executor.configuration().settings().aggressive_lazy_loading {
			self.load_all(executor)?;
		} else {
			self.load_property(executor, property)?;
		}
		Ok(MetaValue::new(&self.value).get(property).cloned().unwrap_or(Value::Null))
	}

	/// A touch through one of the configured trigger method names
	/// (`equals`, `clone`, `hashCode`, `toString` by default) loads the
	/// whole row.
	pub fn touch(
		&mut self,
		executor: &mut dyn Executor,
		method: &str,
	) -> Result<(), ExecutorError> {
		if executor
			.configuration()
			.settings()
			.lazy_load_trigger_methods
			.contains(method)
		{
			self.load_all(executor)?;
		}
		Ok(())
	}

	/// Unwraps the row; pending loaders are dropped unresolved.
	pub fn into_value(self) -> Value {
		self.value
	}
}
