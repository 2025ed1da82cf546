//! The synchronous driver contract.
//!
//! The real database protocol lives outside this crate; executors talk to it
//! through these traits. Implementations own their resources ( a boxed
//! [`Statement`] must stay valid independently of the connection object that
//! produced it) and block the calling thread for I/O.

use std::time::Duration;

use crate::types::JdbcType;
use crate::value::Value;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
	#[error("driver error: {0}")]
	Message(String),
	#[error("connection is closed")]
	ConnectionClosed,
	#[error("statement is closed")]
	StatementClosed,
	#[error("no parameter at index {0}")]
	BadParameterIndex(usize),
	#[error("no column at index {0}")]
	BadColumnIndex(usize),
	#[error("query timed out after {0:?}")]
	Timeout(Duration),
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Column metadata exposed by a result set.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
	pub name: String,
	/// Alias assigned in the SQL, when the driver distinguishes it.
	pub label: String,
	pub jdbc_type: JdbcType,
}

impl ColumnInfo {
	pub fn new(name: impl Into<String>, jdbc_type: JdbcType) -> Self {
		let name = name.into();
		Self { label: name.clone(), name, jdbc_type }
	}
}

/// Hands out connections. Shared across sessions.
pub trait DataSource: Send + Sync {
	fn connection(&self) -> DriverResult<Box<dyn Connection>>;
}

pub trait Connection: Send {
	fn prepare(&mut self, sql: &str) -> DriverResult<Box<dyn Statement>>;
	fn set_auto_commit(&mut self, auto_commit: bool) -> DriverResult<()>;
	fn auto_commit(&self) -> bool;
	fn commit(&mut self) -> DriverResult<()>;
	fn rollback(&mut self) -> DriverResult<()>;
	fn close(&mut self) -> DriverResult<()>;
	/// Vendor product name, consumed by the database-id provider.
	fn product_name(&self) -> DriverResult<String>;
}

pub trait Statement: Send {
	fn set_timeout(&mut self, timeout: Option<Duration>) -> DriverResult<()>;
	fn set_fetch_size(&mut self, fetch_size: Option<u32>) -> DriverResult<()>;

	/// Binds a positional parameter, zero-based.
	fn bind(&mut self, index: usize, value: Value) -> DriverResult<()>;
	fn bind_null(&mut self, index: usize, jdbc_type: JdbcType) -> DriverResult<()>;
	/// Registers an OUT parameter slot for callable statements.
	fn register_out(&mut self, index: usize, jdbc_type: JdbcType) -> DriverResult<()>;
	/// Reads an OUT parameter after execution.
	fn out_value(&self, index: usize) -> DriverResult<Value>;

	fn execute_query(&mut self) -> DriverResult<Box<dyn ResultSet>>;
	fn execute_update(&mut self) -> DriverResult<u64>;
	/// Next result set for multi-result statements, None when exhausted.
	fn more_results(&mut self) -> DriverResult<Option<Box<dyn ResultSet>>>;

	fn add_batch(&mut self) -> DriverResult<()>;
	fn execute_batch(&mut self) -> DriverResult<Vec<u64>>;

	/// Keys generated by the last insert, when the driver supports it.
	fn generated_keys(&mut self) -> DriverResult<Option<Box<dyn ResultSet>>>;

	fn close(&mut self) -> DriverResult<()>;
}

pub trait ResultSet: Send {
	fn columns(&self) -> &[ColumnInfo];
	/// Advances to the next row; false on exhaustion.
	fn next(&mut self) -> DriverResult<bool>;
	/// Raw value of the given column in the current row, zero-based.
	fn get(&self, index: usize) -> DriverResult<Value>;
	fn close(&mut self) -> DriverResult<()>;
}
