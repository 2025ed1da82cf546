//! The facade error type, folding every subsystem error kind together.

use grappelli_core::driver::DriverError;
use grappelli_core::value::ValueError;
use grappelli_executor::ExecutorError;
use grappelli_mapping::BuildError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("no mapper is registered for '{namespace}'")]
	UnknownMapper { namespace: String },
	#[error("mapper '{namespace}' has no method '{method}'")]
	UnknownMapperMethod { namespace: String, method: String },
	#[error("no mapped statement named '{statement_id}'")]
	UnknownStatement { statement_id: String },
	#[error("statement '{statement_id}' expected at most one row, found {count}")]
	TooManyResults { statement_id: String, count: usize },
	#[error("map key property '{key}' is missing on a row of '{statement_id}'")]
	MissingMapKey { statement_id: String, key: String },
	#[error("session is closed")]
	SessionClosed,
	#[error("no session is bound to the current thread")]
	NoBoundSession,
	#[error("configuration has no environment; register one before opening sessions")]
	NoEnvironment,
	#[error(transparent)]
	Build(#[from] BuildError),
	#[error(transparent)]
	Executor(#[from] ExecutorError),
	#[error(transparent)]
	Value(#[from] ValueError),
	#[error(transparent)]
	Driver(#[from] DriverError),
}

pub type Result<T> = std::result::Result<T, Error>;
