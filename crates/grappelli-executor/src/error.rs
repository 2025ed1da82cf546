//! Execution-time errors, each carrying the statement id breadcrumb.

use grappelli_cache::cache::CacheError;
use grappelli_core::driver::DriverError;
use grappelli_core::meta::ReflectionError;
use grappelli_core::types::TypeError;
use grappelli_mapping::BuildError;

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
	#[error("executor is closed")]
	Closed,
	#[error("error executing '{statement_id}' [{sql}]: {source}")]
	Driver {
		statement_id: String,
		/// Leading fragment of the SQL, safe for diagnostics.
		sql: String,
		#[source]
		source: DriverError,
	},
	#[error("type conversion failed in '{statement_id}': {source}")]
	Type {
		statement_id: String,
		#[source]
		source: TypeError,
	},
	#[error("result mapping failed in '{statement_id}': {detail}")]
	Mapping { statement_id: String, detail: String },
	#[error("batch execution failed in '{statement_id}': {detail}; the enqueued batch was discarded, roll back the session")]
	Batch { statement_id: String, detail: String },
	#[error("caching a callable statement with OUT parameters is not supported; set useCache=false on '{statement_id}'")]
	OutParamsNotCacheable { statement_id: String },
	#[error("row bounds are not allowed here because safeRowBoundsEnabled is set")]
	UnsafeRowBounds,
	#[error("a custom result handler is not allowed here because safeResultHandlerEnabled is set")]
	UnsafeResultHandler,
	#[error("cursor is closed")]
	CursorClosed,
	#[error(transparent)]
	Build(#[from] BuildError),
	#[error(transparent)]
	Reflection(#[from] ReflectionError),
	#[error(transparent)]
	Cache(#[from] CacheError),
}

impl ExecutorError {
	pub fn driver(statement_id: &str, sql: &str, source: DriverError) -> Self {
		ExecutorError::Driver {
			statement_id: statement_id.to_string(),
			sql: sql.chars().take(120).collect(),
			source,
		}
	}

	pub fn type_error(statement_id: &str, source: TypeError) -> Self {
		ExecutorError::Type { statement_id: statement_id.to_string(), source }
	}

	pub fn mapping(statement_id: &str, detail: impl Into<String>) -> Self {
		ExecutorError::Mapping { statement_id: statement_id.to_string(), detail: detail.into() }
	}
}
