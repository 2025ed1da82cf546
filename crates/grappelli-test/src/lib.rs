//! Test support: a scriptable in-memory driver implementing the synchronous
//! driver contract.
//!
//! Tests script responses by SQL substring and then assert on the recorded
//! executions:
//!
//! ```
//! use grappelli_core::types::JdbcType;
//! use grappelli_core::value::Value;
//! use grappelli_test::StubDataSource;
//!
//! let ds = StubDataSource::new();
//! ds.when("FROM blog").rows(
//! 	&[("id", JdbcType::BigInt), ("title", JdbcType::Varchar)],
//! 	vec![vec![Value::Int(1), Value::from("jazz")]],
//! );
//! ```

mod driver;

pub use driver::{ExecutedStatement, ResponseBuilder, StubDataSource};
