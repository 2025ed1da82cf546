//! The interception contract.
//!
//! Interceptors registered at build time observe executor operations; the
//! chain runs in registration order before the driver is touched and in
//! reverse order afterwards. Discovery and wiring glue live with the
//! embedding application.

use grappelli_core::value::Value;

use crate::statement::SqlCommandType;

/// What an interceptor sees for one executor operation.
pub struct InvocationContext<'a> {
	pub statement_id: &'a str,
	pub command: SqlCommandType,
	pub sql: Option<&'a str>,
	pub parameter: &'a Value,
}

#[allow(unused_variables)]
pub trait Interceptor: Send + Sync {
	fn name(&self) -> &str;

	fn before_query(&self, invocation: &InvocationContext<'_>) {}

	fn after_query(&self, invocation: &InvocationContext<'_>, row_count: usize) {}

	fn before_update(&self, invocation: &InvocationContext<'_>) {}

	fn after_update(&self, invocation: &InvocationContext<'_>, affected: u64) {}
}
