//! The transaction seam executors run on.
//!
//! A transaction owns one connection for the life of a session. Concrete
//! strategies (driver-managed, externally managed) live with the executor
//! crate; environments reference the factory through this trait.

use std::time::Duration;

use crate::driver::{Connection, DataSource, DriverResult};

pub trait Transaction: Send {
	/// The connection carried by this transaction, opened lazily.
	fn connection(&mut self) -> DriverResult<&mut dyn Connection>;
	fn commit(&mut self) -> DriverResult<()>;
	fn rollback(&mut self) -> DriverResult<()>;
	fn close(&mut self) -> DriverResult<()>;
	/// Remaining transaction budget, used to clamp per-statement timeouts.
	fn timeout(&self) -> Option<Duration> {
		None
	}
}

pub trait TransactionFactory: Send + Sync {
	fn new_transaction(
		&self,
		data_source: &dyn DataSource,
		auto_commit: bool,
	) -> DriverResult<Box<dyn Transaction>>;
}
