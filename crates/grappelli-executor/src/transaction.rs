//! Transaction strategies over the driver contract.

use std::time::{Duration, Instant};

use grappelli_core::driver::{Connection, DataSource, DriverResult};
use grappelli_core::transaction::{Transaction, TransactionFactory};
use tracing::debug;

/// Owns a connection obtained lazily from the data source; commit and
/// rollback drive the driver directly.
pub struct DriverTransaction {
	data_source: std::sync::Arc<dyn DataSource>,
	connection: Option<Box<dyn Connection>>,
	auto_commit: bool,
	deadline: Option<Instant>,
}

impl DriverTransaction {
	pub fn new(data_source: std::sync::Arc<dyn DataSource>, auto_commit: bool) -> Self {
		Self { data_source, connection: None, auto_commit, deadline: None }
	}

	/// Sets a transaction budget; per-statement timeouts clamp to what is
	/// left of it.
	pub fn with_budget(mut self, budget: Duration) -> Self {
		self.deadline = Some(Instant::now() + budget);
		self
	}
}

impl Transaction for DriverTransaction {
	fn connection(&mut self) -> DriverResult<&mut dyn Connection> {
		if self.connection.is_none() {
			let mut connection = self.data_source.connection()?;
			connection.set_auto_commit(self.auto_commit)?;
			debug!(auto_commit = self.auto_commit, "opened connection");
			self.connection = Some(connection);
		}
		Ok(self.connection.as_mut().expect("connection just opened").as_mut())
	}

	fn commit(&mut self) -> DriverResult<()> {
		match &mut self.connection {
			Some(connection) if !connection.auto_commit() => connection.commit(),
			_ => Ok(()),
		}
	}

	fn rollback(&mut self) -> DriverResult<()> {
		match &mut self.connection {
			Some(connection) if !connection.auto_commit() => connection.rollback(),
			_ => Ok(()),
		}
	}

	fn close(&mut self) -> DriverResult<()> {
		if let Some(mut connection) = self.connection.take() {
			connection.close()?;
		}
		Ok(())
	}

	fn timeout(&self) -> Option<Duration> {
		self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
	}
}

pub struct DriverTransactionFactory;

impl TransactionFactory for DriverTransactionFactory {
	fn new_transaction(
		&self,
		data_source: &dyn DataSource,
		auto_commit: bool,
	) -> DriverResult<Box<dyn Transaction>> {
		// the data source is shared state; the transaction needs its own handle
		let connection = data_source.connection()?;
		let mut tx = ConnectionTransaction { connection, auto_commit_applied: false, auto_commit };
		tx.connection()?;
		Ok(Box::new(tx))
	}
}

struct ConnectionTransaction {
	connection: Box<dyn Connection>,
	auto_commit: bool,
	auto_commit_applied: bool,
}

impl Transaction for ConnectionTransaction {
	fn connection(&mut self) -> DriverResult<&mut dyn Connection> {
		if !self.auto_commit_applied {
			self.connection.set_auto_commit(self.auto_commit)?;
			self.auto_commit_applied = true;
		}
		Ok(self.connection.as_mut())
	}

	fn commit(&mut self) -> DriverResult<()> {
		if self.connection.auto_commit() { Ok(()) } else { self.connection.commit() }
	}

	fn rollback(&mut self) -> DriverResult<()> {
		if self.connection.auto_commit() { Ok(()) } else { self.connection.rollback() }
	}

	fn close(&mut self) -> DriverResult<()> {
		self.connection.close()
	}
}

/// Leaves commit/rollback to an outer coordinator; close optionally rolls
/// the connection back first.
pub struct ManagedTransaction {
	connection: Box<dyn Connection>,
	close_connection: bool,
}

impl ManagedTransaction {
	pub fn new(connection: Box<dyn Connection>, close_connection: bool) -> Self {
		Self { connection, close_connection }
	}
}

impl Transaction for ManagedTransaction {
	fn connection(&mut self) -> DriverResult<&mut dyn Connection> {
		Ok(self.connection.as_mut())
	}

	fn commit(&mut self) -> DriverResult<()> {
		Ok(())
	}

	fn rollback(&mut self) -> DriverResult<()> {
		Ok(())
	}

	fn close(&mut self) -> DriverResult<()> {
		if self.close_connection { self.connection.close() } else { Ok(()) }
	}
}
