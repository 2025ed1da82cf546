//! Environment wiring and vendor-based database id resolution.

use std::sync::Arc;

use grappelli_core::driver::{DataSource, DriverError};
use grappelli_core::transaction::TransactionFactory;

/// One configured environment: transaction strategy plus data source.
#[derive(Clone)]
pub struct Environment {
	pub id: String,
	pub transaction_factory: Arc<dyn TransactionFactory>,
	pub data_source: Arc<dyn DataSource>,
}

impl Environment {
	pub fn new(
		id: impl Into<String>,
		transaction_factory: Arc<dyn TransactionFactory>,
		data_source: Arc<dyn DataSource>,
	) -> Self {
		Self { id: id.into(), transaction_factory, data_source }
	}
}

impl std::fmt::Debug for Environment {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Environment").field("id", &self.id).finish()
	}
}

/// Derives the active database id from a data source.
pub trait DatabaseIdProvider: Send + Sync {
	fn database_id(&self, data_source: &dyn DataSource) -> Result<Option<String>, DriverError>;
}

/// Maps vendor product-name substrings to database ids. With no entries the
/// raw product name becomes the id.
pub struct VendorDatabaseIdProvider {
	entries: Vec<(String, String)>,
}

impl VendorDatabaseIdProvider {
	pub fn new(entries: Vec<(String, String)>) -> Self {
		Self { entries }
	}
}

impl DatabaseIdProvider for VendorDatabaseIdProvider {
	fn database_id(&self, data_source: &dyn DataSource) -> Result<Option<String>, DriverError> {
		let mut connection = data_source.connection()?;
		let product = connection.product_name()?;
		let _ = connection.close();
		if self.entries.is_empty() {
			return Ok(Some(product));
		}
		Ok(self
			.entries
			.iter()
			.find(|(vendor, _)| product.contains(vendor.as_str()))
			.map(|(_, id)| id.clone()))
	}
}
