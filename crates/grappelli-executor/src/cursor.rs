//! Forward-only, single-traversal lazy row sequence over a live result set.

use std::sync::Arc;

use grappelli_core::driver::{ResultSet, Statement};
use grappelli_core::value::Value;
use grappelli_mapping::{Configuration, MappedStatement, RowBounds};

use crate::error::ExecutorError;
use crate::result::{ColumnIndex, DefaultResultSetHandler};

/// Iterates mapped rows straight off the driver; closing releases the
/// statement and result set, and reading after close fails.
pub struct Cursor {
	rsh: DefaultResultSetHandler,
	map_id: String,
	stmt: Option<Box<dyn Statement>>,
	rs: Option<Box<dyn ResultSet>>,
	columns: ColumnIndex,
	remaining: usize,
	closed: bool,
}

impl Cursor {
	pub(crate) fn new(
		configuration: Arc<Configuration>,
		ms: Arc<MappedStatement>,
		stmt: Box<dyn Statement>,
		rs: Box<dyn ResultSet>,
		row_bounds: RowBounds,
	) -> Result<Self, ExecutorError> {
		let map_id = ms.result_map_ids.first().cloned().ok_or_else(|| {
			ExecutorError::mapping(&ms.id, "a cursor query requires a result map")
		})?;
		let map = configuration.result_map(&map_id).ok_or_else(|| {
			ExecutorError::mapping(&ms.id, format!("result map '{map_id}' is not registered"))
		})?;
		if map.has_nested_result_maps() || map.has_nested_selects() {
			return Err(ExecutorError::mapping(
				&ms.id,
				"cursor queries require a flat result map without nested mappings",
			));
		}
		let columns = ColumnIndex::new(rs.columns(), configuration.settings().use_column_label);
		let rsh = DefaultResultSetHandler::new(configuration, ms, RowBounds::DEFAULT);
		let mut cursor = Self {
			rsh,
			map_id,
			stmt: Some(stmt),
			rs: Some(rs),
			columns,
			remaining: row_bounds.limit,
			closed: false,
		};
		for _ in 0..row_bounds.offset {
			let advanced = cursor.advance()?;
			if !advanced {
				break;
			}
		}
		Ok(cursor)
	}

	fn advance(&mut self) -> Result<bool, ExecutorError> {
		let Some(rs) = self.rs.as_mut() else { return Ok(false) };
		rs.next().map_err(|e| ExecutorError::driver("<cursor>", "<fetch>", e))
	}

	/// Reads and maps the next row; `None` means exhausted (and closed).
	pub fn next_row(&mut self) -> Result<Option<Value>, ExecutorError> {
		if self.closed {
			return Err(ExecutorError::CursorClosed);
		}
		loop {
			if self.remaining == 0 || !self.advance()? {
				self.close();
				return Ok(None);
			}
			self.remaining -= 1;
			let rs = self.rs.as_deref().expect("open cursor has a result set");
			let row = self.rsh.flat_row(rs, &self.map_id, &self.columns)?;
			if let Some(row) = row {
				return Ok(Some(row));
			}
			// empty rows are skipped, matching list queries
		}
	}

	/// Releases the driver resources. Safe to call more than once.
	pub fn close(&mut self) {
		if let Some(mut rs) = self.rs.take() {
			let _ = rs.close();
		}
		if let Some(mut stmt) = self.stmt.take() {
			let _ = stmt.close();
		}
		self.closed = true;
	}

	pub fn is_closed(&self) -> bool {
		self.closed
	}
}

impl Drop for Cursor {
	fn drop(&mut self) {
		self.close();
	}
}

impl Iterator for Cursor {
	type Item = Result<Value, ExecutorError>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.closed {
			return None;
		}
		self.next_row().transpose()
	}
}
