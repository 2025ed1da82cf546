//! Mapper descriptor tables.
//!
//! The proxy-based method binding of the original design is re-architected
//! as data: each mapper interface registers a descriptor table mapping
//! method names to resolved statement ids, parameter name lists, and result
//! dispositions. Dispatch is then a table lookup in the session facade.

use indexmap::IndexMap;

/// How a method's results are shaped for the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResultDisposition {
	/// At most one row; more than one is an error.
	One,
	#[default]
	Many,
	/// Rows keyed by a property value.
	MapByKey(String),
	/// A lazily traversed cursor.
	Cursor,
	/// The affected-row count of a write.
	Affected,
}

/// One mapper method resolved at registration time.
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
	pub name: String,
	pub statement_id: String,
	/// Declared parameter names, positionally; `None` falls back to the
	/// positional `param1…` aliases.
	pub param_names: Vec<Option<String>>,
	pub disposition: ResultDisposition,
}

impl MethodDescriptor {
	pub fn new(name: impl Into<String>, statement_id: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			statement_id: statement_id.into(),
			param_names: Vec::new(),
			disposition: ResultDisposition::Many,
		}
	}

	pub fn param_names(mut self, names: Vec<Option<String>>) -> Self {
		self.param_names = names;
		self
	}

	pub fn disposition(mut self, disposition: ResultDisposition) -> Self {
		self.disposition = disposition;
		self
	}
}

/// The descriptor table for one mapper namespace.
#[derive(Debug, Clone, Default)]
pub struct MapperDescriptor {
	pub namespace: String,
	pub methods: IndexMap<String, MethodDescriptor>,
}

impl MapperDescriptor {
	pub fn new(namespace: impl Into<String>) -> Self {
		Self { namespace: namespace.into(), methods: IndexMap::new() }
	}

	pub fn add_method(&mut self, method: MethodDescriptor) {
		self.methods.insert(method.name.clone(), method);
	}

	pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
		self.methods.get(name)
	}
}
