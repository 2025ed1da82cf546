//! Ordered parameter descriptors produced by `#{…}` parsing.

use std::sync::Arc;

use grappelli_core::types::{JavaType, JdbcType, TypeHandler};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterMode {
	#[default]
	In,
	Out,
	InOut,
}

impl ParameterMode {
	pub fn parse(name: &str) -> Option<ParameterMode> {
		Some(match name.to_ascii_uppercase().as_str() {
			"IN" => ParameterMode::In,
			"OUT" => ParameterMode::Out,
			"INOUT" => ParameterMode::InOut,
			_ => return None,
		})
	}

	pub fn is_out(&self) -> bool {
		matches!(self, ParameterMode::Out | ParameterMode::InOut)
	}
}

/// One `#{…}` placeholder: where to read the value and how to bind it.
#[derive(Clone)]
pub struct ParameterMapping {
	pub property: String,
	pub java_type: Option<JavaType>,
	pub jdbc_type: Option<JdbcType>,
	pub jdbc_type_name: Option<String>,
	pub mode: ParameterMode,
	pub numeric_scale: Option<u32>,
	/// Result map projecting a cursor OUT parameter.
	pub result_map_id: Option<String>,
	pub type_handler: Option<Arc<dyn TypeHandler>>,
}

impl ParameterMapping {
	pub fn new(property: impl Into<String>) -> Self {
		Self {
			property: property.into(),
			java_type: None,
			jdbc_type: None,
			jdbc_type_name: None,
			mode: ParameterMode::In,
			numeric_scale: None,
			result_map_id: None,
			type_handler: None,
		}
	}
}

impl std::fmt::Debug for ParameterMapping {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ParameterMapping")
			.field("property", &self.property)
			.field("java_type", &self.java_type)
			.field("jdbc_type", &self.jdbc_type)
			.field("mode", &self.mode)
			.field("has_type_handler", &self.type_handler.is_some())
			.finish()
	}
}
