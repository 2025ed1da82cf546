//! Build-time error kind shared by the configuration aggregate, the SQL
//! sources, and the document builders.

use grappelli_core::expr::EvalError;
use grappelli_core::meta::ReflectionError;
use grappelli_core::types::TypeError;
use grappelli_core::xml::XmlError;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
	#[error("{0}")]
	Message(String),
	#[error("duplicate mapped statement id '{id}'")]
	DuplicateStatement { id: String },
	#[error("duplicate result map id '{id}'")]
	DuplicateResultMap { id: String },
	#[error("unknown setting '{name}'")]
	UnknownSetting { name: String },
	#[error("invalid value '{value}' for setting '{name}'")]
	InvalidSetting { name: String, value: String },
	#[error("unresolved references at end of build: {references:?}")]
	IncompleteReference { references: Vec<String> },
	#[error("script error in statement '{statement_id}': {detail}")]
	Script { statement_id: String, detail: String },
	#[error("builder already used; a configuration builder parses exactly once")]
	AlreadyParsed,
	#[error(transparent)]
	Xml(#[from] XmlError),
	#[error(transparent)]
	Eval(#[from] EvalError),
	#[error(transparent)]
	Reflection(#[from] ReflectionError),
	#[error(transparent)]
	Type(#[from] TypeError),
}

impl BuildError {
	pub fn message(text: impl Into<String>) -> Self {
		BuildError::Message(text.into())
	}

	pub fn script(statement_id: &str, detail: impl Into<String>) -> Self {
		BuildError::Script { statement_id: statement_id.to_string(), detail: detail.into() }
	}
}
