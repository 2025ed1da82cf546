//! Mapping definitions and the configuration aggregate.
//!
//! Everything here is data the builders produce once and the executors read
//! forever: immutable [`MappedStatement`]s, [`ResultMap`] trees, the dynamic
//! SQL node language, and the [`Configuration`] registry that owns them all.

pub mod binding;
pub mod bound;
pub mod config;
pub mod dynamic;
pub mod environment;
pub mod error;
pub mod parameter;
pub mod plugin;
pub mod result_map;
pub mod source;
pub mod statement;

pub use binding::{MapperDescriptor, MethodDescriptor, ResultDisposition};
pub use bound::{BoundSql, RowBounds};
pub use config::{
	AutoMappingBehavior, AutoMappingUnknownColumnBehavior, Configuration, ExecutorType,
	LocalCacheScope, Settings,
};
pub use dynamic::{DynamicContext, SqlNode};
pub use environment::{DatabaseIdProvider, Environment, VendorDatabaseIdProvider};
pub use error::BuildError;
pub use parameter::{ParameterMapping, ParameterMode};
pub use plugin::{Interceptor, InvocationContext};
pub use result_map::{Discriminator, ResultMap, ResultMapping};
pub use source::{DynamicSqlSource, RawSqlSource, SqlSource, SqlSourceBuilder, StaticSqlSource};
pub use statement::{
	KeyGeneratorKind, MappedStatement, ResultSetType, SqlCommandType, StatementType,
};
