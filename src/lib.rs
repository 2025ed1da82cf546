//! # Grappelli
//!
//! A SQL-mapping runtime for Rust: user-declared query interfaces bind to
//! externally authored SQL, statements execute through a synchronous driver
//! contract, and rows project into domain values (and domain values into
//! parameters).
//!
//! Grappelli does not write SQL for you. Mapper documents (or code-declared
//! mapper modules) carry the SQL; the runtime compiles dynamic statement
//! bodies per invocation, binds parameters through a bidirectional type
//! handler registry, and projects result rows through declarative result
//! maps — nested joins, discriminated variants, and lazy associations
//! included. Two cache layers sit in front of the database: a per-session
//! first-level cache and an optional shared second-level cache with
//! transactional staging.
//!
//! ## Quick example
//!
//! ```rust,ignore
//! use grappelli::prelude::*;
//!
//! let configuration = XmlConfigBuilder::new()
//! 	.transaction_factory("MANAGED", my_tx_factory)
//! 	.data_source("POOLED", my_data_source)
//! 	.resource("blog-mapper.xml", BLOG_MAPPER_XML)
//! 	.parse(CONFIG_XML)?;
//!
//! let factory = SqlSessionFactoryBuilder::build(configuration);
//! let mut session = factory.open_session()?;
//! let blogs: Vec<Blog> = session.select_list("blog.findAll", &())?;
//! session.close()?;
//! ```

pub mod binding;
pub mod error;
pub mod manager;
pub mod session;

pub use binding::{MapperArgs, MapperResult};
pub use error::{Error, Result};
pub use manager::SqlSessionManager;
pub use session::{SqlSession, SqlSessionFactory, SqlSessionFactoryBuilder};

// Re-export the subsystem crates under their subject names.
pub use grappelli_builder as builder;
pub use grappelli_cache as cache;
pub use grappelli_core as core;
pub use grappelli_executor as executor;
pub use grappelli_mapping as mapping;

// Re-export the types most callers touch directly.
pub use grappelli_builder::{MapperModule, XmlConfigBuilder, XmlMapperBuilder};
pub use grappelli_core::types::{JavaType, JdbcType, TypeHandler};
pub use grappelli_core::value::Value;
pub use grappelli_executor::{Cursor, LazyRow, ResultHandler};
pub use grappelli_mapping::{
	Configuration, ExecutorType, MappedStatement, ResultMap, RowBounds, Settings,
};

pub mod prelude {
	pub use crate::binding::{MapperArgs, MapperResult};
	pub use crate::error::{Error, Result};
	pub use crate::manager::SqlSessionManager;
	pub use crate::session::{SqlSession, SqlSessionFactory, SqlSessionFactoryBuilder};

	pub use grappelli_builder::descriptor::StatementSpec;
	pub use grappelli_builder::{MapperModule, XmlConfigBuilder, XmlMapperBuilder};
	pub use grappelli_core::value::Value;
	pub use grappelli_mapping::{Configuration, ExecutorType, RowBounds};

	pub use serde::{Deserialize, Serialize};
}
