//! Core building blocks for the grappelli SQL-mapping runtime.
//!
//! This crate carries everything the upper layers agree on:
//!
//! - [`value::Value`] — the runtime value tree parameters and rows travel in
//! - [`token`] — the generic `open…close` token scanner
//! - [`property`] — dotted/indexed property path parsing
//! - [`expr`] — the boolean/navigation expression language used by dynamic SQL
//! - [`meta`] — type descriptors, reflectors, and value navigation
//! - [`types`] — `JdbcType`, type handlers, and the handler/alias registries
//! - [`driver`] — the synchronous database driver contract
//! - [`transaction`] — the transaction seam executors run on
//! - [`xml`] — an owned XML element tree read through `quick-xml`

pub mod driver;
pub mod expr;
pub mod meta;
pub mod property;
pub mod token;
pub mod transaction;
pub mod types;
pub mod value;
pub mod xml;

pub use driver::{ColumnInfo, Connection, DataSource, DriverError, ResultSet, Statement};
pub use expr::{EvalError, Expr, Scope};
pub use meta::{MetaValue, Reflector, ReflectorFactory, ReflectionError, TypeDescriptor};
pub use token::TokenParser;
pub use transaction::{Transaction, TransactionFactory};
pub use types::{JavaType, JdbcType, TypeAliasRegistry, TypeError, TypeHandler, TypeHandlerRegistry};
pub use value::Value;
pub use xml::{XmlElement, XmlError};
