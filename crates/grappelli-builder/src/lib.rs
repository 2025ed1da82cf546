//! Configuration builders: XML ingestion for the configuration document and
//! mapper documents, the dynamic-script compiler, and the descriptor-based
//! registration path for mappers declared in code.

pub mod assistant;
pub mod config;
pub mod descriptor;
pub mod mapper;
pub mod script;

pub use config::XmlConfigBuilder;
pub use descriptor::MapperModule;
pub use mapper::XmlMapperBuilder;
pub use script::build_sql_source;
