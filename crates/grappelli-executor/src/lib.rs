//! The execution engine: session-scoped executors over the driver contract,
//! statement handlers, parameter binding, result projection, key
//! generation, and cursors.

pub mod cursor;
pub mod error;
pub mod executor;
pub mod keygen;
pub mod loader;
pub mod parameter;
pub mod result;
pub mod statement;
pub mod transaction;

pub use cursor::Cursor;
pub use error::ExecutorError;
pub use executor::{
	BatchResult, DeferredPatch, Executor, QueryOutcome, new_executor,
	PENDING_UPDATE_COUNT,
};
pub use loader::{LazyRow, ResultLoader};
pub use result::{DefaultResultHandler, ResultContext, ResultHandler};
pub use transaction::{DriverTransaction, DriverTransactionFactory, ManagedTransaction};
