//! Cache layer: the pluggable cache contract, the composable decorator
//! stack, and the per-session transactional staging buffer that keeps the
//! shared second-level cache consistent across uncommitted sessions.

pub mod cache;
pub mod decorators;
pub mod key;
pub mod transactional;

pub use cache::{Cache, CacheError, CacheValue, PerpetualCache};
pub use key::CacheKey;
pub use transactional::{TransactionalCache, TransactionalCacheManager};
