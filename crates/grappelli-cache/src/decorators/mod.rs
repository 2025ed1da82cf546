//! Cache decorators. Each wraps another [`Cache`](crate::Cache) and adds
//! one capability; construction order is data-driven from the mapper
//! document's `cache` attributes.

mod blocking;
mod fifo;
mod logging;
mod lru;
mod scheduled;
mod serialized;
mod synchronized;
mod weak;

pub use blocking::BlockingCache;
pub use fifo::FifoCache;
pub use logging::LoggingCache;
pub use lru::LruCache;
pub use scheduled::ScheduledCache;
pub use serialized::SerializedCache;
pub use synchronized::SynchronizedCache;
pub use weak::WeakCache;
