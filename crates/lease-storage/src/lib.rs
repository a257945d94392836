//! Storage backend abstraction for lease coordination.
//!
//! This crate defines the [`LeaseBackend`] trait — the pluggable surface for
//! the five atomic operations (`put`, `get`, `delete`, `renew`, `expire`)
//! that the domain layer in `lease-core` builds on. It knows nothing about
//! monotonic clocks or lease lifecycles, only raw millisecond integers.
//!
//! Two implementations are provided:
//!
//! - [`RedisBackend`] — production default, executes the five operations as
//!   cached Lua scripts over a [`redis::aio::ConnectionManager`] (feature
//!   `redis-backend`, enabled by default)
//! - [`MemoryBackend`] — in-process, for testing without a live Redis

mod backend;
mod error;
mod memory_backend;
#[cfg(feature = "redis-backend")]
mod redis_backend;
#[cfg(feature = "redis-backend")]
mod script_cache;
#[cfg(feature = "redis-backend")]
mod scripts;

pub use backend::{LeaseBackend, RawLease};
pub use error::StorageError;
pub use memory_backend::{MemoryBackend, RecordedEvent};
#[cfg(feature = "redis-backend")]
pub use redis_backend::RedisBackend;
#[cfg(feature = "redis-backend")]
pub use script_cache::ScriptCache;
