//! Core library for distributed lease coordination.
//!
//! Builds the domain layer (timestamps, lease records, typed errors) on top
//! of the [`lease_storage::LeaseBackend`] abstraction, and wires it into the
//! four public-facing pieces: [`Lessor`] (client façade), [`LeaseReaper`]
//! (background expiry scheduler), [`Watcher`] (expiry event consumer), and
//! [`LeaseExpiryContract`] (declarative reaper configuration).

mod contract;
mod error;
mod event;
mod executor;
mod lease;
mod lessor;
mod provider;
mod reaper;
mod retry;
mod timestamp;
mod watcher;

pub use contract::LeaseExpiryContract;
pub use error::{LessorError, ProviderError, ReaperError, StorageError, WatcherError};
pub use event::{Event, ExpireOptions};
pub use executor::ExpireExecutor;
pub use lease::Lease;
pub use lessor::Lessor;
pub use provider::LeaseProvider;
pub use reaper::{ErrorHandler, HookContext, LeaseReaper, ReaperHook};
pub use retry::{retry_backoff, RetryPolicy};
pub use timestamp::Timestamp;
pub use watcher::{EventHandler, StreamOffset, Watcher};
