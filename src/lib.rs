//! Single-resolution futures with continuations.
//!
//! A [`Future`] is a container for a value that does not exist yet. It is
//! resolved exactly once, by whoever holds its [`Resolver`], and any number
//! of consumers may attach continuations with [`Future::observe`]. Each live
//! continuation runs exactly once, when the value arrives, on the
//! [`Context`] it was registered with.
//!
//! ```
//! use eventual::{Context, Future};
//!
//! let (future, resolver) = Future::<i32>::promise();
//! let doubled = future.transform(Context::Immediate, |x| x * 2);
//!
//! resolver.resolve(21).unwrap();
//! assert_eq!(doubled.value(), Some(42));
//! ```
//!
//! Cancellation is driven by ownership. Dropping the last handle to a future
//! that is still pending runs its upstream cancel callback, which for derived
//! futures tears down the subscription to their source.
//!
//! # Reentrancy
//!
//! Continuations run while the resolving future holds its own lock. A
//! continuation must never synchronously observe or resolve the future that
//! is invoking it; doing so deadlocks.
use thiserror::Error;

mod compose;
mod context;
pub mod executor;
mod future;
mod main_queue;
mod promise;
mod state;
mod waiter;

pub use context::{Context, Invoker};
pub use executor::{Executor, PoolConfig, Task, ThreadPoolExecutor};
pub use future::{Future, Subscription};
pub use main_queue::{main_queue, MainQueue};
pub use promise::{promise, promise_with_cancel, Resolver};
pub use state::Cancel;
pub use waiter::Waiter;

#[derive(Debug, Error)]
pub enum Error {
    #[error("the future was released before it could be resolved")]
    Released,
    #[error("the main queue can only be drained from the main thread")]
    NotMainThread,
    #[error("another thread has already been designated as the main thread")]
    MainThreadTaken,
    #[error("failed to start executor threads: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("the global executor is already running")]
    AlreadyConfigured,
}
