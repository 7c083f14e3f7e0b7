use crate::context::Context;
use crate::executor::{self, Executor};
use crate::promise::{self, Resolver};
use crate::state::{Cancel, Inner, Observer};
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::debug;

/// A value that will be supplied exactly once.
///
/// `Future` is a shared handle: clones refer to the same underlying value.
/// When the last handle to a future that is still pending is dropped, the
/// future's upstream cancel callback (if any) runs.
///
/// # Examples
///
/// ```
/// use eventual::{Context, Future};
/// use std::sync::mpsc;
///
/// let (future, resolver) = Future::<String>::promise();
/// let (tx, rx) = mpsc::channel();
/// future.observe(Context::Immediate, move |value| tx.send(value).unwrap());
///
/// resolver.resolve("🍓".to_owned()).unwrap();
/// assert_eq!(rx.recv().unwrap(), "🍓");
/// ```
pub struct Future<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Future").field(&self.inner).finish()
    }
}

impl<T> Future<T> {
    pub(crate) fn pending(cancel: Option<Cancel>) -> Self {
        Self {
            inner: Arc::new(Inner::pending(cancel)),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<Inner<T>> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<Inner<T>>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub(crate) fn inner(&self) -> &Inner<T> {
        &self.inner
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.is_resolved()
    }
}

impl<T: Clone + Send + 'static> Future<T> {
    /// A future that already holds `value`.
    pub fn resolved(value: T) -> Self {
        Self {
            inner: Arc::new(Inner::resolved(value)),
        }
    }

    /// See [`promise`](crate::promise).
    pub fn promise() -> (Self, Resolver<T>) {
        promise::promise()
    }

    /// See [`promise_with_cancel`](crate::promise_with_cancel).
    pub fn promise_with_cancel<C>(cancel: C) -> (Self, Resolver<T>)
    where
        C: FnOnce() + Send + 'static,
    {
        promise::promise_with_cancel(cancel)
    }

    /// Runs `compute` on the shared global pool and resolves the returned
    /// future with its result.
    ///
    /// ```
    /// use eventual::Future;
    ///
    /// let answer = Future::deferred(|| 6 * 7);
    /// let value = futures::executor::block_on(answer.waiter());
    /// assert_eq!(value, 42);
    /// ```
    pub fn deferred<F>(compute: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::deferred_on(executor::global(), compute)
    }

    /// Runs `compute` on `executor` and resolves the returned future with its
    /// result.
    ///
    /// The computation cannot be aborted once submitted. If every handle to
    /// the future is gone by the time it finishes, the result is discarded.
    pub fn deferred_on<E, F>(executor: &E, compute: F) -> Self
    where
        E: Executor + ?Sized,
        F: FnOnce() -> T + Send + 'static,
    {
        let (future, resolver) = Self::promise();
        executor.execute(Box::new(move || {
            let value = compute();
            if resolver.resolve(value).is_err() {
                debug!("deferred result discarded, future already released");
            }
        }));
        future
    }

    /// A snapshot of the value, if resolved.
    pub fn value(&self) -> Option<T> {
        self.inner.value()
    }

    pub(crate) fn resolve(&self, value: T) {
        self.inner.resolve(value)
    }

    /// Registers `continuation` to run with the value on `context`.
    ///
    /// On a pending future, returns a [`Subscription`] that can withdraw the
    /// continuation before it fires. On a resolved future, the continuation
    /// is handed to `context` before this returns, and there is nothing to
    /// unsubscribe from.
    ///
    /// The continuation is dispatched while the resolving thread holds this
    /// future's lock. It must not synchronously observe or resolve this same
    /// future, and a [`Context::Sync`] target must not be blocked on it.
    pub fn observe<F>(&self, context: Context, continuation: F) -> Option<Subscription>
    where
        F: FnOnce(T) + Send + 'static,
    {
        let observer: Observer<T> = Box::new(move |value| {
            context.run(Box::new(move || continuation(value)));
        });
        self.inner.observe(observer).map(|slot| Subscription {
            source: Arc::downgrade(&self.inner) as Weak<dyn Slots>,
            slot,
        })
    }
}

trait Slots: Send + Sync {
    fn unsubscribe(&self, slot: usize);
}

impl<T: Send> Slots for Inner<T> {
    fn unsubscribe(&self, slot: usize) {
        Inner::unsubscribe(self, slot)
    }
}

/// Withdraws one continuation registered with [`Future::observe`].
///
/// Holds no ownership of the observed future. Unsubscribing more than once,
/// after the continuation fired, or after the future is gone does nothing.
pub struct Subscription {
    source: Weak<dyn Slots>,
    slot: usize,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if let Some(source) = self.source.upgrade() {
            source.unsubscribe(self.slot);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("slot", &self.slot)
            .field("live", &(self.source.strong_count() > 0))
            .finish()
    }
}
