use crate::future::Future;
use crate::state::{Cancel, Inner};
use crate::Error;
use std::fmt;
use std::sync::Weak;
use tracing::debug;

/// The producer's half of a promise.
///
/// A resolver does not keep its future alive. Resolving after every handle
/// to the future has been dropped fails with [`Error::Released`] and changes
/// nothing.
pub struct Resolver<T> {
    target: Weak<Inner<T>>,
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
        }
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("released", &self.is_released())
            .finish()
    }
}

impl<T> Resolver<T> {
    /// Whether the future is gone, i.e. nobody will ever see the value.
    pub fn is_released(&self) -> bool {
        self.target.strong_count() == 0
    }
}

impl<T: Clone + Send + 'static> Resolver<T> {
    /// Resolves the future with `value`, running its observers on this
    /// thread.
    ///
    /// # Panics
    ///
    /// Panics if the future has already been resolved.
    pub fn resolve(&self, value: T) -> Result<(), Error> {
        match Future::upgrade(&self.target) {
            Some(future) => {
                future.resolve(value);
                Ok(())
            }
            None => {
                debug!("resolver target already released");
                Err(Error::Released)
            }
        }
    }
}

/// Creates a pending future together with the resolver that completes it.
///
/// # Examples
///
/// ```
/// use eventual::promise;
///
/// let (future, resolver) = promise::<bool>();
/// assert!(!future.is_resolved());
///
/// resolver.resolve(true).unwrap();
/// assert_eq!(future.value(), Some(true));
///
/// drop(future);
/// assert!(resolver.is_released());
/// ```
pub fn promise<T>() -> (Future<T>, Resolver<T>) {
    with_cancel(None)
}

/// Like [`promise`], but `cancel` runs if the future is dropped before it
/// is resolved.
///
/// ```
/// use eventual::promise_with_cancel;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// let stopped = Arc::new(AtomicBool::new(false));
/// let flag = stopped.clone();
/// let (future, resolver) = promise_with_cancel::<u32, _>(move || flag.store(true, Ordering::SeqCst));
///
/// drop(future);
/// assert!(stopped.load(Ordering::SeqCst));
/// assert!(resolver.resolve(1).is_err());
/// ```
pub fn promise_with_cancel<T, C>(cancel: C) -> (Future<T>, Resolver<T>)
where
    C: FnOnce() + Send + 'static,
{
    with_cancel(Some(Box::new(cancel)))
}

fn with_cancel<T>(cancel: Option<Cancel>) -> (Future<T>, Resolver<T>) {
    let future = Future::pending(cancel);
    let resolver = Resolver {
        target: future.downgrade(),
    };
    (future, resolver)
}
