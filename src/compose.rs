//! Derived futures: `transform`, `chain` and `flatten`.
//!
//! A derived future observes its source through a weak reference and
//! installs the resulting subscription as its own upstream cancel, so
//! dropping the end of a chain unsubscribes all the way back up.
use crate::context::Context;
use crate::future::Future;
use tracing::trace;

impl<T: Clone + Send + 'static> Future<T> {
    /// A future resolved with `f` applied to this future's value.
    ///
    /// `f` runs on `context`. The derived future does not keep `self` alive;
    /// dropping it while `self` is pending withdraws the observation.
    ///
    /// ```
    /// use eventual::{Context, Future};
    ///
    /// let six = Future::resolved(5).transform(Context::Immediate, |x| x + 1);
    /// assert_eq!(six.value(), Some(6));
    /// ```
    ///
    /// Because of that, a pending source needs an owner of its own for as
    /// long as the result matters. In `source.transform(f).transform(g)` the
    /// middle future is a temporary: it is dropped at the end of the
    /// statement, which cancels it, and the end of the pipeline never
    /// resolves. Bind each intermediate future, or use [`chain`](Future::chain),
    /// whose result owns the futures it flattens.
    ///
    /// ```
    /// use eventual::{Context, Future};
    ///
    /// let (source, resolver) = Future::<u32>::promise();
    ///
    /// let dropped_middle = source
    ///     .transform(Context::Immediate, |x| x + 1)
    ///     .transform(Context::Immediate, |x| x * 10);
    ///
    /// let middle = source.transform(Context::Immediate, |x| x + 1);
    /// let end = middle.transform(Context::Immediate, |x| x * 10);
    ///
    /// resolver.resolve(1).unwrap();
    /// assert_eq!(end.value(), Some(20));
    /// assert_eq!(dropped_middle.value(), None);
    /// ```
    pub fn transform<U, F>(&self, context: Context, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let mapped = Future::<U>::pending(None);
        let target = mapped.downgrade();

        let subscription = self.observe(context, move |value| {
            match Future::upgrade(&target) {
                Some(mapped) => mapped.resolve(f(value)),
                None => trace!("transformed future released before its source resolved"),
            }
        });

        if let Some(subscription) = subscription {
            mapped.inner().update_cancel(|cancel| {
                if cancel.is_none() {
                    *cancel = Some(Box::new(move || subscription.unsubscribe()));
                }
            });
        }
        mapped
    }

    /// A future resolved with the value of the future `f` returns.
    ///
    /// ```
    /// use eventual::{Context, Future};
    ///
    /// let (outer, resolve_outer) = Future::<u32>::promise();
    /// let (inner, resolve_inner) = Future::<String>::promise();
    /// let chained = outer.chain(Context::Immediate, move |n| {
    ///     assert_eq!(n, 3);
    ///     inner
    /// });
    ///
    /// resolve_outer.resolve(3).unwrap();
    /// assert!(!chained.is_resolved());
    /// resolve_inner.resolve("three".into()).unwrap();
    /// assert_eq!(chained.value().as_deref(), Some("three"));
    /// ```
    pub fn chain<U, F>(&self, context: Context, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Future<U> + Send + 'static,
    {
        self.transform(context, f).flatten()
    }
}

impl<T: Clone + Send + 'static> Future<Future<T>> {
    /// Collapses a future of a future into a future of the inner value.
    ///
    /// The flattened future takes ownership of `self`, and later of the inner
    /// future, until it resolves. Dropping it first releases both and
    /// withdraws whichever observation is active.
    pub fn flatten(self) -> Future<T> {
        let flattened = Future::<T>::pending(None);
        let target = flattened.downgrade();

        let outer_subscription = self.observe(Context::Immediate, move |inner: Future<T>| {
            let Some(flattened) = Future::upgrade(&target) else {
                trace!("flattened future released before its outer future resolved");
                return;
            };

            let target = flattened.downgrade();
            let inner_subscription = inner.observe(Context::Immediate, move |value| {
                if let Some(flattened) = Future::upgrade(&target) {
                    flattened.resolve(value);
                }
            });
            let Some(inner_subscription) = inner_subscription else {
                return;
            };

            flattened.inner().update_cancel(|cancel| {
                let outer_cancel = cancel.take();
                *cancel = Some(Box::new(move || {
                    if let Some(outer_cancel) = outer_cancel {
                        outer_cancel();
                    }
                    inner_subscription.unsubscribe();
                    drop(inner);
                }));
            });
        });

        // If the outer future resolved first, the cancel installed above
        // already covers it.
        let mut upstream = outer_subscription.map(|subscription| (subscription, self));
        flattened.inner().update_cancel(|cancel| {
            if cancel.is_none() {
                if let Some((subscription, outer)) = upstream.take() {
                    *cancel = Some(Box::new(move || {
                        subscription.unsubscribe();
                        drop(outer);
                    }));
                }
            }
        });
        drop(upstream);
        flattened
    }
}
