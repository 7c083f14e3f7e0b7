use crate::context::Context;
use crate::future::{Future, Subscription};
use parking_lot::Mutex;
use std::fmt::{self, Debug};
use std::future::IntoFuture;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Poll, Waker};

/// Awaits a [`Future`] from async code.
///
/// The waiter owns a handle to the future and observes it on
/// [`Context::Immediate`]; it never blocks on its own. Dropping it withdraws
/// the observation.
///
/// # Examples
///
/// ```
/// use eventual::Future;
/// use futures::executor::block_on;
/// use std::thread;
///
/// let (future, resolver) = Future::<String>::promise();
/// let task1 = thread::spawn(move || block_on(async {
///     println!("Received {:?}", future.await);
/// }));
/// resolver.resolve("Hi".into()).ok();
/// task1.join().expect("The task1 thread has panicked.");
/// ```
pub struct Waiter<T> {
    shared: Arc<Mutex<Inner<T>>>,
    subscription: Option<Subscription>,
    _future: Future<T>,
}

#[derive(Debug)]
struct Inner<T> {
    value: Option<T>,
    waker: Option<Waker>,
}

impl<T: Clone + Send + 'static> Future<T> {
    pub fn waiter(&self) -> Waiter<T> {
        let shared = Arc::new(Mutex::new(Inner {
            value: None,
            waker: None,
        }));
        let slot = shared.clone();
        let subscription = self.observe(Context::Immediate, move |value| {
            let waker = {
                let mut inner = slot.lock();
                inner.value = Some(value);
                inner.waker.take()
            };
            if let Some(waker) = waker {
                waker.wake()
            }
        });
        Waiter {
            shared,
            subscription,
            _future: self.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> IntoFuture for Future<T> {
    type Output = T;
    type IntoFuture = Waiter<T>;

    fn into_future(self) -> Self::IntoFuture {
        self.waiter()
    }
}

impl<T: Clone> std::future::Future for Waiter<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.shared.lock();
        if let Some(value) = &inner.value {
            return Poll::Ready(value.clone());
        }
        let stale = inner
            .waker
            .as_ref()
            .map_or(true, |waker| !waker.will_wake(cx.waker()));
        if stale {
            inner.waker = Some(cx.waker().clone());
        }
        Poll::Pending
    }
}

impl<T> Drop for Waiter<T> {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

impl<T: Debug> Debug for Waiter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waiter")
            .field("ready", &self.shared.lock().value.is_some())
            .finish()
    }
}
