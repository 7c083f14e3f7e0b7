use parking_lot::Mutex;
use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, trace};

/// A callback telling whoever produces a future's value that nobody will
/// ever look at it.
///
/// It is stored in a pending future and invoked at most once, when the last
/// owner of that future lets go of it before it resolves.
pub type Cancel = Box<dyn FnOnce() + Send>;

pub(crate) type Observer<T> = Box<dyn FnOnce(T) + Send>;

pub(crate) enum State<T> {
    Pending {
        cancel: Option<Cancel>,
        // Slots are only ever nulled, so an index handed out at registration
        // stays valid until resolution.
        observers: Vec<Option<Observer<T>>>,
    },
    Resolved(T),
}

impl<T: fmt::Debug> fmt::Debug for State<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Pending { cancel, observers } => f
                .debug_struct("Pending")
                .field("cancel", &cancel.is_some())
                .field("observers", &observers.iter().flatten().count())
                .finish(),
            State::Resolved(value) => f.debug_tuple("Resolved").field(value).finish(),
        }
    }
}

/// The shared half of a future: its state and the lock guarding it.
#[derive(Debug)]
pub(crate) struct Inner<T> {
    state: Mutex<State<T>>,
}

impl<T> Inner<T> {
    pub(crate) fn pending(cancel: Option<Cancel>) -> Self {
        Self {
            state: Mutex::new(State::Pending {
                cancel,
                observers: Vec::new(),
            }),
        }
    }

    pub(crate) fn resolved(value: T) -> Self {
        Self {
            state: Mutex::new(State::Resolved(value)),
        }
    }

    pub(crate) fn is_resolved(&self) -> bool {
        matches!(*self.state.lock(), State::Resolved(_))
    }

    /// Nulls the observer slot at `index`. Does nothing once resolved or if
    /// the slot is already empty.
    pub(crate) fn unsubscribe(&self, index: usize) {
        let mut state = self.state.lock();
        if let State::Pending { observers, .. } = &mut *state {
            if let Some(slot) = observers.get_mut(index) {
                if slot.take().is_some() {
                    trace!(slot = index, "observer unsubscribed");
                }
            }
        }
    }

    /// Runs `install` against the upstream cancel slot, under the lock, if
    /// the future is still pending. Returns whether it ran.
    pub(crate) fn update_cancel<F>(&self, install: F) -> bool
    where
        F: FnOnce(&mut Option<Cancel>),
    {
        let mut state = self.state.lock();
        match &mut *state {
            State::Pending { cancel, .. } => {
                install(cancel);
                true
            }
            State::Resolved(_) => false,
        }
    }

    /// Whether an upstream cancel is installed and how many slots have been
    /// handed out, or `None` once resolved.
    #[cfg(test)]
    pub(crate) fn pending_parts(&self) -> Option<(bool, usize)> {
        match &*self.state.lock() {
            State::Pending { cancel, observers } => Some((cancel.is_some(), observers.len())),
            State::Resolved(_) => None,
        }
    }
}

impl<T: Clone> Inner<T> {
    pub(crate) fn value(&self) -> Option<T> {
        match &*self.state.lock() {
            State::Resolved(value) => Some(value.clone()),
            State::Pending { .. } => None,
        }
    }

    /// Transitions to `Resolved`, then invokes every live observer in slot
    /// order.
    ///
    /// Observers run while the lock is held. A panicking observer does not
    /// stop the others; the first panic is resumed once all of them ran and
    /// the lock is released.
    ///
    /// # Panics
    ///
    /// Panics if the future has already been resolved.
    pub(crate) fn resolve(&self, value: T) {
        // Declared before the guard so it is released after unlocking, even
        // when unwinding.
        let released: Option<Cancel>;
        let mut state = self.state.lock();
        let observers = match mem::replace(&mut *state, State::Resolved(value.clone())) {
            State::Pending { cancel, observers } => {
                released = cancel;
                observers
            }
            State::Resolved(previous) => {
                *state = State::Resolved(previous);
                error!("attempted to resolve a future twice");
                panic!("future resolved twice");
            }
        };

        trace!(
            slots = observers.len(),
            live = observers.iter().flatten().count(),
            "resolving future"
        );
        let mut first_panic = None;
        for (slot, observer) in observers.into_iter().enumerate() {
            let Some(observer) = observer else { continue };
            let value = value.clone();
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || observer(value))) {
                error!(slot, "observer panicked during resolution");
                first_panic.get_or_insert(payload);
            }
        }

        drop(state);
        drop(released);
        if let Some(payload) = first_panic {
            panic::resume_unwind(payload);
        }
    }

    /// Registers `observer`. Returns its slot index while pending; if already
    /// resolved, runs it right away under the lock and returns `None`.
    pub(crate) fn observe(&self, observer: Observer<T>) -> Option<usize> {
        let mut state = self.state.lock();
        match &mut *state {
            State::Pending { observers, .. } => {
                let index = observers.len();
                observers.push(Some(observer));
                trace!(slot = index, "observer registered");
                Some(index)
            }
            State::Resolved(value) => {
                observer(value.clone());
                None
            }
        }
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        if let State::Pending { cancel, .. } = self.state.get_mut() {
            if let Some(cancel) = cancel.take() {
                debug!("pending future released, cancelling upstream");
                cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Inner;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_fresh_pending_is_bare() {
        let inner = Inner::<bool>::pending(None);
        assert_eq!(inner.pending_parts(), Some((false, 0)));
        assert!(!inner.is_resolved());
    }

    #[test]
    fn test_resolve_runs_live_slots_in_order() {
        let inner = Inner::<u32>::pending(None);
        let seen = Arc::new(Mutex::new(vec![]));
        let mut slots = vec![];
        for tag in 0..4 {
            let seen = seen.clone();
            slots.push(inner.observe(Box::new(move |v| seen.lock().unwrap().push((tag, v)))));
        }
        assert_eq!(slots, vec![Some(0), Some(1), Some(2), Some(3)]);

        inner.unsubscribe(2);
        inner.resolve(9);

        assert_eq!(*seen.lock().unwrap(), vec![(0, 9), (1, 9), (3, 9)]);
        assert_eq!(inner.value(), Some(9));
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let inner = Inner::<u32>::pending(None);
        let index = inner.observe(Box::new(|_| panic!("unsubscribed observer ran"))).unwrap();
        inner.unsubscribe(index);
        inner.unsubscribe(index);
        inner.unsubscribe(index + 10);
        inner.resolve(1);
        inner.unsubscribe(index);
        assert_eq!(inner.pending_parts(), None);
    }

    #[test]
    fn test_observe_after_resolution_fires_immediately() {
        let inner = Inner::resolved("done");
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let index = inner.observe(Box::new(move |v| {
            assert_eq!(v, "done");
            h.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(index, None);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[should_panic(expected = "future resolved twice")]
    fn test_resolve_twice_panics() {
        let inner = Inner::pending(None);
        inner.resolve(true);
        inner.resolve(true);
    }

    #[test]
    fn test_panicking_observer_still_resolves() {
        let inner = Inner::<u32>::pending(None);
        let hits = Arc::new(Mutex::new(vec![]));
        for tag in 0..3 {
            let hits = hits.clone();
            inner.observe(Box::new(move |v| {
                if tag == 1 {
                    panic!("observer {tag} failed");
                }
                hits.lock().unwrap().push((tag, v));
            }));
        }

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| inner.resolve(5)));
        assert!(outcome.is_err());
        assert!(inner.is_resolved());
        assert_eq!(inner.value(), Some(5));
        assert_eq!(*hits.lock().unwrap(), vec![(0, 5), (2, 5)]);

        // A later attempt is still caught as a second resolution.
        let again = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| inner.resolve(6)));
        assert!(again.is_err());
        assert_eq!(inner.value(), Some(5));
    }

    #[test]
    fn test_drop_pending_runs_cancel_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let inner = Inner::<u8>::pending(Some(Box::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        })));
        drop(inner);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_resolved_skips_cancel() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let inner = Inner::<u8>::pending(Some(Box::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        })));
        inner.resolve(3);
        drop(inner);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_update_cancel_only_while_pending() {
        let inner = Inner::<u8>::pending(None);
        assert!(inner.update_cancel(|cancel| *cancel = Some(Box::new(|| {}))));
        assert_eq!(inner.pending_parts(), Some((true, 0)));
        inner.resolve(0);
        assert!(!inner.update_cancel(|_| unreachable!()));
    }
}
