use crate::executor::{self, Executor, Task};
use crate::main_queue::main_queue;
use std::fmt;
use std::sync::Arc;

/// A caller-supplied strategy for running a continuation body.
pub type Invoker = Arc<dyn Fn(Task) + Send + Sync>;

/// Where and how a continuation body runs once its future resolves.
///
/// A context carries no mutable state; every observation applies its own
/// context independently.
#[derive(Clone, Default)]
pub enum Context {
    /// On the resolving thread, right away.
    #[default]
    Immediate,
    /// On the target executor, blocking the resolving thread until the body
    /// has run. `None` targets the shared global pool.
    Sync(Option<Arc<dyn Executor>>),
    /// On the target executor, without waiting. `None` targets the shared
    /// global pool.
    Async(Option<Arc<dyn Executor>>),
    /// Right away when already on the main thread, otherwise queued on the
    /// [main queue](crate::main_queue).
    Main,
    Custom(Invoker),
}

impl Context {
    /// Wraps a closure as a [`Context::Custom`].
    pub fn custom<F>(invoker: F) -> Self
    where
        F: Fn(Task) + Send + Sync + 'static,
    {
        Context::Custom(Arc::new(invoker))
    }

    /// Hands `body` to this context's strategy.
    pub fn run(&self, body: Task) {
        match self {
            Context::Immediate => body(),
            Context::Sync(Some(target)) => target.execute_and_wait(body),
            Context::Sync(None) => executor::global().execute_and_wait(body),
            Context::Async(Some(target)) => target.execute(body),
            Context::Async(None) => executor::global().execute(body),
            Context::Main => {
                let main = main_queue();
                if main.is_current() {
                    body()
                } else {
                    main.execute(body)
                }
            }
            Context::Custom(invoker) => invoker(body),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Context::Immediate => f.write_str("Immediate"),
            Context::Sync(target) => f.debug_tuple("Sync").field(&target.is_some()).finish(),
            Context::Async(target) => f.debug_tuple("Async").field(&target.is_some()).finish(),
            Context::Main => f.write_str("Main"),
            Context::Custom(_) => f.write_str("Custom"),
        }
    }
}
