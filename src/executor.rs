//! Executors that continuations and deferred computations are dispatched to.
//!
//! The crate only needs two things from an executor: accept a unit of work
//! to run later, and (for [`Context::Main`](crate::Context::Main)) say
//! whether the calling thread already is the executor. Everything else is
//! built on top of that.
use crate::Error;
use futures::executor::ThreadPool;
use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// A unit of work handed to an executor.
pub type Task = Box<dyn FnOnce() + Send>;

pub trait Executor: Send + Sync {
    /// Schedules `task` and returns without waiting for it.
    fn execute(&self, task: Task);

    /// Schedules `task` and blocks the calling thread until it has run.
    ///
    /// Runs `task` inline when [`is_current`](Executor::is_current) says the
    /// caller already is one of this executor's threads.
    fn execute_and_wait(&self, task: Task) {
        if self.is_current() {
            task();
            return;
        }
        let (done, finished) = crossbeam_channel::bounded(1);
        self.execute(Box::new(move || {
            task();
            let _ = done.send(());
        }));
        if finished.recv().is_err() {
            warn!("task was dropped before it finished running");
        }
    }

    /// Whether the calling thread is one of this executor's own threads.
    ///
    /// Executors that cannot tell return `false`, which makes
    /// [`execute_and_wait`](Executor::execute_and_wait) always dispatch.
    fn is_current(&self) -> bool {
        false
    }
}

/// Settings for a [`ThreadPoolExecutor`].
///
/// ```
/// use eventual::{PoolConfig, ThreadPoolExecutor};
///
/// let config = PoolConfig::default().pool_size(2).name_prefix("workers-");
/// let pool = ThreadPoolExecutor::new(&config).unwrap();
/// # drop(pool);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of worker threads. `None` means one per CPU.
    pub pool_size: Option<usize>,
    pub name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: None,
            name_prefix: "eventual-pool-".to_owned(),
        }
    }
}

impl PoolConfig {
    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = Some(size.max(1));
        self
    }

    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }
}

static NEXT_POOL_ID: AtomicUsize = AtomicUsize::new(1);

thread_local! {
    // Set on each worker thread when its pool starts it.
    static CURRENT_POOL: Cell<usize> = const { Cell::new(0) };
}

/// A general-purpose executor backed by a `futures` thread pool.
///
/// Cloning is cheap; clones share the same workers.
#[derive(Debug, Clone)]
pub struct ThreadPoolExecutor {
    pool: ThreadPool,
    id: usize,
}

impl ThreadPoolExecutor {
    pub fn new(config: &PoolConfig) -> Result<Self, Error> {
        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        let mut builder = ThreadPool::builder();
        builder
            .name_prefix(config.name_prefix.clone())
            .after_start(move |_| CURRENT_POOL.with(|current| current.set(id)));
        if let Some(size) = config.pool_size {
            builder.pool_size(size.max(1));
        }
        let pool = builder.create()?;
        debug!(
            pool_size = ?config.pool_size,
            name_prefix = %config.name_prefix,
            "thread pool started"
        );
        Ok(Self { pool, id })
    }
}

impl Executor for ThreadPoolExecutor {
    fn execute(&self, task: Task) {
        self.pool.spawn_ok(async move { task() });
    }

    fn is_current(&self) -> bool {
        CURRENT_POOL.with(|current| current.get() == self.id)
    }
}

static GLOBAL: OnceLock<ThreadPoolExecutor> = OnceLock::new();

/// Starts the shared pool with `config`.
///
/// Must be called before anything touches [`global`]; afterwards it fails
/// with [`Error::AlreadyConfigured`].
pub fn configure_global(config: &PoolConfig) -> Result<(), Error> {
    if GLOBAL.get().is_some() {
        return Err(Error::AlreadyConfigured);
    }
    let executor = ThreadPoolExecutor::new(config)?;
    GLOBAL.set(executor).map_err(|_| Error::AlreadyConfigured)
}

/// The shared pool used when a context names no executor of its own.
///
/// # Panics
///
/// Panics if the pool is created here and the OS refuses to start its
/// worker threads.
pub fn global() -> &'static ThreadPoolExecutor {
    GLOBAL.get_or_init(|| {
        ThreadPoolExecutor::new(&PoolConfig::default())
            .unwrap_or_else(|err| panic!("failed to start the global executor: {err}"))
    })
}
