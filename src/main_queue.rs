//! A serial queue bound to one designated "main" thread.
//!
//! The thread that first drains the queue (or calls
//! [`MainQueue::designate`]) becomes its main thread. Work sent from any
//! other thread waits in the queue until the main thread drains it.
use crate::executor::{Executor, Task};
use crate::Error;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::fmt;
use std::sync::OnceLock;
use std::thread::{self, ThreadId};
use std::time::Duration;
use tracing::{trace, warn};

const RECHECK_INTERVAL: Duration = Duration::from_millis(10);

pub struct MainQueue {
    sender: Sender<Task>,
    receiver: Receiver<Task>,
    thread: OnceLock<ThreadId>,
}

impl fmt::Debug for MainQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainQueue")
            .field("thread", &self.thread.get())
            .field("queued", &self.receiver.len())
            .finish()
    }
}

impl Default for MainQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MainQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            thread: OnceLock::new(),
        }
    }

    /// Makes the calling thread this queue's main thread.
    ///
    /// Succeeds again on the same thread; fails with
    /// [`Error::MainThreadTaken`] on any other once a main thread is set.
    pub fn designate(&self) -> Result<(), Error> {
        let current = thread::current().id();
        if *self.thread.get_or_init(|| current) == current {
            Ok(())
        } else {
            Err(Error::MainThreadTaken)
        }
    }

    pub fn is_main_thread(&self) -> bool {
        self.thread.get() == Some(&thread::current().id())
    }

    /// Runs everything queued so far and returns how many tasks ran.
    pub fn run_pending(&self) -> Result<usize, Error> {
        self.claim()?;
        let mut ran = 0;
        while let Ok(task) = self.receiver.try_recv() {
            task();
            ran += 1;
        }
        trace!(ran, "main queue drained");
        Ok(ran)
    }

    /// Runs queued tasks as they arrive until `done` returns true.
    ///
    /// `done` is checked before each task and periodically while idle.
    pub fn run_until<F>(&self, mut done: F) -> Result<usize, Error>
    where
        F: FnMut() -> bool,
    {
        self.claim()?;
        let mut ran = 0;
        while !done() {
            match self.receiver.recv_timeout(RECHECK_INTERVAL) {
                Ok(task) => {
                    task();
                    ran += 1;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        Ok(ran)
    }

    fn claim(&self) -> Result<(), Error> {
        self.designate().map_err(|_| Error::NotMainThread)
    }
}

impl Executor for MainQueue {
    fn execute(&self, task: Task) {
        if self.sender.send(task).is_err() {
            warn!("main queue closed, task dropped");
        }
    }

    fn is_current(&self) -> bool {
        self.is_main_thread()
    }
}

static MAIN: OnceLock<MainQueue> = OnceLock::new();

/// The process-wide queue that [`Context::Main`](crate::Context::Main)
/// dispatches to.
pub fn main_queue() -> &'static MainQueue {
    MAIN.get_or_init(MainQueue::new)
}
