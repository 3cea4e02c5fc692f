//! Dispatch of native calls onto worker threads

use std::{sync::Arc, thread};
use parking_lot::Mutex;
use tracing::debug;

use crate::{Error, Result};

const WORKER_NAME  : &str = "ocilink-worker";
const CLEANUP_NAME : &str = "ocilink-cleanup";

/// Where a blocking native call runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dispatch {
    /// On the calling thread
    #[default]
    Inline,
    /// On a dedicated worker thread that the caller joins
    Worker,
}

/**
    Runs `f` as specified by `dispatch` and returns its result.

    With [`Dispatch::Worker`] the call is made on a new named thread and the caller
    waits for it. Failure to start the thread is reported as [`Error::Dispatch`].
*/
pub fn run_blocking<F, R>(dispatch: Dispatch, f: F) -> Result<R>
where
    F: FnOnce() -> R + Send,
    R: Send,
{
    match dispatch {
        Dispatch::Inline => Ok(f()),
        Dispatch::Worker => thread::scope(|scope| {
            let worker = thread::Builder::new()
                .name(WORKER_NAME.to_string())
                .spawn_scoped(scope, f)
                .map_err(Error::Dispatch)?;
            worker.join().map_err(|_| Error::new("native worker panicked"))
        }),
    }
}

/// Detached teardown that is still running or has not been joined yet.
enum Pending {
    Thread(thread::JoinHandle<()>),
    #[cfg(feature="tokio")]
    Task(tokio_rt::task::JoinHandle<()>),
}

impl Pending {
    fn is_finished(&self) -> bool {
        match self {
            Pending::Thread(handle) => handle.is_finished(),
            #[cfg(feature="tokio")]
            Pending::Task(handle) => handle.is_finished(),
        }
    }

    fn wait(self) {
        match self {
            Pending::Thread(handle) => {
                if handle.join().is_err() {
                    tracing::error!("deferred teardown panicked");
                }
            }
            #[cfg(feature="tokio")]
            Pending::Task(handle) => {
                while !handle.is_finished() {
                    thread::sleep(std::time::Duration::from_millis(1));
                }
            }
        }
    }
}

/// List of currently active detached teardowns.
struct Detached(Vec<Pending>);

impl Detached {
    const fn new() -> Self {
        Self(Vec::new())
    }

    fn push(&mut self, pending: Pending) {
        self.0.retain(|task| !task.is_finished());
        self.0.push(pending)
    }

    fn take(&mut self) -> Vec<Pending> {
        std::mem::take(&mut self.0)
    }
}

static DETACHED : Mutex<Detached> = Mutex::new(Detached::new());

/**
    Hands `f` to a cleanup worker and returns without waiting for it.

    Inside a tokio runtime (feature `tokio`) the job goes to the runtime's blocking
    pool. Otherwise a new cleanup thread is started. If the thread cannot be started
    `f` runs on the calling thread before the [`Error::Dispatch`] is returned.
*/
pub(crate) fn spawn_detached<F>(f: F) -> Result<()>
where
    F: FnOnce() + Send + 'static,
{
    #[cfg(feature="tokio")]
    if let Ok(runtime) = tokio_rt::runtime::Handle::try_current() {
        let task = runtime.spawn_blocking(f);
        DETACHED.lock().push(Pending::Task(task));
        debug!("teardown queued onto the tokio blocking pool");
        return Ok(());
    }

    let slot = Arc::new(Mutex::new(Some(f)));
    let job = slot.clone();
    let spawned = thread::Builder::new()
        .name(CLEANUP_NAME.to_string())
        .spawn(move || {
            let f = job.lock().take();
            if let Some(f) = f {
                f();
            }
        });
    match spawned {
        Ok(handle) => {
            DETACHED.lock().push(Pending::Thread(handle));
            debug!("teardown queued onto a cleanup thread");
            Ok(())
        }
        Err(err) => {
            let f = slot.lock().take();
            if let Some(f) = f {
                f();
            }
            Err(Error::Dispatch(err))
        }
    }
}

/// Returns the number of detached teardowns that have not finished yet.
pub fn pending_teardowns() -> usize {
    let mut detached = DETACHED.lock();
    detached.0.retain(|task| !task.is_finished());
    detached.0.len()
}

/**
    Waits until every teardown handed off by dropped connections has finished.

    Teardowns queued while waiting are waited for as well.
*/
pub fn wait_for_teardowns() {
    loop {
        let pending = DETACHED.lock().take();
        if pending.is_empty() {
            break;
        }
        for task in pending {
            task.wait();
        }
    }
}
