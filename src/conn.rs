//! User Session

mod calls;
mod connect_string;
mod info;
mod logoff;
mod logon;

pub use connect_string::{ConnectString, Privilege};
pub use logoff::{LogoffStrategy, LogonSteps};
pub use logon::{AttachMode, Credential, SessionMode};

use std::{sync::atomic::{AtomicBool, AtomicU32, Ordering}, thread};
use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, error, warn};

use crate::{
    Dispatch, Environment, Error, Result, SessionConfig,
    config::DEFAULT_LONG_READ_LEN,
    handle::{self, HandleKind, HandleRef},
    oci::{Oci, Ptr, OCIError, OCIServer, OCISession, OCISvcCtx},
    task,
};

const FORKED_PROCESS : &str = "The connection cannot be reused in the forked process.";
const EXECUTING_ELSEWHERE : &str = "executing in another thread";
const NOT_CONNECTED : &str = "The connection is not established.";

/// Native handles of a connection and the record of how they were set up.
pub(crate) struct SvcState {
    pub(crate) strategy: Option<LogoffStrategy>,
    pub(crate) steps: LogonSteps,
    /// A teardown took the handles and has not finished yet
    pub(crate) closing: bool,
    /// A logon call is in flight; the session has no strategy yet
    pub(crate) establishing: bool,
    pub(crate) closed_once: bool,
    pub(crate) svc: Ptr<OCISvcCtx>,
    pub(crate) usr: Ptr<OCISession>,
    pub(crate) srv: Ptr<OCIServer>,
    pub(crate) err: Ptr<OCIError>,
}

impl SvcState {
    fn new() -> Self {
        Self {
            strategy: None,
            steps: LogonSteps::empty(),
            closing: false,
            establishing: false,
            closed_once: false,
            svc: Ptr::null(),
            usr: Ptr::null(),
            srv: Ptr::null(),
            err: Ptr::null(),
        }
    }
}

/// Observable lifecycle state of a [`Connection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never connected
    Unconnected,
    /// Logged on with `OCILogon`
    SimpleActive,
    /// Handles allocated for an explicit logon; neither attached nor authenticated
    Allocated,
    /// Attached to the server; no session yet
    AttachOnly,
    /// Session begun on a service context that was not attached by this connection
    SessionOnly,
    AttachAndSessionActive,
    /// Logoff is in progress
    Closing,
    /// Logged off. The connection can be established again.
    Closed,
}

/// The call in flight on a connection
struct Executing {
    thread: thread::Thread,
    svc: Ptr<OCISvcCtx>,
    /// Whether `break_execution` may interrupt the call
    breakable: bool,
}

/// At most one call executes on a connection at a time.
struct ExecutingSlot {
    current: Mutex<Option<Executing>>,
    idle: Condvar,
}

impl ExecutingSlot {
    fn new() -> Self {
        Self { current: Mutex::new(None), idle: Condvar::new() }
    }

    fn occupy(current: &mut Option<Executing>, breakable: bool) {
        *current = Some(Executing { thread: thread::current(), svc: Ptr::null(), breakable });
    }

    /// Fails when another call is in flight.
    fn enter(&self, breakable: bool) -> Result<ExecutingGuard<'_>> {
        let mut current = self.current.lock();
        if current.is_some() {
            return Err(Error::state(EXECUTING_ELSEWHERE));
        }
        Self::occupy(&mut current, breakable);
        Ok(ExecutingGuard { slot: self })
    }

    /// Waits for the call in flight, if any, to return.
    fn wait_and_enter(&self) -> ExecutingGuard<'_> {
        let mut current = self.current.lock();
        while current.is_some() {
            self.idle.wait(&mut current);
        }
        Self::occupy(&mut current, false);
        ExecutingGuard { slot: self }
    }
}

/// Marks a connection as executing a call until dropped.
pub(crate) struct ExecutingGuard<'a> {
    slot: &'a ExecutingSlot,
}

impl ExecutingGuard<'_> {
    fn set_svc(&self, svc: Ptr<OCISvcCtx>) {
        if let Some(executing) = self.slot.current.lock().as_mut() {
            executing.svc = svc;
        }
    }
}

impl Drop for ExecutingGuard<'_> {
    fn drop(&mut self) {
        self.slot.current.lock().take();
        self.slot.idle.notify_all();
    }
}

/**
    A call on an established session.

    The handles stay valid while it is alive: a logoff waits for the call to be
    dropped before it tears the session down.
*/
pub(crate) struct ActiveCall<'c> {
    conn: &'c Connection<'c>,
    _executing: ExecutingGuard<'c>,
    pub(crate) svc: Ptr<OCISvcCtx>,
    pub(crate) usr: Ptr<OCISession>,
    pub(crate) err: Ptr<OCIError>,
}

impl ActiveCall<'_> {
    /// Makes a round trip as configured by the connection's dispatch.
    pub(crate) fn run<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> Result<R> + Send,
        R: Send,
    {
        task::run_blocking(self.conn.dispatch(), f)?
    }
}

/// Represents a user session
pub struct Connection<'a> {
    env: &'a Environment,
    state: Mutex<SvcState>,
    /// Service context; statements are registered as its children
    handle: HandleRef,
    session: HandleRef,
    server: HandleRef,
    executing: ExecutingSlot,
    pid: u32,
    autocommit: AtomicBool,
    non_blocking: AtomicBool,
    long_read_len: AtomicU32,
    prefetch_rows: Mutex<Option<u32>>,
    dispatch: Mutex<Dispatch>,
}

impl std::fmt::Debug for Connection<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state())
            .field("pid", &self.pid)
            .finish()
    }
}

impl Drop for Connection<'_> {
    fn drop(&mut self) {
        let pid = self.oci().getpid();
        if pid != self.pid {
            warn!(owner = self.pid, pid, "connection dropped in a forked process; its handles are left to the parent process");
            return;
        }
        if let Err(err) = self.handle.release_children() {
            warn!(%err, "statement handles were not freed");
        }
        let env = self.env.get_env();
        let state = self.state.get_mut();
        if let Some(strategy) = state.strategy {
            let task = strategy.prepare(state, env);
            debug!(?strategy, "connection dropped; deferring teardown");
            let res = task::spawn_detached(move || {
                if let Err(err) = task.execute() {
                    warn!(%err, "deferred teardown failed");
                }
            });
            if let Err(err) = res {
                error!(%err, "cannot defer connection teardown; it ran on the dropping thread");
            }
        }
        let err = state.err.take();
        let _ = handle::free_handle(self.env.oci(), err, HandleKind::Error);
    }
}

impl<'a> Connection<'a> {
    pub(crate) fn new(env: &'a Environment) -> Result<Self> {
        Ok(Self {
            env,
            state: Mutex::new(SvcState::new()),
            handle: HandleRef::alias(HandleKind::SvcCtx),
            session: HandleRef::alias(HandleKind::Session),
            server: HandleRef::alias(HandleKind::Server),
            executing: ExecutingSlot::new(),
            pid: env.oci().getpid(),
            autocommit: AtomicBool::new(false),
            non_blocking: AtomicBool::new(true),
            long_read_len: AtomicU32::new(DEFAULT_LONG_READ_LEN),
            prefetch_rows: Mutex::new(None),
            dispatch: Mutex::new(Dispatch::Inline),
        })
    }

    pub(crate) fn env(&self) -> &'a Environment {
        self.env
    }

    pub(crate) fn oci(&self) -> &'a dyn Oci {
        self.env.oci()
    }

    /// Fails when the connection is used by a process other than the one that created it.
    pub(crate) fn check_pid(&self) -> Result<()> {
        if self.oci().getpid() == self.pid {
            Ok(())
        } else {
            Err(Error::state(FORKED_PROCESS))
        }
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, SvcState> {
        self.state.lock()
    }

    /**
        Starts a call on the established session.

        Fails when the session is not established or when another call executes
        on it. The session handles are read only once the connection is marked as
        executing, so they cannot be torn down under the call.
    */
    pub(crate) fn active_call(&self) -> Result<ActiveCall<'_>> {
        let executing = self.executing.enter(self.is_non_blocking())?;
        let (svc, usr, err) = {
            let state = self.lock_state();
            if state.strategy.is_none() {
                return Err(Error::state(NOT_CONNECTED));
            }
            (state.svc, state.usr, state.err)
        };
        executing.set_svc(svc);
        Ok(ActiveCall { conn: self, _executing: executing, svc, usr, err })
    }

    /// Marks the connection as executing a call that has no established session yet.
    pub(crate) fn enter_call(&self) -> Result<ExecutingGuard<'_>> {
        self.executing.enter(self.is_non_blocking())
    }

    /// Waits until nothing executes on the connection and marks it as executing.
    pub(crate) fn wait_for_call(&self) -> ExecutingGuard<'_> {
        self.executing.wait_and_enter()
    }

    pub(crate) fn root(&self) -> &HandleRef {
        &self.handle
    }

    pub(crate) fn reset_aliases(&self) {
        self.handle.set(Ptr::<OCISvcCtx>::null());
        self.session.set(Ptr::<OCISession>::null());
        self.server.set(Ptr::<OCIServer>::null());
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        let state = self.lock_state();
        match state.strategy {
            Some(LogoffStrategy::Simple) => ConnectionState::SimpleActive,
            Some(LogoffStrategy::Complex) => {
                let attached = state.steps.contains(LogonSteps::SERVER_ATTACH);
                let begun = state.steps.contains(LogonSteps::SESSION_BEGIN);
                match (attached, begun) {
                    (false, false) => ConnectionState::Allocated,
                    (true, false)  => ConnectionState::AttachOnly,
                    (false, true)  => ConnectionState::SessionOnly,
                    (true, true)   => ConnectionState::AttachAndSessionActive,
                }
            }
            None if state.closing => ConnectionState::Closing,
            None if state.closed_once => ConnectionState::Closed,
            None => ConnectionState::Unconnected,
        }
    }

    /// Returns `true` while a logoff strategy is assigned.
    pub fn is_connected(&self) -> bool {
        self.lock_state().strategy.is_some()
    }

    /// Applies `config` to this connection.
    pub fn apply(&self, config: &SessionConfig) {
        self.set_autocommit(config.autocommit);
        self.set_non_blocking(config.non_blocking);
        self.set_long_read_len(config.long_read_len);
        *self.prefetch_rows.lock() = config.prefetch_rows;
        self.set_dispatch(config.dispatch);
    }

    pub fn is_autocommit(&self) -> bool {
        self.autocommit.load(Ordering::Relaxed)
    }

    pub fn set_autocommit(&self, autocommit: bool) {
        self.autocommit.store(autocommit, Ordering::Relaxed);
    }

    pub fn is_non_blocking(&self) -> bool {
        self.non_blocking.load(Ordering::Relaxed)
    }

    pub fn set_non_blocking(&self, non_blocking: bool) {
        self.non_blocking.store(non_blocking, Ordering::Relaxed);
    }

    /// Maximum size of LONG and LONG RAW values fetched by statements of this connection.
    pub fn long_read_len(&self) -> u32 {
        self.long_read_len.load(Ordering::Relaxed)
    }

    pub fn set_long_read_len(&self, len: u32) {
        self.long_read_len.store(len, Ordering::Relaxed);
    }

    pub fn prefetch_rows(&self) -> Option<u32> {
        *self.prefetch_rows.lock()
    }

    /// Sets the number of rows statements parsed afterwards will prefetch.
    pub fn set_prefetch_rows(&self, rows: u32) {
        *self.prefetch_rows.lock() = Some(rows);
    }

    pub fn dispatch(&self) -> Dispatch {
        *self.dispatch.lock()
    }

    pub fn set_dispatch(&self, dispatch: Dispatch) {
        *self.dispatch.lock() = dispatch;
    }

    /// Session handle. It stops pointing to a handle when the connection is closed.
    pub fn session_handle(&self) -> &HandleRef {
        &self.session
    }

    /// Server handle. It stops pointing to a handle when the connection is closed.
    pub fn server_handle(&self) -> &HandleRef {
        &self.server
    }

    /**
        Interrupts the call that executes on this connection.

        Returns `false` if nothing executes, or if the call in flight was started
        while the connection was not in non-blocking mode. Otherwise issues
        `OCIBreak` on the executing service context, wakes the executing thread and
        returns `true`. Does not wait for the interrupted call to return.
    */
    pub fn break_execution(&self) -> Result<bool> {
        self.check_pid()?;
        let executing = self.executing.current.lock();
        let executing = match executing.as_ref() {
            Some(executing) if executing.breakable => executing,
            _ => return Ok(false),
        };
        if !executing.svc.is_null() {
            let oci = self.oci();
            let err = self.env.err_ptr();
            let res = oci.break_call(executing.svc.as_void(), err);
            if let Err(err) = crate::err::check(oci, err, res) {
                warn!(%err, "OCIBreak failed");
            }
        }
        executing.thread.unpark();
        debug!("break requested");
        Ok(true)
    }
}
