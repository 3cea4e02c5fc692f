//! Session establishment

use bitflags::bitflags;
use libc::c_void;
use tracing::debug;

use super::{Connection, LogoffStrategy, LogonSteps, SvcState};
use crate::{
    Error, Result,
    err::check,
    handle::{self, HandleKind},
    oci::{self, AttrValue, Ptr, OCIError},
    task,
};

const REUSE : &str = "Could not reuse the session.";
const COMPLEX_ONLY : &str = "Use this method only for the connection whose handles were allocated by allocate_handles().";
const TWICE : &str = "Could not use this method twice.";

bitflags! {
    /// `OCIServerAttach` modes
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AttachMode: u32 {
        /// Attach through a connection pool
        const CPOOL = oci::OCI_CPOOL;
    }
}

bitflags! {
    /// `OCISessionBegin` modes
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SessionMode: u32 {
        const SYSDBA  = oci::OCI_SYSDBA;
        const SYSOPER = oci::OCI_SYSOPER;
    }
}

/// Credentials for [`Connection::begin_session`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential<'a> {
    /// Database user name and password
    Rdbms { username: &'a str, password: &'a str },
    /// Credentials of the operating system user
    External,
}

fn check_reuse(state: &SvcState) -> Result<()> {
    if state.strategy.is_some() || state.closing || state.establishing {
        Err(Error::connect(REUSE))
    } else {
        Ok(())
    }
}

fn check_complex(state: &SvcState, step: LogonSteps) -> Result<()> {
    if state.strategy != Some(LogoffStrategy::Complex) {
        Err(Error::state(COMPLEX_ONLY))
    } else if state.steps.contains(step) {
        Err(Error::state(TWICE))
    } else {
        Ok(())
    }
}

impl Connection<'_> {
    /// Returns the connection's error handle, allocating one if the previous was freed by a logoff.
    fn ensure_err(&self, state: &mut SvcState) -> Result<Ptr<OCIError>> {
        if state.err.is_null() {
            let err = handle::alloc_handle(self.oci(), self.env().env_ptr(), HandleKind::Error)?;
            state.err = Ptr::from_void(err.as_void());
        }
        Ok(state.err)
    }

    fn read_handle(&self, state: &SvcState, attr: u32) -> Result<Ptr<c_void>> {
        let oci = self.oci();
        let mut value = std::ptr::null_mut::<c_void>();
        check(oci, state.err, oci.attr_get_handle(state.svc.as_void(), oci::OCI_HTYPE_SVCCTX, &mut value, attr, state.err))?;
        Ok(Ptr::new(value))
    }

    /**
        Logs on with `OCILogon`.

        Fails with [`Error::Connect`] when the connection is connected or closing.
        An absent `dbname` connects to the default database.

        # Example

        ```no_run
        # #[cfg(feature="native")]
        # fn main() -> ocilink::Result<()> {
        let oracle = ocilink::Environment::new()?;
        let conn = oracle.new_connection()?;
        conn.establish_simple("scott", "tiger", Some("//localhost/orclpdb"))?;
        assert_eq!(conn.state(), ocilink::ConnectionState::SimpleActive);
        # Ok(())
        # }
        # #[cfg(not(feature="native"))]
        # fn main() {}
        ```
    */
    pub fn establish_simple(&self, username: &str, password: &str, dbname: Option<&str>) -> Result<()> {
        self.check_pid()?;
        let _executing = self.enter_call()?;
        let err = {
            let mut state = self.lock_state();
            check_reuse(&state)?;
            let err = self.ensure_err(&mut state)?;
            state.establishing = true;
            err
        };
        let oci = self.oci();
        let env = self.env().env_ptr();
        let dbname = dbname.unwrap_or_default();
        let res = task::run_blocking(self.dispatch(), || {
            let mut svc = Ptr::null();
            check(oci, err, oci.logon(env, err, &mut svc, username.as_bytes(), password.as_bytes(), dbname.as_bytes()))?;
            Ok(svc)
        });

        let mut state = self.lock_state();
        state.establishing = false;
        let svc = res??;
        state.strategy = Some(LogoffStrategy::Simple);
        state.steps = LogonSteps::empty();
        state.svc = svc;
        self.root().set(svc);
        debug!(username, dbname, "logged on");

        let usr = self.read_handle(&state, oci::OCI_ATTR_SESSION)?;
        let srv = self.read_handle(&state, oci::OCI_ATTR_SERVER)?;
        state.usr = Ptr::from_void(usr.as_void());
        state.srv = Ptr::from_void(srv.as_void());
        self.session_handle().set(usr);
        self.server_handle().set(srv);
        Ok(())
    }

    /**
        Allocates the service context, session and server handles for an explicit
        logon with [`Connection::attach_server`] and [`Connection::begin_session`].

        Fails with [`Error::Connect`] when the connection is connected or closing.
    */
    pub fn allocate_handles(&self) -> Result<()> {
        self.check_pid()?;
        let mut state = self.lock_state();
        check_reuse(&state)?;
        self.ensure_err(&mut state)?;
        state.strategy = Some(LogoffStrategy::Complex);
        state.steps = LogonSteps::empty();

        let oci = self.oci();
        let env = self.env().env_ptr();
        let svc = handle::alloc_handle(oci, env, HandleKind::SvcCtx)?;
        state.svc = Ptr::from_void(svc.as_void());
        self.root().set(svc);
        let usr = handle::alloc_handle(oci, env, HandleKind::Session)?;
        state.usr = Ptr::from_void(usr.as_void());
        self.session_handle().set(usr);
        let srv = handle::alloc_handle(oci, env, HandleKind::Server)?;
        state.srv = Ptr::from_void(srv.as_void());
        self.server_handle().set(srv);
        debug!("logon handles allocated");
        Ok(())
    }

    /**
        Attaches to the server with `OCIServerAttach` and sets the server handle
        into the service context.

        Only valid after [`Connection::allocate_handles`], and only once.
    */
    pub fn attach_server(&self, dbname: Option<&str>, mode: AttachMode) -> Result<()> {
        self.check_pid()?;
        let _executing = self.enter_call()?;
        let (svc, srv, err) = {
            let state = self.lock_state();
            check_complex(&state, LogonSteps::SERVER_ATTACH)?;
            (state.svc, state.srv, state.err)
        };
        let oci = self.oci();
        let dbname = dbname.unwrap_or_default();
        task::run_blocking(self.dispatch(), || {
            check(oci, err, oci.server_attach(srv, err, dbname.as_bytes(), mode.bits()))
        })??;
        self.lock_state().steps.insert(LogonSteps::SERVER_ATTACH);
        debug!(dbname, "attached to server");
        check(oci, err, oci.attr_set(svc.as_void(), oci::OCI_HTYPE_SVCCTX, AttrValue::Handle(srv.as_void()), oci::OCI_ATTR_SERVER, err))
    }

    /**
        Authenticates the session with `OCISessionBegin` and sets the session handle
        into the service context.

        Only valid after [`Connection::allocate_handles`], and only once.

        # Example

        ```no_run
        use ocilink::{AttachMode, Credential, SessionMode};

        # #[cfg(feature="native")]
        # fn main() -> ocilink::Result<()> {
        let oracle = ocilink::Environment::new()?;
        let conn = oracle.new_connection()?;
        conn.allocate_handles()?;
        conn.attach_server(None, AttachMode::empty())?;
        conn.begin_session(Credential::External, SessionMode::SYSDBA)?;
        # Ok(())
        # }
        # #[cfg(not(feature="native"))]
        # fn main() {}
        ```
    */
    pub fn begin_session(&self, credential: Credential<'_>, mode: SessionMode) -> Result<()> {
        self.check_pid()?;
        let _executing = self.enter_call()?;
        let (svc, usr, err) = {
            let state = self.lock_state();
            check_complex(&state, LogonSteps::SESSION_BEGIN)?;
            (state.svc, state.usr, state.err)
        };
        let oci = self.oci();
        let cred = match credential {
            Credential::Rdbms { username, password } => {
                check(oci, err, oci.attr_set(usr.as_void(), oci::OCI_HTYPE_SESSION, AttrValue::Text(username.as_bytes()), oci::OCI_ATTR_USERNAME, err))?;
                check(oci, err, oci.attr_set(usr.as_void(), oci::OCI_HTYPE_SESSION, AttrValue::Text(password.as_bytes()), oci::OCI_ATTR_PASSWORD, err))?;
                oci::OCI_CRED_RDBMS
            }
            Credential::External => oci::OCI_CRED_EXT,
        };
        task::run_blocking(self.dispatch(), || {
            check(oci, err, oci.session_begin(svc, err, usr, cred, mode.bits()))
        })??;
        self.lock_state().steps.insert(LogonSteps::SESSION_BEGIN);
        debug!(?mode, "session begun");
        check(oci, err, oci.attr_set(svc.as_void(), oci::OCI_HTYPE_SVCCTX, AttrValue::Handle(usr.as_void()), oci::OCI_ATTR_SESSION, err))
    }

    /**
        Closes the connection.

        Statements parsed on the connection are closed first. Then the session is
        torn down the way it was established. Logging off a connection that is not
        connected does nothing.

        A call that executes on the connection in another thread is waited for.
        When several threads log off at once, one of them tears the session down
        and the others find it closed.
    */
    pub fn logoff(&self) -> Result<()> {
        self.check_pid()?;
        let _executing = self.wait_for_call();
        let mut state = self.lock_state();
        let strategy = match state.strategy {
            Some(strategy) => strategy,
            None => return Ok(()),
        };
        let children_res = self.root().release_children();
        let teardown = strategy.prepare(&mut state, self.env().get_env());
        self.reset_aliases();
        drop(state);

        let res = task::run_blocking(self.dispatch(), move || teardown.execute());

        let mut state = self.lock_state();
        state.closing = false;
        state.closed_once = true;
        debug!(?strategy, "logged off");
        res?.and(children_res)
    }
}
