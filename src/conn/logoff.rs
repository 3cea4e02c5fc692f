//! Session teardown

use std::sync::Arc;
use bitflags::bitflags;
use tracing::{debug, warn};

use super::SvcState;
use crate::{
    Error, Result,
    env::EnvHandle,
    err::check,
    handle::{self, HandleKind},
    oci::{self, Ptr, OCIError, OCIServer, OCISession, OCISvcCtx},
};

bitflags! {
    /// Steps of an explicit logon that have completed
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LogonSteps: u8 {
        const SESSION_BEGIN = 0x01;
        const SERVER_ATTACH = 0x02;
    }
}

/// How the session was established, and thus how it must be torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoffStrategy {
    /// Logged on with `OCILogon`; `OCILogoff` frees everything
    Simple,
    /// Handles allocated by the connection; each completed logon step is undone separately
    Complex,
}

impl LogoffStrategy {
    /**
        Detaches the native handles from the live session state.

        After this returns the session state holds no handles and no strategy, and
        is marked as closing. The returned task owns the handles.
    */
    pub(crate) fn prepare(self, state: &mut SvcState, env: Arc<EnvHandle>) -> LogoffTask {
        let task = LogoffTask {
            env,
            strategy: self,
            steps: state.steps,
            svc: state.svc.take(),
            usr: state.usr.take(),
            srv: state.srv.take(),
            err: state.err.take(),
        };
        state.steps = LogonSteps::empty();
        state.strategy = None;
        state.closing = true;
        task
    }
}

/// Native half of a logoff. It can run on any thread.
pub(crate) struct LogoffTask {
    env: Arc<EnvHandle>,
    strategy: LogoffStrategy,
    steps: LogonSteps,
    svc: Ptr<OCISvcCtx>,
    usr: Ptr<OCISession>,
    srv: Ptr<OCIServer>,
    err: Ptr<OCIError>,
}

impl LogoffTask {
    /**
        Tears down the session.

        Every step runs even when a previous one fails. Returns the first failure of
        `OCILogoff`, `OCISessionEnd` or `OCIServerDetach`. Rollback and handle free
        failures are only logged.
    */
    pub(crate) fn execute(self) -> Result<()> {
        let oci = self.env.oci();
        let err = self.err;
        let mut first_err : Option<Error> = None;
        let mut record = |step: &str, res: Result<()>| {
            if let Err(step_err) = res {
                warn!(err = %step_err, step, "teardown step failed");
                first_err.get_or_insert(step_err);
            }
        };

        if let Err(rollback_err) = check(oci, err, oci.trans_rollback(self.svc, err, oci::OCI_DEFAULT)) {
            warn!(err = %rollback_err, "rollback before logoff failed");
        }

        match self.strategy {
            LogoffStrategy::Simple => {
                record("logoff", check(oci, err, oci.logoff(self.svc, err)));
            }
            LogoffStrategy::Complex => {
                if self.steps.contains(LogonSteps::SESSION_BEGIN) {
                    record("session end", check(oci, err, oci.session_end(self.svc, err, self.usr, oci::OCI_DEFAULT)));
                }
                if self.steps.contains(LogonSteps::SERVER_ATTACH) {
                    record("server detach", check(oci, err, oci.server_detach(self.srv, err, oci::OCI_DEFAULT)));
                }
                let _ = handle::free_handle(oci, self.usr, HandleKind::Session);
                let _ = handle::free_handle(oci, self.srv, HandleKind::Server);
                let _ = handle::free_handle(oci, self.svc, HandleKind::SvcCtx);
            }
        }
        let _ = handle::free_handle(oci, err, HandleKind::Error);
        debug!(strategy = ?self.strategy, "session torn down");
        first_err.map_or(Ok(()), Err)
    }
}
