//! Round trips on an established session

use tracing::debug;

use super::Connection;
use crate::{
    Result, Statement, Version,
    err::check,
    oci,
    stmt,
};

/// First client release with `OCIPing`
const PING_SINCE : Version = Version::new(10, 2, 0, 0, 0);

impl Connection<'_> {
    /// Commits the current transaction.
    pub fn commit(&self) -> Result<()> {
        self.check_pid()?;
        let call = self.active_call()?;
        let (svc, err) = (call.svc, call.err);
        let oci = self.oci();
        call.run(|| check(oci, err, oci.trans_commit(svc, err, oci::OCI_DEFAULT)))
    }

    /// Rolls back the current transaction.
    pub fn rollback(&self) -> Result<()> {
        self.check_pid()?;
        let call = self.active_call()?;
        let (svc, err) = (call.svc, call.err);
        let oci = self.oci();
        call.run(|| check(oci, err, oci.trans_rollback(svc, err, oci::OCI_DEFAULT)))
    }

    /**
        Makes a round trip to the server to check that the connection is alive.

        Returns `false`, rather than an error, when the round trip fails or cannot
        be made, for instance because another call executes on the session. Uses
        `OCIPing` when the client library has it, and executes an empty PL/SQL
        block otherwise.
    */
    pub fn ping(&self) -> Result<bool> {
        self.check_pid()?;
        let res = if self.env().client_version() >= PING_SINCE {
            self.active_call().and_then(|call| {
                let (svc, err) = (call.svc, call.err);
                let oci = self.oci();
                call.run(|| check(oci, err, oci.ping(svc, err, oci::OCI_DEFAULT)))
            })
        } else {
            stmt::exec_sql(self, "BEGIN NULL; END;", &[])
        };
        match res {
            Ok(()) => Ok(true),
            Err(err) => {
                debug!(%err, "ping failed");
                Ok(false)
            }
        }
    }

    /**
        Prepares a statement for execution.

        The prefetch row count set on the connection is set on the new statement.
    */
    pub fn parse(&self, sql: &str) -> Result<Statement<'_>> {
        self.check_pid()?;
        let stmt = Statement::new(self, sql)?;
        if let Some(rows) = self.prefetch_rows() {
            stmt.set_prefetch_rows(rows)?;
        }
        Ok(stmt)
    }

    /// Returns the release number of the database server.
    pub fn server_version(&self) -> Result<Version> {
        self.check_pid()?;
        let call = self.active_call()?;
        let (svc, err) = (call.svc, call.err);
        let oci = self.oci();
        let vernum = call.run(|| {
            let mut vernum = 0;
            check(oci, err, oci.server_release(svc.as_void(), err, oci::OCI_HTYPE_SVCCTX as u8, &mut vernum))?;
            Ok(vernum)
        })?;
        Ok(Version::from_packed(vernum))
    }
}
