//! SQL or PL/SQL statements

use parking_lot::Mutex;
use tracing::warn;

use crate::{
    Connection, Error, Result,
    err::check,
    handle::{HandleKind, HandleRef},
    oci::{self, AttrValue, Ptr, OCIBind, OCIStmt},
};

/// Represents a prepared statement
pub struct Statement<'a> {
    conn: &'a Connection<'a>,
    handle: HandleRef,
    prefetch_rows: Mutex<Option<u32>>,
}

impl std::fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement").field("handle", &self.handle).finish()
    }
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.conn.check_pid() {
            warn!(%err, "statement dropped in a forked process; its handle is left to the parent process");
            return;
        }
        if let Err(err) = self.handle.release() {
            warn!(%err, "statement handle was not freed");
        }
    }
}

impl<'a> Statement<'a> {
    pub(crate) fn new(conn: &'a Connection<'a>, sql: &str) -> Result<Self> {
        let call = conn.active_call()?;
        let err = call.err;
        let env = conn.env();
        let handle = HandleRef::alloc(env.oci_arc(), env.env_ptr(), HandleKind::Stmt, Some(conn.root()))?;
        let stmt = Self { conn, handle, prefetch_rows: Mutex::new(None) };
        let oci = conn.oci();
        check(oci, err, oci.stmt_prepare(stmt.handle.ptr(), err, sql.as_bytes(), oci::OCI_NTV_SYNTAX, oci::OCI_DEFAULT))?;
        Ok(stmt)
    }

    fn stmt_ptr(&self) -> Result<Ptr<OCIStmt>> {
        if self.handle.is_released() {
            Err(Error::new("Statement is closed"))
        } else {
            Ok(self.handle.ptr())
        }
    }

    /// Statement handle. It is released when the statement or its connection is closed.
    pub fn handle(&self) -> &HandleRef {
        &self.handle
    }

    pub fn prefetch_rows(&self) -> Option<u32> {
        *self.prefetch_rows.lock()
    }

    /// Sets the number of top-level rows to be prefetched.
    pub fn set_prefetch_rows(&self, rows: u32) -> Result<()> {
        self.conn.check_pid()?;
        self.stmt_ptr()?;
        let call = self.conn.active_call()?;
        let err = call.err;
        let stmt = self.stmt_ptr()?;
        let oci = self.conn.oci();
        check(oci, err, oci.attr_set(stmt.as_void(), oci::OCI_HTYPE_STMT, AttrValue::U32(rows), oci::OCI_ATTR_PREFETCH_ROWS, err))?;
        *self.prefetch_rows.lock() = Some(rows);
        Ok(())
    }

    /**
        Binds `args` by position as character values and executes the statement once.

        When the connection is in autocommit mode the transaction is committed if the
        execution succeeds. The values bound by the previous execution are unbound.
    */
    pub fn execute(&self, args: &[&str]) -> Result<()> {
        self.conn.check_pid()?;
        self.stmt_ptr()?;
        let call = self.conn.active_call()?;
        let (svc, err) = (call.svc, call.err);
        let stmt = self.stmt_ptr()?;
        // Bind aliases are the only children of a statement.
        self.handle.release_children()?;
        let oci = self.conn.oci();
        for (idx, arg) in args.iter().enumerate() {
            let mut bind = Ptr::<OCIBind>::null();
            check(oci, err, oci.bind_by_pos(stmt, &mut bind, err, idx as u32 + 1, arg.as_bytes(), oci::SQLT_CHR))?;
            let bind_ref = HandleRef::alias(HandleKind::Bind);
            bind_ref.set(bind);
            self.handle.link_child(&bind_ref);
        }
        let mode = if self.conn.is_autocommit() { oci::OCI_COMMIT_ON_SUCCESS } else { oci::OCI_DEFAULT };
        call.run(|| check(oci, err, oci.stmt_execute(svc, stmt, err, 1, mode)))
    }

    /// Frees the statement handle. Closing a closed statement does nothing.
    pub fn close(&self) -> Result<()> {
        self.conn.check_pid()?;
        self.handle.release()
    }
}

/// Prepares `sql`, executes it once with `args` and closes it.
pub(crate) fn exec_sql(conn: &Connection<'_>, sql: &str, args: &[&str]) -> Result<()> {
    let stmt = Statement::new(conn, sql)?;
    let res = stmt.execute(args);
    let closed = stmt.close();
    res.and(closed)
}
