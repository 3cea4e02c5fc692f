//! Bindings to the Oracle client library

use std::{ptr, ffi::CStr};
use libc::{c_void, size_t};

use super::*;

const OCI_ERROR_MAXMSG_SIZE : usize = 3072;
const OCI_DURATION_PROCESS  : u16 = 5;

/// Message file handle
#[repr(C)] struct OCIMsg { _private: [u8; 0] }

extern "C" {
    // https://docs.oracle.com/en/database/oracle/oracle-database/19/lnoci/handle-and-descriptor-functions.html#GUID-C5BF55F7-A110-4CB5-9663-5056590F12B5
    fn OCIHandleAlloc(
        parenth:    *mut OCIEnv,
        hndlpp:     *mut *mut  c_void,
        hndl_type:  u32,
        xtramem_sz: size_t,
        usrmempp:   *const c_void
    ) -> i32;

    // https://docs.oracle.com/en/database/oracle/oracle-database/19/lnoci/handle-and-descriptor-functions.html#GUID-E87E9F91-D3DC-4F35-BE7C-F1EFBFEEBA0A
    fn OCIHandleFree(
        hndlp:      *mut c_void,
        hnd_type:   u32
    ) -> i32;

    // https://docs.oracle.com/en/database/oracle/oracle-database/19/lnoci/handle-and-descriptor-functions.html#GUID-FA199A99-4D7A-42C2-BB0A-C20047B95DF9
    fn OCIAttrGet(
        trgthndlp:  *const c_void,
        trghndltyp: u32,
        attributep: *mut c_void,
        sizep:      *mut u32,
        attrtype:   u32,
        errhp:      *mut OCIError
    ) -> i32;

    // https://docs.oracle.com/en/database/oracle/oracle-database/19/lnoci/handle-and-descriptor-functions.html#GUID-3741D7BD-7652-4D7A-8813-AC2AEA8D3B03
    fn OCIAttrSet(
        trgthndlp:  *mut c_void,
        trghndltyp: u32,
        attributep: *const c_void,
        size:       u32,
        attrtype:   u32,
        errhp:      *mut OCIError
    ) -> i32;
}

extern "C" {
    // https://docs.oracle.com/en/database/oracle/oracle-database/19/lnoci/miscellaneous-functions.html#GUID-4B99087C-74F6-498A-8310-D6645172390A
    fn OCIErrorGet(
        hndlp:      *const c_void,
        recordno:   u32,
        sqlstate:   *const c_void,
        errcodep:   *mut i32,
        bufp:       *mut u8,
        bufsiz:     u32,
        hnd_type:   u32,
    ) -> i32;

    // https://docs.oracle.com/en/database/oracle/oracle-database/19/lnoci/miscellaneous-functions.html
    fn OCIClientVersion(
        major_version:          *mut i32,
        minor_version:          *mut i32,
        update_num:             *mut i32,
        patch_num:              *mut i32,
        port_update_num:        *mut i32,
    );

    // https://docs.oracle.com/en/database/oracle/oracle-database/19/lnoci/miscellaneous-functions.html
    fn OCIServerRelease(
        hndlp:      *mut c_void,
        errhp:      *mut OCIError,
        bufp:       *mut u8,
        bufsz:      u32,
        hndltype:   u8,
        version:    *mut u32
    ) -> i32;

    // https://docs.oracle.com/en/database/oracle/oracle-database/19/lnoci/miscellaneous-functions.html#GUID-033BF96D-D88D-4F18-909A-3AB7C2F6C70F
    fn OCIPing(
        svchp:      *mut OCISvcCtx,
        errhp:      *mut OCIError,
        mode:       u32
    ) -> i32;

    // https://docs.oracle.com/en/database/oracle/oracle-database/19/lnoci/miscellaneous-functions.html
    fn OCIBreak(
        hndlp:      *mut c_void,
        errhp:      *mut OCIError
    ) -> i32;

    // https://docs.oracle.com/en/database/oracle/oracle-database/19/lnoci/miscellaneous-functions.html
    fn OCIMessageOpen(
        envhp:      *mut OCIEnv,
        errhp:      *mut OCIError,
        msghp:      *mut *mut OCIMsg,
        product:    *const u8,
        facility:   *const u8,
        dur:        u16
    ) -> i32;

    // https://docs.oracle.com/en/database/oracle/oracle-database/19/lnoci/miscellaneous-functions.html
    fn OCIMessageGet(
        msgh:       *mut OCIMsg,
        msgno:      u32,
        msgbuf:     *mut u8,
        buflen:     size_t
    ) -> *const u8;

    // https://docs.oracle.com/en/database/oracle/oracle-database/19/lnoci/miscellaneous-functions.html
    fn OCIMessageClose(
        envhp:      *mut OCIEnv,
        errhp:      *mut OCIError,
        msgh:       *mut OCIMsg
    ) -> i32;
}

extern "C" {
    // https://docs.oracle.com/en/database/oracle/oracle-database/19/lnoci/connect-authorize-and-initialize-functions.html#GUID-0B6911A9-4B46-476C-BC5E-B87581666CD9
    fn OCIEnvNlsCreate(
        envhpp:     *mut *mut  OCIEnv,
        mode:       u32,
        ctxp:       *const c_void,
        malocfp:    *const c_void,
        ralocfp:    *const c_void,
        mfreefp:    *const c_void,
        xtramemsz:  size_t,
        usrmempp:   *const c_void,
        charset:    u16,
        ncharset:   u16
    ) -> i32;

    // https://docs.oracle.com/en/database/oracle/oracle-database/19/lnoci/connect-authorize-and-initialize-functions.html
    fn OCILogon(
        envhp:      *mut OCIEnv,
        errhp:      *mut OCIError,
        svchp:      *mut *mut OCISvcCtx,
        username:   *const u8,
        uname_len:  u32,
        password:   *const u8,
        passwd_len: u32,
        dbname:     *const u8,
        dbname_len: u32
    ) -> i32;

    // https://docs.oracle.com/en/database/oracle/oracle-database/19/lnoci/connect-authorize-and-initialize-functions.html
    fn OCILogoff(
        svchp:      *mut OCISvcCtx,
        errhp:      *mut OCIError
    ) -> i32;

    // https://docs.oracle.com/en/database/oracle/oracle-database/19/lnoci/connect-authorize-and-initialize-functions.html#GUID-B6291228-DA2F-4CE9-870A-F94243141757
    fn OCIServerAttach(
        srvhp:      *mut OCIServer,
        errhp:      *mut OCIError,
        dblink:     *const u8,
        dblink_len: u32,
        mode:       u32
    ) -> i32;

    // https://docs.oracle.com/en/database/oracle/oracle-database/19/lnoci/connect-authorize-and-initialize-functions.html#GUID-402B540A-05FF-464B-B9C8-B2E7B4ABD564
    fn OCIServerDetach(
        srvhp:      *mut OCIServer,
        errhp:      *mut OCIError,
        mode:       u32
    ) -> i32;

    // https://docs.oracle.com/en/database/oracle/oracle-database/19/lnoci/connect-authorize-and-initialize-functions.html#GUID-31B1FDB3-056E-4AF9-9B89-8DA6AA156947
    fn OCISessionBegin(
        svchp:      *mut OCISvcCtx,
        errhp:      *mut OCIError,
        userhp:     *mut OCISession,
        credt:      u32,
        mode:       u32
    ) -> i32;

    // https://docs.oracle.com/en/database/oracle/oracle-database/19/lnoci/connect-authorize-and-initialize-functions.html#GUID-2AE88BDC-2C44-4958-B26A-434B0407F06F
    fn OCISessionEnd(
        svchp:      *mut OCISvcCtx,
        errhp:      *mut OCIError,
        userhp:     *mut OCISession,
        mode:       u32
    ) -> i32;
}

extern "C" {
    // https://docs.oracle.com/en/database/oracle/oracle-database/19/lnoci/transaction-functions.html#GUID-DDAE3122-8769-4A30-8D78-EB2A3CCF77D4
    fn OCITransCommit(
        svchp:      *mut OCISvcCtx,
        errhp:      *mut OCIError,
        flags:      u32
    ) -> i32;

    // https://docs.oracle.com/en/database/oracle/oracle-database/19/lnoci/transaction-functions.html#GUID-06EF9A0A-01A3-40CE-A0B7-DF0504A93366
    fn OCITransRollback(
        svchp:      *mut OCISvcCtx,
        errhp:      *mut OCIError,
        flags:      u32
    ) -> i32;
}

extern "C" {
    // https://docs.oracle.com/en/database/oracle/oracle-database/19/lnoci/statement-functions.html
    fn OCIStmtPrepare(
        stmtp:      *mut OCIStmt,
        errhp:      *mut OCIError,
        stmt:       *const u8,
        stmt_len:   u32,
        language:   u32,
        mode:       u32
    ) -> i32;

    // https://docs.oracle.com/en/database/oracle/oracle-database/19/lnoci/bind-define-describe-functions.html
    fn OCIBindByPos(
        stmtp:      *mut OCIStmt,
        bindpp:     *mut *mut OCIBind,
        errhp:      *mut OCIError,
        position:   u32,
        valuep:     *mut c_void,
        value_sz:   i32,
        dty:        u16,
        indp:       *mut c_void,
        alenp:      *mut u16,
        rcodep:     *mut u16,
        maxarr_len: u32,
        curelep:    *mut u32,
        mode:       u32
    ) -> i32;

    // https://docs.oracle.com/en/database/oracle/oracle-database/19/lnoci/statement-functions.html#GUID-98B26708-3E02-45C0-8258-5D5544F32BE9
    fn OCIStmtExecute(
        svchp:      *mut OCISvcCtx,
        stmtp:      *mut OCIStmt,
        errhp:      *mut OCIError,
        iters:      u32,
        rowoff:     u32,
        snap_in:    *const c_void,
        snap_out:   *mut c_void,
        mode:       u32
    ) -> i32;
}

/// Pointer to optional text; OCI expects NULL for an empty string.
fn text_ptr(text: &[u8]) -> *const u8 {
    if text.is_empty() { ptr::null() } else { text.as_ptr() }
}

/// [`Oci`] implementation that calls the Oracle client library directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeOci;

impl Oci for NativeOci {
    fn env_create(&self, env: &mut Ptr<OCIEnv>, mode: u32) -> i32 {
        let mut envhp = ptr::null_mut::<OCIEnv>();
        let res = unsafe {
            OCIEnvNlsCreate(
                &mut envhp, mode,
                ptr::null(), ptr::null(), ptr::null(), ptr::null(), 0, ptr::null(),
                AL32UTF8, UTF8
            )
        };
        *env = Ptr::new(envhp);
        res
    }

    fn client_version(&self) -> Version {
        let mut major = 0;
        let mut minor = 0;
        let mut update = 0;
        let mut patch = 0;
        let mut port_update = 0;
        unsafe {
            OCIClientVersion(&mut major, &mut minor, &mut update, &mut patch, &mut port_update);
        }
        Version::new(major as u8, minor as u8, update as u8, patch as u8, port_update as u8)
    }

    fn error_get(&self, hndl: *mut c_void, htype: u32) -> Option<(i32, String)> {
        let mut errcode = 0;
        let mut errmsg : Vec<u8> = Vec::with_capacity(OCI_ERROR_MAXMSG_SIZE);
        let errmsg_ptr = errmsg.as_mut_ptr();
        let res = unsafe {
            *errmsg_ptr = 0;
            OCIErrorGet(hndl, 1, ptr::null(), &mut errcode, errmsg_ptr, OCI_ERROR_MAXMSG_SIZE as u32, htype)
        };
        if res == OCI_SUCCESS {
            let msg = unsafe { CStr::from_ptr(errmsg_ptr as *const libc::c_char) };
            Some((errcode, msg.to_string_lossy().trim_end().to_string()))
        } else {
            None
        }
    }

    fn message_get(&self, env: Ptr<OCIEnv>, err: Ptr<OCIError>, msgno: u32) -> Option<String> {
        let mut msgh = ptr::null_mut::<OCIMsg>();
        let res = unsafe {
            OCIMessageOpen(env.get(), err.get(), &mut msgh, b"rdbms\0".as_ptr(), b"ora\0".as_ptr(), OCI_DURATION_PROCESS)
        };
        if res != OCI_SUCCESS || msgh.is_null() {
            return None;
        }
        let msg = unsafe {
            let text = OCIMessageGet(msgh, msgno, ptr::null_mut(), 0);
            if text.is_null() {
                None
            } else {
                Some(CStr::from_ptr(text as *const libc::c_char).to_string_lossy().trim_end().to_string())
            }
        };
        unsafe {
            OCIMessageClose(env.get(), err.get(), msgh);
        }
        msg
    }

    fn handle_alloc(&self, env: Ptr<OCIEnv>, hndl: &mut *mut c_void, htype: u32) -> i32 {
        unsafe { OCIHandleAlloc(env.get(), hndl, htype, 0, ptr::null()) }
    }

    fn handle_free(&self, hndl: *mut c_void, htype: u32) -> i32 {
        unsafe { OCIHandleFree(hndl, htype) }
    }

    fn attr_get_handle(&self, hndl: *mut c_void, htype: u32, value: &mut *mut c_void, attr: u32, err: Ptr<OCIError>) -> i32 {
        let mut size = 0u32;
        unsafe {
            OCIAttrGet(hndl, htype, value as *mut *mut c_void as *mut c_void, &mut size, attr, err.get())
        }
    }

    fn attr_set(&self, hndl: *mut c_void, htype: u32, value: AttrValue<'_>, attr: u32, err: Ptr<OCIError>) -> i32 {
        match value {
            AttrValue::Handle(val) => unsafe {
                OCIAttrSet(hndl, htype, val, 0, attr, err.get())
            },
            AttrValue::Text(text) => unsafe {
                OCIAttrSet(hndl, htype, text.as_ptr() as *const c_void, text.len() as u32, attr, err.get())
            },
            AttrValue::U32(val) => unsafe {
                OCIAttrSet(hndl, htype, &val as *const u32 as *const c_void, std::mem::size_of::<u32>() as u32, attr, err.get())
            },
        }
    }

    fn logon(&self, env: Ptr<OCIEnv>, err: Ptr<OCIError>, svc: &mut Ptr<OCISvcCtx>, username: &[u8], password: &[u8], dbname: &[u8]) -> i32 {
        let mut svchp = ptr::null_mut::<OCISvcCtx>();
        let res = unsafe {
            OCILogon(
                env.get(), err.get(), &mut svchp,
                username.as_ptr(), username.len() as u32,
                password.as_ptr(), password.len() as u32,
                text_ptr(dbname), dbname.len() as u32
            )
        };
        *svc = Ptr::new(svchp);
        res
    }

    fn logoff(&self, svc: Ptr<OCISvcCtx>, err: Ptr<OCIError>) -> i32 {
        unsafe { OCILogoff(svc.get(), err.get()) }
    }

    fn server_attach(&self, srv: Ptr<OCIServer>, err: Ptr<OCIError>, dbname: &[u8], mode: u32) -> i32 {
        unsafe { OCIServerAttach(srv.get(), err.get(), text_ptr(dbname), dbname.len() as u32, mode) }
    }

    fn server_detach(&self, srv: Ptr<OCIServer>, err: Ptr<OCIError>, mode: u32) -> i32 {
        unsafe { OCIServerDetach(srv.get(), err.get(), mode) }
    }

    fn session_begin(&self, svc: Ptr<OCISvcCtx>, err: Ptr<OCIError>, usr: Ptr<OCISession>, cred: u32, mode: u32) -> i32 {
        unsafe { OCISessionBegin(svc.get(), err.get(), usr.get(), cred, mode) }
    }

    fn session_end(&self, svc: Ptr<OCISvcCtx>, err: Ptr<OCIError>, usr: Ptr<OCISession>, mode: u32) -> i32 {
        unsafe { OCISessionEnd(svc.get(), err.get(), usr.get(), mode) }
    }

    fn trans_commit(&self, svc: Ptr<OCISvcCtx>, err: Ptr<OCIError>, flags: u32) -> i32 {
        unsafe { OCITransCommit(svc.get(), err.get(), flags) }
    }

    fn trans_rollback(&self, svc: Ptr<OCISvcCtx>, err: Ptr<OCIError>, flags: u32) -> i32 {
        unsafe { OCITransRollback(svc.get(), err.get(), flags) }
    }

    fn ping(&self, svc: Ptr<OCISvcCtx>, err: Ptr<OCIError>, mode: u32) -> i32 {
        unsafe { OCIPing(svc.get(), err.get(), mode) }
    }

    fn break_call(&self, hndl: *mut c_void, err: Ptr<OCIError>) -> i32 {
        unsafe { OCIBreak(hndl, err.get()) }
    }

    fn server_release(&self, hndl: *mut c_void, err: Ptr<OCIError>, htype: u8, version: &mut u32) -> i32 {
        let mut buf = [0u8; 128];
        unsafe { OCIServerRelease(hndl, err.get(), buf.as_mut_ptr(), buf.len() as u32, htype, version) }
    }

    fn stmt_prepare(&self, stmt: Ptr<OCIStmt>, err: Ptr<OCIError>, sql: &[u8], language: u32, mode: u32) -> i32 {
        unsafe { OCIStmtPrepare(stmt.get(), err.get(), sql.as_ptr(), sql.len() as u32, language, mode) }
    }

    fn bind_by_pos(&self, stmt: Ptr<OCIStmt>, bind: &mut Ptr<OCIBind>, err: Ptr<OCIError>, position: u32, value: &[u8], dty: u16) -> i32 {
        let mut bindp = bind.get();
        let res = unsafe {
            OCIBindByPos(
                stmt.get(), &mut bindp, err.get(), position,
                value.as_ptr() as *mut c_void, value.len() as i32, dty,
                ptr::null_mut(), ptr::null_mut(), ptr::null_mut(), 0, ptr::null_mut(), OCI_DEFAULT
            )
        };
        *bind = Ptr::new(bindp);
        res
    }

    fn stmt_execute(&self, svc: Ptr<OCISvcCtx>, stmt: Ptr<OCIStmt>, err: Ptr<OCIError>, iters: u32, mode: u32) -> i32 {
        unsafe { OCIStmtExecute(svc.get(), stmt.get(), err.get(), iters, 0, ptr::null(), ptr::null_mut(), mode) }
    }
}

// Character set IDs
const AL32UTF8 : u16 = 873;
const UTF8     : u16 = 871;
