//! Oracle OCI

use libc::c_void;

pub mod ptr;

#[cfg(feature="native")]
#[cfg_attr(docsrs, doc(cfg(feature="native")))]
pub mod native;

pub use ptr::Ptr;

use crate::Version;

pub const OCI_DEFAULT                : u32 = 0;

// OCI Error Codes
pub const OCI_SUCCESS                : i32 = 0;
pub const OCI_SUCCESS_WITH_INFO      : i32 = 1;
pub const OCI_NEED_DATA              : i32 = 99;
pub const OCI_NO_DATA                : i32 = 100;
pub const OCI_ERROR                  : i32 = -1;

// Handle Types
pub const OCI_HTYPE_ENV              : u32 = 1;
pub const OCI_HTYPE_ERROR            : u32 = 2;
pub const OCI_HTYPE_SVCCTX           : u32 = 3;
pub const OCI_HTYPE_STMT             : u32 = 4;
pub const OCI_HTYPE_BIND             : u32 = 5;
pub const OCI_HTYPE_SERVER           : u32 = 8;
pub const OCI_HTYPE_SESSION          : u32 = 9;

// Handle Definitions
#[repr(C)] pub struct OCIEnv                { _private: [u8; 0] }
#[repr(C)] pub struct OCIError              { _private: [u8; 0] }
#[repr(C)] pub struct OCISvcCtx             { _private: [u8; 0] }
#[repr(C)] pub struct OCIStmt               { _private: [u8; 0] }
#[repr(C)] pub struct OCIBind               { _private: [u8; 0] }
#[repr(C)] pub struct OCIServer             { _private: [u8; 0] }
#[repr(C)] pub struct OCISession            { _private: [u8; 0] }

/// Marker trait for OCI handles
pub trait OCIStruct {}

macro_rules! mark_as_oci {
    ($($t:ty),+) => {
        $(
            impl OCIStruct for $t {}
        )+
    };
}

mark_as_oci!(OCIEnv, OCIError, OCISvcCtx, OCIStmt, OCIBind, OCIServer, OCISession, c_void);

// Initialization Modes
pub const OCI_THREADED               : u32 = 1;
pub const OCI_OBJECT                 : u32 = 2;

// Attribute Constants
pub const OCI_ATTR_PREFETCH_ROWS     : u32 = 11;
pub const OCI_ATTR_SERVER            : u32 = 6;
pub const OCI_ATTR_SESSION           : u32 = 7;
pub const OCI_ATTR_USERNAME          : u32 = 22;
pub const OCI_ATTR_PASSWORD          : u32 = 23;
pub const OCI_ATTR_CLIENT_IDENTIFIER : u32 = 278;
pub const OCI_ATTR_MODULE            : u32 = 366;
pub const OCI_ATTR_ACTION            : u32 = 367;
pub const OCI_ATTR_CLIENT_INFO       : u32 = 368;

// Credential Types
pub const OCI_CRED_RDBMS             : u32 = 1;
pub const OCI_CRED_EXT               : u32 = 2;

// Session Modes
pub const OCI_SYSDBA                 : u32 = 0x0002;
pub const OCI_SYSOPER                : u32 = 0x0004;

// Server Attach Modes
pub const OCI_CPOOL                  : u32 = 0x0200;

// Execution Modes
pub const OCI_COMMIT_ON_SUCCESS      : u32 = 0x0020;

// Parsing Syntax Types
pub const OCI_NTV_SYNTAX             : u32 = 1;

// Data types
pub const SQLT_CHR                   : u16 = 1;

/// Attribute value passed to [`Oci::attr_set`]
#[derive(Debug, Clone, Copy)]
pub enum AttrValue<'a> {
    /// Another handle, like the server handle set into a service context
    Handle(*mut c_void),
    /// Text attributes; OCI copies the bytes
    Text(&'a [u8]),
    U32(u32),
}

/**
    The OCI calls the connection lifecycle is built on.

    Each method mirrors one OCI function and returns its raw `sword` status,
    so callers decide how a status maps onto [`crate::Error`]. Handles are passed
    as [`Ptr`]s and are never dereferenced on the Rust side.

    [`native::NativeOci`] (feature `native`) forwards these calls to the Oracle
    client library. Other implementations can be plugged into an environment with
    [`crate::Environment::with_oci`].
*/
pub trait Oci: Send + Sync + 'static {
    /// `OCIEnvNlsCreate`
    fn env_create(&self, env: &mut Ptr<OCIEnv>, mode: u32) -> i32;

    /// `OCIClientVersion`
    fn client_version(&self) -> Version;

    /// `OCIErrorGet` for the first diagnostic record. Returns `None` when there is none.
    fn error_get(&self, hndl: *mut c_void, htype: u32) -> Option<(i32, String)>;

    /// Text of message `msgno` from the `rdbms`/`ora` message file (`OCIMessageOpen`, `OCIMessageGet`).
    /// Returns `None` when there is no such message.
    fn message_get(&self, env: Ptr<OCIEnv>, err: Ptr<OCIError>, msgno: u32) -> Option<String>;

    /// `OCIHandleAlloc`
    fn handle_alloc(&self, env: Ptr<OCIEnv>, hndl: &mut *mut c_void, htype: u32) -> i32;

    /// `OCIHandleFree`
    fn handle_free(&self, hndl: *mut c_void, htype: u32) -> i32;

    /// `OCIAttrGet` of a handle-valued attribute
    fn attr_get_handle(&self, hndl: *mut c_void, htype: u32, value: &mut *mut c_void, attr: u32, err: Ptr<OCIError>) -> i32;

    /// `OCIAttrSet`
    fn attr_set(&self, hndl: *mut c_void, htype: u32, value: AttrValue<'_>, attr: u32, err: Ptr<OCIError>) -> i32;

    /// `OCILogon`. An empty `dbname` is passed to OCI as NULL.
    fn logon(&self, env: Ptr<OCIEnv>, err: Ptr<OCIError>, svc: &mut Ptr<OCISvcCtx>, username: &[u8], password: &[u8], dbname: &[u8]) -> i32;

    /// `OCILogoff`
    fn logoff(&self, svc: Ptr<OCISvcCtx>, err: Ptr<OCIError>) -> i32;

    /// `OCIServerAttach`. An empty `dbname` is passed to OCI as NULL.
    fn server_attach(&self, srv: Ptr<OCIServer>, err: Ptr<OCIError>, dbname: &[u8], mode: u32) -> i32;

    /// `OCIServerDetach`
    fn server_detach(&self, srv: Ptr<OCIServer>, err: Ptr<OCIError>, mode: u32) -> i32;

    /// `OCISessionBegin`
    fn session_begin(&self, svc: Ptr<OCISvcCtx>, err: Ptr<OCIError>, usr: Ptr<OCISession>, cred: u32, mode: u32) -> i32;

    /// `OCISessionEnd`
    fn session_end(&self, svc: Ptr<OCISvcCtx>, err: Ptr<OCIError>, usr: Ptr<OCISession>, mode: u32) -> i32;

    /// `OCITransCommit`
    fn trans_commit(&self, svc: Ptr<OCISvcCtx>, err: Ptr<OCIError>, flags: u32) -> i32;

    /// `OCITransRollback`
    fn trans_rollback(&self, svc: Ptr<OCISvcCtx>, err: Ptr<OCIError>, flags: u32) -> i32;

    /// `OCIPing`
    fn ping(&self, svc: Ptr<OCISvcCtx>, err: Ptr<OCIError>, mode: u32) -> i32;

    /// `OCIBreak`
    fn break_call(&self, hndl: *mut c_void, err: Ptr<OCIError>) -> i32;

    /// `OCIServerRelease`
    fn server_release(&self, hndl: *mut c_void, err: Ptr<OCIError>, htype: u8, version: &mut u32) -> i32;

    /// `OCIStmtPrepare`
    fn stmt_prepare(&self, stmt: Ptr<OCIStmt>, err: Ptr<OCIError>, sql: &[u8], language: u32, mode: u32) -> i32;

    /**
        `OCIBindByPos` of an input character value.

        OCI keeps the address of `value`; it must stay valid until the statement
        is executed.
    */
    fn bind_by_pos(&self, stmt: Ptr<OCIStmt>, bind: &mut Ptr<OCIBind>, err: Ptr<OCIError>, position: u32, value: &[u8], dty: u16) -> i32;

    /// `OCIStmtExecute`
    fn stmt_execute(&self, svc: Ptr<OCISvcCtx>, stmt: Ptr<OCIStmt>, err: Ptr<OCIError>, iters: u32, mode: u32) -> i32;

    /// Identifier of the current process. OCI handles are not valid across `fork()`.
    fn getpid(&self) -> u32 {
        unsafe { libc::getpid() as u32 }
    }
}
