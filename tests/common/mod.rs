#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, atomic::{AtomicU32, AtomicUsize, Ordering}},
    thread,
};
use libc::c_void;
use parking_lot::{Condvar, Mutex};
use ocilink::{
    Environment, Version,
    oci::{self, AttrValue, Oci, Ptr, OCIBind, OCIEnv, OCIError, OCIServer, OCISession, OCIStmt, OCISvcCtx},
};

pub const MOCK_PID : u32 = 4242;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One native call made through [`MockOci`]
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: &'static str,
    pub arg: String,
    pub thread: Option<String>,
}

#[derive(Default)]
struct CallGate {
    /// The call that blocks when it is made next
    blocking: Option<&'static str>,
    waiting: bool,
    released: bool,
}

/// Records every call and hands out fake handle addresses.
pub struct MockOci {
    calls: Mutex<Vec<Call>>,
    next_addr: AtomicUsize,
    live: Mutex<HashMap<usize, u32>>,
    failures: Mutex<HashMap<&'static str, i32>>,
    last_error: Mutex<Option<(i32, String)>>,
    client_version: Version,
    server_version: Version,
    pid: AtomicU32,
    gate: Mutex<CallGate>,
    gate_cv: Condvar,
}

fn htype_name(htype: u32) -> &'static str {
    match htype {
        oci::OCI_HTYPE_ENV     => "ENV",
        oci::OCI_HTYPE_ERROR   => "ERROR",
        oci::OCI_HTYPE_SVCCTX  => "SVCCTX",
        oci::OCI_HTYPE_STMT    => "STMT",
        oci::OCI_HTYPE_BIND    => "BIND",
        oci::OCI_HTYPE_SERVER  => "SERVER",
        oci::OCI_HTYPE_SESSION => "SESSION",
        _ => "UNKNOWN",
    }
}

fn attr_name(attr: u32) -> &'static str {
    match attr {
        oci::OCI_ATTR_SERVER            => "SERVER",
        oci::OCI_ATTR_SESSION           => "SESSION",
        oci::OCI_ATTR_USERNAME          => "USERNAME",
        oci::OCI_ATTR_PASSWORD          => "PASSWORD",
        oci::OCI_ATTR_PREFETCH_ROWS     => "PREFETCH_ROWS",
        oci::OCI_ATTR_CLIENT_IDENTIFIER => "CLIENT_IDENTIFIER",
        oci::OCI_ATTR_MODULE            => "MODULE",
        oci::OCI_ATTR_ACTION            => "ACTION",
        oci::OCI_ATTR_CLIENT_INFO       => "CLIENT_INFO",
        _ => "UNKNOWN",
    }
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

impl MockOci {
    pub fn new() -> Arc<Self> {
        Self::with_client_version(Version::new(19, 3, 0, 0, 0))
    }

    pub fn with_client_version(client_version: Version) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            next_addr: AtomicUsize::new(0x1000),
            live: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            last_error: Mutex::new(None),
            client_version,
            server_version: Version::new(19, 3, 0, 0, 0),
            pid: AtomicU32::new(MOCK_PID),
            gate: Mutex::new(CallGate::default()),
            gate_cv: Condvar::new(),
        })
    }

    /// Makes every later call to `name` fail with ORA-`code`.
    pub fn fail_on(&self, name: &'static str, code: i32) {
        self.failures.lock().insert(name, code);
    }

    pub fn succeed_on(&self, name: &'static str) {
        self.failures.lock().remove(name);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.calls.lock().iter().map(|call| call.name).collect()
    }

    /// Arguments of the calls to `name`, in call order.
    pub fn args(&self, name: &str) -> Vec<String> {
        self.calls.lock().iter().filter(|call| call.name == name).map(|call| call.arg.clone()).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().iter().filter(|call| call.name == name).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Number of allocated and not yet freed handles of the type.
    pub fn live(&self, htype: u32) -> usize {
        self.live.lock().values().filter(|&&live_type| live_type == htype).count()
    }

    /// Pretends that the process has forked.
    pub fn fork(&self) {
        self.pid.fetch_add(1, Ordering::SeqCst);
    }

    /// Makes the next `ping` block until `break_call` or `release_blocked`.
    pub fn block_next_ping(&self) {
        self.block_next("ping");
    }

    /// Makes the next call to `name` block until `release_blocked`.
    pub fn block_next(&self, name: &'static str) {
        self.gate.lock().blocking = Some(name);
    }

    pub fn wait_until_blocked(&self) {
        let mut gate = self.gate.lock();
        while !gate.waiting {
            self.gate_cv.wait(&mut gate);
        }
    }

    pub fn release_blocked(&self) {
        self.gate.lock().released = true;
        self.gate_cv.notify_all();
    }

    fn record(&self, name: &'static str, arg: impl Into<String>) -> i32 {
        self.calls.lock().push(Call {
            name,
            arg: arg.into(),
            thread: thread::current().name().map(str::to_string),
        });
        let failure = self.failures.lock().get(name).copied();
        match failure {
            Some(code) => {
                *self.last_error.lock() = Some((code, format!("{} failed", name)));
                oci::OCI_ERROR
            }
            None => oci::OCI_SUCCESS,
        }
    }

    /// Blocks `name` if it is the gated call. Returns whether it was blocked.
    fn pass_gate(&self, name: &'static str) -> bool {
        let mut gate = self.gate.lock();
        if gate.blocking != Some(name) {
            return false;
        }
        gate.waiting = true;
        self.gate_cv.notify_all();
        while !gate.released {
            self.gate_cv.wait(&mut gate);
        }
        *gate = CallGate::default();
        true
    }

    fn new_addr(&self) -> *mut c_void {
        self.next_addr.fetch_add(0x10, Ordering::SeqCst) as *mut c_void
    }

    fn alloc(&self, htype: u32) -> *mut c_void {
        let addr = self.new_addr();
        self.live.lock().insert(addr as usize, htype);
        addr
    }
}

pub fn env(mock: &Arc<MockOci>) -> Environment {
    init_tracing();
    let oci : Arc<dyn Oci> = mock.clone();
    match Environment::with_oci(oci) {
        Ok(env) => env,
        Err(err) => panic!("cannot create environment: {}", err),
    }
}

impl Oci for MockOci {
    fn env_create(&self, env: &mut Ptr<OCIEnv>, _mode: u32) -> i32 {
        let res = self.record("env_create", "");
        if res == oci::OCI_SUCCESS {
            *env = Ptr::from_void(self.alloc(oci::OCI_HTYPE_ENV));
        }
        res
    }

    fn client_version(&self) -> Version {
        self.client_version
    }

    fn error_get(&self, _hndl: *mut c_void, _htype: u32) -> Option<(i32, String)> {
        self.last_error.lock().take()
    }

    fn message_get(&self, _env: Ptr<OCIEnv>, _err: Ptr<OCIError>, msgno: u32) -> Option<String> {
        let res = self.record("message_get", msgno.to_string());
        if res != oci::OCI_SUCCESS {
            return None;
        }
        match msgno {
            1    => Some("unique constraint (%s.%s) violated".to_string()),
            1017 => Some("invalid username/password; logon denied".to_string()),
            _    => None,
        }
    }

    fn handle_alloc(&self, _env: Ptr<OCIEnv>, hndl: &mut *mut c_void, htype: u32) -> i32 {
        let res = self.record("handle_alloc", htype_name(htype));
        if res == oci::OCI_SUCCESS {
            *hndl = self.alloc(htype);
        }
        res
    }

    fn handle_free(&self, hndl: *mut c_void, htype: u32) -> i32 {
        let res = self.record("handle_free", htype_name(htype));
        if res == oci::OCI_SUCCESS {
            self.live.lock().remove(&(hndl as usize));
        }
        res
    }

    fn attr_get_handle(&self, _hndl: *mut c_void, _htype: u32, value: &mut *mut c_void, attr: u32, _err: Ptr<OCIError>) -> i32 {
        let res = self.record("attr_get", attr_name(attr));
        if res == oci::OCI_SUCCESS {
            *value = self.new_addr();
        }
        res
    }

    fn attr_set(&self, _hndl: *mut c_void, _htype: u32, value: AttrValue<'_>, attr: u32, _err: Ptr<OCIError>) -> i32 {
        let value = match value {
            AttrValue::Handle(hndl) => format!("{:p}", hndl),
            AttrValue::Text(bytes) => text(bytes),
            AttrValue::U32(num) => num.to_string(),
        };
        self.record("attr_set", format!("{}={}", attr_name(attr), value))
    }

    fn logon(&self, _env: Ptr<OCIEnv>, _err: Ptr<OCIError>, svc: &mut Ptr<OCISvcCtx>, username: &[u8], password: &[u8], dbname: &[u8]) -> i32 {
        let res = self.record("logon", format!("{}/{}@{}", text(username), text(password), text(dbname)));
        self.pass_gate("logon");
        if res == oci::OCI_SUCCESS {
            *svc = Ptr::from_void(self.new_addr());
        }
        res
    }

    fn logoff(&self, _svc: Ptr<OCISvcCtx>, _err: Ptr<OCIError>) -> i32 {
        self.record("logoff", "")
    }

    fn server_attach(&self, _srv: Ptr<OCIServer>, _err: Ptr<OCIError>, dbname: &[u8], mode: u32) -> i32 {
        self.record("server_attach", format!("{} mode={}", text(dbname), mode))
    }

    fn server_detach(&self, _srv: Ptr<OCIServer>, _err: Ptr<OCIError>, _mode: u32) -> i32 {
        self.record("server_detach", "")
    }

    fn session_begin(&self, _svc: Ptr<OCISvcCtx>, _err: Ptr<OCIError>, _usr: Ptr<OCISession>, cred: u32, mode: u32) -> i32 {
        self.record("session_begin", format!("cred={} mode={}", cred, mode))
    }

    fn session_end(&self, _svc: Ptr<OCISvcCtx>, _err: Ptr<OCIError>, _usr: Ptr<OCISession>, _mode: u32) -> i32 {
        self.record("session_end", "")
    }

    fn trans_commit(&self, _svc: Ptr<OCISvcCtx>, _err: Ptr<OCIError>, _flags: u32) -> i32 {
        self.record("trans_commit", "")
    }

    fn trans_rollback(&self, _svc: Ptr<OCISvcCtx>, _err: Ptr<OCIError>, _flags: u32) -> i32 {
        self.record("trans_rollback", "")
    }

    fn ping(&self, _svc: Ptr<OCISvcCtx>, _err: Ptr<OCIError>, _mode: u32) -> i32 {
        let res = self.record("ping", "");
        if !self.pass_gate("ping") {
            return res;
        }
        *self.last_error.lock() = Some((1013, "user requested cancel of current operation".to_string()));
        oci::OCI_ERROR
    }

    fn break_call(&self, _hndl: *mut c_void, _err: Ptr<OCIError>) -> i32 {
        let res = self.record("break", "");
        self.release_blocked();
        res
    }

    fn server_release(&self, _hndl: *mut c_void, _err: Ptr<OCIError>, _htype: u8, version: &mut u32) -> i32 {
        let res = self.record("server_release", "");
        if res == oci::OCI_SUCCESS {
            *version = self.server_version.packed();
        }
        res
    }

    fn stmt_prepare(&self, _stmt: Ptr<OCIStmt>, _err: Ptr<OCIError>, sql: &[u8], _language: u32, _mode: u32) -> i32 {
        self.record("stmt_prepare", text(sql))
    }

    fn bind_by_pos(&self, _stmt: Ptr<OCIStmt>, bind: &mut Ptr<OCIBind>, _err: Ptr<OCIError>, position: u32, value: &[u8], _dty: u16) -> i32 {
        let res = self.record("bind", format!("{}={}", position, text(value)));
        if res == oci::OCI_SUCCESS {
            *bind = Ptr::from_void(self.new_addr());
        }
        res
    }

    fn stmt_execute(&self, _svc: Ptr<OCISvcCtx>, _stmt: Ptr<OCIStmt>, _err: Ptr<OCIError>, _iters: u32, mode: u32) -> i32 {
        self.record("stmt_execute", format!("mode={}", mode))
    }

    fn getpid(&self) -> u32 {
        self.pid.load(Ordering::SeqCst)
    }
}
