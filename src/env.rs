//! OCI environment

use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    Connection, ConnectString, Credential, Error, Privilege, Result, SessionConfig, SessionMode, AttachMode, Version,
    handle::{self, HandleKind},
    oci::{self, Oci, Ptr, OCIEnv, OCIError},
};

/// `OCIEnv` handle and the OCI implementation it was created by.
pub(crate) struct EnvHandle {
    oci: Arc<dyn Oci>,
    env: Ptr<OCIEnv>,
}

impl EnvHandle {
    pub(crate) fn oci(&self) -> &dyn Oci {
        self.oci.as_ref()
    }

    pub(crate) fn get_ptr(&self) -> Ptr<OCIEnv> {
        self.env
    }
}

impl Drop for EnvHandle {
    fn drop(&mut self) {
        if !self.env.is_null() {
            self.oci.handle_free(self.env.as_void(), oci::OCI_HTYPE_ENV);
        }
    }
}

/// Represents an OCI environment.
pub struct Environment {
    // `OCIEnv` handle must be behind Arc as it needs to survive the Environment drop,
    // so that `OCIEnv` is still available to deferred teardowns of dropped connections.
    env: Arc<EnvHandle>,
    err: Ptr<OCIError>,
    client_version: Version,
}

impl Drop for Environment {
    fn drop(&mut self) {
        let _ = handle::free_handle(self.oci(), self.err, HandleKind::Error);
    }
}

impl Environment {
    /**
    Returns a new environment handle, which is then used by the OCI functions.

    # Example

    ```no_run
    # #[cfg(feature="native")]
    # fn main() -> ocilink::Result<()> {
    use ocilink::Environment;

    let oracle = Environment::new()?;
    println!("OCI client {}", oracle.client_version());
    # Ok(())
    # }
    # #[cfg(not(feature="native"))]
    # fn main() {}
    ```
    */
    #[cfg(feature="native")]
    #[cfg_attr(docsrs, doc(cfg(feature="native")))]
    pub fn new() -> Result<Self> {
        Self::with_oci(Arc::new(oci::native::NativeOci))
    }

    /// Creates a new environment that makes its native calls through `oci`.
    pub fn with_oci(oci: Arc<dyn Oci>) -> Result<Self> {
        let mut env = Ptr::<OCIEnv>::null();
        let res = oci.env_create(&mut env, oci::OCI_OBJECT | oci::OCI_THREADED);
        if res != oci::OCI_SUCCESS || env.is_null() {
            return Err( Error::new("Cannot create OCI environment") );
        }
        let client_version = oci.client_version();
        let env = Arc::new(EnvHandle { oci, env });
        let err = handle::alloc_handle(env.oci(), env.get_ptr(), HandleKind::Error)?;
        debug!(%client_version, "environment created");
        Ok(Self { env, err: Ptr::from_void(err.as_void()), client_version })
    }

    pub(crate) fn get_env(&self) -> Arc<EnvHandle> {
        self.env.clone()
    }

    pub(crate) fn env_ptr(&self) -> Ptr<OCIEnv> {
        self.env.get_ptr()
    }

    pub(crate) fn oci(&self) -> &dyn Oci {
        self.env.oci()
    }

    pub(crate) fn oci_arc(&self) -> Arc<dyn Oci> {
        self.env.oci.clone()
    }

    /// Error handle used by calls that may run alongside a connection's own calls.
    pub(crate) fn err_ptr(&self) -> Ptr<OCIError> {
        self.err
    }

    /// Version of the OCI client library, captured when the environment was created.
    pub fn client_version(&self) -> Version {
        self.client_version
    }

    /**
    Returns the text of an Oracle error message in the language of the client,
    formatted as `ORA-{code:05}: {message}`.

    Placeholders such as `%s` are returned as they are in the message file.

    # Example

    ```no_run
    # #[cfg(feature="native")]
    # fn main() -> ocilink::Result<()> {
    let oracle = ocilink::Environment::new()?;
    assert_eq!(oracle.error_message(1), "ORA-00001: unique constraint (%s.%s) violated");
    # Ok(())
    # }
    # #[cfg(not(feature="native"))]
    # fn main() {}
    ```
    */
    pub fn error_message(&self, code: u32) -> String {
        match self.oci().message_get(self.env_ptr(), self.err, code) {
            Some(message) => format!("ORA-{:05}: {}", code, message),
            None => format!("ORA-{:05}: Message {} not found; product=RDBMS; facility=ORA", code, code),
        }
    }

    /// Returns a new connection that is not connected to any database yet.
    pub fn new_connection(&self) -> Result<Connection<'_>> {
        Connection::new(self)
    }

    /**
    Connects to the database as specified by the connect string
    `username/password[@dbname][ as sysdba|sysoper]`.

    Connect strings without a privilege are logged on with `OCILogon`. Privileged
    and externally authenticated connections attach to the server and begin the
    session explicitly.

    # Example

    ```no_run
    # #[cfg(feature="native")]
    # fn main() -> ocilink::Result<()> {
    let oracle = ocilink::Environment::new()?;
    let conn = oracle.connect("scott/tiger@//localhost/orclpdb")?;
    assert!(conn.ping()?);
    # Ok(())
    # }
    # #[cfg(not(feature="native"))]
    # fn main() {}
    ```
    */
    pub fn connect(&self, conn_str: &str) -> Result<Connection<'_>> {
        self.connect_with(conn_str, &SessionConfig::default())
    }

    /// Connects as [`Environment::connect`] does and applies `config` to the new connection first.
    pub fn connect_with(&self, conn_str: &str, config: &SessionConfig) -> Result<Connection<'_>> {
        let params = ConnectString::parse(conn_str)?;
        let conn = self.new_connection()?;
        conn.apply(config);
        let dbname = params.dbname.as_deref();
        match (&params.privilege, &params.username) {
            (None, Some(username)) => {
                let password = params.password.as_deref().unwrap_or_default();
                conn.establish_simple(username, password, dbname)?;
            }
            (privilege, username) => {
                let mode = match privilege {
                    None => SessionMode::empty(),
                    Some(Privilege::SysDba) => SessionMode::SYSDBA,
                    Some(Privilege::SysOper) => SessionMode::SYSOPER,
                    Some(Privilege::Other(name)) => {
                        return Err(Error::Connect(format!("invalid privilege name {}", name)));
                    }
                };
                let credential = match username {
                    Some(username) => Credential::Rdbms {
                        username,
                        password: params.password.as_deref().unwrap_or_default(),
                    },
                    None => Credential::External,
                };
                let res = conn.allocate_handles()
                    .and_then(|_| conn.attach_server(dbname, AttachMode::empty()))
                    .and_then(|_| conn.begin_session(credential, mode));
                if let Err(err) = res {
                    if let Err(teardown_err) = conn.logoff() {
                        warn!(%teardown_err, "partially established session was not torn down cleanly");
                    }
                    return Err(err);
                }
            }
        }
        Ok(conn)
    }
}
