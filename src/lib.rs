#![cfg_attr(not(doctest), doc=include_str!("../README.md"))]

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod oci;

mod err;
mod version;
mod env;
mod config;
mod handle;
mod conn;
mod stmt;
mod task;

pub use err::Error;
pub use version::Version;
pub use env::Environment;
pub use config::{SessionConfig, DEFAULT_LONG_READ_LEN};
pub use handle::{HandleKind, HandleRef};
pub use conn::{
    AttachMode, ConnectString, Connection, ConnectionState, Credential, LogoffStrategy, LogonSteps, Privilege, SessionMode,
};
pub use stmt::Statement;
pub use task::{Dispatch, run_blocking, pending_teardowns, wait_for_teardowns};

pub type Result<T> = std::result::Result<T, Error>;

/**
    Returns a new environment handle, which is then used by the OCI functions.

    While there can be multiple environments, most applications most likely will
    need only one. As nothing can outlive its environment it is usually created
    in `main` or kept in a static.

    ```no_run
    # #[cfg(feature="native")]
    # fn main() -> ocilink::Result<()> {
    let oracle = ocilink::env()?;
    let conn = oracle.connect("scott/tiger@//localhost/orclpdb")?;
    conn.set_module(Some("billing"))?;
    conn.commit()?;
    conn.logoff()?;
    # Ok(())
    # }
    # #[cfg(not(feature="native"))]
    # fn main() {}
    ```
*/
#[cfg(feature="native")]
#[cfg_attr(docsrs, doc(cfg(feature="native")))]
pub fn env() -> Result<Environment> {
    Environment::new()
}
