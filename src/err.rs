use std::{cmp, io};
use libc::c_void;
use thiserror::Error;

use crate::oci::{self, Oci, Ptr, OCIEnv, OCIError};

/// Represents possible errors returned from ocilink
#[derive(Debug, Error)]
pub enum Error {
    /// The connection could not be (re)established: a malformed connect string,
    /// reuse of a session that is connected or closing, or invalid logon input.
    #[error("{0}")]
    Connect(String),

    /// A native OCI call failed
    #[error("ORA-{code:05}: {message}")]
    Oracle { code: i32, message: String },

    /// A worker thread for a native call could not be started
    #[error("cannot start a native worker thread: {0}")]
    Dispatch(#[source] io::Error),

    /// The operation is not valid in the current lifecycle state of the connection
    #[error("{0}")]
    State(String),

    #[error("{0}")]
    Interface(String),
}

impl cmp::PartialEq for Error {
    fn eq(&self, other: &Error) -> bool {
        match (self, other) {
            (Error::Oracle { code: this_code, .. }, Error::Oracle { code: other_code, .. }) => this_code == other_code,
            (Error::Connect(this_msg),   Error::Connect(other_msg))   => this_msg == other_msg,
            (Error::State(this_msg),     Error::State(other_msg))     => this_msg == other_msg,
            (Error::Interface(this_msg), Error::Interface(other_msg)) => this_msg == other_msg,
            (Error::Dispatch(this_err),  Error::Dispatch(other_err))  => this_err.kind() == other_err.kind(),
            _ => false,
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        io::Error::new(io::ErrorKind::Other, err)
    }
}

fn get_oracle_error(oci: &dyn Oci, rc: i32, hndl: *mut c_void, htype: u32) -> Error {
    match oci.error_get(hndl, htype) {
        Some((code, message)) => Error::Oracle { code, message },
        None => {
            let message = match rc {
                oci::OCI_NO_DATA   => String::from("No Data"),
                oci::OCI_NEED_DATA => String::from("Need Data"),
                _ => format!("Error {}", rc),
            };
            Error::Oracle { code: rc, message }
        }
    }
}

impl Error {
    pub(crate) fn new(msg: &str) -> Self {
        Error::Interface(msg.to_owned())
    }

    pub(crate) fn state(msg: &str) -> Self {
        Error::State(msg.to_owned())
    }

    pub(crate) fn connect(msg: &str) -> Self {
        Error::Connect(msg.to_owned())
    }

    pub(crate) fn env(oci: &dyn Oci, env: Ptr<OCIEnv>, rc: i32) -> Self {
        get_oracle_error(oci, rc, env.as_void(), oci::OCI_HTYPE_ENV)
    }

    pub(crate) fn oci(oci: &dyn Oci, err: Ptr<OCIError>, rc: i32) -> Self {
        get_oracle_error(oci, rc, err.as_void(), oci::OCI_HTYPE_ERROR)
    }

    /// Native error code, if this is an Oracle error.
    pub fn code(&self) -> Option<i32> {
        match self {
            Error::Oracle { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Converts an OCI status into a `Result`. `OCI_SUCCESS_WITH_INFO` is a success.
pub(crate) fn check(oci: &dyn Oci, err: Ptr<OCIError>, rc: i32) -> crate::Result<()> {
    match rc {
        oci::OCI_SUCCESS | oci::OCI_SUCCESS_WITH_INFO => Ok(()),
        _ => Err(Error::oci(oci, err, rc)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oracle_errors_display_padded_code() {
        let err = Error::Oracle { code: 1017, message: "invalid username/password; logon denied".to_string() };
        assert_eq!(err.to_string(), "ORA-01017: invalid username/password; logon denied");
    }

    #[test]
    fn oracle_errors_compare_by_code() {
        let a = Error::Oracle { code: 3113, message: "end-of-file on communication channel".to_string() };
        let b = Error::Oracle { code: 3113, message: String::new() };
        assert_eq!(a, b);
        assert_ne!(a, Error::State("end-of-file on communication channel".to_string()));
    }

    #[test]
    fn dispatch_errors_keep_the_platform_error() {
        let err = Error::Dispatch(io::Error::new(io::ErrorKind::OutOfMemory, "EAGAIN"));
        let source = std::error::Error::source(&err).map(|src| src.to_string());
        assert_eq!(source.as_deref(), Some("EAGAIN"));
        let io_err : io::Error = err.into();
        assert_eq!(io_err.kind(), io::ErrorKind::Other);
    }
}
