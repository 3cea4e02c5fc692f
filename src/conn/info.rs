//! Session attributes reported to the server

use super::Connection;
use crate::{
    Error, Result, Version,
    err::check,
    oci::{self, AttrValue},
    stmt,
};

const SET_CLIENT_IDENTIFIER : &str = "BEGIN\n  DBMS_SESSION.SET_IDENTIFIER(:client_id);\nEND;\n";
const SET_MODULE : &str = "DECLARE\n  action VARCHAR2(32);\nBEGIN\n  SELECT SYS_CONTEXT('USERENV','ACTION') INTO action FROM DUAL;\n  DBMS_APPLICATION_INFO.SET_MODULE(:module, action);\nEND;\n";
const SET_ACTION : &str = "BEGIN\n  DBMS_APPLICATION_INFO.SET_ACTION(:action);\nEND;\n";
const SET_CLIENT_INFO : &str = "BEGIN\n  DBMS_APPLICATION_INFO.SET_CLIENT_INFO(:client_info);\nEND;\n";

const CLIENT_IDENTIFIER_SINCE : Version = Version::new(9, 2, 0, 3, 0);
const APPLICATION_INFO_SINCE  : Version = Version::new(10, 1, 0, 0, 0);

impl Connection<'_> {
    /**
        Sets a session attribute.

        Clients that support `attr` set it on the session handle; the server sees it
        with the next round trip. Older clients execute `fallback` with `value` bound
        to its only placeholder.
    */
    fn set_session_info(&self, value: &str, attr: u32, since: Version, fallback: &str) -> Result<()> {
        self.check_pid()?;
        if self.env().client_version() >= since {
            let call = self.active_call()?;
            let oci = self.oci();
            check(oci, call.err, oci.attr_set(call.usr.as_void(), oci::OCI_HTYPE_SESSION, AttrValue::Text(value.as_bytes()), attr, call.err))
        } else {
            stmt::exec_sql(self, fallback, &[value])
        }
    }

    /**
        Sets the client identifier of the session, which is reported in
        `V$SESSION.CLIENT_IDENTIFIER`. `None` clears it.

        Identifiers must not start with `:`.
    */
    pub fn set_client_identifier(&self, id: Option<&str>) -> Result<()> {
        let id = id.unwrap_or_default();
        if id.starts_with(':') {
            return Err(Error::connect("client identifier should not start with ':'."));
        }
        self.set_session_info(id, oci::OCI_ATTR_CLIENT_IDENTIFIER, CLIENT_IDENTIFIER_SINCE, SET_CLIENT_IDENTIFIER)
    }

    /// Sets the name of the module, reported in `V$SESSION.MODULE`.
    pub fn set_module(&self, module: Option<&str>) -> Result<()> {
        self.set_session_info(module.unwrap_or_default(), oci::OCI_ATTR_MODULE, APPLICATION_INFO_SINCE, SET_MODULE)
    }

    /// Sets the name of the current action within the module, reported in `V$SESSION.ACTION`.
    pub fn set_action(&self, action: Option<&str>) -> Result<()> {
        self.set_session_info(action.unwrap_or_default(), oci::OCI_ATTR_ACTION, APPLICATION_INFO_SINCE, SET_ACTION)
    }

    pub fn set_client_info(&self, info: Option<&str>) -> Result<()> {
        self.set_session_info(info.unwrap_or_default(), oci::OCI_ATTR_CLIENT_INFO, APPLICATION_INFO_SINCE, SET_CLIENT_INFO)
    }
}
