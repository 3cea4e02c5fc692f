//! Connect string parsing

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{Error, Result};

static CONNECT_STRING : Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^([^(\s|@)]*)/([^(\s|@)]*)(?:@(\S+))?(?:\s+as\s+(\S*)\s*)?$")
        .unwrap_or_else(|_| unreachable!("connect string pattern is valid"))
});

/// Administrative privilege requested with `as sysdba` or `as sysoper`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Privilege {
    SysDba,
    SysOper,
    /// Any other privilege name, as written
    Other(String),
}

/**
    Parts of a connect string `username/password[@dbname][ as privilege]`.

    # Example

    ```
    use ocilink::{ConnectString, Privilege};

    let params = ConnectString::parse("sys/change_on_install@//db.example.com/orcl as SYSDBA")?;
    assert_eq!(params.username.as_deref(), Some("sys"));
    assert_eq!(params.dbname.as_deref(), Some("//db.example.com/orcl"));
    assert_eq!(params.privilege, Some(Privilege::SysDba));
    # Ok::<(),ocilink::Error>(())
    ```
*/
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectString {
    /// `None` together with `password` for external credentials
    pub username: Option<String>,
    pub password: Option<String>,
    pub dbname: Option<String>,
    pub privilege: Option<Privilege>,
}

impl ConnectString {
    /// Splits a connect string. An empty username and password select external credentials.
    pub fn parse(conn_str: &str) -> Result<Self> {
        let caps = CONNECT_STRING.captures(conn_str).ok_or_else(|| Error::Connect(format!(
            r#"invalid connect string "{}" (expect "username/password[@(tns_name|//host[:port]/service_name)][ as (sysdba|sysoper)]")"#,
            conn_str
        )))?;
        let group = |n: usize| caps.get(n).map(|m| m.as_str());
        let mut username = group(1).map(str::to_string);
        let mut password = group(2).map(str::to_string);
        if username.as_deref() == Some("") && password.as_deref() == Some("") {
            username = None;
            password = None;
        }
        let dbname = group(3).map(str::to_string);
        let privilege = group(4).map(|name| {
            if name.eq_ignore_ascii_case("sysdba") {
                Privilege::SysDba
            } else if name.eq_ignore_ascii_case("sysoper") {
                Privilege::SysOper
            } else {
                Privilege::Other(name.to_string())
            }
        });
        Ok(Self { username, password, dbname, privilege })
    }
}
