//! Per-connection settings

use crate::Dispatch;

/// Default limit on the size of LONG and LONG RAW values read from the database.
pub const DEFAULT_LONG_READ_LEN : u32 = 65535;

/**
    Settings applied to a connection before it is established.

    # Example

    ```
    use ocilink::SessionConfig;

    let config = SessionConfig::default().autocommit(true).prefetch_rows(100);
    assert!(config.is_autocommit());
    assert_eq!(config.get_prefetch_rows(), Some(100));
    assert_eq!(config.get_long_read_len(), 65535);
    ```
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub(crate) autocommit: bool,
    pub(crate) non_blocking: bool,
    pub(crate) long_read_len: u32,
    pub(crate) prefetch_rows: Option<u32>,
    pub(crate) dispatch: Dispatch,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            autocommit: false,
            non_blocking: true,
            long_read_len: DEFAULT_LONG_READ_LEN,
            prefetch_rows: None,
            dispatch: Dispatch::Inline,
        }
    }
}

impl SessionConfig {
    /// Commit every statement executed on the connection when it succeeds.
    pub fn autocommit(mut self, autocommit: bool) -> Self {
        self.autocommit = autocommit;
        self
    }

    /// Track in-flight calls so that they can be interrupted by `break_execution`.
    pub fn non_blocking(mut self, non_blocking: bool) -> Self {
        self.non_blocking = non_blocking;
        self
    }

    pub fn long_read_len(mut self, len: u32) -> Self {
        self.long_read_len = len;
        self
    }

    /// Number of rows statements parsed on the connection prefetch.
    pub fn prefetch_rows(mut self, rows: u32) -> Self {
        self.prefetch_rows = Some(rows);
        self
    }

    /// Where round-trip calls run.
    pub fn dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn is_autocommit(&self) -> bool {
        self.autocommit
    }

    pub fn is_non_blocking(&self) -> bool {
        self.non_blocking
    }

    pub fn get_long_read_len(&self) -> u32 {
        self.long_read_len
    }

    pub fn get_prefetch_rows(&self) -> Option<u32> {
        self.prefetch_rows
    }

    pub fn get_dispatch(&self) -> Dispatch {
        self.dispatch
    }
}
