//! Send-able pointers to OCI handles

use std::{fmt, ptr};
use libc::c_void;

use super::OCIStruct;

/// Send-able cell-like wrapper around a pointer to OCI handle.
pub struct Ptr<T: OCIStruct> {
    value: *mut T
}

impl<T: OCIStruct> Ptr<T> {
    pub fn new(ptr: *mut T) -> Self {
        Self{ value: ptr }
    }

    pub fn null() -> Self {
        Self{ value: ptr::null_mut() }
    }

    pub fn from_void(ptr: *mut c_void) -> Self {
        Self{ value: ptr as *mut T }
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    pub fn get(&self) -> *mut T {
        self.value
    }

    pub fn as_void(&self) -> *mut c_void {
        self.value as *mut c_void
    }

    /// Returns the pointer and leaves NULL in its place.
    pub(crate) fn take(&mut self) -> Self {
        let mut taken = Self::null();
        std::mem::swap(self, &mut taken);
        taken
    }
}

impl<T: OCIStruct> Clone for Ptr<T> {
    fn clone(&self) -> Self {
        Self { value: self.value }
    }
}

impl<T: OCIStruct> Copy for Ptr<T> {}

impl<T: OCIStruct> PartialEq for Ptr<T> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.value, other.value)
    }
}

impl<T: OCIStruct> Eq for Ptr<T> {}

impl<T: OCIStruct> fmt::Debug for Ptr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ptr({:p})", self.value)
    }
}

unsafe impl<T: OCIStruct> Send for Ptr<T> {}
unsafe impl<T: OCIStruct> Sync for Ptr<T> {}
