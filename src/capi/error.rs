// SPDX-License-Identifier: MPL-2.0 OR LGPL-3.0-or-later
/*
 * cfsafepath: safe path resolution and mutation for config-management agents
 */

//! Thread-local last-error storage for the `capi` surface. The safe Rust
//! API never needs this (every fallible call returns a proper `Result`);
//! it exists purely because C callers across an FFI boundary have nowhere
//! else to get the error that produced a `-1`/`-2` sentinel.

use crate::error::Error;

use std::cell::RefCell;
use std::cmp;
use std::ffi::CString;
use std::os::raw::{c_char, c_int};
use std::ptr;

thread_local! {
    static LAST_ERROR: RefCell<Option<Error>> = const { RefCell::new(None) };
}

pub(crate) fn set_last_error(err: Error) {
    LAST_ERROR.with(|cell| *cell.borrow_mut() = Some(err));
}

pub(crate) fn clear_last_error() {
    LAST_ERROR.with(|cell| *cell.borrow_mut() = None);
}

/// Returns the `errno`-equivalent of the last error recorded on this
/// thread, or `0` if the last call did not fail.
pub(crate) fn last_errno() -> i32 {
    LAST_ERROR.with(|cell| cell.borrow().as_ref().and_then(Error::errno).unwrap_or(0))
}

/// `cfsafepath_last_errno() -> int`: the `errno`-equivalent of the most
/// recent failure on this thread, or `0` if the last call succeeded.
#[no_mangle]
pub extern "C" fn cfsafepath_last_errno() -> c_int {
    last_errno()
}

/// `cfsafepath_last_strerror(buf, bufsize) -> int`: copies a
/// human-readable description of the last error on this thread into `buf`
/// (truncating to `bufsize`, always nul-terminating unless `bufsize == 0`)
/// and returns the number of bytes the full message would need. Returns
/// `0` and writes nothing if no error is recorded.
///
/// # Safety
/// `buf` must be null or point to at least `bufsize` writable bytes.
#[no_mangle]
pub unsafe extern "C" fn cfsafepath_last_strerror(buf: *mut c_char, bufsize: usize) -> c_int {
    let message = LAST_ERROR.with(|cell| cell.borrow().as_ref().map(ToString::to_string));
    let Some(message) = message else {
        return 0;
    };
    let cstring = CString::new(message).unwrap_or_else(|_| CString::new("cfsafepath error").unwrap());
    let bytes = cstring.as_bytes_with_nul();

    if !buf.is_null() && bufsize > 0 {
        let to_copy = cmp::min(bytes.len(), bufsize);
        // SAFETY: caller guarantees `buf` has room for `bufsize` bytes, and
        // `to_copy <= bufsize`.
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr() as *const c_char, buf, to_copy) };
    }
    (bytes.len() - 1) as c_int
}
