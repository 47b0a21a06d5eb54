// SPDX-License-Identifier: MPL-2.0 OR LGPL-3.0-or-later
/*
 * cfsafepath: safe path resolution and mutation for config-management agents
 */

//! Small helpers shared by the `extern "C"` wrappers: turning a C string
//! into a [`Path`] and a raw mode string pointer into a `&str`.

use crate::error::{Error, ErrorImpl};

use std::ffi::{CStr, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use libc::c_char;

/// # Safety
/// `path` must either be null or point to a valid, nul-terminated C string
/// that lives at least as long as the borrow returned.
pub(super) unsafe fn parse_path<'a>(path: *const c_char) -> Result<&'a Path, Error> {
    if path.is_null() {
        return Err(ErrorImpl::InvalidArgument {
            name: "path".into(),
            description: "cannot be NULL".into(),
        }
        .into());
    }
    // SAFETY: caller guarantees `path` is a valid C string.
    let bytes = unsafe { CStr::from_ptr(path) }.to_bytes();
    Ok(Path::new(OsStr::from_bytes(bytes)))
}

/// # Safety
/// Same contract as [`parse_path`], plus the bytes must be valid UTF-8 (the
/// `fopen(3)` mode strings this crate recognises always are).
pub(super) unsafe fn parse_mode_string<'a>(mode: *const c_char) -> Result<&'a str, Error> {
    if mode.is_null() {
        return Err(ErrorImpl::InvalidArgument {
            name: "mode".into(),
            description: "cannot be NULL".into(),
        }
        .into());
    }
    // SAFETY: caller guarantees `mode` is a valid C string.
    unsafe { CStr::from_ptr(mode) }.to_str().map_err(|_| {
        ErrorImpl::InvalidArgument {
            name: "mode".into(),
            description: "mode string is not valid UTF-8".into(),
        }
        .into()
    })
}
