// SPDX-License-Identifier: MPL-2.0 OR LGPL-3.0-or-later
/*
 * cfsafepath: safe path resolution and mutation for config-management agents
 */

// This module exists purely to expose C-callable wrappers over the safe
// Rust API, for the C agent code this core replaces. Unsafe is inherent to
// that boundary.
#![allow(unsafe_code)]

//! The `capi` feature (§9 "C interop surface"): `extern "C"` wrappers
//! returning the legacy `0 | -1 | -2` sentinels described in §6, backed by
//! the thread-local last-error slot in [`error`].

pub mod error;
mod lock;
mod ret;
mod utils;

use crate::flags::OpenFlags;
use crate::{ops, perms};

use self::error::clear_last_error;
use self::ret::IntoCReturn;
use self::utils::{parse_mode_string, parse_path};

use std::fs::File;
use std::os::raw::{c_char, c_int, c_uint};
use std::os::unix::io::{IntoRawFd, RawFd};

/// `safe_open(path, flags) -> fd | -1` (§6).
///
/// # Safety
/// `path` must be null or a valid nul-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn cfsafepath_safe_open(path: *const c_char, flags: c_int) -> RawFd {
    clear_last_error();
    with_path(path, |path| {
        ops::safe_open(path, OpenFlags::from_bits_truncate(flags))
    })
    .into_c_return()
}

/// `safe_open_create_perms(path, flags, perms) -> fd | -1` (§6).
///
/// # Safety
/// `path` must be null or a valid nul-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn cfsafepath_safe_open_create_perms(
    path: *const c_char,
    flags: c_int,
    perms: c_uint,
) -> RawFd {
    clear_last_error();
    with_path(path, |path| {
        ops::safe_open_create_perms(path, OpenFlags::from_bits_truncate(flags), perms)
    })
    .into_c_return()
}

/// `safe_creat(path, perms) -> fd | -1` (§6).
///
/// # Safety
/// `path` must be null or a valid nul-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn cfsafepath_safe_creat(path: *const c_char, perms: c_uint) -> RawFd {
    clear_last_error();
    with_path(path, |path| ops::safe_creat(path, perms)).into_c_return()
}

/// `safe_chmod(path, mode) -> 0 | -1` (§6).
///
/// # Safety
/// `path` must be null or a valid nul-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn cfsafepath_safe_chmod(path: *const c_char, mode: c_uint) -> c_int {
    clear_last_error();
    with_path(path, |path| ops::safe_chmod(path, mode)).into_c_return()
}

/// `safe_chown(path, uid, gid) -> 0 | -1` (§6). Pass `ops::UNCHANGED` for
/// either id to leave it untouched, matching the `(uid_t)-1` convention.
///
/// # Safety
/// `path` must be null or a valid nul-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn cfsafepath_safe_chown(
    path: *const c_char,
    uid: c_uint,
    gid: c_uint,
) -> c_int {
    clear_last_error();
    with_path(path, |path| ops::safe_chown(path, uid, gid)).into_c_return()
}

/// `safe_lchown(path, uid, gid) -> 0 | -1` (§6).
///
/// # Safety
/// `path` must be null or a valid nul-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn cfsafepath_safe_lchown(
    path: *const c_char,
    uid: c_uint,
    gid: c_uint,
) -> c_int {
    clear_last_error();
    with_path(path, |path| ops::safe_lchown(path, uid, gid)).into_c_return()
}

/// `safe_fopen(path, mode_string) -> fd | -1` (§6). The C surface hands
/// back a raw, caller-owned file descriptor rather than a `FILE*`: wrapping
/// it in a stream (`fdopen(3)`) is left to the C agent code, which already
/// knows what buffering it wants.
///
/// # Safety
/// `path` and `mode` must each be null or a valid nul-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn cfsafepath_safe_fopen(
    path: *const c_char,
    mode: *const c_char,
) -> RawFd {
    clear_last_error();
    cfsafepath_safe_fopen_create_perms(path, mode, perms::PERMS_DEFAULT)
}

/// `safe_fopen_create_perms(path, mode_string, perms) -> fd | -1` (§6).
///
/// # Safety
/// `path` and `mode` must each be null or a valid nul-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn cfsafepath_safe_fopen_create_perms(
    path: *const c_char,
    mode: *const c_char,
    perms: c_uint,
) -> RawFd {
    clear_last_error();
    // SAFETY: caller contract above.
    let result = (|| -> Result<File, crate::error::Error> {
        let path = unsafe { parse_path(path) }?;
        let mode = unsafe { parse_mode_string(mode) }?;
        crate::safe_fopen_create_perms(path, mode, perms)
    })();
    result.map(IntoRawFd::into_raw_fd).into_c_return()
}

/// Parse `path` and run `f`, translating a null/invalid pointer into
/// `InvalidArgument` the same way every other wrapper in this module does.
///
/// # Safety
/// `path` must be null or a valid nul-terminated C string.
unsafe fn with_path<T>(
    path: *const c_char,
    f: impl FnOnce(&std::path::Path) -> Result<T, crate::error::Error>,
) -> Result<T, crate::error::Error> {
    // SAFETY: caller contract above.
    let path = unsafe { parse_path(path) }?;
    f(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::ffi::CString;

    use tempfile::tempdir;

    #[test]
    fn open_chmod_chown_roundtrip_through_capi() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f");
        let c_path = CString::new(path.to_str().unwrap()).unwrap();

        let fd = unsafe {
            cfsafepath_safe_open_create_perms(
                c_path.as_ptr(),
                libc::O_WRONLY | libc::O_CREAT,
                0o600,
            )
        };
        assert!(fd >= 0);
        unsafe { libc::close(fd) };

        let rc = unsafe { cfsafepath_safe_chmod(c_path.as_ptr(), 0o640) };
        assert_eq!(rc, 0);

        let meta = std::fs::metadata(&path).unwrap();
        use std::os::unix::fs::PermissionsExt;
        assert_eq!(meta.permissions().mode() & 0o777, 0o640);
    }

    #[test]
    fn null_path_is_invalid_argument_and_last_errno_reflects_it() {
        let rc = unsafe { cfsafepath_safe_open(std::ptr::null(), libc::O_RDONLY) };
        assert_eq!(rc, -1);
        assert_eq!(self::error::cfsafepath_last_errno(), libc::EINVAL);
    }

    #[test]
    fn missing_file_surfaces_enoent_via_last_errno() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing");
        let c_path = CString::new(path.to_str().unwrap()).unwrap();

        let rc = unsafe { cfsafepath_safe_open(c_path.as_ptr(), libc::O_RDONLY) };
        assert_eq!(rc, -1);
        assert_eq!(self::error::cfsafepath_last_errno(), libc::ENOENT);
    }
}
