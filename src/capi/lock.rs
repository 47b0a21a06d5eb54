// SPDX-License-Identifier: MPL-2.0 OR LGPL-3.0-or-later
/*
 * cfsafepath: safe path resolution and mutation for config-management agents
 */

//! `extern "C"` wrappers around [`FileLock`] (§6: `ExclusiveFileLock`,
//! `SharedFileLock`, `ExclusiveFileUnlock`, `ExclusiveFileLockCheck`,
//! `ExclusiveFileLockPath`, `SharedFileLockPath`).
//!
//! A `FileLock` is handed to C callers as an opaque, heap-leaked pointer
//! (the same `Leakable` pattern the model implementation uses for `Root`/
//! `Handle`): `cfsafepath_filelock_new` leaks one, `cfsafepath_filelock_free`
//! un-leaks and drops it.

use super::error::{clear_last_error, set_last_error};
use super::ret::IntoCReturn;
use super::utils::parse_path;

use crate::lock::{FileLock, LockPathError};

use std::os::raw::{c_char, c_int};

/// Leak `lock` onto the heap so a raw pointer can cross the FFI boundary.
fn leak(lock: FileLock) -> *mut FileLock {
    Box::into_raw(Box::new(lock))
}

/// # Safety
/// `ptr` must have been produced by [`cfsafepath_filelock_new`] and not
/// already freed.
unsafe fn borrow_mut<'a>(ptr: *mut FileLock) -> &'a mut FileLock {
    debug_assert!(!ptr.is_null(), "caller passed a NULL FileLock pointer");
    // SAFETY: caller contract above.
    unsafe { &mut *ptr }
}

/// `cfsafepath_filelock_new() -> FileLock*`: allocate an unlocked,
/// fd-less [`FileLock`] the caller owns until it passes the pointer to
/// [`cfsafepath_filelock_free`].
#[no_mangle]
pub extern "C" fn cfsafepath_filelock_new() -> *mut FileLock {
    leak(FileLock::new())
}

/// `cfsafepath_filelock_free(lock)`: release a [`FileLock`] allocated by
/// [`cfsafepath_filelock_new`], releasing any lock still held and closing
/// its descriptor.
///
/// # Safety
/// `ptr` must be null, or a pointer previously returned by
/// [`cfsafepath_filelock_new`] that has not already been freed.
#[no_mangle]
pub unsafe extern "C" fn cfsafepath_filelock_free(ptr: *mut FileLock) {
    if ptr.is_null() {
        return;
    }
    // SAFETY: caller contract above; `Box::from_raw` un-leaks exactly what
    // `leak` allocated, dropping the FileLock (and its fd) once.
    let mut lock = unsafe { Box::from_raw(ptr) };
    let _ = lock.unlock(true);
}

/// `ExclusiveFileLock(lock, blocking) -> 0 | -1`.
///
/// # Safety
/// `ptr` must be a live pointer from [`cfsafepath_filelock_new`].
#[no_mangle]
pub unsafe extern "C" fn cfsafepath_exclusive_lock(ptr: *mut FileLock, blocking: c_int) -> c_int {
    clear_last_error();
    // SAFETY: caller contract above.
    let lock = unsafe { borrow_mut(ptr) };
    lock.lock(blocking != 0).into_c_return()
}

/// `SharedFileLock(lock, blocking) -> 0 | -1`.
///
/// # Safety
/// `ptr` must be a live pointer from [`cfsafepath_filelock_new`].
#[no_mangle]
pub unsafe extern "C" fn cfsafepath_shared_lock(ptr: *mut FileLock, blocking: c_int) -> c_int {
    clear_last_error();
    // SAFETY: caller contract above.
    let lock = unsafe { borrow_mut(ptr) };
    lock.share(blocking != 0).into_c_return()
}

/// `ExclusiveFileUnlock(lock, close_fd) -> 0 | -1`.
///
/// # Safety
/// `ptr` must be a live pointer from [`cfsafepath_filelock_new`].
#[no_mangle]
pub unsafe extern "C" fn cfsafepath_unlock(ptr: *mut FileLock, close_fd: c_int) -> c_int {
    clear_last_error();
    // SAFETY: caller contract above.
    let lock = unsafe { borrow_mut(ptr) };
    lock.unlock(close_fd != 0).into_c_return()
}

/// `ExclusiveFileLockCheck(lock) -> bool`, surfaced as `1`/`0`/`-1`
/// (error) since the C surface has no native boolean.
///
/// # Safety
/// `ptr` must be a live pointer from [`cfsafepath_filelock_new`].
#[no_mangle]
pub unsafe extern "C" fn cfsafepath_lock_check_exclusive(ptr: *mut FileLock) -> c_int {
    clear_last_error();
    // SAFETY: caller contract above.
    let lock = unsafe { borrow_mut(ptr) };
    lock.check_exclusive().into_c_return()
}

/// Shared plumbing for `ExclusiveFileLockPath`/`SharedFileLockPath`: `0` on
/// success, `-1` on a generic failure, `-2` if a containing directory is
/// missing (§4.5).
///
/// # Safety
/// `ptr` must be a live pointer from [`cfsafepath_filelock_new`]; `path`
/// must be null or a valid nul-terminated C string.
unsafe fn lock_path(
    ptr: *mut FileLock,
    path: *const c_char,
    exclusive: bool,
    blocking: c_int,
) -> c_int {
    clear_last_error();
    // SAFETY: caller contract above.
    let lock = unsafe { borrow_mut(ptr) };
    // SAFETY: caller contract above.
    let path = match unsafe { parse_path(path) } {
        Ok(path) => path,
        Err(err) => {
            set_last_error(err);
            return -1;
        }
    };

    match lock.lock_path(path, exclusive, blocking != 0) {
        Ok(()) => 0,
        Err(LockPathError::DirectoryMissing) => -2,
        Err(LockPathError::Other(err)) => {
            set_last_error(err);
            -1
        }
    }
}

/// `ExclusiveFileLockPath(lock, path, blocking) -> 0 | -1 | -2`.
///
/// # Safety
/// Same contract as [`lock_path`].
#[no_mangle]
pub unsafe extern "C" fn cfsafepath_exclusive_lock_path(
    ptr: *mut FileLock,
    path: *const c_char,
    blocking: c_int,
) -> c_int {
    // SAFETY: forwarded from this function's own contract.
    unsafe { lock_path(ptr, path, true, blocking) }
}

/// `SharedFileLockPath(lock, path, blocking) -> 0 | -1 | -2`.
///
/// # Safety
/// Same contract as [`lock_path`].
#[no_mangle]
pub unsafe extern "C" fn cfsafepath_shared_lock_path(
    ptr: *mut FileLock,
    path: *const c_char,
    blocking: c_int,
) -> c_int {
    // SAFETY: forwarded from this function's own contract.
    unsafe { lock_path(ptr, path, false, blocking) }
}
