// SPDX-License-Identifier: MPL-2.0 OR LGPL-3.0-or-later
/*
 * cfsafepath: safe path resolution and mutation for config-management agents
 *
 * == MPL-2.0 ==
 *
 *  This Source Code Form is subject to the terms of the Mozilla Public
 *  License, v. 2.0. If a copy of the MPL was not distributed with this
 *  file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * Alternatively, this Source Code Form may also (at your option) be used
 * under the terms of the GNU Lesser General Public License Version 3, as
 * described below:
 *
 * == LGPL-3.0-or-later ==
 *
 *  This program is free software: you can redistribute it and/or modify it
 *  under the terms of the GNU Lesser General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or (at
 *  your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful, but
 *  WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General
 *  Public License for more details.
 *
 *  You should have received a copy of the GNU Lesser General Public License
 *  along with this program. If not, see <https://www.gnu.org/licenses/>.
 */

//! cfsafepath resolves filesystem paths and performs the handful of
//! mutating operations a configuration-management agent needs (open,
//! create, chmod, chown, lchown, advisory locking) while staying safe
//! against symlink attacks and time-of-check/time-of-use races: every
//! path is walked one component at a time using directory-relative,
//! no-follow lookups, and every symlink encountered along the way is
//! checked against a trust predicate before it is followed.
//!
//! # Example
//!
//! ```no_run
//! use cfsafepath::{flags::OpenFlags, safe_open};
//!
//! # fn main() -> Result<(), cfsafepath::error::Error> {
//! let fd = safe_open("/etc/my-agent/state.db", OpenFlags::O_RDWR)?;
//! # let _ = fd;
//! # Ok(())
//! # }
//! ```
//!
//! # Trust model
//!
//! A symlink is followed only if its owning uid is root or the calling
//! process's effective uid, and its owning gid is root or the calling
//! process's effective gid. Links placed by anyone else cause the
//! operation touching them to fail with [`error::ErrorKind::UntrustedLink`]
//! rather than being silently skipped or ignored.
//!
//! # Platform support
//!
//! Linux only: the safety guarantees rely on directory-relative `*at(2)`
//! syscalls and no-follow open flags that this crate does not attempt to
//! emulate on other platforms.

#![cfg(target_os = "linux")]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(clippy::all)]
#![deny(missing_debug_implementations)]
#![cfg_attr(coverage, feature(coverage_attribute))]

pub mod error;
pub mod flags;
pub mod perms;

mod fopen;
mod hook;
mod lock;
mod ops;
mod path;
mod retry;
mod trust;
mod utils;
mod walker;

#[cfg(feature = "capi")]
mod capi;

pub use hook::WalkObserver;
pub use lock::{FileLock, LockPathError};
pub use ops::UNCHANGED;
pub use perms::{PERMS_DEFAULT, PERMS_SHARED};

use error::Error;
use flags::OpenFlags;

use std::fs::File;
use std::os::unix::io::OwnedFd;
use std::path::Path;

/// `safe_fopen(path, mode_string) -> stream | error` (§6).
pub fn safe_fopen(path: impl AsRef<Path>, mode_string: &str) -> Result<File, Error> {
    fopen::safe_fopen(path.as_ref(), mode_string)
}

/// `safe_fopen_create_perms(path, mode_string, perms) -> stream | error` (§6).
pub fn safe_fopen_create_perms(
    path: impl AsRef<Path>,
    mode_string: &str,
    perms: u32,
) -> Result<File, Error> {
    fopen::safe_fopen_create_perms(path.as_ref(), mode_string, perms)
}

/// `safe_chmod(path, mode) -> 0 | -1` (§6).
pub fn safe_chmod(path: impl AsRef<Path>, mode: u32) -> Result<(), Error> {
    ops::safe_chmod(path.as_ref(), mode)
}

/// `safe_chown(path, uid, gid) -> 0 | -1` (§6).
pub fn safe_chown(path: impl AsRef<Path>, uid: u32, gid: u32) -> Result<(), Error> {
    ops::safe_chown(path.as_ref(), uid, gid)
}

/// `safe_lchown(path, uid, gid) -> 0 | -1` (§6).
pub fn safe_lchown(path: impl AsRef<Path>, uid: u32, gid: u32) -> Result<(), Error> {
    ops::safe_lchown(path.as_ref(), uid, gid)
}

/// `safe_open(path, flags) -> fd | error` (§6).
pub fn safe_open(path: impl AsRef<Path>, flags: OpenFlags) -> Result<OwnedFd, Error> {
    ops::safe_open(path.as_ref(), flags)
}

/// `safe_open_create_perms(path, flags, perms) -> fd | error` (§6).
pub fn safe_open_create_perms(
    path: impl AsRef<Path>,
    flags: OpenFlags,
    perms: u32,
) -> Result<OwnedFd, Error> {
    ops::safe_open_create_perms(path.as_ref(), flags, perms)
}

/// `safe_creat(path, perms) -> fd | error` (§6).
pub fn safe_creat(path: impl AsRef<Path>, perms: u32) -> Result<OwnedFd, Error> {
    ops::safe_creat(path.as_ref(), perms)
}

/// Like [`safe_open`], but drives the walk with `observer` wired in instead
/// of the no-op production hook. Exposed for race-condition tests built on
/// top of this crate; production code should use [`safe_open`].
pub fn safe_open_observed(
    path: impl AsRef<Path>,
    flags: OpenFlags,
    observer: &dyn WalkObserver,
) -> Result<OwnedFd, Error> {
    ops::safe_open_with(path.as_ref(), flags, observer)
}

/// `ExclusiveFileLock(lock, blocking) -> 0 | -1` (§6).
pub fn exclusive_file_lock(lock: &mut FileLock, blocking: bool) -> Result<(), Error> {
    lock.lock(blocking)
}

/// `SharedFileLock(lock, blocking) -> 0 | -1` (§6).
pub fn shared_file_lock(lock: &mut FileLock, blocking: bool) -> Result<(), Error> {
    lock.share(blocking)
}

/// `ExclusiveFileUnlock(lock, close_fd) -> 0 | -1` (§6).
pub fn exclusive_file_unlock(lock: &mut FileLock, close_fd: bool) -> Result<(), Error> {
    lock.unlock(close_fd)
}

/// `ExclusiveFileLockCheck(lock) -> bool` (§6).
pub fn exclusive_file_lock_check(lock: &FileLock) -> Result<bool, Error> {
    lock.check_exclusive()
}

/// `ExclusiveFileLockPath(lock, path, blocking) -> 0 | -1 | -2` (§6).
pub fn exclusive_file_lock_path(
    lock: &mut FileLock,
    path: impl AsRef<Path>,
    blocking: bool,
) -> Result<(), LockPathError> {
    lock.lock_path(path.as_ref(), true, blocking)
}

/// `SharedFileLockPath(lock, path, blocking) -> 0 | -1 | -2` (§6).
pub fn shared_file_lock_path(
    lock: &mut FileLock,
    path: impl AsRef<Path>,
    blocking: bool,
) -> Result<(), LockPathError> {
    lock.lock_path(path.as_ref(), false, blocking)
}
