// SPDX-License-Identifier: MPL-2.0 OR LGPL-3.0-or-later
/*
 * cfsafepath: safe path resolution and mutation for config-management agents
 */

#![forbid(unsafe_code)]

//! Flag types used by the public operations.

bitflags::bitflags! {
    /// Open-mode and creation flags understood by [`safe_open`](crate::safe_open)
    /// and friends. These mirror the POSIX `O_*` flags; bits that the Walker
    /// doesn't need to act on (e.g. [`OpenFlags::O_APPEND`]) are passed
    /// through verbatim to the terminal `openat(2)` call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenFlags: i32 {
        const O_RDONLY = libc::O_RDONLY;
        const O_WRONLY = libc::O_WRONLY;
        const O_RDWR = libc::O_RDWR;
        const O_CREAT = libc::O_CREAT;
        const O_EXCL = libc::O_EXCL;
        const O_TRUNC = libc::O_TRUNC;
        const O_APPEND = libc::O_APPEND;
        const O_NOFOLLOW = libc::O_NOFOLLOW;
        const O_NONBLOCK = libc::O_NONBLOCK;
        const O_NOCTTY = libc::O_NOCTTY;
        const O_CLOEXEC = libc::O_CLOEXEC;
        const O_SYNC = libc::O_SYNC;
        const O_DIRECTORY = libc::O_DIRECTORY;
    }
}

impl Default for OpenFlags {
    fn default() -> Self {
        OpenFlags::O_RDONLY
    }
}
