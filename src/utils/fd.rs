// SPDX-License-Identifier: MPL-2.0 OR LGPL-3.0-or-later
/*
 * cfsafepath: safe path resolution and mutation for config-management agents
 */

#![forbid(unsafe_code)]

//! Small helpers around file descriptors used by the Walker and Operation
//! Adapters: capturing enough of a `stat(2)` result to detect whether a
//! racing attacker swapped the inode underneath us (§4.2 "Truncation
//! preservation").

use crate::error::{Error, ErrorImpl};

use std::os::unix::io::{AsFd, BorrowedFd};

use rustix::fs::{fstat, Stat};

/// The subset of `stat(2)` fields that identify "the same inode, unchanged
/// since we last looked" for the purposes of the TOCTOU check in §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FileIdentity {
    dev: u64,
    ino: u64,
    nlink: u64,
    uid: u32,
    gid: u32,
    mode: u32,
}

impl FileIdentity {
    pub(crate) fn of(fd: BorrowedFd<'_>) -> Result<Self, Error> {
        Self::from_stat(&fstat(fd).map_err(|errno| ErrorImpl::OsError {
            operation: "fstat for identity check".into(),
            source: errno.into(),
        })?)
    }

    fn from_stat(st: &Stat) -> Self {
        Self::from_raw(st)
    }

    /// Build an identity from a `stat(2)` result obtained by path rather than
    /// by fd (used by the Retry Controller to re-check a name it doesn't
    /// hold an fd for yet).
    pub(crate) fn from_raw(st: &Stat) -> Self {
        Self {
            dev: st.st_dev as u64,
            ino: st.st_ino as u64,
            nlink: st.st_nlink as u64,
            uid: st.st_uid,
            gid: st.st_gid,
            mode: st.st_mode,
        }
    }
}

/// The ownership fields of a symlink itself (never the target), used by the
/// symlink safety predicate (§3 "Symlink policy decision").
#[derive(Debug, Clone, Copy)]
pub(crate) struct LinkOwner {
    pub(crate) uid: u32,
    pub(crate) gid: u32,
}

impl LinkOwner {
    pub(crate) fn of(fd: BorrowedFd<'_>) -> Result<Self, Error> {
        let st = fstat(fd).map_err(|errno| ErrorImpl::OsError {
            operation: "fstat symlink for ownership check".into(),
            source: errno.into(),
        })?;
        Ok(Self {
            uid: st.st_uid,
            gid: st.st_gid,
        })
    }
}

pub(crate) trait AsFdExt: AsFd {
    fn identity(&self) -> Result<FileIdentity, Error> {
        FileIdentity::of(self.as_fd())
    }
}

impl<T: AsFd> AsFdExt for T {}
