// SPDX-License-Identifier: MPL-2.0 OR LGPL-3.0-or-later
/*
 * cfsafepath: safe path resolution and mutation for config-management agents
 */

#![forbid(unsafe_code)]

//! The Advisory Lock Manager (§4.5): whole-file advisory locks on top of
//! the safe-open path, with the small state machine described in §3's
//! `FileLock` data model.

use crate::error::{Error, ErrorImpl, ErrorKind};
use crate::flags::OpenFlags;
use crate::hook::NoopObserver;
use crate::ops;
use crate::perms::PERMS_DEFAULT;
use crate::retry;

use std::os::unix::io::{AsFd, OwnedFd};
use std::path::Path;

use rustix::fs::{fcntl_getfl, flock, FlockOperation, OFlags};
use rustix::io::Errno;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockKind {
    Shared,
    Exclusive,
}

/// An ownership record for a whole-file advisory lock (§3 "FileLock").
///
/// `fd == -1` in the source maps to `fd: None` here; `lock_held` is folded
/// into knowing which [`LockKind`], if any, is currently held.
#[derive(Debug, Default)]
pub struct FileLock {
    fd: Option<OwnedFd>,
    held: Option<LockKind>,
    writable: bool,
}

/// Distinguishes the two failure shapes `*Path` variants report (§4.5,
/// §6): a missing containing directory gets its own code so callers can
/// decide whether to create it and retry.
pub enum LockPathError {
    /// A directory on the path does not exist (maps to the `-2` sentinel
    /// on the `capi` surface).
    DirectoryMissing,
    Other(Error),
}

impl From<Error> for LockPathError {
    fn from(err: Error) -> Self {
        LockPathError::Other(err)
    }
}

impl FileLock {
    pub fn new() -> Self {
        Self {
            fd: None,
            held: None,
            writable: false,
        }
    }

    /// Adopt an already-open descriptor, e.g. one the caller obtained from
    /// [`crate::safe_open`] directly instead of through [`Self::lock_path`].
    pub fn from_fd(fd: OwnedFd, writable: bool) -> Self {
        Self {
            fd: Some(fd),
            held: None,
            writable,
        }
    }

    pub fn fd(&self) -> Option<std::os::unix::io::BorrowedFd<'_>> {
        self.fd.as_ref().map(AsFd::as_fd)
    }

    /// `ExclusiveFileLock`.
    pub fn lock(&mut self, blocking: bool) -> Result<(), Error> {
        self.acquire(LockKind::Exclusive, blocking)
    }

    /// `SharedFileLock`.
    pub fn share(&mut self, blocking: bool) -> Result<(), Error> {
        self.acquire(LockKind::Shared, blocking)
    }

    /// `ExclusiveFileUnlock`. A no-op success if nothing is held.
    pub fn unlock(&mut self, close_fd: bool) -> Result<(), Error> {
        if let (Some(fd), Some(_)) = (&self.fd, self.held) {
            flock(fd, FlockOperation::Unlock).map_err(os_error("unlock"))?;
        }
        self.held = None;
        if close_fd {
            self.fd = None;
        }
        Ok(())
    }

    /// `ExclusiveFileLockCheck`: true iff an exclusive lock could be taken
    /// right now without blocking, without changing what is actually held.
    pub fn check_exclusive(&self) -> Result<bool, Error> {
        let Some(fd) = &self.fd else {
            return Ok(false);
        };

        match flock(fd, FlockOperation::NonBlockingLockExclusive) {
            Ok(()) => {
                // We don't want this predicate to have side effects: put
                // back whatever was actually held before we probed.
                match self.held {
                    None => {
                        let _ = flock(fd, FlockOperation::Unlock);
                    }
                    Some(LockKind::Shared) => {
                        let _ = flock(fd, FlockOperation::NonBlockingLockShared);
                    }
                    Some(LockKind::Exclusive) => {}
                }
                Ok(true)
            }
            Err(Errno::WOULDBLOCK) | Err(Errno::AGAIN) => Ok(false),
            Err(errno) => Err(os_error("probe exclusive lock")(errno)),
        }
    }

    /// `ExclusiveFileLockPath` / `SharedFileLockPath`, parameterized by
    /// which kind the caller wants.
    pub fn lock_path(&mut self, path: &Path, kind_exclusive: bool, blocking: bool) -> Result<(), LockPathError> {
        let flags = OpenFlags::O_RDWR | OpenFlags::O_CREAT;
        let fd = retry::open(
            path,
            ops::walk_mode_for(flags, PERMS_DEFAULT),
            flags,
            &NoopObserver,
        )
        .map_err(|err| {
            // `OpenOrCreate` never lets a `NotFound` over the terminal
            // component escape: a missing name is created outright, and a
            // trusted dangling terminal symlink is turned into `create_exclusive`
            // (PermissionDenied/AlreadyExists), not reported as `NotFound` (see
            // `open_or_create_terminal`). So any `NotFound` that reaches here
            // can only be a missing intermediate directory (§4.2 point 2c).
            if err.kind() == ErrorKind::NotFound {
                LockPathError::DirectoryMissing
            } else {
                LockPathError::Other(err)
            }
        })?;

        self.fd = Some(fd);
        self.writable = true;
        let kind = if kind_exclusive {
            LockKind::Exclusive
        } else {
            LockKind::Shared
        };
        self.acquire(kind, blocking)?;
        Ok(())
    }

    fn acquire(&mut self, kind: LockKind, blocking: bool) -> Result<(), Error> {
        if self.held == Some(kind) {
            return Ok(());
        }

        if kind == LockKind::Exclusive && self.held == Some(LockKind::Shared) && !self.is_writable()? {
            return Err(ErrorImpl::InvalidArgument {
                name: "fd".into(),
                description: "cannot upgrade to an exclusive lock on a read-only descriptor".into(),
            }
            .into());
        }

        let fd = self.fd.as_ref().ok_or_else(|| -> Error {
            ErrorImpl::InvalidArgument {
                name: "fd".into(),
                description: "no descriptor to lock".into(),
            }
            .into()
        })?;

        let op = match (kind, blocking) {
            (LockKind::Exclusive, true) => FlockOperation::LockExclusive,
            (LockKind::Exclusive, false) => FlockOperation::NonBlockingLockExclusive,
            (LockKind::Shared, true) => FlockOperation::LockShared,
            (LockKind::Shared, false) => FlockOperation::NonBlockingLockShared,
        };

        let mut retried_interrupt = false;
        loop {
            match flock(fd, op) {
                Ok(()) => {
                    self.held = Some(kind);
                    return Ok(());
                }
                Err(Errno::INTR) => {
                    if retried_interrupt {
                        return Err(ErrorImpl::Interrupted.into());
                    }
                    retried_interrupt = true;
                    continue;
                }
                Err(Errno::WOULDBLOCK) | Err(Errno::AGAIN) => {
                    return Err(ErrorImpl::WouldBlock.into())
                }
                Err(errno) => return Err(os_error("flock")(errno)),
            }
        }
    }

    fn is_writable(&self) -> Result<bool, Error> {
        if self.writable {
            return Ok(true);
        }
        let Some(fd) = &self.fd else { return Ok(false) };
        let raw = fcntl_getfl(fd).map_err(os_error("fcntl(F_GETFL)"))?;
        let access = OFlags::from_bits_retain(raw.bits() & libc::O_ACCMODE as u32);
        Ok(access == OFlags::WRONLY || access == OFlags::RDWR)
    }
}

fn os_error(operation: &'static str) -> impl FnOnce(Errno) -> Error {
    move |errno| {
        ErrorImpl::OsError {
            operation: operation.into(),
            source: errno.into(),
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use tempfile::tempdir;

    #[test]
    fn relocking_same_kind_in_one_thread_is_a_noop() {
        use std::os::unix::io::AsRawFd;

        let dir = tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"x").unwrap();

        let mut lock = FileLock::new();
        lock.lock_path(&path, true, true).ok().unwrap();
        let fd_before = lock.fd().unwrap().as_raw_fd();
        lock.lock(true).unwrap();
        let fd_after = lock.fd().unwrap().as_raw_fd();
        assert_eq!(fd_before, fd_after);
    }

    #[test]
    fn unlock_then_check_leaves_fd_reset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"x").unwrap();

        let mut lock = FileLock::new();
        match lock.lock_path(&path, true, true) {
            Ok(()) => {}
            Err(LockPathError::DirectoryMissing) => panic!("directory exists"),
            Err(LockPathError::Other(err)) => panic!("unexpected failure: {err}"),
        }
        lock.unlock(true).unwrap();
        assert!(lock.fd().is_none());
        assert!(fs::metadata(&path).is_ok());
    }

    #[test]
    fn lock_path_with_missing_parent_directory_is_distinguished() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing-subdir").join("f");

        let mut lock = FileLock::new();
        let err = lock.lock_path(&path, true, true).unwrap_err();
        assert!(matches!(err, LockPathError::DirectoryMissing));
    }

    #[test]
    fn shared_then_check_exclusive_round_trip() -> anyhow::Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"x").unwrap();

        let mut lock = FileLock::new();
        lock.lock_path(&path, false, true)
            .map_err(|err| match err {
                LockPathError::DirectoryMissing => anyhow::anyhow!("directory unexpectedly missing"),
                LockPathError::Other(err) => anyhow::anyhow!(err),
            })?;
        assert!(lock.check_exclusive()?, "sole holder of a shared lock can still go exclusive");
        lock.unlock(true)?;
        Ok(())
    }
}
