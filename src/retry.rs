// SPDX-License-Identifier: MPL-2.0 OR LGPL-3.0-or-later
/*
 * cfsafepath: safe path resolution and mutation for config-management agents
 */

#![forbid(unsafe_code)]

//! The Retry Controller (§4.3): wraps a Walker attempt in a bounded retry
//! budget that tolerates benign, transient filesystem races, and owns the
//! `O_TRUNC`-stripping/re-arming trick described in §4.2 point 4 and §9
//! ("Truncation consumed across retries").

use crate::error::{Error, ErrorImpl, ErrorKind};
use crate::flags::OpenFlags;
use crate::hook::WalkObserver;
use crate::utils::AsFdExt;
use crate::walker::{self, WalkMode};

use std::os::unix::io::{AsFd, OwnedFd};
use std::path::Path;

use rustix::fs::{ftruncate, statat, AtFlags};

/// Small bounded budget (§4.3: "a bounded budget (small constant, e.g. 5)").
const MAX_ATTEMPTS: u32 = 5;

/// Drive [`walker::walk`] for an operation that wants a descriptor to the
/// terminal object, retrying on [`ErrorKind::TransientRace`] and handling
/// `O_TRUNC` the way §4.2 point 4 describes: strip it from what the Walker
/// sees, then apply it ourselves once the walk's identity is confirmed
/// stable.
pub(crate) fn open(
    path: &Path,
    mode: WalkMode,
    flags: OpenFlags,
    observer: &dyn WalkObserver,
) -> Result<OwnedFd, Error> {
    let wants_truncate = flags.contains(OpenFlags::O_TRUNC);
    let walk_flags = flags.difference(OpenFlags::O_TRUNC);

    let mut last_err: Option<Error> = None;
    for _attempt in 0..MAX_ATTEMPTS {
        let walked = match walker::walk(path, mode, walk_flags, observer) {
            Ok(walked) => walked,
            Err(err) if err.kind() == ErrorKind::TransientRace => {
                last_err = Some(err);
                continue;
            }
            Err(err) => return Err(err),
        };

        let fd = walked
            .fd
            .expect("open-family walk modes always produce a terminal descriptor");

        if !wants_truncate {
            return Ok(fd);
        }

        match confirm_identity_and_truncate(&fd, walked.dir_fd.as_fd(), &walked.name) {
            Ok(()) => return Ok(fd),
            Err(err) if err.kind() == ErrorKind::TransientRace => {
                last_err = Some(err);
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_err.unwrap_or_else(|| {
        ErrorImpl::TransientRace {
            description: "retry budget exhausted".into(),
        }
        .into()
    }))
}

/// Drive a walk for an operation that only needs the parent directory and
/// terminal name (`ParentOnly`/`OpenNoFollow`), with the same retry budget
/// but no truncation handling (neither mode is ever combined with it).
pub(crate) fn resolve(
    path: &Path,
    mode: WalkMode,
    observer: &dyn WalkObserver,
) -> Result<walker::Walked, Error> {
    let mut last_err: Option<Error> = None;
    for _attempt in 0..MAX_ATTEMPTS {
        match walker::walk(path, mode, OpenFlags::default(), observer) {
            Ok(walked) => return Ok(walked),
            Err(err) if err.kind() == ErrorKind::TransientRace => {
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        ErrorImpl::TransientRace {
            description: "retry budget exhausted".into(),
        }
        .into()
    }))
}

/// §4.2 point 4: verify that the entry the Walker just opened hasn't been
/// swapped for a different inode in the gap between the walk's internal
/// checks and this moment, then truncate.
fn confirm_identity_and_truncate(
    fd: &OwnedFd,
    dir_fd: std::os::unix::io::BorrowedFd<'_>,
    name: &std::ffi::OsStr,
) -> Result<(), Error> {
    let authorized = fd.identity()?;

    let now = statat(dir_fd, name, AtFlags::empty()).map_err(|errno| ErrorImpl::OsError {
        operation: "re-stat terminal object before truncate".into(),
        source: errno.into(),
    })?;

    if authorized != crate::utils::FileIdentity::from_raw(&now) {
        return Err(ErrorImpl::TransientRace {
            description: "terminal object identity changed before truncate".into(),
        }
        .into());
    }

    ftruncate(fd, 0).map_err(|errno| {
        ErrorImpl::OsError {
            operation: "truncate authorized descriptor".into(),
            source: errno.into(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::hook::NoopObserver;

    use std::fs;
    use std::io::Read;

    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn truncate_flag_empties_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"BLUE balloon").unwrap();

        let fd = open(
            &path,
            WalkMode::OpenExisting,
            OpenFlags::O_WRONLY | OpenFlags::O_TRUNC,
            &NoopObserver,
        )
        .expect("truncating open should succeed");
        drop(fd);

        let mut buf = Vec::new();
        fs::File::open(&path).unwrap().read_to_end(&mut buf).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn plain_open_without_truncate_preserves_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"BLUE balloon").unwrap();

        let fd = open(&path, WalkMode::OpenExisting, OpenFlags::O_RDONLY, &NoopObserver)
            .expect("open should succeed");
        let mut buf = Vec::new();
        let mut file: fs::File = fd.into();
        file.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"BLUE balloon");
    }
}
