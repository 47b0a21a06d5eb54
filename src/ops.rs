// SPDX-License-Identifier: MPL-2.0 OR LGPL-3.0-or-later
/*
 * cfsafepath: safe path resolution and mutation for config-management agents
 */

#![forbid(unsafe_code)]

//! Operation Adapters (§4.4): thin wrappers that drive the Walker (through
//! the Retry Controller) on behalf of each public operation, then translate
//! the walk's outcome into the syscall actually needed.

use crate::error::{Error, ErrorImpl};
use crate::flags::OpenFlags;
use crate::hook::{NoopObserver, WalkObserver};
use crate::perms::mask_mode;
use crate::retry;
use crate::trust::is_trusted_link_owner;
use crate::utils::LinkOwner;
use crate::walker::WalkMode;

use std::os::unix::io::{AsFd, OwnedFd};
use std::path::Path;

use rustix::fs::{fchmod, fchown, fchownat, fstat, statat, AtFlags, Mode};

/// `u32::MAX` stands in for `(uid_t)-1`/`(gid_t)-1`: "leave unchanged"
/// (§4.4 "Numeric semantics").
pub const UNCHANGED: u32 = u32::MAX;

pub(crate) fn safe_open(path: &Path, flags: OpenFlags) -> Result<OwnedFd, Error> {
    safe_open_with(path, flags, &NoopObserver)
}

pub(crate) fn safe_open_with(
    path: &Path,
    flags: OpenFlags,
    observer: &dyn WalkObserver,
) -> Result<OwnedFd, Error> {
    let mode = walk_mode_for(flags, crate::perms::PERMS_DEFAULT);
    retry::open(path, mode, flags, observer)
}

pub(crate) fn safe_open_create_perms(
    path: &Path,
    flags: OpenFlags,
    perms: u32,
) -> Result<OwnedFd, Error> {
    safe_open_create_perms_with(path, flags, perms, &NoopObserver)
}

pub(crate) fn safe_open_create_perms_with(
    path: &Path,
    flags: OpenFlags,
    perms: u32,
    observer: &dyn WalkObserver,
) -> Result<OwnedFd, Error> {
    let flags = flags | OpenFlags::O_CREAT;
    let mode = walk_mode_for(flags, mask_mode(perms));
    retry::open(path, mode, flags, observer)
}

pub(crate) fn safe_creat(path: &Path, perms: u32) -> Result<OwnedFd, Error> {
    let flags = OpenFlags::O_WRONLY | OpenFlags::O_CREAT | OpenFlags::O_TRUNC;
    retry::open(
        path,
        WalkMode::OpenOrCreate {
            perms: mask_mode(perms),
        },
        flags,
        &NoopObserver,
    )
}

pub(crate) fn walk_mode_for(flags: OpenFlags, perms: u32) -> WalkMode {
    if flags.contains(OpenFlags::O_CREAT) {
        if flags.contains(OpenFlags::O_EXCL) {
            WalkMode::CreateOnly { perms }
        } else {
            WalkMode::OpenOrCreate { perms }
        }
    } else {
        WalkMode::OpenExisting
    }
}

/// §4.4: `safe_chmod`. Chmod is defined to follow symlinks, but this core
/// has no safe way to validate a followed link's target before changing its
/// mode, so (matching the table's explicit carve-out) any terminal symlink
/// fails outright rather than being silently followed.
pub(crate) fn safe_chmod(path: &Path, mode: u32) -> Result<(), Error> {
    let walked = retry::resolve(path, WalkMode::OpenNoFollow, &NoopObserver)?;
    let fd = walked.fd.expect("OpenNoFollow always opens the terminal component");

    if is_symlink_fd(&fd)? {
        return Err(ErrorImpl::UntrustedLink {
            description: "chmod refuses to follow a terminal symlink".into(),
        }
        .into());
    }

    // `fd` is `O_PATH` (needed so the lookup above could safely inspect a
    // symlink without following it); Linux refuses `fchmod(2)` on an
    // `O_PATH` descriptor outright, so reopen the same inode for real.
    let real_fd = crate::walker::reopen_real(fd.as_fd())?;
    fchmod(&real_fd, Mode::from_raw_mode(mask_mode(mode))).map_err(|errno| {
        ErrorImpl::OsError {
            operation: "fchmod".into(),
            source: errno.into(),
        }
        .into()
    })
}

/// §4.4: `safe_chown`. A terminal symlink is only followed when it passes
/// the ordinary safety predicate *and* its own ownership agrees with the
/// ownership of whatever it points at — otherwise a link could be used to
/// redirect a chown onto a file the caller never named.
pub(crate) fn safe_chown(path: &Path, uid: u32, gid: u32) -> Result<(), Error> {
    let walked = retry::resolve(path, WalkMode::OpenNoFollow, &NoopObserver)?;
    let link_fd = walked.fd.expect("OpenNoFollow always opens the terminal component");

    if !is_symlink_fd(&link_fd)? {
        // Same `O_PATH`-can't-`fchown` issue as `safe_chmod` above.
        let real_fd = crate::walker::reopen_real(link_fd.as_fd())?;
        return do_fchown(&real_fd, uid, gid);
    }

    let link_owner = LinkOwner::of(link_fd.as_fd())?;
    if !is_trusted_link_owner(link_owner.uid, link_owner.gid) {
        return Err(ErrorImpl::UntrustedLink {
            description: "terminal symlink failed the safety predicate".into(),
        }
        .into());
    }

    let target_st = statat(walked.dir_fd.as_fd(), walked.name.as_os_str(), AtFlags::empty())
        .map_err(|errno| ErrorImpl::OsError {
            operation: "stat chown target through symlink".into(),
            source: errno.into(),
        })?;
    if target_st.st_uid != link_owner.uid || target_st.st_gid != link_owner.gid {
        return Err(ErrorImpl::UntrustedLink {
            description: "symlink owner disagrees with its target's owner".into(),
        }
        .into());
    }

    let target_fd = crate::walker::open_path_following(
        walked.dir_fd.as_fd(),
        walked.name.as_os_str(),
    )?;
    let real_target_fd = crate::walker::reopen_real(target_fd.as_fd())?;
    do_fchown(&real_target_fd, uid, gid)
}

fn do_fchown(fd: &OwnedFd, uid: u32, gid: u32) -> Result<(), Error> {
    let uid = if uid == UNCHANGED { None } else { Some(rustix::fs::Uid::from_raw(uid)) };
    let gid = if gid == UNCHANGED { None } else { Some(rustix::fs::Gid::from_raw(gid)) };
    fchown(fd, uid, gid).map_err(|errno| {
        ErrorImpl::OsError {
            operation: "fchown".into(),
            source: errno.into(),
        }
        .into()
    })
}

/// §4.4: `safe_lchown`. Always targets the link itself, so link safety is
/// irrelevant.
pub(crate) fn safe_lchown(path: &Path, uid: u32, gid: u32) -> Result<(), Error> {
    let walked = retry::resolve(path, WalkMode::ParentOnly, &NoopObserver)?;
    let uid = if uid == UNCHANGED { None } else { Some(rustix::fs::Uid::from_raw(uid)) };
    let gid = if gid == UNCHANGED { None } else { Some(rustix::fs::Gid::from_raw(gid)) };
    fchownat(
        walked.dir_fd.as_fd(),
        walked.name.as_os_str(),
        uid,
        gid,
        AtFlags::SYMLINK_NOFOLLOW,
    )
    .map_err(|errno| {
        ErrorImpl::OsError {
            operation: "fchownat (no-follow)".into(),
            source: errno.into(),
        }
        .into()
    })
}

fn is_symlink_fd(fd: &OwnedFd) -> Result<bool, Error> {
    let st = fstat(fd).map_err(|errno| ErrorImpl::OsError {
        operation: "fstat terminal descriptor".into(),
        source: errno.into(),
    })?;
    Ok((st.st_mode & libc::S_IFMT as u32) == libc::S_IFLNK as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;
    use std::os::unix::fs::{symlink, PermissionsExt};

    use tempfile::tempdir;

    #[test]
    fn safe_chmod_changes_mode_of_regular_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"x").unwrap();

        safe_chmod(&path, 0o640).unwrap();
        let meta = fs::metadata(&path).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o640);
    }

    #[test]
    fn safe_chmod_refuses_terminal_symlink() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("f");
        fs::write(&target, b"x").unwrap();
        let link = dir.path().join("l");
        symlink(&target, &link).unwrap();

        let err = safe_chmod(&link, 0o600).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UntrustedLink);
    }

    #[test]
    fn safe_lchown_targets_link_itself_regardless_of_owner() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("f");
        fs::write(&target, b"x").unwrap();
        let link = dir.path().join("l");
        symlink(&target, &link).unwrap();

        // Chowning to our own uid/gid is a no-op but exercises the ParentOnly
        // path end-to-end without requiring root in test.
        let me = rustix::process::geteuid().as_raw();
        let my_group = rustix::process::getegid().as_raw();
        safe_lchown(&link, me, my_group).unwrap();
    }

    #[test]
    fn safe_open_creates_with_default_perms() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("new");
        let fd = safe_open(&path, OpenFlags::O_WRONLY | OpenFlags::O_CREAT).unwrap();
        drop(fd);
        let meta = fs::metadata(&path).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, crate::perms::PERMS_DEFAULT);
    }
}
