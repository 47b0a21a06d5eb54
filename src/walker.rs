// SPDX-License-Identifier: MPL-2.0 OR LGPL-3.0-or-later
/*
 * cfsafepath: safe path resolution and mutation for config-management agents
 */

#![forbid(unsafe_code)]

//! The Safe Walker (§4.2): descends a path one component at a time using
//! directory-relative, no-follow lookups, applying the symlink safety
//! predicate (§3, [`crate::trust`]) at every hop and at the terminal
//! component.
//!
//! Every intermediate directory descriptor is owned locally and dropped as
//! soon as its successor is obtained, so leak-on-early-return is structurally
//! impossible rather than something each call site has to remember (§9
//! "Resource scoping").

use crate::error::{Error, ErrorExt, ErrorImpl};
use crate::flags::OpenFlags;
use crate::hook::WalkObserver;
use crate::path::{tokenize, tokenize_link_target};
use crate::trust::is_trusted_link_owner;
use crate::utils::LinkOwner;

use std::ffi::{OsStr, OsString};
use std::os::unix::io::{AsFd, BorrowedFd, OwnedFd};
use std::path::Path;

use rustix::fs::{fstat, openat, statat, AtFlags, Mode, OFlags, Stat, CWD};
use rustix::io::Errno;

/// An upper bound on symlink hops per walk, matching Linux's `SYMLOOP_MAX`
/// (§4.2: "a link-hop budget (≥ the OS `SYMLOOP_MAX`)").
const MAX_SYMLINK_HOPS: u32 = 40;

/// How the terminal component of a walk should be treated (§4.2).
#[derive(Debug, Clone, Copy)]
pub(crate) enum WalkMode {
    /// Open an existing object; fail `NotFound` if it is missing.
    OpenExisting,
    /// Open if present, otherwise create exclusively with `perms`.
    OpenOrCreate { perms: u32 },
    /// Always create exclusively with `perms`; fail `AlreadyExists` if
    /// anything is already there.
    CreateOnly { perms: u32 },
    /// Resolve everything but the terminal component; return the parent
    /// directory and the terminal name without opening it.
    ParentOnly,
    /// Open the terminal component itself with `O_NOFOLLOW`, whatever it is
    /// (including a symlink) — used by adapters that decide what to do with
    /// a symlink terminal themselves (chmod, chown).
    OpenNoFollow,
}

/// The outcome of a walk (§4.2 "Public contract"): always the parent
/// directory and terminal name, plus a descriptor to the terminal object
/// itself when the mode opened one.
pub(crate) struct Walked {
    pub(crate) dir_fd: OwnedFd,
    pub(crate) name: OsString,
    pub(crate) fd: Option<OwnedFd>,
}

/// Walk `path` under `mode`, applying `oflags`'s access-mode and passthrough
/// bits (`O_APPEND`, `O_NONBLOCK`, ...) to whichever `openat(2)` call
/// ultimately produces the terminal descriptor. `oflags` is ignored by
/// [`WalkMode::ParentOnly`] and [`WalkMode::OpenNoFollow`].
pub(crate) fn walk(
    path: &Path,
    mode: WalkMode,
    oflags: OpenFlags,
    observer: &dyn WalkObserver,
) -> Result<Walked, Error> {
    let tokenized = tokenize(path)?;
    let mut dir_fd = open_root_or_cwd(tokenized.absolute)?;
    let mut remaining = tokenized.components;
    let mut hops = 0u32;
    let mut depth = 0usize;

    if remaining.is_empty() {
        return walk_root(dir_fd, mode);
    }

    loop {
        let name = remaining
            .pop_front()
            .expect("remaining checked non-empty before every iteration");

        if !remaining.is_empty() {
            dir_fd = step_intermediate(dir_fd, &name, &mut remaining, &mut hops, depth, observer)
                .wrap(format!("step into component {:?}", name.to_string_lossy()))?;
            depth += 1;
            continue;
        }

        observer.after_component(depth, dir_fd.as_fd(), &name);
        let walked = resolve_terminal(dir_fd, name, mode, oflags, &mut hops)
            .wrap("resolve terminal component")?;

        if tokenized.trailing_slash {
            require_directory(&walked)?;
        }
        return Ok(walked);
    }
}

/// Handle a path that tokenized to zero components (`/`, `.`, or equivalent
/// after collapsing): the walk's subject is the root/cwd itself (§4.2
/// "Root").
fn walk_root(dir_fd: OwnedFd, mode: WalkMode) -> Result<Walked, Error> {
    match mode {
        WalkMode::CreateOnly { .. } => Err(ErrorImpl::AlreadyExists {
            description: "path resolves to the filesystem root, which always exists".into(),
        }
        .into()),
        WalkMode::ParentOnly => Ok(Walked {
            dir_fd,
            name: OsString::from("."),
            fd: None,
        }),
        _ => {
            let fd = dup_for_reuse(dir_fd.as_fd())?;
            Ok(Walked {
                dir_fd,
                name: OsString::from("."),
                fd: Some(fd),
            })
        }
    }
}

fn require_directory(walked: &Walked) -> Result<(), Error> {
    let st = match &walked.fd {
        Some(fd) => fstat(fd).map_err(os_error("fstat terminal object"))?,
        None => {
            statat(&walked.dir_fd, &walked.name, AtFlags::SYMLINK_NOFOLLOW)
                .map_err(os_error("stat terminal object"))?
        }
    };
    if is_dir(&st) {
        Ok(())
    } else {
        Err(ErrorImpl::NotADirectory {
            description: "trailing slash requires a directory".into(),
        }
        .into())
    }
}

fn open_root_or_cwd(absolute: bool) -> Result<OwnedFd, Error> {
    let name: &str = if absolute { "/" } else { "." };
    let oflags = OFlags::from_bits_retain((libc::O_PATH | libc::O_DIRECTORY | libc::O_NOFOLLOW) as u32);
    openat(CWD, name, oflags, Mode::empty())
        .map_err(os_error("open initial directory descriptor"))
}

fn dup_for_reuse(fd: BorrowedFd<'_>) -> Result<OwnedFd, Error> {
    rustix::io::dup(fd).map_err(os_error("duplicate directory descriptor"))
}

fn is_symlink(st: &Stat) -> bool {
    (st.st_mode & libc::S_IFMT as u32) == libc::S_IFLNK as u32
}

fn is_dir(st: &Stat) -> bool {
    (st.st_mode & libc::S_IFMT as u32) == libc::S_IFDIR as u32
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

/// Directory-relative, no-follow `open(2)`: succeeds whether `name` is a
/// directory, a regular file, or a symlink (the link itself, not its
/// target), and maps `ENOENT` to [`ErrorKind::NotFound`](crate::error::ErrorKind::NotFound).
fn lookup_nofollow(dir_fd: BorrowedFd<'_>, name: &OsStr) -> Result<OwnedFd, Error> {
    let oflags = OFlags::from_bits_retain((libc::O_PATH | libc::O_NOFOLLOW) as u32);
    openat(dir_fd, name, oflags, Mode::empty()).map_err(|errno| {
        if errno == Errno::NOENT {
            ErrorImpl::NotFound {
                description: format!("{} does not exist", name.to_string_lossy()).into(),
            }
            .into()
        } else {
            ErrorImpl::OsError {
                operation: "look up path component".into(),
                source: errno.into(),
            }
            .into()
        }
    })
}

fn read_link_target(dir_fd: BorrowedFd<'_>, name: &OsStr) -> Result<OsString, Error> {
    use std::os::unix::ffi::OsStringExt;
    rustix::fs::readlinkat(dir_fd, name, Vec::new())
        .map(|c| OsString::from_vec(c.into_bytes()))
        .map_err(os_error("read symlink target"))
}

/// Advance past a single non-terminal component (§4.2 point 2), returning
/// the new `dir_fd` to use for the next hop. `remaining` is mutated in place
/// when a symlink is expanded, per §9's "path tokenizer vs. walker coupling"
/// note.
fn step_intermediate(
    dir_fd: OwnedFd,
    name: &OsStr,
    remaining: &mut std::collections::VecDeque<OsString>,
    hops: &mut u32,
    depth: usize,
    observer: &dyn WalkObserver,
) -> Result<OwnedFd, Error> {
    if name == ".." {
        let oflags = OFlags::from_bits_retain((libc::O_PATH | libc::O_DIRECTORY | libc::O_NOFOLLOW) as u32);
        return openat(dir_fd.as_fd(), "..", oflags, Mode::empty())
            .map_err(os_error("ascend to parent directory"));
    }

    observer.after_component(depth, dir_fd.as_fd(), name);
    let looked_up = lookup_nofollow(dir_fd.as_fd(), name)?;
    let st = fstat(&looked_up).map_err(os_error("fstat path component"))?;

    if is_symlink(&st) {
        *hops += 1;
        if *hops > MAX_SYMLINK_HOPS {
            return Err(ErrorImpl::LinkLoop {
                description: format!("{} exceeded the symlink-hop budget", name.to_string_lossy())
                    .into(),
            }
            .into());
        }

        let owner = LinkOwner::of(looked_up.as_fd())?;
        if !is_trusted_link_owner(owner.uid, owner.gid) {
            return Err(ErrorImpl::UntrustedLink {
                description: format!(
                    "{} is owned by an untrusted uid/gid",
                    name.to_string_lossy()
                )
                .into(),
            }
            .into());
        }
        drop(looked_up);

        let target = read_link_target(dir_fd.as_fd(), name)?;
        let (target_absolute, target_components) = tokenize_link_target(&target);

        let mut spliced = target_components;
        spliced.extend(remaining.drain(..));
        *remaining = spliced;

        if target_absolute {
            open_root_or_cwd(true)
        } else {
            Ok(dir_fd)
        }
    } else if is_dir(&st) {
        Ok(looked_up)
    } else {
        Err(ErrorImpl::NotADirectory {
            description: format!("{} is not a directory", name.to_string_lossy()).into(),
        }
        .into())
    }
}

/// Open `name` relative to `dir_fd`, following a trailing symlink exactly
/// once. Used by [`crate::ops::safe_chown`] after it has independently
/// established that the terminal symlink is trustworthy and agrees with its
/// target's ownership.
pub(crate) fn open_path_following(dir_fd: BorrowedFd<'_>, name: &OsStr) -> Result<OwnedFd, Error> {
    let oflags = OFlags::from_bits_retain(libc::O_PATH as u32);
    openat(dir_fd, name, oflags, Mode::empty()).map_err(os_error("open through verified symlink"))
}

/// Promote an `O_PATH` descriptor into a real, `fchmod`/`fchown`-capable one
/// (§4.4's `safe_chmod`/`safe_chown`): Linux refuses `fchmod(2)`/`fchown(2)`
/// on an `O_PATH` fd with `EBADF`, so once a terminal object's identity and
/// trust have been established through `fd`, this reopens the very same
/// inode via `/proc/self/fd` rather than re-walking the path by name (which
/// would reopen the door to a swap between the safety check and the
/// mutating syscall). `O_NONBLOCK` keeps this from blocking if `fd` happens
/// to refer to a FIFO with no peer connected yet (§4.4 "FIFOs behave as
/// regular files for mode/owner purposes").
pub(crate) fn reopen_real(fd: BorrowedFd<'_>) -> Result<OwnedFd, Error> {
    use std::os::unix::io::AsRawFd;

    let proc_path = format!("/proc/self/fd/{}", fd.as_raw_fd());
    let oflags = OFlags::from_bits_retain(
        (libc::O_RDONLY | libc::O_NONBLOCK | libc::O_CLOEXEC) as u32,
    );
    openat(CWD, proc_path, oflags, Mode::empty())
        .map_err(os_error("reopen O_PATH descriptor via /proc/self/fd"))
}

fn real_oflags(oflags: OpenFlags, extra: i32) -> OFlags {
    OFlags::from_bits_retain((oflags.bits() | extra) as u32)
}

fn resolve_terminal(
    dir_fd: OwnedFd,
    name: OsString,
    mode: WalkMode,
    oflags: OpenFlags,
    hops: &mut u32,
) -> Result<Walked, Error> {
    match mode {
        WalkMode::ParentOnly => Ok(Walked {
            dir_fd,
            name,
            fd: None,
        }),
        WalkMode::OpenNoFollow => {
            let fd = lookup_nofollow(dir_fd.as_fd(), &name)?;
            Ok(Walked {
                dir_fd,
                name,
                fd: Some(fd),
            })
        }
        WalkMode::OpenExisting => {
            let fd = open_existing_terminal(dir_fd.as_fd(), &name, oflags, hops)?;
            Ok(Walked {
                dir_fd,
                name,
                fd: Some(fd),
            })
        }
        WalkMode::OpenOrCreate { perms } => {
            let fd = open_or_create_terminal(dir_fd.as_fd(), &name, oflags, perms, hops)?;
            Ok(Walked {
                dir_fd,
                name,
                fd: Some(fd),
            })
        }
        WalkMode::CreateOnly { perms } => {
            let fd = create_only_terminal(dir_fd.as_fd(), &name, oflags, perms)?;
            Ok(Walked {
                dir_fd,
                name,
                fd: Some(fd),
            })
        }
    }
}

/// §4.2 point 3, `OpenExisting`.
fn open_existing_terminal(
    dir_fd: BorrowedFd<'_>,
    name: &OsStr,
    oflags: OpenFlags,
    hops: &mut u32,
) -> Result<OwnedFd, Error> {
    let follow_flags = real_oflags(oflags, 0);
    let nofollow_flags = real_oflags(oflags, libc::O_NOFOLLOW);

    match openat(dir_fd, name, nofollow_flags, Mode::empty()) {
        Ok(fd) => Ok(fd),
        Err(Errno::LOOP) => {
            open_through_terminal_symlink(dir_fd, name, follow_flags, hops)
        }
        Err(Errno::NOENT) => Err(ErrorImpl::NotFound {
            description: format!("{} does not exist", name.to_string_lossy()).into(),
        }
        .into()),
        Err(errno) => Err(ErrorImpl::OsError {
            operation: "open existing path".into(),
            source: errno.into(),
        }
        .into()),
    }
}

/// Shared by [`open_existing_terminal`] and the fallback path in
/// [`open_or_create_terminal`]: the terminal component is a symlink.
/// Validate it, re-check it hasn't changed since (the "retry one
/// re-resolution" in §4.2), then open through it.
fn open_through_terminal_symlink(
    dir_fd: BorrowedFd<'_>,
    name: &OsStr,
    follow_flags: OFlags,
    hops: &mut u32,
) -> Result<OwnedFd, Error> {
    *hops += 1;
    if *hops > MAX_SYMLINK_HOPS {
        return Err(ErrorImpl::LinkLoop {
            description: format!("{} exceeded the symlink-hop budget", name.to_string_lossy())
                .into(),
        }
        .into());
    }

    let link_fd = lookup_nofollow(dir_fd, name)?;
    let owner = LinkOwner::of(link_fd.as_fd())?;
    if !is_trusted_link_owner(owner.uid, owner.gid) {
        return Err(ErrorImpl::UntrustedLink {
            description: format!("{} is an untrusted terminal symlink", name.to_string_lossy())
                .into(),
        }
        .into());
    }
    drop(link_fd);

    // Re-resolve once more right before following, to catch a swap between
    // the safety check above and the open below (§4.3's "transient race").
    let recheck_fd = lookup_nofollow(dir_fd, name)?;
    let recheck_owner = LinkOwner::of(recheck_fd.as_fd())?;
    drop(recheck_fd);
    if recheck_owner.uid != owner.uid || recheck_owner.gid != owner.gid {
        return Err(ErrorImpl::TransientRace {
            description: format!(
                "{} changed owner between safety check and open",
                name.to_string_lossy()
            )
            .into(),
        }
        .into());
    }

    match openat(dir_fd, name, follow_flags, Mode::empty()) {
        Ok(fd) => Ok(fd),
        Err(Errno::NOENT) => Err(ErrorImpl::NotFound {
            description: format!("{} is a dangling symlink", name.to_string_lossy()).into(),
        }
        .into()),
        // A self-referential (or otherwise cyclic) terminal symlink only
        // shows up here: the kernel's own loop detection rejects this
        // *following* open with ELOOP once it exceeds its internal limit
        // (§4.4 edge cases, §8 S5).
        Err(Errno::LOOP) => Err(ErrorImpl::LinkLoop {
            description: format!("{} is a self-referential symlink", name.to_string_lossy())
                .into(),
        }
        .into()),
        Err(errno) => Err(ErrorImpl::OsError {
            operation: "open through terminal symlink".into(),
            source: errno.into(),
        }
        .into()),
    }
}

/// §4.2 point 3, `OpenOrCreate`.
fn open_or_create_terminal(
    dir_fd: BorrowedFd<'_>,
    name: &OsStr,
    oflags: OpenFlags,
    perms: u32,
    hops: &mut u32,
) -> Result<OwnedFd, Error> {
    // Probe as a plain `OpenExisting` would: with `O_CREAT`/`O_EXCL` left
    // in, the probe open could itself create the file (at mode 0, since
    // neither `open_existing_terminal` nor `open_through_terminal_symlink`
    // know `perms`) or create through a dangling symlink instead of
    // reporting it as missing. Stripping them here keeps "does it already
    // exist" and "create it" as two distinct steps, matching §4.2 point 3.
    let probe_flags = oflags.difference(OpenFlags::O_CREAT | OpenFlags::O_EXCL);
    match open_existing_terminal(dir_fd, name, probe_flags, hops) {
        Ok(fd) => Ok(fd),
        Err(err) if err.kind() == crate::error::ErrorKind::NotFound => {
            create_exclusive(dir_fd, name, oflags, perms, oflags.contains(OpenFlags::O_EXCL))
        }
        Err(err) => Err(err),
    }
}

/// §4.2 point 3, `CreateOnly`.
fn create_only_terminal(
    dir_fd: BorrowedFd<'_>,
    name: &OsStr,
    oflags: OpenFlags,
    perms: u32,
) -> Result<OwnedFd, Error> {
    create_exclusive(dir_fd, name, oflags, perms, true)
}

/// Attempt `O_CREAT|O_EXCL`; on collision, classify what raced in ahead of
/// us and translate it into the error the adapter table promises.
fn create_exclusive(
    dir_fd: BorrowedFd<'_>,
    name: &OsStr,
    oflags: OpenFlags,
    perms: u32,
    caller_wants_excl: bool,
) -> Result<OwnedFd, Error> {
    let create_flags = real_oflags(oflags, libc::O_CREAT | libc::O_EXCL);
    let mode = Mode::from_raw_mode(perms & 0o7777);

    match openat(dir_fd, name, create_flags, mode) {
        Ok(fd) => Ok(fd),
        Err(Errno::EXIST) => classify_create_collision(dir_fd, name, caller_wants_excl),
        Err(errno) => Err(ErrorImpl::OsError {
            operation: "create path exclusively".into(),
            source: errno.into(),
        }
        .into()),
    }
}

fn classify_create_collision(
    dir_fd: BorrowedFd<'_>,
    name: &OsStr,
    caller_wants_excl: bool,
) -> Result<OwnedFd, Error> {
    let lstat = statat(dir_fd, name, AtFlags::SYMLINK_NOFOLLOW);
    let st = match lstat {
        Ok(st) => st,
        // The colliding name vanished again between our EEXIST and this
        // lstat; from the caller's point of view nothing is really there.
        Err(Errno::NOENT) => {
            return Err(ErrorImpl::AlreadyExists {
                description: format!("{} collided transiently", name.to_string_lossy()).into(),
            }
            .into())
        }
        Err(errno) => {
            return Err(ErrorImpl::OsError {
                operation: "stat colliding path".into(),
                source: errno.into(),
            }
            .into())
        }
    };

    if !is_symlink(&st) {
        return Err(ErrorImpl::AlreadyExists {
            description: format!("{} already exists", name.to_string_lossy()).into(),
        }
        .into());
    }

    let owner = LinkOwner { uid: st.st_uid, gid: st.st_gid };
    if !is_trusted_link_owner(owner.uid, owner.gid) {
        return Err(ErrorImpl::UntrustedLink {
            description: format!(
                "{} is an untrusted link switched in during create",
                name.to_string_lossy()
            )
            .into(),
        }
        .into());
    }

    // Safe link switched in ahead of us. Per §4.2: dangling + O_EXCL wanted
    // → AlreadyExists; dangling otherwise → PermissionDenied.
    match statat(dir_fd, name, AtFlags::empty()) {
        Ok(_) => Err(ErrorImpl::AlreadyExists {
            description: format!("{} now points at a real target", name.to_string_lossy()).into(),
        }
        .into()),
        Err(Errno::NOENT) if caller_wants_excl => Err(ErrorImpl::AlreadyExists {
            description: format!("{} is a dangling link", name.to_string_lossy()).into(),
        }
        .into()),
        Err(Errno::NOENT) => Err(ErrorImpl::PermissionDenied {
            description: format!(
                "{} is a dangling link and the open would follow it for write",
                name.to_string_lossy()
            )
            .into(),
        }
        .into()),
        Err(errno) => Err(ErrorImpl::OsError {
            operation: "stat target of colliding link".into(),
            source: errno.into(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::flags::OpenFlags;
    use crate::hook::test_support::SwitchSymlinkHook;
    use crate::hook::NoopObserver;

    use std::fs;
    use std::os::unix::fs::{symlink, PermissionsExt};
    use std::os::unix::io::AsRawFd;

    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn read_all(fd: OwnedFd) -> Vec<u8> {
        use std::io::Read;
        let mut file: fs::File = fd.into();
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn opens_existing_regular_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"BLUE balloon").unwrap();

        let walked = walk(&path, WalkMode::OpenExisting, OpenFlags::O_RDONLY, &NoopObserver)
            .expect("walk should succeed");
        assert_eq!(read_all(walked.fd.unwrap()), b"BLUE balloon");
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing");
        let err = walk(&path, WalkMode::OpenExisting, OpenFlags::O_RDONLY, &NoopObserver)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }

    #[test]
    fn root_owned_symlink_is_followed() {
        // We can't actually chown to root in a test sandbox, so this exercises
        // the self-owned branch of the predicate instead: the link owner is
        // our own euid, which is also trusted.
        let dir = tempdir().unwrap();
        let target = dir.path().join("f");
        fs::write(&target, b"BLUE balloon").unwrap();
        let link = dir.path().join("l");
        symlink(&target, &link).unwrap();

        let walked = walk(&link, WalkMode::OpenExisting, OpenFlags::O_RDONLY, &NoopObserver)
            .expect("self-owned link should be trusted");
        assert_eq!(read_all(walked.fd.unwrap()), b"BLUE balloon");
    }

    #[test]
    fn self_referential_link_is_link_loop() {
        let dir = tempdir().unwrap();
        let link = dir.path().join("f");
        symlink(&link, &link).unwrap();

        let err = walk(&link, WalkMode::OpenExisting, OpenFlags::O_RDONLY, &NoopObserver)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::LinkLoop);
    }

    #[test]
    fn exclusive_create_against_dangling_link_fails_already_exists() {
        let dir = tempdir().unwrap();
        let link = dir.path().join("f");
        symlink(dir.path().join("nonexistent"), &link).unwrap();

        let err = walk(
            &link,
            WalkMode::CreateOnly { perms: 0o600 },
            OpenFlags::O_WRONLY | OpenFlags::O_CREAT | OpenFlags::O_EXCL,
            &NoopObserver,
        )
        .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::AlreadyExists);
    }

    #[test]
    fn open_or_create_makes_a_new_file_with_requested_perms() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("new");

        let walked = walk(
            &path,
            WalkMode::OpenOrCreate { perms: 0o600 },
            OpenFlags::O_WRONLY | OpenFlags::O_CREAT,
            &NoopObserver,
        )
        .expect("should create");
        let fd = walked.fd.unwrap();
        let meta = fs::metadata(&path).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
        drop(fd);
    }

    #[test]
    fn parent_only_does_not_open_terminal_component() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"x").unwrap();

        let walked = walk(&path, WalkMode::ParentOnly, OpenFlags::default(), &NoopObserver)
            .expect("should resolve parent");
        assert!(walked.fd.is_none());
        assert_eq!(walked.name, "f");
        assert!(walked.dir_fd.as_raw_fd() >= 0);
    }

    #[test]
    fn trailing_slash_on_regular_file_is_not_a_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"x").unwrap();
        let with_slash = format!("{}/", path.to_str().unwrap());

        let err = walk(
            Path::new(&with_slash),
            WalkMode::OpenExisting,
            OpenFlags::O_RDONLY,
            &NoopObserver,
        )
        .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotADirectory);
    }

    #[test]
    fn dotdot_ascends_to_parent_directory() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        let path = sub.join("../f");
        fs::write(dir.path().join("f"), b"up one").unwrap();

        let walked = walk(&path, WalkMode::OpenExisting, OpenFlags::O_RDONLY, &NoopObserver)
            .expect("should ascend via ..");
        assert_eq!(read_all(walked.fd.unwrap()), b"up one");
    }

    /// §8 seed scenario S3-shape: the terminal component gets swapped for a
    /// symlink *during* the walk, between the no-follow lookup and the
    /// caller's open. A self-owned replacement is trusted, so the swap
    /// should be followed rather than rejected — this is what distinguishes
    /// an ordinary race from the untrusted-link cases the Walker refuses.
    #[test]
    fn symlink_raced_in_mid_walk_by_self_is_followed() {
        let dir = tempdir().unwrap();
        let real = dir.path().join("real");
        fs::write(&real, b"after swap").unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"before swap").unwrap();

        let hook = SwitchSymlinkHook::new(1, "f", &real);
        let walked = walk(&path, WalkMode::OpenExisting, OpenFlags::O_RDONLY, &hook)
            .expect("a self-owned symlink switched in mid-walk is trusted and followed");
        assert_eq!(read_all(walked.fd.unwrap()), b"after swap");
    }

    /// §8 seed scenario S6: an exclusive create races against a dangling
    /// symlink planted by someone else in the window between our `O_CREAT |
    /// O_EXCL` attempt and nothing having been there a moment before. The
    /// hook plants the link immediately before the single create attempt,
    /// so the EEXIST this produces is handled by the same path a real race
    /// would take, not a pre-seeded fixture.
    #[test]
    fn exclusive_create_raced_by_dangling_link_fails_already_exists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f");

        let hook = SwitchSymlinkHook::new(1, "f", "does-not-exist");
        let err = walk(
            &path,
            WalkMode::CreateOnly { perms: 0o600 },
            OpenFlags::O_WRONLY,
            &hook,
        )
        .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::AlreadyExists);
    }
}
