// SPDX-License-Identifier: MPL-2.0 OR LGPL-3.0-or-later
/*
 * cfsafepath: safe path resolution and mutation for config-management agents
 */

#![forbid(unsafe_code)]

//! The symlink safety predicate (§3 "Symlink policy decision", §9 "Symlink
//! safety predicate").
//!
//! Pulled out into a single pure function (as §9 asks for) so that the trust
//! policy is both testable in isolation and impossible to accidentally apply
//! inconsistently between the Walker's intermediate-component handling and
//! its terminal-component handling.

use once_cell::sync::Lazy;
use rustix::process::{getegid, geteuid};

/// A link is trustworthy iff its owning uid is root or us, *and* its owning
/// gid is root or us. This matches the trust model described in §3: "a link
/// placed by us or by root is trustworthy; a link placed by anyone else is
/// not."
pub(crate) fn is_trusted(owner_uid: u32, owner_gid: u32, my_euid: u32, my_egid: u32) -> bool {
    let uid_ok = owner_uid == 0 || owner_uid == my_euid;
    let gid_ok = owner_gid == 0 || owner_gid == my_egid;
    uid_ok && gid_ok
}

/// The process's effective uid/gid, cached for the life of the process: it
/// cannot meaningfully change underneath a running thread in a way that
/// would matter for this check (and re-fetching on every symlink hop of
/// every walk would be wasteful).
static EFFECTIVE_IDS: Lazy<(u32, u32)> = Lazy::new(|| {
    (geteuid().as_raw(), getegid().as_raw())
});

/// Check a candidate symlink owner against the process's own identity.
pub(crate) fn is_trusted_link_owner(owner_uid: u32, owner_gid: u32) -> bool {
    let (euid, egid) = *EFFECTIVE_IDS;
    is_trusted(owner_uid, owner_gid, euid, egid)
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn root_owned_link_is_always_trusted() {
        assert!(is_trusted(0, 0, 1000, 1000));
        assert!(is_trusted(0, 1000, 1000, 1000));
        assert!(is_trusted(1000, 0, 1000, 1000));
    }

    #[test]
    fn self_owned_link_is_trusted() {
        assert!(is_trusted(1000, 1000, 1000, 1000));
    }

    #[test]
    fn other_owned_link_is_untrusted() {
        assert!(!is_trusted(1001, 1000, 1000, 1000));
        assert!(!is_trusted(1000, 1001, 1000, 1000));
        assert_eq!(is_trusted(1001, 1001, 1000, 1000), false);
    }
}
