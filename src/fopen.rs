// SPDX-License-Identifier: MPL-2.0 OR LGPL-3.0-or-later
/*
 * cfsafepath: safe path resolution and mutation for config-management agents
 */

#![forbid(unsafe_code)]

//! `safe_fopen`/`safe_fopen_create_perms` (§6): a thin buffered-stream
//! wrapper over the safe-open path, translating the standard C library's
//! six `fopen(3)` mode strings into the flag combinations they've always
//! meant.

use crate::error::{Error, ErrorImpl};
use crate::flags::OpenFlags;
use crate::hook::NoopObserver;
use crate::ops;
use crate::perms::{mask_mode, PERMS_DEFAULT};
use crate::retry;

use std::fs::File;
use std::path::Path;

fn mode_string_to_flags(mode_string: &str) -> Result<OpenFlags, Error> {
    let flags = match mode_string {
        "r" => OpenFlags::O_RDONLY,
        "r+" => OpenFlags::O_RDWR,
        "w" => OpenFlags::O_WRONLY | OpenFlags::O_CREAT | OpenFlags::O_TRUNC,
        "w+" => OpenFlags::O_RDWR | OpenFlags::O_CREAT | OpenFlags::O_TRUNC,
        "a" => OpenFlags::O_WRONLY | OpenFlags::O_CREAT | OpenFlags::O_APPEND,
        "a+" => OpenFlags::O_RDWR | OpenFlags::O_CREAT | OpenFlags::O_APPEND,
        other => {
            return Err(ErrorImpl::InvalidArgument {
                name: "mode_string".into(),
                description: format!("unrecognized fopen mode {other:?}").into(),
            }
            .into())
        }
    };
    Ok(flags)
}

/// `safe_fopen(path, mode_string)`.
pub(crate) fn safe_fopen(path: &Path, mode_string: &str) -> Result<File, Error> {
    safe_fopen_create_perms(path, mode_string, PERMS_DEFAULT)
}

/// `safe_fopen_create_perms(path, mode_string, perms)`.
pub(crate) fn safe_fopen_create_perms(
    path: &Path,
    mode_string: &str,
    perms: u32,
) -> Result<File, Error> {
    let flags = mode_string_to_flags(mode_string)?;
    let walk_mode = ops::walk_mode_for(flags, mask_mode(perms));
    let fd = retry::open(path, walk_mode, flags, &NoopObserver)?;
    Ok(File::from(fd))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::{Read, Write};

    use tempfile::tempdir;

    #[test]
    fn write_then_append_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f");

        let mut w = safe_fopen(&path, "w").unwrap();
        w.write_all(b"BLUE").unwrap();
        drop(w);

        let mut a = safe_fopen(&path, "a").unwrap();
        a.write_all(b" balloon").unwrap();
        drop(a);

        let mut r = safe_fopen(&path, "r").unwrap();
        let mut buf = String::new();
        r.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "BLUE balloon");
    }

    #[test]
    fn unrecognized_mode_string_is_invalid_argument() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f");
        let err = safe_fopen(&path, "rw").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidArgument);
    }

    macro_rules! mode_flags_test {
        ($name:ident, $mode:literal, $expected:expr) => {
            paste::paste! {
                #[test]
                fn [<mode_string_ $name _maps_to_expected_flags>]() {
                    assert_eq!(mode_string_to_flags($mode).unwrap(), $expected);
                }
            }
        };
    }

    mode_flags_test!(r, "r", OpenFlags::O_RDONLY);
    mode_flags_test!(r_plus, "r+", OpenFlags::O_RDWR);
    mode_flags_test!(
        w,
        "w",
        OpenFlags::O_WRONLY | OpenFlags::O_CREAT | OpenFlags::O_TRUNC
    );
    mode_flags_test!(
        w_plus,
        "w+",
        OpenFlags::O_RDWR | OpenFlags::O_CREAT | OpenFlags::O_TRUNC
    );
    mode_flags_test!(
        a,
        "a",
        OpenFlags::O_WRONLY | OpenFlags::O_CREAT | OpenFlags::O_APPEND
    );
    mode_flags_test!(
        a_plus,
        "a+",
        OpenFlags::O_RDWR | OpenFlags::O_CREAT | OpenFlags::O_APPEND
    );
}
