// SPDX-License-Identifier: MPL-2.0 OR LGPL-3.0-or-later
/*
 * cfsafepath: safe path resolution and mutation for config-management agents
 */

#![forbid(unsafe_code)]

//! The Path Tokenizer (§4.1): splits a textual path into an absolute/relative
//! flag plus an ordered sequence of non-empty components, collapsing
//! redundant separators. `.` components are elided; `..` components are kept
//! so that the Walker can resolve them against the live directory-relative
//! cursor rather than lexically (a purely lexical `..` would be unsound in
//! the presence of symlinks).

use crate::error::{Error, ErrorImpl};

use std::collections::VecDeque;
use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::Path;

/// The result of tokenizing a path (§4.1, §3 "Path").
#[derive(Debug, Clone)]
pub(crate) struct TokenizedPath {
    pub(crate) absolute: bool,
    pub(crate) components: VecDeque<OsString>,
    pub(crate) trailing_slash: bool,
}

/// Split `bytes` on `/`, collapsing consecutive separators and eliding `.`
/// components. `..` components are preserved verbatim.
fn split_components(bytes: &[u8]) -> VecDeque<OsString> {
    bytes
        .split(|&b| b == b'/')
        .filter(|part| !part.is_empty() && *part != b".")
        .map(|part| OsString::from_vec(part.to_vec()))
        .collect()
}

/// Tokenize a path per §4.1.
///
/// # Failures
/// - [`ErrorKind::NotFound`](crate::error::ErrorKind::NotFound) if `path` is
///   the empty string.
pub(crate) fn tokenize(path: &Path) -> Result<TokenizedPath, Error> {
    let bytes = path.as_os_str().as_bytes();
    if bytes.is_empty() {
        return Err(ErrorImpl::NotFound {
            description: "path is empty".into(),
        }
        .into());
    }

    let absolute = bytes[0] == b'/';
    let trailing_slash = bytes[bytes.len() - 1] == b'/';
    let components = split_components(bytes);

    Ok(TokenizedPath {
        absolute,
        components,
        trailing_slash,
    })
}

/// Tokenize a symlink target so its components can be spliced into the
/// remaining walk. Unlike [`tokenize`], an empty target is valid (it just
/// contributes no components) since `readlink(2)` never returns an empty
/// string for a real symlink, but defensive callers may still hand us one.
pub(crate) fn tokenize_link_target(target: &OsStr) -> (bool, VecDeque<OsString>) {
    let bytes = target.as_bytes();
    let absolute = bytes.first() == Some(&b'/');
    (absolute, split_components(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn names(path: &TokenizedPath) -> Vec<&str> {
        path.components
            .iter()
            .map(|c| c.to_str().unwrap())
            .collect()
    }

    #[test]
    fn empty_path_is_not_found() {
        let err = tokenize(Path::new("")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }

    #[test]
    fn root_is_absolute_with_no_components() {
        let tok = tokenize(Path::new("/")).unwrap();
        assert!(tok.absolute);
        assert!(tok.components.is_empty());
        assert!(tok.trailing_slash);
    }

    #[test]
    fn relative_path_basic() {
        let tok = tokenize(Path::new("a/b/c")).unwrap();
        assert!(!tok.absolute);
        assert_eq!(names(&tok), vec!["a", "b", "c"]);
        assert!(!tok.trailing_slash);
    }

    #[test]
    fn absolute_path_basic() {
        let tok = tokenize(Path::new("/a/b/c")).unwrap();
        assert!(tok.absolute);
        assert_eq!(names(&tok), vec!["a", "b", "c"]);
    }

    #[test]
    fn collapses_redundant_separators() {
        let tok = tokenize(Path::new("//a//b///c/")).unwrap();
        assert!(tok.absolute);
        assert_eq!(names(&tok), vec!["a", "b", "c"]);
        assert!(tok.trailing_slash);
    }

    #[test]
    fn elides_dot_but_keeps_dotdot() {
        let tok = tokenize(Path::new("./a/./../b")).unwrap();
        assert_eq!(names(&tok), vec!["a", "..", "b"]);
    }

    #[test]
    fn trailing_slash_detection() {
        assert!(!tokenize(Path::new("a/b")).unwrap().trailing_slash);
        assert!(tokenize(Path::new("a/b/")).unwrap().trailing_slash);
    }
}
