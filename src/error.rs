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

#![forbid(unsafe_code)]

//! Error types for cfsafepath.

use std::borrow::Cow;
use std::io::Error as IOError;

/// Opaque error type for cfsafepath.
///
/// If you wish to do non-trivial error handling with cfsafepath errors, use
/// [`Error::kind`] to get an [`ErrorKind`] you can handle programmatically.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct Error(#[from] Box<ErrorImpl>);

impl<E: Into<ErrorImpl>> From<E> for Error {
    fn from(err: E) -> Self {
        Self(Box::new(err.into()))
    }
}

impl Error {
    /// Get the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.0.kind()
    }

    /// Shorthand for [`.kind().can_retry()`](ErrorKind::can_retry).
    pub fn can_retry(&self) -> bool {
        self.0.kind().can_retry()
    }

    /// The `errno`-equivalent number for this error, if any, matching the
    /// legacy C surface's expectations.
    pub fn errno(&self) -> Option<i32> {
        self.0.kind().errno()
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> ErrorImpl {
        *self.0
    }
}

#[derive(thiserror::Error, Debug)]
pub(crate) enum ErrorImpl {
    #[error("invalid {name} argument: {description}")]
    InvalidArgument {
        name: Cow<'static, str>,
        description: Cow<'static, str>,
    },

    #[error("{description}")]
    NotFound { description: Cow<'static, str> },

    #[error("{description}")]
    NotADirectory { description: Cow<'static, str> },

    #[error("{description}")]
    AlreadyExists { description: Cow<'static, str> },

    #[error("untrusted symlink: {description}")]
    UntrustedLink { description: Cow<'static, str> },

    #[error("symlink loop: {description}")]
    LinkLoop { description: Cow<'static, str> },

    #[error("transient race: {description}")]
    TransientRace { description: Cow<'static, str> },

    #[error("{description}")]
    PermissionDenied { description: Cow<'static, str> },

    #[error("lock would block")]
    WouldBlock,

    #[error("operation interrupted")]
    Interrupted,

    #[error("{operation} failed")]
    OsError {
        operation: Cow<'static, str>,
        source: IOError,
    },

    #[error("{context}")]
    Wrapped {
        context: Cow<'static, str>,
        source: Box<ErrorImpl>,
    },
}

/// Underlying error class for cfsafepath errors, matching the taxonomy a
/// caller of the original C module would have handled through `errno`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Null path, unrecognized flag combination, or bad mode string.
    InvalidArgument,
    /// Empty path, missing component, or dangling terminal link.
    NotFound,
    /// Non-final component is not a directory, or a trailing slash was used
    /// on a non-directory.
    NotADirectory,
    /// Exclusive create collided with an existing name.
    AlreadyExists,
    /// A symlink failed the safety predicate at some hop of the walk.
    UntrustedLink,
    /// The symlink-hop budget was exhausted.
    LinkLoop,
    /// The Walker observed the terminal component's resolution disagree with
    /// itself between two consecutive lookups (§4.3). Retrying the whole
    /// walk is expected to resolve it.
    TransientRace,
    /// The underlying operation was denied, including the dangling-link
    /// write case described in §4.2.
    PermissionDenied,
    /// A non-blocking lock request could not be satisfied immediately.
    WouldBlock,
    /// A blocking operation was interrupted by a signal more than once.
    Interrupted,
    /// Some other OS-reported failure, preserved verbatim.
    IoError(Option<i32>),
}

impl ErrorImpl {
    pub(crate) fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::NotADirectory { .. } => ErrorKind::NotADirectory,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::UntrustedLink { .. } => ErrorKind::UntrustedLink,
            Self::LinkLoop { .. } => ErrorKind::LinkLoop,
            Self::TransientRace { .. } => ErrorKind::TransientRace,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::WouldBlock => ErrorKind::WouldBlock,
            Self::Interrupted => ErrorKind::Interrupted,
            Self::OsError { source, .. } => ErrorKind::IoError(source.raw_os_error()),
            Self::Wrapped { source, .. } => source.kind(),
        }
    }
}

impl ErrorKind {
    /// Return a C-like errno for the [`ErrorKind`], for the `capi` surface.
    pub(crate) fn errno(&self) -> Option<i32> {
        match self {
            ErrorKind::InvalidArgument => Some(libc::EINVAL),
            ErrorKind::NotFound => Some(libc::ENOENT),
            ErrorKind::NotADirectory => Some(libc::ENOTDIR),
            ErrorKind::AlreadyExists => Some(libc::EEXIST),
            ErrorKind::UntrustedLink => Some(libc::EPERM),
            ErrorKind::LinkLoop => Some(libc::ELOOP),
            ErrorKind::TransientRace => Some(libc::EAGAIN),
            ErrorKind::PermissionDenied => Some(libc::EACCES),
            ErrorKind::WouldBlock => Some(libc::EWOULDBLOCK),
            ErrorKind::Interrupted => Some(libc::EINTR),
            ErrorKind::IoError(errno) => *errno,
        }
    }

    /// Indicates whether an [`ErrorKind`] was associated with a transient
    /// error and that the operation might succeed if retried.
    pub fn can_retry(&self) -> bool {
        matches!(
            self,
            ErrorKind::WouldBlock | ErrorKind::Interrupted | ErrorKind::TransientRace
        ) || matches!(self.errno(), Some(libc::EAGAIN) | Some(libc::EINTR))
    }
}

/// Private trait necessary to attach context without an orphan-trait issue.
pub(crate) trait ErrorExt: Sized {
    fn wrap<S: Into<String>>(self, context: S) -> Self {
        self.with_wrap(|| context.into())
    }

    fn with_wrap<F>(self, context_fn: F) -> Self
    where
        F: FnOnce() -> String;
}

impl ErrorExt for ErrorImpl {
    fn with_wrap<F>(self, context_fn: F) -> Self
    where
        F: FnOnce() -> String,
    {
        Self::Wrapped {
            context: context_fn().into(),
            source: self.into(),
        }
    }
}

impl ErrorExt for Error {
    fn with_wrap<F>(self, context_fn: F) -> Self
    where
        F: FnOnce() -> String,
    {
        self.0.with_wrap(context_fn).into()
    }
}

impl<T, E: ErrorExt> ErrorExt for Result<T, E> {
    fn with_wrap<F>(self, context_fn: F) -> Self
    where
        F: FnOnce() -> String,
    {
        self.map_err(|err| err.with_wrap(context_fn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn error_kind_errno() {
        assert_eq!(ErrorKind::InvalidArgument.errno(), Some(libc::EINVAL));
        assert_eq!(ErrorKind::NotFound.errno(), Some(libc::ENOENT));
        assert_eq!(ErrorKind::LinkLoop.errno(), Some(libc::ELOOP));
        assert_eq!(ErrorKind::AlreadyExists.errno(), Some(libc::EEXIST));
    }

    #[test]
    fn wrapped_error_keeps_inner_kind() {
        let err: Error = ErrorImpl::NotFound {
            description: "missing component".into(),
        }
        .into();
        let wrapped = err.wrap("while walking /a/b/c");
        assert_eq!(wrapped.kind(), ErrorKind::NotFound);
    }
}
