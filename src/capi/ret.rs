// SPDX-License-Identifier: MPL-2.0 OR LGPL-3.0-or-later
/*
 * cfsafepath: safe path resolution and mutation for config-management agents
 */

//! Conversion from this crate's `Result<T, Error>` into the legacy
//! `0 | -1 | -2` sentinel returns the C agent code this core replaces
//! expects, storing the error (if any) in the thread-local slot a C
//! caller retrieves with `cfsafepath_last_errno`.

use crate::capi::error as capi_error;
use crate::error::Error;

use std::os::unix::io::{IntoRawFd, OwnedFd};

use libc::c_int;

pub(super) type CReturn = c_int;

pub(super) trait IntoCReturn {
    fn into_c_return(self) -> CReturn;
}

impl IntoCReturn for () {
    fn into_c_return(self) -> CReturn {
        0
    }
}

impl IntoCReturn for CReturn {
    fn into_c_return(self) -> CReturn {
        self
    }
}

impl IntoCReturn for bool {
    fn into_c_return(self) -> CReturn {
        self as CReturn
    }
}

impl IntoCReturn for OwnedFd {
    fn into_c_return(self) -> CReturn {
        self.into_raw_fd()
    }
}

impl<V> IntoCReturn for Result<V, Error>
where
    V: IntoCReturn,
{
    /// Every public `extern "C"` entry point returns `-1` on failure (§6);
    /// the caller recovers the specific reason with
    /// [`cfsafepath_last_errno`](super::error::cfsafepath_last_errno).
    fn into_c_return(self) -> CReturn {
        match self {
            Ok(ok) => ok.into_c_return(),
            Err(err) => {
                capi_error::set_last_error(err);
                -1
            }
        }
    }
}
