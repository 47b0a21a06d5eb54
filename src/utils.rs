// SPDX-License-Identifier: MPL-2.0 OR LGPL-3.0-or-later
/*
 * cfsafepath: safe path resolution and mutation for config-management agents
 */

#![forbid(unsafe_code)]

mod fd;
pub(crate) use fd::*;
