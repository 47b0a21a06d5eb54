// SPDX-License-Identifier: MPL-2.0 OR LGPL-3.0-or-later
/*
 * cfsafepath: safe path resolution and mutation for config-management agents
 */

use std::env;

fn main() {
    // Add DT_SONAME to our cdylibs. We can't check the crate-type here
    // directly, but we can at least avoid needless warnings for "cargo build"
    // by only emitting this when the capi feature is enabled.
    if cfg!(feature = "capi") {
        let name = "cfsafepath";
        let major = env::var("CARGO_PKG_VERSION_MAJOR").unwrap();
        println!("cargo:rustc-cdylib-link-arg=-Wl,-soname,lib{name}.so.{major}");
    }
}
