//! Build script for tether-core
//!
//! This script does two things before compilation:
//! - Checks the minimum Rust version (Edition 2021 = Rust 1.56.0+)
//! - Decides whether the subscription registry is compiled in
//!
//! ## Checked vs. unchecked
//!
//! The registry (and every check that depends on it) exists only when the
//! `tether_checked` cfg is set. It is set when:
//!
//! - the target is built with debug assertions (`cargo build`, `cargo test`), or
//! - the `checked` feature is enabled,
//!
//! and the `unchecked` feature is *not* enabled. `unchecked` always wins so a
//! debug build can be benchmarked against the zero-overhead variant.

use std::env;

fn main()
{
    // Check minimum Rust version
    // Edition 2021 requires Rust 1.56.0
    if let Ok(rustc_version) = rustc_version::version() {
        let min_rust_version = rustc_version::Version::new(1, 56, 0);

        if rustc_version < min_rust_version {
            panic!(
                "tether-core requires Rust {} or newer (Edition 2021), found {}",
                min_rust_version, rustc_version
            );
        }
    } else {
        // If we can't get version (e.g., in some build environments), just warn
        println!("cargo:warning=could not verify Rust version");
    }

    println!("cargo:rustc-check-cfg=cfg(tether_checked)");
    println!("cargo:rerun-if-changed=build.rs");

    if registry_enabled() {
        println!("cargo:rustc-cfg=tether_checked");
    }
}

fn registry_enabled() -> bool
{
    // Cargo exposes target cfgs and enabled features to build scripts as env vars.
    // `debug_assertions` here refers to the crate being built, not to this script.
    let debug_assertions = env::var_os("CARGO_CFG_DEBUG_ASSERTIONS").is_some();
    let checked = env::var_os("CARGO_FEATURE_CHECKED").is_some();
    let unchecked = env::var_os("CARGO_FEATURE_UNCHECKED").is_some();

    !unchecked && (debug_assertions || checked)
}
