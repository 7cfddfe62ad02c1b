//! # tether-core
//!
//! Tracked non-owning references and small diagnostic helpers for Tether.
//!
//! The heart of this crate is the [`Subscribable`] / [`SubscriptionPointer`]
//! pair: an object embeds a `Subscribable`, and lightweight pointers register
//! with it while they point at it. Destroying an object that is still observed
//! is detected and reported instead of silently leaving dangling pointers.
//!
//! Around that core sit a few independent helpers:
//! - Backtrace capture and parsing ([`backtrace`])
//! - Symbol demangling and type-name shortening ([`demangle`])
//! - Path canonicalisation with structured errors ([`fs`])
//! - Tolerance-aware numeric comparison ([`numcomp`])
//! - Index sorting ([`argsort`])
//!
//! ## Checked and unchecked builds
//!
//! The subscription registry only exists in checked builds: debug builds, or
//! any build with the `checked` feature. Release builds (or the `unchecked`
//! feature) get a zero-sized registry and pointers that behave like plain
//! references with none of the checks. [`CHECKED`] tells you which one you
//! got.
//!
//! ## Why unsafe code is needed
//!
//! A subscription pointer does not borrow its target, so reading through it
//! means dereferencing a raw pointer. Binding requires a pinned target and the
//! registry refuses to let an observed target die quietly, which is what makes
//! that dereference sound in checked builds.

#![allow(unsafe_code)] // Required for the non-owning pointer dereference and `Tracked`

pub mod argsort;
pub mod backtrace;
pub mod demangle;
pub mod error;
pub mod fs;
pub mod numcomp;
pub mod pointer;
pub mod prelude;
mod registry;
pub mod subscribable;
pub mod violation;

// Re-export commonly used types
pub use error::{SubscriptionError, TetherError, TetherResult};
pub use pointer::{make_subscription, SubscriptionPointer};
pub use registry::{CHECKED, UNKNOWN_TYPE_NAME};
pub use subscribable::{Subscribable, Tracked};
pub use violation::{set_violation_action, violation_action, ViolationAction};
