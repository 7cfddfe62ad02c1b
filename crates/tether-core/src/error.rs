//! # Error Types
//!
//! General error handling for tether.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.
//!
//! There are two families of errors here:
//!
//! 1. [`SubscriptionError`]: protocol violations of the subscription
//!    registry. These are programmer errors, never expected runtime
//!    conditions, and are delivered through [`crate::violation::raise`]
//!    rather than returned to callers.
//! 2. [`TetherError`]: ordinary recoverable failures of the helper modules
//!    (realpath, numeric comparison), returned as `Result`s.

use thiserror::Error;

use crate::fs::RealpathError;
use crate::numcomp::NumCompError;

/// A violation of the subscription protocol.
///
/// Every variant indicates a bug in the calling program. There is no valid
/// recovery action once one of these has been observed, which is why they
/// are raised at the point of violation instead of being propagated.
///
/// ## Variants
///
/// 1. **StillUsed**: a `Subscribable` was destroyed (or transferred) while
///    pointers still observe it
/// 2. **UnknownSubscriber**: a token was unsubscribed that the registry does
///    not hold (double unregister or registry corruption)
/// 3. **EmptyDereference**: an empty `SubscriptionPointer` was dereferenced
/// 4. **DanglingTarget**: a pointer was dereferenced after its target was
///    destroyed (checked mode only)
/// 5. **DetachedRegistry**: a pointer was bound to an object whose
///    `Subscribable` is not stored inside the object itself (checked mode
///    only)
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError
{
    /// The object is still observed by live subscription pointers.
    ///
    /// `subscribers` lists the pointer labels from the most recent
    /// subscription to the oldest one.
    #[error(
        "Object of type \"{type_name}\" is still used by {count} other objects, which are (from new to old): {}",
        .subscribers.join(" ")
    )]
    StillUsed
    {
        /// Concrete type name captured on first subscription
        type_name: String,
        /// Number of live subscriptions
        count: usize,
        /// Labels of the live subscriptions, newest first
        subscribers: Vec<String>,
    },

    /// No subscription with this token is known to the registry.
    #[error("No subscriber with identifier \"{label}\" is known to have subscribed to the class {type_name}.")]
    UnknownSubscriber
    {
        /// Label of the token that could not be found
        label: String,
        /// Concrete type name of the registry owner
        type_name: String,
    },

    /// Dereferenced a subscription pointer that is not bound to anything.
    #[error("Dereferenced the empty subscription pointer \"{label}\"")]
    EmptyDereference
    {
        /// Label of the offending pointer
        label: String,
    },

    /// Dereferenced a subscription pointer whose target no longer exists.
    #[error("Subscription pointer \"{label}\" outlived its target of type \"{type_name}\"")]
    DanglingTarget
    {
        /// Label of the offending pointer
        label: String,
        /// Concrete type name of the destroyed target
        type_name: String,
    },

    /// The target's `Subscribable` lives outside the target, so moving the
    /// target would go unnoticed.
    #[error(
        "Subscription pointer \"{label}\" cannot bind to \"{type_name}\": its Subscribable is not stored inside the object"
    )]
    DetachedRegistry
    {
        /// Label of the offending pointer
        label: String,
        /// Concrete type name of the target
        type_name: String,
    },
}

impl SubscriptionError
{
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// ```rust
    /// use tether_core::SubscriptionError;
    ///
    /// let err = SubscriptionError::EmptyDereference { label: "cursor".into() };
    /// assert_eq!(err.as_label(), "empty_dereference");
    /// ```
    #[must_use]
    pub fn as_label(&self) -> &'static str
    {
        match self {
            Self::StillUsed { .. } => "still_used",
            Self::UnknownSubscriber { .. } => "unknown_subscriber",
            Self::EmptyDereference { .. } => "empty_dereference",
            Self::DanglingTarget { .. } => "dangling_target",
            Self::DetachedRegistry { .. } => "detached_registry",
        }
    }
}

/// Main error type for the recoverable helper operations
#[derive(Error, Debug)]
pub enum TetherError
{
    /// Path canonicalisation failed
    #[error(transparent)]
    Realpath(#[from] RealpathError),

    /// A numeric comparison configured to fail loudly did not match
    #[error(transparent)]
    NumComp(#[from] NumCompError),

    /// I/O error (for file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for `Result<T, TetherError>`
///
/// ```rust
/// use tether_core::error::TetherResult;
/// fn foo() -> TetherResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type TetherResult<T> = std::result::Result<T, TetherError>;
