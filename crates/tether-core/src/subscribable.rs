//! # Subscribable
//!
//! The capability that lets an object be observed by
//! [`SubscriptionPointer`](crate::SubscriptionPointer)s.
//!
//! A type opts in by embedding a [`Subscribable`] field and implementing
//! [`Tracked`] to expose it:
//!
//! ```rust
//! use tether_core::{Subscribable, Tracked};
//!
//! #[derive(Default)]
//! struct Account
//! {
//!     balance: i64,
//!     subscribable: Subscribable,
//! }
//!
//! // SAFETY: the subscribable is a plain field and `Account` is not `Unpin`.
//! unsafe impl Tracked for Account
//! {
//!     fn subscribable(&self) -> &Subscribable
//!     {
//!         &self.subscribable
//!     }
//! }
//! ```
//!
//! ## Checked mode
//!
//! With the registry compiled in (see [`crate::CHECKED`]) the subscribable
//! records every pointer bound to it, newest first. Dropping it while that
//! list is non-empty raises [`SubscriptionError::StillUsed`] through
//! [`crate::violation::raise`]: the pointers would dangle the moment the
//! memory is released, so execution must not continue.
//!
//! ## Unchecked mode
//!
//! The registry is a zero-sized type. `Subscribable` takes no space, counts
//! are always zero and nothing is ever raised.
//!
//! ## Moves
//!
//! `Subscribable` is `!Unpin`, so every type embedding it is `!Unpin` too.
//! Pointers only bind to pinned targets, which means a target with live
//! observers cannot be moved by safe code. [`Subscribable::transfer`] is the
//! explicit equivalent of a move constructor and checks the same invariant.
//!
//! An embedding type cannot be pinned in place without a promise that it
//! stays put:
//!
//! ```compile_fail,E0277
//! use std::pin::Pin;
//!
//! use tether_core::{Subscribable, Tracked};
//!
//! #[derive(Default)]
//! struct Account
//! {
//!     subscribable: Subscribable,
//! }
//!
//! unsafe impl Tracked for Account
//! {
//!     fn subscribable(&self) -> &Subscribable
//!     {
//!         &self.subscribable
//!     }
//! }
//!
//! let account = Account::default();
//! let _pinned = Pin::new(&account);
//! ```

use std::fmt;
use std::marker::{PhantomData, PhantomPinned};
use std::pin::Pin;

use crate::error::SubscriptionError;
use crate::registry::{ActiveRegistry, Lease, Registry, Token};
use crate::violation;

/// Implemented by every type a [`SubscriptionPointer`](crate::SubscriptionPointer)
/// can point at.
///
/// Trait objects work too: if `trait Shape: Tracked`, then `dyn Shape` is
/// `Tracked` and [`Tracked::type_label`] still reports the concrete type.
///
/// ## Safety
///
/// Pointers dereference their target for as long as its registry lists them,
/// so the registry has to go wherever the object goes. Implementors promise
/// that:
///
/// - [`Tracked::subscribable`] returns a `Subscribable` stored by value
///   inside `self` (a field, or a field of a field), never one behind a
///   `Box`, `Rc` or reference, and
/// - `Self` does not implement `Unpin`. Embedding a `Subscribable` makes the
///   type `!Unpin` automatically; do not add `impl Unpin` by hand.
///
/// The first rule is also verified when a pointer binds in checked builds.
pub unsafe trait Tracked
{
    /// The registry embedded in this object.
    fn subscribable(&self) -> &Subscribable;

    /// Display name of the concrete type, used in diagnostics.
    fn type_label(&self) -> &'static str
    {
        std::any::type_name::<Self>()
    }
}

/// Registry of the subscription pointers currently observing an object.
///
/// Neither `Send` nor `Sync`: all bookkeeping is single-threaded.
pub struct Subscribable
{
    registry: ActiveRegistry,
    _pinned: PhantomPinned,
    _local: PhantomData<*const ()>,
}

impl Subscribable
{
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self
    {
        Self {
            registry: ActiveRegistry::default(),
            _pinned: PhantomPinned,
            _local: PhantomData,
        }
    }

    /// Number of pointers currently bound to this object.
    ///
    /// Always zero in unchecked mode.
    #[must_use]
    pub fn subscriber_count(&self) -> usize
    {
        self.registry.subscriber_count()
    }

    /// Labels of the pointers currently bound to this object, from the most
    /// recent subscription to the oldest one.
    ///
    /// Always empty in unchecked mode.
    #[must_use]
    pub fn subscriber_labels(&self) -> Vec<String>
    {
        self.registry.subscriber_labels()
    }

    /// Concrete type name of the object, captured on the first subscription.
    ///
    /// `"(unknown)"` before that, and always in unchecked mode.
    #[must_use]
    pub fn type_name(&self) -> &'static str
    {
        self.registry.type_name()
    }

    /// Check that no pointer observes this object.
    ///
    /// This is the check the destructor runs, without destroying anything.
    ///
    /// ## Errors
    ///
    /// [`SubscriptionError::StillUsed`] with the type name, the number of live
    /// subscriptions and their labels (newest first).
    pub fn check_released(&self) -> Result<(), SubscriptionError>
    {
        self.registry.check_released()
    }

    /// Move-construct a new registry out of this one.
    ///
    /// Pointers hold addresses, not values, so relocating an object that is
    /// still observed would leave them dangling. In checked mode that raises
    /// [`SubscriptionError::StillUsed`]. The returned registry is always
    /// empty; this one keeps whatever it had, and stays where it is.
    #[must_use]
    pub fn transfer(self: Pin<&mut Self>) -> Self
    {
        if let Err(err) = self.registry.check_released() {
            violation::raise(err);
        }
        Self::new()
    }

    pub(crate) fn subscribe(&self, token: &Token, type_name: &'static str) -> Lease
    {
        self.registry.subscribe(token, type_name)
    }
}

impl Default for Subscribable
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl Clone for Subscribable
{
    /// A copy is a new object at a new address: it starts without observers.
    fn clone(&self) -> Self
    {
        Self::new()
    }

    /// Pointers to `self` stay valid across assignment, so the registry is
    /// left alone.
    fn clone_from(&mut self, _source: &Self) {}
}

impl Drop for Subscribable
{
    fn drop(&mut self)
    {
        if let Err(err) = self.registry.release() {
            violation::raise(err);
        }
    }
}

impl fmt::Debug for Subscribable
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("Subscribable")
            .field("type_name", &self.type_name())
            .field("subscribers", &self.subscriber_labels())
            .finish()
    }
}

// SAFETY: a subscribable is its own registry and is `!Unpin`.
unsafe impl Tracked for Subscribable
{
    fn subscribable(&self) -> &Subscribable
    {
        self
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::registry::{CHECKED, UNKNOWN_TYPE_NAME};

    #[test]
    fn test_new_is_empty()
    {
        let subscribable = Subscribable::new();
        assert_eq!(subscribable.subscriber_count(), 0);
        assert!(subscribable.subscriber_labels().is_empty());
        assert_eq!(subscribable.type_name(), UNKNOWN_TYPE_NAME);
        assert!(subscribable.check_released().is_ok());
    }

    #[test]
    fn test_subscribe_captures_type_name()
    {
        let subscribable = Subscribable::new();
        let token = ActiveRegistry::mint("watcher");
        let lease = subscribable.subscribe(&token, "bank::Account");

        if CHECKED {
            assert_eq!(subscribable.type_name(), "bank::Account");
            assert_eq!(subscribable.subscriber_labels(), vec!["watcher"]);
        } else {
            assert_eq!(subscribable.type_name(), UNKNOWN_TYPE_NAME);
        }

        ActiveRegistry::unsubscribe(lease, &token).unwrap();
        assert_eq!(subscribable.subscriber_count(), 0);
    }

    #[test]
    fn test_clone_from_keeps_registry()
    {
        let mut target = Subscribable::new();
        let token = ActiveRegistry::mint("kept");
        let lease = target.subscribe(&token, "T");

        let source = Subscribable::new();
        target.clone_from(&source);
        let expected = usize::from(CHECKED);
        assert_eq!(target.subscriber_count(), expected);

        ActiveRegistry::unsubscribe(lease, &token).unwrap();
    }

    #[test]
    fn test_transfer_without_observers()
    {
        let source = std::pin::pin!(Subscribable::new());
        let moved = source.transfer();
        assert_eq!(moved.subscriber_count(), 0);
    }

    #[test]
    fn test_zero_sized_when_unchecked()
    {
        if !CHECKED {
            assert_eq!(std::mem::size_of::<Subscribable>(), 0);
        }
    }
}
