//! # Subscription Pointer
//!
//! A typed, non-owning handle that registers itself with the object it points
//! at.
//!
//! ```rust
//! use std::pin::pin;
//!
//! use tether_core::{Subscribable, SubscriptionPointer, CHECKED};
//!
//! let target = pin!(Subscribable::new());
//! let first = SubscriptionPointer::bound("loanA", target.as_ref());
//! let mut second = SubscriptionPointer::bound("loanB", target.as_ref());
//!
//! if CHECKED {
//!     assert_eq!(target.subscriber_labels(), vec!["loanB", "loanA"]);
//! }
//!
//! second.reset();
//! assert!(second.is_empty());
//! assert!(first.is_bound());
//! ```
//!
//! ## Binding
//!
//! Pointers bind to `Pin<&T>`. Pinning guarantees the target stays at its
//! address until it is dropped, and in checked mode dropping it while a
//! pointer is still bound raises [`SubscriptionError::StillUsed`]. Together
//! that keeps dereferencing sound for as long as the pointer is bound.
//!
//! In unchecked mode nothing is recorded: a pointer that outlives its target
//! dangles silently. That is the price of the zero-overhead variant.
//!
//! ## Copies and moves
//!
//! - `clone()` mints a new token with the same label and registers it at the
//!   same target: two independent registry entries.
//! - Moving a pointer is a plain Rust move. The moved-to pointer *is* the
//!   registry entry the moved-from pointer used to be; the registry is not
//!   touched.
//! - Assigning over a bound pointer drops it first, which unregisters it.

use std::borrow::Cow;
use std::fmt;
use std::ops::Deref;
use std::pin::Pin;
use std::ptr::NonNull;

use crate::error::SubscriptionError;
use crate::registry::{ActiveRegistry, Lease, Registry, Token};
use crate::subscribable::{Subscribable, Tracked};
use crate::violation;

/// Where a bound pointer points, and its lease on the target's registry.
struct Binding<T: ?Sized>
{
    target: NonNull<T>,
    lease: Lease,
}

/// Non-owning pointer that is known to the object it points at.
pub struct SubscriptionPointer<T: ?Sized + Tracked>
{
    binding: Option<Binding<T>>,
    token: Token,
}

impl<T: ?Sized + Tracked> SubscriptionPointer<T>
{
    /// Create an empty pointer whose subscriptions will carry `label`.
    ///
    /// A `&'static str` label is stored as is; only owned labels allocate.
    #[must_use]
    pub fn new(label: impl Into<Cow<'static, str>>) -> Self
    {
        Self {
            binding: None,
            token: ActiveRegistry::mint(label),
        }
    }

    /// Create a pointer bound to `target`.
    #[must_use]
    pub fn bound(label: impl Into<Cow<'static, str>>, target: Pin<&T>) -> Self
    {
        let mut pointer = Self::new(label);
        pointer.attach(target.get_ref());
        pointer
    }

    /// Unsubscribe from the current target (if any), then subscribe to
    /// `target` with the same token.
    pub fn reset_to(&mut self, target: Pin<&T>)
    {
        self.detach();
        self.attach(target.get_ref());
    }

    /// Unsubscribe from the current target (if any) and become empty.
    pub fn reset(&mut self)
    {
        self.detach();
    }

    /// Label given at construction.
    #[must_use]
    pub fn label(&self) -> &str
    {
        ActiveRegistry::label(&self.token)
    }

    /// `true` if bound to a target.
    #[must_use]
    pub fn is_bound(&self) -> bool
    {
        self.binding.is_some()
    }

    /// `true` if not bound to anything.
    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.binding.is_none()
    }

    /// Borrow the target, or `None` if the pointer is empty.
    ///
    /// In checked mode, reaching a target that has already been destroyed
    /// raises [`SubscriptionError::DanglingTarget`].
    #[must_use]
    pub fn get(&self) -> Option<&T>
    {
        let binding = self.binding.as_ref()?;
        if let Err(err) = ActiveRegistry::check_access(&binding.lease, &self.token) {
            violation::raise(err);
        }

        // SAFETY: the target was pinned when we bound to it, so it has not
        // moved, and its registry still lists our token, so it has not been
        // dropped without raising.
        Some(unsafe { binding.target.as_ref() })
    }

    /// Create a pointer to a different view of the same target, for example
    /// a trait object.
    ///
    /// The new pointer gets a fresh token with the same label and registers
    /// at the registry of the projected view.
    ///
    /// ```rust
    /// use std::pin::{pin, Pin};
    ///
    /// use tether_core::{Subscribable, SubscriptionPointer, Tracked};
    ///
    /// trait Shape: Tracked
    /// {
    ///     fn area(&self) -> f64;
    /// }
    ///
    /// #[derive(Default)]
    /// struct Square
    /// {
    ///     side: f64,
    ///     subscribable: Subscribable,
    /// }
    ///
    /// // SAFETY: the subscribable is a plain field and `Square` is not `Unpin`.
    /// unsafe impl Tracked for Square
    /// {
    ///     fn subscribable(&self) -> &Subscribable
    ///     {
    ///         &self.subscribable
    ///     }
    /// }
    ///
    /// impl Shape for Square
    /// {
    ///     fn area(&self) -> f64
    ///     {
    ///         self.side * self.side
    ///     }
    /// }
    ///
    /// fn as_shape(square: Pin<&Square>) -> Pin<&(dyn Shape + 'static)>
    /// {
    ///     square
    /// }
    ///
    /// let square = pin!(Square { side: 2.0, ..Square::default() });
    /// let concrete = SubscriptionPointer::bound("square", square.as_ref());
    /// let shape: SubscriptionPointer<dyn Shape> = concrete.convert(as_shape);
    /// assert_eq!(shape.area(), 4.0);
    /// ```
    #[must_use]
    pub fn convert<U, F>(&self, project: F) -> SubscriptionPointer<U>
    where
        U: ?Sized + Tracked,
        F: for<'a> FnOnce(Pin<&'a T>) -> Pin<&'a U>,
    {
        let mut converted = SubscriptionPointer::<U> {
            binding: None,
            token: ActiveRegistry::fork(&self.token),
        };
        if let Some(target) = self.get() {
            // SAFETY: we only ever bind to pinned targets.
            let pinned = unsafe { Pin::new_unchecked(target) };
            converted.attach(project(pinned).get_ref());
        }
        converted
    }

    /// Address of the target, without its metadata.
    fn address(&self) -> Option<*const ()>
    {
        self.binding.as_ref().map(|binding| binding.target.as_ptr().cast_const().cast::<()>())
    }

    /// Subscribe to `target`. Callers guarantee `target` is pinned.
    fn attach(&mut self, target: &T)
    {
        debug_assert!(self.binding.is_none(), "attach on a bound pointer");

        let registry = target.subscribable();
        if crate::CHECKED && !embeds(target, registry) {
            violation::raise(SubscriptionError::DetachedRegistry {
                label: self.label().to_string(),
                type_name: target.type_label().to_string(),
            });
        }

        let lease = registry.subscribe(&self.token, target.type_label());
        self.binding = Some(Binding {
            target: NonNull::from(target),
            lease,
        });
    }

    fn detach(&mut self)
    {
        if let Some(binding) = self.binding.take() {
            if let Err(err) = ActiveRegistry::unsubscribe(binding.lease, &self.token) {
                violation::raise(err);
            }
        }
    }
}

/// Whether `registry` lies within the bytes of `target`.
fn embeds<T: ?Sized>(target: &T, registry: &Subscribable) -> bool
{
    let start = std::ptr::from_ref(target).cast::<u8>() as usize;
    let end = start + std::mem::size_of_val(target);
    let at = std::ptr::from_ref(registry) as usize;
    start <= at && at + std::mem::size_of::<Subscribable>() <= end
}

/// Convenience wrapper for making subscription pointers.
///
/// The mechanism protects against destroying the target while the pointer
/// still observes it. It does not protect against changes made to the target
/// through other paths; those are of course visible through the pointer.
#[must_use]
pub fn make_subscription<T: ?Sized + Tracked>(
    target: Pin<&T>,
    label: impl Into<Cow<'static, str>>,
) -> SubscriptionPointer<T>
{
    SubscriptionPointer::bound(label, target)
}

impl<T: ?Sized + Tracked> Deref for SubscriptionPointer<T>
{
    type Target = T;

    /// Borrow the target.
    ///
    /// Dereferencing an empty pointer raises
    /// [`SubscriptionError::EmptyDereference`].
    fn deref(&self) -> &T
    {
        match self.get() {
            Some(target) => target,
            None => violation::raise(SubscriptionError::EmptyDereference {
                label: self.label().to_string(),
            }),
        }
    }
}

impl<T: ?Sized + Tracked> Clone for SubscriptionPointer<T>
{
    fn clone(&self) -> Self
    {
        let mut copy = Self {
            binding: None,
            token: ActiveRegistry::fork(&self.token),
        };
        if let Some(target) = self.get() {
            copy.attach(target);
        }
        copy
    }

    fn clone_from(&mut self, source: &Self)
    {
        self.detach();
        self.token = ActiveRegistry::fork(&source.token);
        if let Some(target) = source.get() {
            self.attach(target);
        }
    }
}

impl<T: ?Sized + Tracked> Drop for SubscriptionPointer<T>
{
    fn drop(&mut self)
    {
        self.detach();
    }
}

impl<T: ?Sized + Tracked> PartialEq for SubscriptionPointer<T>
{
    /// Equal iff both point at the same address, or both are empty.
    fn eq(&self, other: &Self) -> bool
    {
        self.address() == other.address()
    }
}

impl<T: ?Sized + Tracked> Eq for SubscriptionPointer<T> {}

impl<T: ?Sized + Tracked> fmt::Debug for SubscriptionPointer<T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("SubscriptionPointer")
            .field("label", &self.label())
            .field("target", &self.address())
            .finish()
    }
}
