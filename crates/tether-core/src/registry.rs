//! # Subscription Registry
//!
//! The bookkeeping behind [`Subscribable`](crate::Subscribable) and
//! [`SubscriptionPointer`](crate::SubscriptionPointer).
//!
//! Two interchangeable strategies implement the same [`Registry`] interface:
//!
//! - [`VerifiedRegistry`]: keeps an ordered list of live tokens and performs
//!   every check (still-used at destruction, unknown subscriber, access after
//!   destruction).
//! - [`FastRegistry`]: a zero-sized stand-in. Tokens carry only their label
//!   (borrowed, not copied, when it is a `&'static str`), nothing is recorded
//!   and nothing can fail.
//!
//! [`ActiveRegistry`] selects one of them from the `tether_checked` cfg set by
//! the build script. Both are always compiled so both stay tested.
//!
//! ## Layout
//!
//! The verified registry keeps its state in an `Rc` shared between the
//! subscribable and every bound pointer (the pointer's *lease*). Unsubscribing
//! goes through the lease, so a pointer never has to read its target's memory
//! to unregister, and the registry can tell a pointer that its target is gone.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use crate::error::SubscriptionError;

/// Type name reported before the first subscription has captured the real one.
pub const UNKNOWN_TYPE_NAME: &str = "(unknown)";

/// Registries are expected to be small; this many entries live inline.
const INLINE_SUBSCRIBERS: usize = 4;

/// Whether the subscription registry is compiled in.
///
/// `true` in debug builds and with the `checked` feature, `false` in release
/// builds and with the `unchecked` feature.
pub const CHECKED: bool = cfg!(tether_checked);

/// Strategy selected for this build.
#[cfg(tether_checked)]
pub(crate) type ActiveRegistry = VerifiedRegistry;
/// Strategy selected for this build.
#[cfg(not(tether_checked))]
pub(crate) type ActiveRegistry = FastRegistry;

/// Token type of the active strategy.
pub(crate) type Token = <ActiveRegistry as Registry>::Token;
/// Lease type of the active strategy.
pub(crate) type Lease = <ActiveRegistry as Registry>::Lease;

/// Shared interface of the registry strategies.
///
/// A `Token` is owned by exactly one pointer. A `Lease` is what a pointer
/// holds while bound; it is consumed on unsubscribe.
pub(crate) trait Registry: Default
{
    type Token;
    type Lease;

    /// Mint a fresh token carrying `label`.
    fn mint(label: impl Into<Cow<'static, str>>) -> Self::Token;

    /// Mint a fresh token with the same label as `token` but a new identity.
    fn fork(token: &Self::Token) -> Self::Token;

    /// Human-readable label of a token.
    fn label(token: &Self::Token) -> &str;

    /// Register `token` as the newest subscriber.
    fn subscribe(&self, token: &Self::Token, type_name: &'static str) -> Self::Lease;

    /// Remove `token` from the registry behind `lease`, matched by identity.
    fn unsubscribe(lease: Self::Lease, token: &Self::Token) -> Result<(), SubscriptionError>;

    /// Verify that the object behind `lease` still exists.
    fn check_access(lease: &Self::Lease, token: &Self::Token) -> Result<(), SubscriptionError>;

    fn subscriber_count(&self) -> usize;

    /// Labels of the live tokens, newest first.
    fn subscriber_labels(&self) -> Vec<String>;

    fn type_name(&self) -> &'static str;

    /// Fail with `StillUsed` if any token is registered.
    fn check_released(&self) -> Result<(), SubscriptionError>;

    /// Like [`Registry::check_released`], and additionally mark the owner as
    /// destroyed. Called exactly once, from the owner's destructor.
    fn release(&self) -> Result<(), SubscriptionError>;
}

/// Unique identity of a subscription token.
///
/// Issued from a process-wide counter, so two tokens with the same label are
/// still told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct TokenId(u64);

impl TokenId
{
    #[cfg_attr(not(tether_checked), allow(dead_code))]
    fn next() -> Self
    {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw numeric representation (useful for logging / errors).
    #[must_use]
    pub(crate) const fn raw(self) -> u64
    {
        self.0
    }
}

impl fmt::Display for TokenId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "#{}", self.raw())
    }
}

/// Token of the verified strategy.
#[cfg_attr(not(tether_checked), allow(dead_code))]
#[derive(Debug)]
pub(crate) struct TokenCell
{
    id: TokenId,
    label: Cow<'static, str>,
}

#[cfg_attr(not(tether_checked), allow(dead_code))]
#[derive(Debug)]
pub(crate) struct RegistryState
{
    entries: RefCell<SmallVec<[Rc<TokenCell>; INLINE_SUBSCRIBERS]>>,
    type_name: Cell<&'static str>,
    released: Cell<bool>,
}

#[cfg_attr(not(tether_checked), allow(dead_code))]
impl RegistryState
{
    fn labels(&self) -> Vec<String>
    {
        self.entries.borrow().iter().map(|token| token.label.to_string()).collect()
    }
}

/// Registry that records every subscription and checks every transition.
#[cfg_attr(not(tether_checked), allow(dead_code))]
#[derive(Debug)]
pub(crate) struct VerifiedRegistry
{
    state: Rc<RegistryState>,
}

impl Default for VerifiedRegistry
{
    fn default() -> Self
    {
        Self {
            state: Rc::new(RegistryState {
                entries: RefCell::new(SmallVec::new()),
                type_name: Cell::new(UNKNOWN_TYPE_NAME),
                released: Cell::new(false),
            }),
        }
    }
}

impl Registry for VerifiedRegistry
{
    type Token = Rc<TokenCell>;
    type Lease = Rc<RegistryState>;

    fn mint(label: impl Into<Cow<'static, str>>) -> Self::Token
    {
        Rc::new(TokenCell {
            id: TokenId::next(),
            label: label.into(),
        })
    }

    fn fork(token: &Self::Token) -> Self::Token
    {
        Self::mint(token.label.clone())
    }

    fn label(token: &Self::Token) -> &str
    {
        &token.label
    }

    fn subscribe(&self, token: &Self::Token, type_name: &'static str) -> Self::Lease
    {
        let state = &self.state;
        if state.type_name.get() == UNKNOWN_TYPE_NAME {
            tracing::debug!(type_name, "captured subscribable type name");
            state.type_name.set(type_name);
        }

        let mut entries = state.entries.borrow_mut();
        entries.insert(0, Rc::clone(token));
        tracing::trace!(
            label = %token.label,
            token = %token.id,
            type_name = state.type_name.get(),
            count = entries.len(),
            "subscribed"
        );

        Rc::clone(state)
    }

    fn unsubscribe(lease: Self::Lease, token: &Self::Token) -> Result<(), SubscriptionError>
    {
        let mut entries = lease.entries.borrow_mut();
        let Some(position) = entries.iter().position(|entry| entry.id == token.id) else {
            return Err(SubscriptionError::UnknownSubscriber {
                label: token.label.to_string(),
                type_name: lease.type_name.get().to_string(),
            });
        };

        entries.remove(position);
        tracing::trace!(
            label = %token.label,
            token = %token.id,
            type_name = lease.type_name.get(),
            count = entries.len(),
            "unsubscribed"
        );
        Ok(())
    }

    fn check_access(lease: &Self::Lease, token: &Self::Token) -> Result<(), SubscriptionError>
    {
        if lease.released.get() {
            return Err(SubscriptionError::DanglingTarget {
                label: token.label.to_string(),
                type_name: lease.type_name.get().to_string(),
            });
        }
        Ok(())
    }

    fn subscriber_count(&self) -> usize
    {
        self.state.entries.borrow().len()
    }

    fn subscriber_labels(&self) -> Vec<String>
    {
        self.state.labels()
    }

    fn type_name(&self) -> &'static str
    {
        self.state.type_name.get()
    }

    fn check_released(&self) -> Result<(), SubscriptionError>
    {
        let count = self.subscriber_count();
        if count == 0 {
            return Ok(());
        }

        Err(SubscriptionError::StillUsed {
            type_name: self.state.type_name.get().to_string(),
            count,
            subscribers: self.state.labels(),
        })
    }

    fn release(&self) -> Result<(), SubscriptionError>
    {
        self.state.released.set(true);
        self.check_released()
    }
}

/// Registry that records nothing.
#[cfg_attr(tether_checked, allow(dead_code))]
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct FastRegistry;

impl Registry for FastRegistry
{
    type Token = Cow<'static, str>;
    type Lease = ();

    fn mint(label: impl Into<Cow<'static, str>>) -> Self::Token
    {
        label.into()
    }

    fn fork(token: &Self::Token) -> Self::Token
    {
        token.clone()
    }

    fn label(token: &Self::Token) -> &str
    {
        token
    }

    fn subscribe(&self, _token: &Self::Token, _type_name: &'static str) -> Self::Lease {}

    fn unsubscribe(_lease: Self::Lease, _token: &Self::Token) -> Result<(), SubscriptionError>
    {
        Ok(())
    }

    fn check_access(_lease: &Self::Lease, _token: &Self::Token) -> Result<(), SubscriptionError>
    {
        Ok(())
    }

    fn subscriber_count(&self) -> usize
    {
        0
    }

    fn subscriber_labels(&self) -> Vec<String>
    {
        Vec::new()
    }

    fn type_name(&self) -> &'static str
    {
        UNKNOWN_TYPE_NAME
    }

    fn check_released(&self) -> Result<(), SubscriptionError>
    {
        Ok(())
    }

    fn release(&self) -> Result<(), SubscriptionError>
    {
        Ok(())
    }
}
