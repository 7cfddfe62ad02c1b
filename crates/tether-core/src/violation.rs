//! # Violation Channel
//!
//! Where subscription protocol violations end up.
//!
//! A [`SubscriptionError`] is never returned to the caller. The registry
//! detects it at the exact point of violation and hands it to [`raise`],
//! which logs it and then stops the current line of execution for good:
//!
//! - [`ViolationAction::Abort`] (default): abort the process.
//! - [`ViolationAction::Panic`]: panic with the error as payload, so a host
//!   that wants a recoverable channel can intercept it with
//!   [`std::panic::catch_unwind`] and downcast the payload.
//!
//! ## Configuration
//!
//! The action is read once from `TETHER_ON_VIOLATION` (`abort` or `panic`)
//! and can be overridden at any time with [`set_violation_action`].
//!
//! ```rust
//! use tether_core::violation::{set_violation_action, violation_action, ViolationAction};
//!
//! set_violation_action(ViolationAction::Panic);
//! assert_eq!(violation_action(), ViolationAction::Panic);
//! ```

use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

use once_cell::sync::Lazy;

use crate::error::SubscriptionError;

/// Environment variable that seeds the violation action.
pub const VIOLATION_ENV: &str = "TETHER_ON_VIOLATION";

/// What to do once a violation has been logged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViolationAction
{
    /// Abort the process (default)
    #[default]
    Abort,
    /// Panic with the [`SubscriptionError`] as payload
    Panic,
}

impl ViolationAction
{
    const fn as_raw(self) -> u8
    {
        match self {
            Self::Abort => 0,
            Self::Panic => 1,
        }
    }

    const fn from_raw(raw: u8) -> Self
    {
        match raw {
            1 => Self::Panic,
            _ => Self::Abort,
        }
    }
}

impl FromStr for ViolationAction
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.trim().to_lowercase().as_str() {
            "abort" | "fatal" => Ok(Self::Abort),
            "panic" | "unwind" => Ok(Self::Panic),
            _ => Err(format!("Unknown violation action: {s}. Use 'abort' or 'panic'")),
        }
    }
}

impl fmt::Display for ViolationAction
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            Self::Abort => "abort",
            Self::Panic => "panic",
        };
        write!(f, "{label}")
    }
}

static ACTION: Lazy<AtomicU8> = Lazy::new(|| {
    let action = env::var(VIOLATION_ENV)
        .ok()
        .and_then(|raw| match raw.parse::<ViolationAction>() {
            Ok(action) => Some(action),
            Err(err) => {
                tracing::warn!(%err, "ignoring {VIOLATION_ENV}");
                None
            }
        })
        .unwrap_or_default();
    AtomicU8::new(action.as_raw())
});

/// Current violation action.
#[must_use]
pub fn violation_action() -> ViolationAction
{
    ViolationAction::from_raw(ACTION.load(Ordering::Relaxed))
}

/// Override the violation action for the whole process.
pub fn set_violation_action(action: ViolationAction)
{
    ACTION.store(action.as_raw(), Ordering::Relaxed);
}

/// Report a protocol violation and never return.
///
/// The error is logged at `error` level first, then the configured
/// [`ViolationAction`] is applied. A violation raised while the thread is
/// already unwinding always aborts, since a second panic would abort anyway
/// and lose the message.
pub fn raise(error: SubscriptionError) -> !
{
    tracing::error!(kind = error.as_label(), "{error}");

    if std::thread::panicking() {
        eprintln!("tether: {error}");
        std::process::abort();
    }

    match violation_action() {
        ViolationAction::Abort => {
            eprintln!("tether: {error}");
            std::process::abort();
        }
        ViolationAction::Panic => std::panic::panic_any(error),
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_violation_action_from_str()
    {
        assert_eq!(ViolationAction::from_str("abort").unwrap(), ViolationAction::Abort);
        assert_eq!(ViolationAction::from_str("PANIC").unwrap(), ViolationAction::Panic);
        assert_eq!(ViolationAction::from_str(" unwind ").unwrap(), ViolationAction::Panic);
        assert!(ViolationAction::from_str("ignore").is_err());
    }

    #[test]
    fn test_violation_action_raw_roundtrip()
    {
        for action in [ViolationAction::Abort, ViolationAction::Panic] {
            assert_eq!(ViolationAction::from_raw(action.as_raw()), action);
        }
        assert_eq!(ViolationAction::from_raw(42), ViolationAction::Abort);
    }

    #[test]
    fn test_raise_panics_with_structured_payload()
    {
        set_violation_action(ViolationAction::Panic);

        let payload = std::panic::catch_unwind(|| {
            raise(SubscriptionError::EmptyDereference { label: "cursor".to_string() })
        })
        .unwrap_err();

        let error = payload.downcast::<SubscriptionError>().unwrap();
        assert_eq!(
            *error,
            SubscriptionError::EmptyDereference { label: "cursor".to_string() }
        );
    }
}
