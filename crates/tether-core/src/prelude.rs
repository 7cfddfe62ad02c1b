//! Common module for library exports
//!
//! ```rust
//! use tether_core::prelude::*;
//!
//! assert_eq!(argsort(&[3, 1, 2]), vec![1, 2, 0]);
//! assert!(numcomp(0.1 + 0.2) == 0.3);
//! ```

pub use crate::argsort::{argsort, argsort_by, argsort_by_key};
pub use crate::error::{SubscriptionError, TetherError, TetherResult};
pub use crate::numcomp::{numcomp, AccuracyLevel, FailureAction, NumComp};
pub use crate::pointer::{make_subscription, SubscriptionPointer};
pub use crate::subscribable::{Subscribable, Tracked};
pub use crate::violation::ViolationAction;
