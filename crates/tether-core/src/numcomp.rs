//! # Numeric Comparison
//!
//! Tolerance-aware equality for floating point (and integer) values.
//!
//! ```rust
//! use tether_core::numcomp::{numcomp, AccuracyLevel};
//!
//! let third = 1.0_f64 / 3.0;
//! assert!(numcomp(third * 3.0) == 1.0);
//! assert!(numcomp(1.0_f64).accuracy(AccuracyLevel::Sloppy) != 1.001);
//! ```
//!
//! ## Error measure
//!
//! Two values are compared by their relative error
//! `|a - b| / max(|a|, |b|)`. When both magnitudes are below the tolerance
//! the absolute difference is used instead, so comparisons against zero
//! behave. `NaN` never matches anything.
//!
//! ## Failure actions
//!
//! A comparison either just answers `false` ([`FailureAction::Return`]) or
//! reports the details as a [`NumCompError`] ([`FailureAction::Error`]).

use thiserror::Error;

/// Named tolerance presets, as multiples of `f64::EPSILON`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccuracyLevel
{
    /// 1 epsilon
    Extreme,
    /// 10 epsilon
    Higher,
    /// 100 epsilon
    #[default]
    Default,
    /// 1 000 epsilon
    Lower,
    /// 10 000 epsilon
    Sloppy,
    /// 100 000 epsilon
    SuperSloppy,
}

impl AccuracyLevel
{
    /// Tolerance value of this level.
    #[must_use]
    pub fn tolerance(self) -> f64
    {
        let factor = match self {
            Self::Extreme => 1.0,
            Self::Higher => 10.0,
            Self::Default => 100.0,
            Self::Lower => 1_000.0,
            Self::Sloppy => 10_000.0,
            Self::SuperSloppy => 100_000.0,
        };
        factor * f64::EPSILON
    }
}

/// What a failed comparison does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureAction
{
    /// Answer `false`
    #[default]
    Return,
    /// Report a [`NumCompError`]
    Error,
}

/// A comparison did not hold.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NumCompError
{
    /// Two values differ by more than the tolerance
    #[error("{lhs} and {rhs} differ by {error:e}, which exceeds the tolerance {tolerance:e}")]
    Mismatch
    {
        /// Left-hand value
        lhs: f64,
        /// Right-hand value
        rhs: f64,
        /// Error measure between the two
        error: f64,
        /// Tolerance that was exceeded
        tolerance: f64,
    },

    /// Two sequences do not have the same length
    #[error("cannot compare sequences of length {lhs} and {rhs}")]
    LengthMismatch
    {
        /// Length of the left-hand sequence
        lhs: usize,
        /// Length of the right-hand sequence
        rhs: usize,
    },

    /// Two sequences differ at an index
    #[error("sequences differ at index {index}: {source}")]
    Element
    {
        /// First index that did not match
        index: usize,
        /// Mismatch at that index
        #[source]
        source: Box<NumCompError>,
    },
}

/// Error measure between two values (see the module documentation).
#[must_use]
#[allow(clippy::float_cmp)]
pub fn numerical_error(lhs: f64, rhs: f64, tolerance: f64) -> f64
{
    if lhs == rhs {
        // Also covers equal infinities
        return 0.0;
    }

    let difference = (lhs - rhs).abs();
    let scale = lhs.abs().max(rhs.abs());
    if scale <= tolerance {
        difference
    } else {
        difference / scale
    }
}

/// `true` if `lhs` and `rhs` agree within `tolerance`.
#[must_use]
pub fn is_close(lhs: f64, rhs: f64, tolerance: f64) -> bool
{
    // NaN errors compare false
    numerical_error(lhs, rhs, tolerance) <= tolerance
}

/// A value together with the rules to compare it by.
#[derive(Debug, Clone, Copy)]
pub struct NumComp<T>
{
    value: T,
    tolerance: f64,
    failure_action: FailureAction,
}

impl<T: Copy + Into<f64>> NumComp<T>
{
    /// Compare `value` at [`AccuracyLevel::Default`], answering `false` on
    /// mismatch.
    pub fn new(value: T) -> Self
    {
        Self {
            value,
            tolerance: AccuracyLevel::default().tolerance(),
            failure_action: FailureAction::default(),
        }
    }

    /// Use an explicit tolerance.
    #[must_use]
    pub fn tolerance(mut self, tolerance: f64) -> Self
    {
        self.tolerance = tolerance;
        self
    }

    /// Use the tolerance of an accuracy level.
    #[must_use]
    pub fn accuracy(mut self, level: AccuracyLevel) -> Self
    {
        self.tolerance = level.tolerance();
        self
    }

    #[must_use]
    pub fn failure_action(mut self, action: FailureAction) -> Self
    {
        self.failure_action = action;
        self
    }

    /// Current tolerance value.
    pub fn tolerance_value(&self) -> f64
    {
        self.tolerance
    }

    /// Compare against `other`, honouring the failure action.
    ///
    /// ## Errors
    ///
    /// [`NumCompError::Mismatch`] if the values differ and the failure action
    /// is [`FailureAction::Error`].
    pub fn check<U: Copy + Into<f64>>(&self, other: U) -> Result<bool, NumCompError>
    {
        let (lhs, rhs) = (self.value.into(), other.into());
        let error = numerical_error(lhs, rhs, self.tolerance);
        if error <= self.tolerance {
            return Ok(true);
        }

        match self.failure_action {
            FailureAction::Return => Ok(false),
            FailureAction::Error => Err(NumCompError::Mismatch {
                lhs,
                rhs,
                error,
                tolerance: self.tolerance,
            }),
        }
    }

    /// `true` if `other` matches, whatever the failure action.
    pub fn matches<U: Copy + Into<f64>>(&self, other: U) -> bool
    {
        is_close(self.value.into(), other.into(), self.tolerance)
    }
}

impl<T: Copy + Into<f64>> PartialEq<f64> for NumComp<T>
{
    fn eq(&self, other: &f64) -> bool
    {
        self.matches(*other)
    }
}

/// Compare `value` with the default rules.
pub fn numcomp<T: Copy + Into<f64>>(value: T) -> NumComp<T>
{
    NumComp::new(value)
}

/// Compare `value`, answering `false` on mismatch.
pub fn numcomp_return<T: Copy + Into<f64>>(value: T) -> NumComp<T>
{
    NumComp::new(value).failure_action(FailureAction::Return)
}

/// Compare `value`, reporting mismatches as errors.
pub fn numcomp_error<T: Copy + Into<f64>>(value: T) -> NumComp<T>
{
    NumComp::new(value).failure_action(FailureAction::Error)
}

/// Compare two sequences element-wise within `tolerance`.
///
/// ## Errors
///
/// [`NumCompError::LengthMismatch`] if the lengths differ, otherwise
/// [`NumCompError::Element`] for the first element that does not match.
pub fn check_slices<T, U>(lhs: &[T], rhs: &[U], tolerance: f64) -> Result<(), NumCompError>
where
    T: Copy + Into<f64>,
    U: Copy + Into<f64>,
{
    if lhs.len() != rhs.len() {
        return Err(NumCompError::LengthMismatch {
            lhs: lhs.len(),
            rhs: rhs.len(),
        });
    }

    for (index, (&left, &right)) in lhs.iter().zip(rhs).enumerate() {
        numcomp_error(left).tolerance(tolerance).check(right).map_err(|source| NumCompError::Element {
            index,
            source: Box::new(source),
        })?;
    }
    Ok(())
}
