//! Index sorting.
//!
//! These return the permutation that would sort a slice instead of sorting
//! it in place. The sort is stable, so equal elements keep their relative
//! order.
//!
//! ```rust
//! use tether_core::argsort::argsort;
//!
//! let balances = [30, 10, 20];
//! assert_eq!(argsort(&balances), vec![1, 2, 0]);
//! ```

use std::cmp::Ordering;

/// Indices that sort `values` ascending.
#[must_use]
pub fn argsort<T: Ord>(values: &[T]) -> Vec<usize>
{
    argsort_by(values, Ord::cmp)
}

/// Indices that sort `values` according to `compare`.
///
/// ```rust
/// use tether_core::argsort::argsort_by;
///
/// let values = [0.5_f64, -1.0, 2.0];
/// assert_eq!(argsort_by(&values, |a, b| b.total_cmp(a)), vec![2, 0, 1]);
/// ```
pub fn argsort_by<T, F>(values: &[T], mut compare: F) -> Vec<usize>
where
    F: FnMut(&T, &T) -> Ordering,
{
    let mut indices: Vec<usize> = (0..values.len()).collect();
    indices.sort_by(|&a, &b| compare(&values[a], &values[b]));
    indices
}

/// Indices that sort `values` by the key `key` extracts.
pub fn argsort_by_key<T, K, F>(values: &[T], mut key: F) -> Vec<usize>
where
    K: Ord,
    F: FnMut(&T) -> K,
{
    let mut indices: Vec<usize> = (0..values.len()).collect();
    indices.sort_by_key(|&index| key(&values[index]));
    indices
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_argsort_empty()
    {
        let empty: [u8; 0] = [];
        assert!(argsort(&empty).is_empty());
    }

    #[test]
    fn test_argsort_orders_indices()
    {
        let values = ["pear", "apple", "fig"];
        let order = argsort(&values);
        assert_eq!(order, vec![1, 2, 0]);

        let sorted: Vec<_> = order.iter().map(|&i| values[i]).collect();
        assert_eq!(sorted, vec!["apple", "fig", "pear"]);
    }

    #[test]
    fn test_argsort_is_stable()
    {
        let values = [2, 1, 2, 1, 0];
        assert_eq!(argsort(&values), vec![4, 1, 3, 0, 2]);
    }

    #[test]
    fn test_argsort_by_descending()
    {
        let values = [3, 9, 1];
        assert_eq!(argsort_by(&values, |a, b| b.cmp(a)), vec![1, 0, 2]);
    }

    #[test]
    fn test_argsort_by_key()
    {
        let words = ["three", "a", "to", "bee"];
        assert_eq!(argsort_by_key(&words, |w| w.len()), vec![1, 2, 3, 0]);
    }
}
