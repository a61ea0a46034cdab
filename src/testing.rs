//! Assertion functions for testing pattern outputs.
//!
//! Worker pools complete submissions in a nondeterministic order, so most of
//! these compare collections as multisets rather than sequences.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::hash::Hash;

/// Assert that two collections are equal in order and content.
///
/// # Panics
///
/// Panics if the collections differ in length or content.
///
/// # Example
///
/// ```
/// use parloom::testing::assert_collections_equal;
///
/// assert_collections_equal(&[1, 2, 3], &[1, 2, 3]);
/// ```
pub fn assert_collections_equal<T: Debug + PartialEq>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Collection length mismatch:\n  Expected length: {}\n  Actual length: {}\n  Expected: {expected:?}\n  Actual: {actual:?}",
        expected.len(),
        actual.len()
    );

    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert_eq!(
            a, e,
            "Collection mismatch at index {i}:\n  Expected: {e:?}\n  Actual: {a:?}\n  Full expected: {expected:?}\n  Full actual: {actual:?}"
        );
    }
}

/// Assert that two collections contain the same elements with the same
/// multiplicities, ignoring order.
///
/// This is the right comparison for outputs gathered from a pool: every
/// submitted input produces exactly one output, but completion order is up to
/// the scheduler.
///
/// # Panics
///
/// Panics if the collections differ as multisets.
///
/// # Example
///
/// ```
/// use parloom::testing::assert_same_elements;
///
/// assert_same_elements(&[3, 1, 2, 1], &[1, 1, 2, 3]);
/// ```
pub fn assert_same_elements<T: Debug + Eq + Hash>(actual: &[T], expected: &[T]) {
    fn counted<T: Eq + Hash>(items: &[T]) -> HashMap<&T, usize> {
        let mut counts = HashMap::new();
        for item in items {
            *counts.entry(item).or_insert(0) += 1;
        }
        counts
    }

    assert_eq!(
        actual.len(),
        expected.len(),
        "Collection length mismatch:\n  Expected length: {}\n  Actual length: {}\n  Expected: {expected:?}\n  Actual: {actual:?}",
        expected.len(),
        actual.len()
    );

    let actual_counts = counted(actual);
    let expected_counts = counted(expected);
    if actual_counts != expected_counts {
        let missing: Vec<_> = expected_counts
            .iter()
            .filter(|(item, count)| actual_counts.get(**item).unwrap_or(&0) < count)
            .map(|(item, _)| item)
            .collect();
        let extra: Vec<_> = actual_counts
            .iter()
            .filter(|(item, count)| expected_counts.get(**item).unwrap_or(&0) < count)
            .map(|(item, _)| item)
            .collect();

        panic!(
            "Collection content mismatch:\n  Missing elements: {missing:?}\n  Extra elements: {extra:?}\n  Expected: {expected:?}\n  Actual: {actual:?}"
        );
    }
}

/// Assert that a keyed result matches the expected entries exactly.
///
/// # Panics
///
/// Panics if the maps differ in keys or values.
///
/// # Example
///
/// ```
/// use parloom::testing::assert_keyed_result;
/// use std::collections::BTreeMap;
///
/// let result = BTreeMap::from([(1usize, 10u64), (2, 20)]);
/// assert_keyed_result(&result, &[(1, 10), (2, 20)]);
/// ```
pub fn assert_keyed_result<K, V>(actual: &BTreeMap<K, V>, expected: &[(K, V)])
where
    K: Debug + Ord,
    V: Debug + PartialEq,
{
    assert_eq!(
        actual.len(),
        expected.len(),
        "Keyed result size mismatch:\n  Expected size: {}\n  Actual size: {}\n  Expected: {expected:?}\n  Actual: {actual:?}",
        expected.len(),
        actual.len()
    );

    for (key, expected_value) in expected {
        match actual.get(key) {
            Some(actual_value) if actual_value == expected_value => {}
            Some(actual_value) => {
                panic!(
                    "Keyed result mismatch for key {key:?}:\n  Expected: {expected_value:?}\n  Actual: {actual_value:?}"
                );
            }
            None => {
                panic!("Keyed result missing key: {key:?}\n  Actual: {actual:?}");
            }
        }
    }
}

/// Assert that all elements in a collection satisfy a predicate.
///
/// # Panics
///
/// Panics if any element does not satisfy the predicate.
pub fn assert_all<T: Debug>(collection: &[T], predicate: impl Fn(&T) -> bool) {
    for (i, item) in collection.iter().enumerate() {
        assert!(
            predicate(item),
            "Predicate failed for element at index {i}:\n  Element: {item:?}\n  Collection: {collection:?}"
        );
    }
}
