//! In-place quicksort over owned vectors.

use crate::algorithm::Algorithm;
use std::marker::PhantomData;

/// Sorts a `Vec<T>` with a recursive middle-pivot quicksort.
#[derive(Default)]
pub struct QuickSort<T>(PhantomData<T>);

impl<T> QuickSort<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

fn quicksort<T: Ord>(slice: &mut [T]) {
    if slice.len() <= 1 {
        return;
    }
    let pivot = partition(slice);
    let (left, right) = slice.split_at_mut(pivot);
    quicksort(left);
    quicksort(&mut right[1..]);
}

/// Lomuto partition around the middle element; returns the pivot's final
/// position.
fn partition<T: Ord>(slice: &mut [T]) -> usize {
    let last = slice.len() - 1;
    slice.swap(slice.len() / 2, last);

    let mut store = 0;
    for i in 0..last {
        if slice[i] <= slice[last] {
            slice.swap(i, store);
            store += 1;
        }
    }
    slice.swap(store, last);
    store
}

impl<T> Algorithm<Vec<T>, Vec<T>> for QuickSort<T>
where
    T: Ord + Send + Sync,
{
    fn compute(&self, mut input: Vec<T>) -> Vec<T> {
        quicksort(&mut input);
        input
    }

    fn name(&self) -> String {
        "quick_sort".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_unordered_input() {
        let sorter = QuickSort::new();
        assert_eq!(
            sorter.compute(vec![5, 3, 8, 1, 9, 2, 7, 2]),
            vec![1, 2, 2, 3, 5, 7, 8, 9]
        );
    }

    #[test]
    fn handles_degenerate_inputs() {
        let sorter = QuickSort::<i32>::new();
        assert_eq!(sorter.compute(vec![]), Vec::<i32>::new());
        assert_eq!(sorter.compute(vec![1]), vec![1]);
        assert_eq!(sorter.compute(vec![2, 2, 2]), vec![2, 2, 2]);
    }

    #[test]
    fn sorts_already_sorted_and_reversed() {
        let sorter = QuickSort::new();
        let sorted: Vec<i64> = (0..200).collect();
        let reversed: Vec<i64> = (0..200).rev().collect();
        assert_eq!(sorter.compute(reversed), sorted);
        assert_eq!(sorter.compute(sorted.clone()), sorted);
    }
}
