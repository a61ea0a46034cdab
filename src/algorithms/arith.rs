//! Element-wise and reducing arithmetic leaves.

use crate::algorithm::Algorithm;
use crate::shuffle::{KEY_SPACE, Key};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::ops::{Add, Rem};

/// Adds a fixed step to every element.
pub struct Increase<T> {
    step: T,
}

impl<T> Increase<T> {
    pub fn new(step: T) -> Self {
        Self { step }
    }
}

impl<T> Algorithm<Vec<T>, Vec<T>> for Increase<T>
where
    T: Copy + Add<Output = T> + Send + Sync,
{
    fn compute(&self, input: Vec<T>) -> Vec<T> {
        input.into_iter().map(|v| v + self.step).collect()
    }

    fn name(&self) -> String {
        "increase".to_string()
    }
}

/// Identity pass-through, useful as a pipeline stage placeholder.
#[derive(Default)]
pub struct Nop<T>(PhantomData<T>);

impl<T> Nop<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Algorithm<T, T> for Nop<T>
where
    T: Send + Sync,
{
    fn compute(&self, input: T) -> T {
        input
    }

    fn name(&self) -> String {
        "nop".to_string()
    }
}

/// Sums a value list; an empty list reduces to the configured default.
/// Associative and commutative, as the shuffle contract requires.
pub struct ReduceAddVec<T> {
    default: T,
}

impl<T> ReduceAddVec<T> {
    pub fn new(default: T) -> Self {
        Self { default }
    }
}

impl<T> Algorithm<Vec<T>, T> for ReduceAddVec<T>
where
    T: Copy + Add<Output = T> + Send + Sync,
{
    fn compute(&self, input: Vec<T>) -> T {
        let mut values = input.into_iter();
        let Some(first) = values.next() else {
            return self.default;
        };
        values.fold(first, |acc, v| acc + v)
    }

    fn name(&self) -> String {
        "reduce_add_vec".to_string()
    }
}

/// Sums a pair.
#[derive(Default)]
pub struct ReduceAdd<T>(PhantomData<T>);

impl<T> ReduceAdd<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Algorithm<(T, T), T> for ReduceAdd<T>
where
    T: Add<Output = T> + Send + Sync,
{
    fn compute(&self, (lhs, rhs): (T, T)) -> T {
        lhs + rhs
    }

    fn name(&self) -> String {
        "reduce_add".to_string()
    }
}

/// Tags an integer with the shuffle key `value % KEY_SPACE`, the canonical
/// horizontal map-reduce mapper for numeric workloads.
#[derive(Default)]
pub struct ModuloKey;

impl ModuloKey {
    pub fn new() -> Self {
        Self
    }
}

impl Algorithm<u64, BTreeMap<Key, Vec<u64>>> for ModuloKey {
    fn compute(&self, value: u64) -> BTreeMap<Key, Vec<u64>> {
        let key = (value.rem(KEY_SPACE as u64)) as Key;
        BTreeMap::from([(key, vec![value])])
    }

    fn name(&self) -> String {
        "modulo_key".to_string()
    }
}
