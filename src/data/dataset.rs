//! Dataset traits

use super::Sample;
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::rc::Rc;

/// A dataset split into named subsets (`"train"`, `"valid"`, `"test"`, ...)
pub trait DataSet {
    type Item;

    /// Number of items in `subset`; unknown subsets are empty
    fn len(&self, subset: &str) -> usize;

    /// Item `index` of `subset`
    fn item(&self, subset: &str, index: usize) -> Result<Self::Item>;
}

/// Anything with a length and positional lookup
pub trait IndexedSource {
    type Item;

    fn len(&self) -> usize;

    fn get(&self, index: usize) -> Result<Self::Item>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> IndexedSource for Vec<T> {
    type Item = T;

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn get(&self, index: usize) -> Result<T> {
        self.as_slice()
            .get(index)
            .cloned()
            .ok_or(Error::IndexOutOfRange {
                index,
                len: Vec::len(self),
            })
    }
}

/// A dataset pinned to one subset
pub struct Subset<D: ?Sized> {
    dataset: Rc<D>,
    key: String,
}

impl<D: DataSet + ?Sized> Subset<D> {
    pub fn new(dataset: Rc<D>, key: impl Into<String>) -> Self {
        Self {
            dataset,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<D: DataSet + ?Sized> IndexedSource for Subset<D> {
    type Item = D::Item;

    fn len(&self) -> usize {
        self.dataset.len(&self.key)
    }

    fn get(&self, index: usize) -> Result<D::Item> {
        self.dataset.item(&self.key, index)
    }
}

/// Subsets of [`Sample`]s held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataSet {
    subsets: BTreeMap<String, Vec<Sample>>,
}

impl InMemoryDataSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a subset
    pub fn with_subset(mut self, key: impl Into<String>, samples: Vec<Sample>) -> Self {
        self.subsets.insert(key.into(), samples);
        self
    }

    pub fn subset_keys(&self) -> impl Iterator<Item = &str> {
        self.subsets.keys().map(String::as_str)
    }
}

impl DataSet for InMemoryDataSet {
    type Item = Sample;

    fn len(&self, subset: &str) -> usize {
        self.subsets.get(subset).map_or(0, Vec::len)
    }

    fn item(&self, subset: &str, index: usize) -> Result<Sample> {
        let samples = self
            .subsets
            .get(subset)
            .ok_or_else(|| Error::Config(format!("unknown subset '{subset}'")))?;
        IndexedSource::get(samples, index)
    }
}
