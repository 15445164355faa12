//! Named, shuffleable view over an indexed source

use super::IndexedSource;
use crate::{Error, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use std::rc::Rc;

/// Wraps a source with a name and an index permutation
///
/// Lookups go through `order`, and every item comes back paired with the
/// identifier `"{name}_{source_index}"` so results can be traced back to the
/// underlying dataset across shuffles.
pub struct DatasetView<S: ?Sized> {
    source: Rc<S>,
    name: String,
    order: Vec<usize>,
}

impl<S: IndexedSource + ?Sized> DatasetView<S> {
    /// Create a view with the identity order
    pub fn new(source: Rc<S>, name: impl Into<String>) -> Self {
        let order = (0..source.len()).collect();
        Self {
            source,
            name: name.into(),
            order,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Current permutation
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Source index that position `index` resolves to
    pub fn source_index(&self, index: usize) -> Result<usize> {
        self.order.as_slice().get(index).copied().ok_or(Error::IndexOutOfRange {
            index,
            len: self.order.len(),
        })
    }

    /// Item at position `index` with its traceable identifier
    pub fn item_at(&self, index: usize) -> Result<(S::Item, String)> {
        let real_index = self.source_index(index)?;
        let item = self.source.get(real_index)?;
        Ok((item, format!("{}_{}", self.name, real_index)))
    }

    /// Replace the order with a fresh uniform permutation of the source
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut order: Vec<usize> = (0..self.source.len()).collect();
        order.shuffle(rng);
        self.order = order;
    }

    /// Back to the identity order
    pub fn reset_order(&mut self) {
        self.order = (0..self.source.len()).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn view(n: usize) -> DatasetView<Vec<usize>> {
        DatasetView::new(Rc::new((0..n).map(|i| i * 10).collect()), "ds")
    }

    #[test]
    fn test_identity_order_and_ids() {
        let v = view(3);
        assert_eq!(v.order(), &[0, 1, 2]);
        assert_eq!(v.item_at(2).unwrap(), (20, "ds_2".to_string()));
    }

    #[test]
    fn test_ids_follow_source_index_after_shuffle() {
        let mut v = view(20);
        let mut rng = StdRng::seed_from_u64(3);
        v.shuffle(&mut rng);

        for i in 0..v.len() {
            let (item, id) = v.item_at(i).unwrap();
            let real = v.order()[i];
            assert_eq!(item, real * 10);
            assert_eq!(id, format!("ds_{real}"));
        }
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let mut v = view(50);
        let mut rng = StdRng::seed_from_u64(11);
        v.shuffle(&mut rng);

        let mut sorted = v.order().to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_consecutive_shuffles_differ() {
        let mut v = view(50);
        let mut rng = StdRng::seed_from_u64(5);
        v.shuffle(&mut rng);
        let first = v.order().to_vec();
        v.shuffle(&mut rng);
        assert_ne!(first, v.order());

        v.reset_order();
        assert_eq!(v.order(), (0..50).collect::<Vec<_>>().as_slice());
    }

    #[test]
    fn test_out_of_range_is_error() {
        let v = view(2);
        assert!(matches!(
            v.item_at(2),
            Err(Error::IndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_empty_source() {
        let mut v = view(0);
        let mut rng = StdRng::seed_from_u64(0);
        v.shuffle(&mut rng);
        assert!(v.is_empty());
        assert_eq!(v.name(), "ds");
    }
}
