//! Feeds batches from a dataset

use crate::data::{Batch, DataSet, DatasetView, Sample, Subset};
use crate::train::{Pipe, PriorityMap, Stage, TrainerContext};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::debug;

/// Supplies the batch count and the batches of every epoch
///
/// One [`DatasetView`] is kept per subset and created on first use. Train
/// epochs reshuffle their view with the trainer RNG.
pub struct DatasetHandler<D: DataSet<Item = Sample>> {
    dataset: Rc<D>,
    batch_size: usize,
    limit: Option<usize>,
    subset_limits: BTreeMap<String, usize>,
    shuffle: bool,
    views: BTreeMap<String, DatasetView<Subset<D>>>,
}

impl<D: DataSet<Item = Sample>> DatasetHandler<D> {
    pub fn new(dataset: Rc<D>, batch_size: usize) -> Self {
        Self {
            dataset,
            batch_size,
            limit: None,
            subset_limits: BTreeMap::new(),
            shuffle: true,
            views: BTreeMap::new(),
        }
    }

    /// Cap the batch count of every subset
    pub fn with_limit(mut self, max_batches: usize) -> Self {
        self.limit = Some(max_batches);
        self
    }

    /// Cap the batch count of one subset
    pub fn with_subset_limit(mut self, subset: impl Into<String>, max_batches: usize) -> Self {
        self.subset_limits.insert(subset.into(), max_batches);
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Batches per epoch for `subset`
    pub fn n_iterations(&self, subset: &str) -> usize {
        let batches = self.dataset.len(subset).div_ceil(self.batch_size.max(1));
        let limit = self.subset_limits.get(subset).copied().or(self.limit);
        limit.map_or(batches, |l| batches.min(l))
    }

    /// The view of `subset`, if an epoch has touched it
    pub fn view(&self, subset: &str) -> Option<&DatasetView<Subset<D>>> {
        self.views.get(subset)
    }

    fn view_mut(&mut self, subset: &str) -> &mut DatasetView<Subset<D>> {
        let dataset = &self.dataset;
        self.views.entry(subset.to_string()).or_insert_with(|| {
            DatasetView::new(Rc::new(Subset::new(dataset.clone(), subset)), subset)
        })
    }
}

impl<D: DataSet<Item = Sample> + 'static> Pipe for DatasetHandler<D> {
    fn on_init(&mut self, _ctx: &mut TrainerContext) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch size must be positive".into()));
        }
        Ok(())
    }

    fn on_epoch_begin(&mut self, ctx: &mut TrainerContext) -> Result<()> {
        let n_iterations = self.n_iterations(&ctx.subset);
        let shuffle = self.shuffle && ctx.is_train();

        let view = self.view_mut(&ctx.subset);
        if shuffle {
            view.shuffle(&mut ctx.rng);
        }

        debug!(subset = %ctx.subset, items = view.len(), n_iterations, "dataset ready");
        ctx.n_iterations = Some(n_iterations);
        Ok(())
    }

    fn on_batch_begin(&mut self, ctx: &mut TrainerContext) -> Result<()> {
        let batch_size = self.batch_size;
        let view = self.view_mut(&ctx.subset);

        let start = ctx.epoch_iteration.saturating_sub(1) * batch_size;
        let end = (start + batch_size).min(view.len());
        if start >= end {
            return Err(Error::IndexOutOfRange {
                index: start,
                len: view.len(),
            });
        }

        let items = (start..end)
            .map(|i| view.item_at(i))
            .collect::<Result<Vec<_>>>()?;
        ctx.input = Some(Batch::collate(items)?);
        Ok(())
    }

    fn priority(&self) -> PriorityMap {
        PriorityMap::from_stages([(Stage::BatchBegin, 10)])
    }

    fn name(&self) -> &str {
        "DatasetHandler"
    }
}
