//! Dataset collaborator contract, subset slicing and shuffled views

mod batch;
mod dataset;
mod view;

pub use batch::{Batch, Sample};
pub use dataset::{DataSet, InMemoryDataSet, IndexedSource, Subset};
pub use view::DatasetView;
