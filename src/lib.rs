//! Merge the `features` of every `.geojson` file in a directory into
//! FeatureCollection outputs, flushing a partial file whenever the
//! accumulated feature count crosses a threshold.

pub mod collection;
pub mod merger;

pub use collection::FeatureCollection;
pub use merger::{run, EntryOrder, Flush, MergeOptions, MergeReport, PartialNaming};
