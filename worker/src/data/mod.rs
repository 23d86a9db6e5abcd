mod dataset;
mod shard;
mod source;

pub use dataset::{Dataset, Sample};
pub use shard::ShardSpec;
pub use source::{DataSource, TextSource};
