mod collective;
mod kv;
mod local;

pub use collective::CollectiveAggregator;
pub use kv::KvAggregator;
pub use local::LocalAggregator;
