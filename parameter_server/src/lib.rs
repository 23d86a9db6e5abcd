//! The aggregator side of synchronous data-parallel training.
//!
//! Three strategies keep the per-layer parameters of every worker consistent,
//! all applying `parameter -= (stepsize / N) * sum` over the `N` gradient arrays
//! received since the previous update:
//!
//! * `LocalAggregator`, shared in memory by workers of the same process.
//! * `CollectiveAggregator`, the root of a `comms::Group` reduce/broadcast loop.
//! * `KvAggregator`, a key-value table served over one task per connection.

mod error;
mod service;
mod storage;

pub use error::{Result, ServerErr};
pub use service::{CollectiveAggregator, KvAggregator, LocalAggregator};
pub use storage::DeltaSum;
