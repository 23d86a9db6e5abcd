pub mod coordinator;
pub mod data;
pub mod error;
pub mod store;
pub mod worker;

pub use data::{DataSource, Dataset, Sample, ShardSpec, TextSource};
pub use error::{Result, WorkerErr};
pub use store::{CollectiveStore, KvStore, LocalStore, ParameterStore, Progress};
pub use worker::{TrainingReport, Worker};
