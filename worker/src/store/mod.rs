//! The worker side of the parameter aggregation strategies.

mod collective;
mod kv;
mod local;

pub use collective::CollectiveStore;
pub use kv::KvStore;
pub use local::LocalStore;

use comms::msg::Msg;
use machine_learning::{LayerParameter, Network, StatsPair};

use crate::{Result, WorkerErr};

/// What a worker does after a logical iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Continue,
    Stop,
}

/// The worker's handle on the shared parameters.
#[allow(unused)]
#[trait_variant::make(ParameterStore: Send)]
pub trait ParameterStoreTemplate {
    /// Contributes the gradients of one sample.
    ///
    /// # Arguments
    /// * `grads` - One entry per layer, or `None` for a dummy contribution that
    ///   only keeps the worker in step with the others.
    async fn push(&mut self, grads: Option<Vec<LayerParameter>>) -> Result<()>;

    /// Fetches the parameters with every contribution so far applied.
    ///
    /// # Returns
    /// One entry per layer, or an empty array marking the end of a logical iteration.
    async fn pull(&mut self) -> Result<Vec<LayerParameter>>;

    /// Ends the worker's local pass over its data.
    ///
    /// # Arguments
    /// * `network` - The worker's network, it adopts every parameter update pulled meanwhile.
    /// * `stats` - The worker's accuracy during the pass.
    ///
    /// # Returns
    /// Whether another logical iteration follows.
    async fn finish_iteration(&mut self, network: &mut Network, stats: StatsPair)
    -> Result<Progress>;

    /// Releases the store once training is over.
    async fn close(&mut self) -> Result<()>;
}

fn unexpected(expected: &'static str, msg: &Msg) -> WorkerErr {
    WorkerErr::UnexpectedMessage {
        expected,
        got: msg.kind(),
    }
}
