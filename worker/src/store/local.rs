use std::num::NonZeroUsize;

use log::info;
use machine_learning::{LayerParameter, Network, StatsPair};
use parameter_server::LocalAggregator;

use super::{ParameterStore, Progress};
use crate::Result;

/// A store backed by an aggregator living in the same process.
///
/// There is no barrier between the workers sharing the aggregator, each one
/// counts its own logical iterations.
#[derive(Debug, Clone)]
pub struct LocalStore {
    aggregator: LocalAggregator,
    iteration: usize,
    max_iterations: NonZeroUsize,
}

impl LocalStore {
    /// Creates a new `LocalStore`.
    ///
    /// # Arguments
    /// * `aggregator` - A handle on the shared aggregator.
    /// * `max_iterations` - The amount of logical iterations to run.
    pub fn new(aggregator: LocalAggregator, max_iterations: NonZeroUsize) -> Self {
        Self {
            aggregator,
            iteration: 0,
            max_iterations,
        }
    }
}

impl ParameterStore for LocalStore {
    async fn push(&mut self, grads: Option<Vec<LayerParameter>>) -> Result<()> {
        if let Some(grads) = grads {
            self.aggregator.push(&grads)?;
        }

        Ok(())
    }

    async fn pull(&mut self) -> Result<Vec<LayerParameter>> {
        Ok(self.aggregator.pull()?)
    }

    async fn finish_iteration(
        &mut self,
        network: &mut Network,
        stats: StatsPair,
    ) -> Result<Progress> {
        network.adopt(self.aggregator.pull()?)?;
        self.iteration += 1;

        info!(
            iteration = self.iteration,
            training_error = stats.training.error().unwrap_or(f32::NAN),
            validation_error = stats.validation.error().unwrap_or(f32::NAN);
            "local iteration finished"
        );

        if self.iteration >= self.max_iterations.get() {
            return Ok(Progress::Stop);
        }

        Ok(Progress::Continue)
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
