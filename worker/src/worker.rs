use log::{debug, info};
use machine_learning::{
    Network, StatsPair,
    validation::{self, argmax},
};

use crate::{
    Result,
    data::Dataset,
    store::{ParameterStore, Progress},
};

/// What a worker ends up with once training is over.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    /// The network with the last parameters the worker adopted.
    pub network: Network,
    /// The local accuracy of every logical iteration, in order.
    pub history: Vec<StatsPair>,
}

/// Trains a network on a data partition, one sample at a time.
pub struct Worker<S: ParameterStore> {
    worker_id: usize,
    network: Network,
    store: S,
}

impl<S: ParameterStore> Worker<S> {
    /// Creates a new `Worker`.
    ///
    /// # Arguments
    /// * `worker_id` - Identifier used for observability.
    /// * `network` - The network to train, its parameters must match the aggregator's.
    /// * `store` - The handle on the shared parameters.
    pub fn new(worker_id: usize, network: Network, store: S) -> Self {
        Self {
            worker_id,
            network,
            store,
        }
    }

    /// Runs logical iterations over `dataset` until the store says to stop.
    ///
    /// Each iteration trains on every training sample, pulling after every full
    /// batch, then evaluates the validation samples and hands the accuracy to
    /// the store.
    ///
    /// # Returns
    /// The trained network and the accuracy history.
    pub async fn run(mut self, dataset: &Dataset) -> Result<TrainingReport> {
        let worker_id = self.worker_id;
        let mut history = Vec::new();

        info!(
            worker_id = worker_id,
            training = dataset.training().len(),
            validation = dataset.validation().len();
            "worker started"
        );

        loop {
            let stats = self.train_iteration(dataset).await?;
            history.push(stats);

            info!(
                worker_id = worker_id,
                iteration = history.len(),
                training_error = stats.training.error().unwrap_or(f32::NAN),
                validation_error = stats.validation.error().unwrap_or(f32::NAN);
                "local pass finished"
            );

            let progress = self.store.finish_iteration(&mut self.network, stats).await?;
            if progress == Progress::Stop {
                break;
            }
        }

        self.store.close().await?;
        info!(worker_id = worker_id, iterations = history.len(); "worker finished");

        Ok(TrainingReport {
            network: self.network,
            history,
        })
    }

    async fn train_iteration(&mut self, dataset: &Dataset) -> Result<StatsPair> {
        let mut stats = StatsPair::default();

        for sample in dataset.training() {
            let (output, grads) = self
                .network
                .compute_gradients(sample.input.view(), sample.label)?;
            stats
                .training
                .record(argmax(output.view()) == Some(sample.label));

            self.store.push(Some(grads)).await?;

            if self.network.note_trained() {
                let params = self.store.pull().await?;
                debug!(worker_id = self.worker_id; "pulled parameters");

                if !params.is_empty() {
                    self.network.adopt(params)?;
                }
            }
        }

        for sample in dataset.validation() {
            validation::evaluate(
                &self.network,
                sample.input.view(),
                sample.label,
                &mut stats.validation,
            )?;
        }

        Ok(stats)
    }
}
