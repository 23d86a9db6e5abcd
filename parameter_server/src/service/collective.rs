use std::num::NonZeroUsize;

use comms::{
    Group,
    msg::{Command, Msg, Payload},
};
use log::{debug, info};
use machine_learning::{LayerParameter, StatsPair, param};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    Result, ServerErr,
    storage::DeltaSum,
};

/// The aggregator side of the collective strategy.
///
/// Every round it reduces the gradient batches of all members and broadcasts the
/// updated parameters. A round where no member contributed anything ends the
/// current logical iteration.
#[derive(Debug)]
pub struct CollectiveAggregator {
    params: Vec<LayerParameter>,
    stepsize: f32,
    max_iterations: NonZeroUsize,
    iteration: usize,
}

impl CollectiveAggregator {
    /// Creates a new `CollectiveAggregator`.
    ///
    /// # Arguments
    /// * `params` - The initial per-layer parameters, the same every member starts with.
    /// * `stepsize` - The learning rate.
    /// * `max_iterations` - The amount of logical iterations to run, every worker
    ///   trains at least one before it can be told to stop.
    pub fn new(params: Vec<LayerParameter>, stepsize: f32, max_iterations: NonZeroUsize) -> Self {
        Self {
            params,
            stepsize,
            max_iterations,
            iteration: 0,
        }
    }

    /// The amount of completed logical iterations.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn parameters(&self) -> &[LayerParameter] {
        &self.params
    }

    /// Serves rounds until `max_iterations` logical iterations completed.
    ///
    /// # Arguments
    /// * `group` - Every worker of the job.
    ///
    /// # Returns
    /// The final parameters.
    pub async fn run<R, W>(mut self, group: &mut Group<R, W>) -> Result<Vec<LayerParameter>>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(
            workers = group.len(),
            max_iterations = self.max_iterations.get();
            "collective aggregator started"
        );

        let mut rounds = 0usize;

        while self.iteration < self.max_iterations.get() {
            let init = DeltaSum::new(&self.params);
            let delta = group
                .reduce(init, |mut delta: DeltaSum, msg: Msg| -> Result<DeltaSum> {
                    let Msg::Data(Payload::Gradients(batch)) = msg else {
                        return Err(unexpected("data/gradients", &msg));
                    };

                    for grads in batch {
                        delta.add(&param::from_wire(grads)?)?;
                    }

                    Ok(delta)
                })
                .await?;

            if delta.is_empty() {
                self.finish_iteration(group).await?;
                debug!(iteration = self.iteration, rounds = rounds; "iteration rounds");
                rounds = 0;
                continue;
            }

            rounds += 1;
            delta.apply(&mut self.params, self.stepsize)?;

            let msg = Msg::Data(Payload::Params(param::to_wire(&self.params)));
            group.broadcast(&msg).await?;
        }

        Ok(self.params)
    }

    /// The sentinel round: releases the members from their drain, pools their
    /// stats and tells them whether to go on.
    async fn finish_iteration<R, W>(&mut self, group: &mut Group<R, W>) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        group
            .broadcast(&Msg::Data(Payload::Params(Vec::new())))
            .await?;

        let stats = group
            .reduce(StatsPair::default(), |mut acc: StatsPair, msg: Msg| -> Result<StatsPair> {
                let Msg::Data(Payload::Stats(stats)) = msg else {
                    return Err(unexpected("data/stats", &msg));
                };

                acc.merge(&stats.into());
                Ok(acc)
            })
            .await?;

        self.iteration += 1;

        info!(
            iteration = self.iteration,
            training_samples = stats.training.total(),
            training_error = stats.training.error().unwrap_or(f32::NAN),
            validation_samples = stats.validation.total(),
            validation_error = stats.validation.error().unwrap_or(f32::NAN);
            "iteration finished"
        );

        let cmd = if self.iteration >= self.max_iterations.get() {
            Command::Stop
        } else {
            Command::Continue {
                iteration: self.iteration,
            }
        };

        group.broadcast(&Msg::Control(cmd)).await?;
        Ok(())
    }
}

fn unexpected(expected: &'static str, msg: &Msg) -> ServerErr {
    ServerErr::UnexpectedMessage {
        expected,
        got: msg.kind(),
    }
}
