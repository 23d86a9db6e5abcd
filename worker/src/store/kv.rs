use std::{num::NonZeroUsize, time::Duration};

use comms::{
    FrameReceiver, FrameSender,
    msg::{Command, GRADIENT_KEY, Msg, PARAMETER_KEY, Payload},
};
use log::{debug, info, warn};
use machine_learning::{LayerParameter, Network, StatsPair, param};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    time,
};

use super::{ParameterStore, Progress, unexpected};
use crate::{Result, WorkerErr};

const PULL_ATTEMPTS: usize = 3;
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// A store talking to a remote key-value aggregator.
///
/// Gradients are buffered locally and pushed as one batch right before each
/// pull. There is no barrier between workers, each one counts its own logical
/// iterations.
pub struct KvStore<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    rx: FrameReceiver<R>,
    tx: FrameSender<W>,
    pending: Vec<Vec<LayerParameter>>,
    retry_delay: Duration,
    iteration: usize,
    max_iterations: NonZeroUsize,
}

impl<R, W> KvStore<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a new `KvStore`.
    ///
    /// # Arguments
    /// * `rx` - The receiving end of the communication with the aggregator.
    /// * `tx` - The sending end of the communication with the aggregator.
    /// * `max_iterations` - The amount of logical iterations to run.
    pub fn new(
        rx: FrameReceiver<R>,
        tx: FrameSender<W>,
        max_iterations: NonZeroUsize,
    ) -> Self {
        Self {
            rx,
            tx,
            pending: Vec::new(),
            retry_delay: RETRY_DELAY,
            iteration: 0,
            max_iterations,
        }
    }

    /// Overrides the pause between two pulls of a missing key.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Stores `params` under `key` in the aggregator.
    pub async fn put(&mut self, key: &str, params: &[LayerParameter]) -> Result<()> {
        let cmd = Msg::Control(Command::Put {
            key: key.to_string(),
        });
        self.tx.send(&cmd).await?;
        self.tx
            .send(&Msg::Data(Payload::Params(param::to_wire(params))))
            .await?;

        self.expect_ack().await
    }

    async fn expect_ack(&mut self) -> Result<()> {
        match self.rx.recv().await? {
            Msg::Control(Command::Ack) => Ok(()),
            Msg::Err(detail) => Err(WorkerErr::Server(detail)),
            other => Err(unexpected("control/ack", &other)),
        }
    }

    async fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let batch: Vec<_> = self.pending.drain(..).map(|g| param::to_wire(&g)).collect();
        debug!(arrays = batch.len(); "pushing gradients");

        let cmd = Msg::Control(Command::Push {
            key: GRADIENT_KEY.to_string(),
        });
        self.tx.send(&cmd).await?;
        self.tx.send(&Msg::Data(Payload::Gradients(batch))).await?;

        self.expect_ack().await
    }

    /// Pulls `key`, retrying a bounded amount of times while the aggregator has no value for it.
    async fn pull_key(&mut self, key: &str) -> Result<Vec<LayerParameter>> {
        for attempt in 1..=PULL_ATTEMPTS {
            let cmd = Msg::Control(Command::Pull {
                key: key.to_string(),
            });
            self.tx.send(&cmd).await?;

            match self.rx.recv().await? {
                Msg::Data(Payload::Params(params)) => return Ok(param::from_wire(params)?),
                Msg::Control(Command::Missing { .. }) => {
                    warn!(key = key, attempt = attempt; "key is missing");
                    if attempt < PULL_ATTEMPTS {
                        time::sleep(self.retry_delay).await;
                    }
                }
                Msg::Err(detail) => return Err(WorkerErr::Server(detail)),
                other => return Err(unexpected("data/params", &other)),
            }
        }

        Err(WorkerErr::MissingKey {
            key: key.to_string(),
            attempts: PULL_ATTEMPTS,
        })
    }
}

impl<R, W> ParameterStore for KvStore<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn push(&mut self, grads: Option<Vec<LayerParameter>>) -> Result<()> {
        self.pending.extend(grads);
        Ok(())
    }

    async fn pull(&mut self) -> Result<Vec<LayerParameter>> {
        self.flush().await?;
        self.pull_key(PARAMETER_KEY).await
    }

    async fn finish_iteration(
        &mut self,
        network: &mut Network,
        stats: StatsPair,
    ) -> Result<Progress> {
        let params = self.pull().await?;
        network.adopt(params)?;
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
        self.flush().await?;
        self.tx.send(&Msg::Control(Command::Disconnect)).await?;
        Ok(())
    }
}
