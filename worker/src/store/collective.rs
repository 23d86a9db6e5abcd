use comms::{
    Member,
    msg::{Command, Msg, Payload},
};
use log::debug;
use machine_learning::{LayerParameter, Network, StatsPair, param};
use tokio::io::{AsyncRead, AsyncWrite};

use super::{ParameterStore, Progress, unexpected};
use crate::{Result, WorkerErr, coordinator};

/// A store whose aggregator is the root of a collective group.
///
/// Gradients are buffered locally and travel as one batch per pull, every pull
/// is a reduce followed by a broadcast that all the workers of the job take
/// part in.
pub struct CollectiveStore<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    member: Member<R, W>,
    pending: Vec<Vec<LayerParameter>>,
    rounds: usize,
}

impl<R, W> CollectiveStore<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a new `CollectiveStore`.
    ///
    /// # Arguments
    /// * `member` - This worker's end of the collective group.
    pub fn new(member: Member<R, W>) -> Self {
        Self {
            member,
            pending: Vec::new(),
            rounds: 0,
        }
    }

    /// The amount of reduce/broadcast rounds this worker took part in.
    pub fn rounds(&self) -> usize {
        self.rounds
    }
}

impl<R, W> ParameterStore for CollectiveStore<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn push(&mut self, grads: Option<Vec<LayerParameter>>) -> Result<()> {
        self.pending.extend(grads);
        Ok(())
    }

    async fn pull(&mut self) -> Result<Vec<LayerParameter>> {
        let batch = self.pending.drain(..).map(|g| param::to_wire(&g)).collect();

        self.member
            .reduce(&Msg::Data(Payload::Gradients(batch)))
            .await?;
        self.rounds += 1;

        match self.member.broadcast().await? {
            Msg::Data(Payload::Params(params)) => Ok(param::from_wire(params)?),
            Msg::Err(detail) => Err(WorkerErr::Server(detail)),
            other => Err(unexpected("data/params", &other)),
        }
    }

    async fn finish_iteration(
        &mut self,
        network: &mut Network,
        stats: StatsPair,
    ) -> Result<Progress> {
        let drained = coordinator::drain(self, network).await?;
        debug!(rounds = drained; "drained until the end of the iteration");

        self.member
            .reduce(&Msg::Data(Payload::Stats(stats.into())))
            .await?;

        match self.member.broadcast().await? {
            Msg::Control(Command::Continue { iteration }) => {
                debug!(iteration = iteration; "continuing");
                Ok(Progress::Continue)
            }
            Msg::Control(Command::Stop) => Ok(Progress::Stop),
            Msg::Err(detail) => Err(WorkerErr::Server(detail)),
            other => Err(unexpected("control", &other)),
        }
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
