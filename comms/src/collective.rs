//! Blocking collective operations over a fixed set of participants.
//!
//! The root of the group (the aggregator) holds a `Group`, every other participant
//! holds a `Member`. A `reduce` completes on the root only once every member sent
//! its contribution, a `broadcast` completes on a member only once the root sent
//! the value. Members must call both operations the same amount of times as the
//! root does, otherwise the root waits forever.

use std::io;

use futures::future;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{FrameReceiver, FrameSender, msg::Msg};

/// The root end of a collective communication group.
pub struct Group<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    members: Vec<(FrameReceiver<R>, FrameSender<W>)>,
}

impl<R, W> Group<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a new empty `Group`.
    pub fn new() -> Self {
        Self {
            members: Vec::new(),
        }
    }

    /// Registers a new participant, the set is fixed once the first collective call happens.
    ///
    /// # Arguments
    /// * `rx` - The receiving end of the communication with the participant.
    /// * `tx` - The sending end of the communication with the participant.
    pub fn join(&mut self, rx: FrameReceiver<R>, tx: FrameSender<W>) {
        self.members.push((rx, tx));
    }

    /// Returns the amount of registered participants.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Waits for one message from every participant and combines them.
    ///
    /// # Arguments
    /// * `init` - The initial value of the accumulator.
    /// * `fold` - Combines the accumulator with one participant's message, in join order.
    ///
    /// # Returns
    /// The combined value, or the first io or `fold` error.
    pub async fn reduce<T, E, F>(&mut self, init: T, mut fold: F) -> Result<T, E>
    where
        F: FnMut(T, Msg) -> Result<T, E>,
        E: From<io::Error>,
    {
        let pending = self.members.iter_mut().map(|(rx, _)| rx.recv::<Msg>());
        let msgs = future::try_join_all(pending).await?;

        msgs.into_iter().try_fold(init, |acc, msg| fold(acc, msg))
    }

    /// Sends `msg` to every participant.
    ///
    /// # Arguments
    /// * `msg` - The message to broadcast.
    pub async fn broadcast(&mut self, msg: &Msg) -> io::Result<()> {
        let pending = self.members.iter_mut().map(|(_, tx)| tx.send(msg));
        future::try_join_all(pending).await?;
        Ok(())
    }
}

impl<R, W> Default for Group<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    fn default() -> Self {
        Self::new()
    }
}

/// A non-root participant of a collective communication group.
pub struct Member<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    rx: FrameReceiver<R>,
    tx: FrameSender<W>,
}

impl<R, W> Member<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a new `Member`.
    ///
    /// # Arguments
    /// * `rx` - The receiving end of the communication with the root.
    /// * `tx` - The sending end of the communication with the root.
    pub fn new(rx: FrameReceiver<R>, tx: FrameSender<W>) -> Self {
        Self { rx, tx }
    }

    /// Contributes `msg` to the root's current reduce.
    pub async fn reduce(&mut self, msg: &Msg) -> io::Result<()> {
        self.tx.send(msg).await
    }

    /// Waits for the root's next broadcast.
    pub async fn broadcast(&mut self) -> io::Result<Msg> {
        self.rx.recv().await
    }
}
