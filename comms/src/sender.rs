//! The sending end of the length-prefixed frame protocol.

use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{LEN_TYPE_SIZE, LenType, MAX_FRAME_LEN, Serialize};

/// Writes whole messages as `u64` big-endian length + body frames.
pub struct FrameSender<W>
where
    W: AsyncWrite + Unpin,
{
    tx: W,
    frame: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> FrameSender<W> {
    pub(super) fn new(tx: W) -> Self {
        Self {
            tx,
            frame: Vec::new(),
        }
    }

    /// Serializes `msg` into one frame and writes it out.
    ///
    /// The frame is built in full before the first byte is written, so a message
    /// that fails to serialize or is too big for a receiver leaves the stream untouched.
    ///
    /// # Returns
    /// An `InvalidInput` io error if the body exceeds `MAX_FRAME_LEN`, or the writer's error.
    pub async fn send<T: Serialize>(&mut self, msg: &T) -> io::Result<()> {
        self.frame.clear();
        self.frame.extend_from_slice(&[0; LEN_TYPE_SIZE]);
        msg.serialize(&mut self.frame)?;

        let body = self.frame.len() - LEN_TYPE_SIZE;
        if body > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("frame of {body} bytes exceeds the {MAX_FRAME_LEN} bytes limit"),
            ));
        }

        let header = (body as LenType).to_be_bytes();
        self.frame[..LEN_TYPE_SIZE].copy_from_slice(&header);

        self.tx.write_all(&self.frame).await?;
        self.tx.flush().await
    }
}
