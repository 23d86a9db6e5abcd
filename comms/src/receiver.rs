use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{Deserialize, LEN_TYPE_SIZE, LenType, MAX_FRAME_LEN};

/// The receiving end handle of the communication.
pub struct FrameReceiver<R: AsyncRead + Unpin> {
    rx: R,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReceiver<R> {
    /// Creates a new `FrameReceiver` instance.
    ///
    /// # Arguments
    /// * `rx` - The underlying reader.
    pub(super) fn new(rx: R) -> Self {
        Self {
            rx,
            buf: Vec::new(),
        }
    }

    /// Waits to receive a new message from the inner receiver.
    ///
    /// # Returns
    /// A result object that returns `T` on success or `io::Error` on failure, a frame
    /// with bytes left over after decoding `T` is an `InvalidData` error.
    pub async fn recv<T: Deserialize>(&mut self) -> io::Result<T> {
        let mut size_buf = [0; LEN_TYPE_SIZE];
        self.rx.read_exact(&mut size_buf).await?;
        let len = LenType::from_be_bytes(size_buf) as usize;

        if len > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame of {len} bytes exceeds the {MAX_FRAME_LEN} bytes limit"),
            ));
        }

        self.buf.resize(len, 0);
        self.rx.read_exact(&mut self.buf).await?;

        let mut view = self.buf.as_slice();
        let msg = T::deserialize(&mut view)?;

        if !view.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} trailing bytes after the message", view.len()),
            ));
        }

        Ok(msg)
    }
}
