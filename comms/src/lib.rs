mod collective;
mod deserialize;
pub mod msg;
mod receiver;
mod sender;
mod serialize;
pub mod wire;

use tokio::io::{AsyncRead, AsyncWrite};

pub use collective::{Group, Member};
pub use deserialize::Deserialize;
pub use receiver::FrameReceiver;
pub use sender::FrameSender;
pub use serialize::Serialize;

type LenType = u64;
const LEN_TYPE_SIZE: usize = size_of::<LenType>();

/// The biggest frame body a receiver will accept.
const MAX_FRAME_LEN: usize = 256 * 1024 * 1024;

/// Creates both `FrameReceiver` and `FrameSender` network channel parts.
///
/// Given a writer and reader creates and returns both ends of the communication.
///
/// # Arguments
/// * `rx` - An async readable.
/// * `tx` - An async writable.
///
/// # Returns
/// A communication stream in the form of a frame receiver and sender.
pub fn channel<R, W>(rx: R, tx: W) -> (FrameReceiver<R>, FrameSender<W>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    (FrameReceiver::new(rx), FrameSender::new(tx))
}
