use std::io;

use bytes::{Buf, BufMut};

use crate::{
    Deserialize, Serialize,
    wire::{StatsPair, WireParameter},
};

type Header = u32;
const HEADER_SIZE: usize = size_of::<Header>();

const ERR: Header = 0;
const CONTROL: Header = 1;
const GRADIENTS: Header = 2;
const PARAMS: Header = 3;
const STATS: Header = 4;

/// The key the workers push their gradient batches under in a key-value aggregator.
pub const GRADIENT_KEY: &str = "gradients";

/// The key the current parameters are stored under in a key-value aggregator.
pub const PARAMETER_KEY: &str = "parameters";

/// The command for the `Control` variant of the `Msg` enum.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// A logical iteration finished and the next one, `iteration`, starts now.
    Continue { iteration: usize },
    /// The last logical iteration finished, the job is over.
    Stop,
    /// The next `Data` frame is a gradient batch to append under `key`.
    Push { key: String },
    /// The next `Data` frame is a parameter array to store under `key`.
    Put { key: String },
    /// Requests the value stored under `key`.
    Pull { key: String },
    /// Answer to a `Pull` whose key holds no value yet.
    Missing { key: String },
    Ack,
    Disconnect,
}

/// The payload data for the `Data` variant of the `Msg` enum.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Every per-layer gradient array computed since the last pull.
    Gradients(Vec<Vec<WireParameter>>),
    /// A full per-layer parameter array, empty when it acts as the end of iteration sentinel.
    Params(Vec<WireParameter>),
    Stats(StatsPair),
}

/// The application layer message for the entire system.
#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    Control(Command),
    Data(Payload),
    Err(String),
}

impl Msg {
    /// A short name for the kind of this message, meant for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Msg::Control(_) => "control",
            Msg::Err(_) => "err",
            Msg::Data(Payload::Gradients(_)) => "data/gradients",
            Msg::Data(Payload::Params(_)) => "data/params",
            Msg::Data(Payload::Stats(_)) => "data/stats",
        }
    }

    fn buf_is_too_small<T>(size: usize) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("The given buffer is too small {size}, must at least be {HEADER_SIZE} bytes"),
        ))
    }

    fn invalid_kind<T>(kind: Header) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Received an invalid kind header {kind}"),
        ))
    }
}

impl Serialize for Msg {
    fn serialize<B: BufMut>(&self, buf: &mut B) -> io::Result<()> {
        match self {
            Msg::Err(detail) => {
                buf.put_u32(ERR);
                buf.put_slice(detail.as_bytes());
            }
            Msg::Control(cmd) => {
                buf.put_u32(CONTROL);
                let json = serde_json::to_vec(cmd)?;
                buf.put_slice(&json);
            }
            Msg::Data(Payload::Gradients(batch)) => {
                buf.put_u32(GRADIENTS);
                batch.serialize(buf)?;
            }
            Msg::Data(Payload::Params(params)) => {
                buf.put_u32(PARAMS);
                params.serialize(buf)?;
            }
            Msg::Data(Payload::Stats(stats)) => {
                buf.put_u32(STATS);
                stats.serialize(buf)?;
            }
        }

        Ok(())
    }
}

impl Deserialize for Msg {
    fn deserialize(buf: &mut &[u8]) -> io::Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Self::buf_is_too_small(buf.len());
        }

        let kind = buf.get_u32();

        let msg = match kind {
            ERR => {
                let detail = String::from_utf8_lossy(buf).into_owned();
                buf.advance(buf.len());
                Msg::Err(detail)
            }
            CONTROL => {
                let cmd = serde_json::from_slice(buf)?;
                buf.advance(buf.len());
                Msg::Control(cmd)
            }
            GRADIENTS => Msg::Data(Payload::Gradients(Deserialize::deserialize(buf)?)),
            PARAMS => Msg::Data(Payload::Params(Deserialize::deserialize(buf)?)),
            STATS => Msg::Data(Payload::Stats(StatsPair::deserialize(buf)?)),
            other => return Self::invalid_kind(other),
        };

        Ok(msg)
    }
}
