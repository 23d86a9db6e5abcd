use std::{error::Error, fmt, io};

use machine_learning::MlErr;

/// The worker module's result type.
pub type Result<T> = std::result::Result<T, WorkerErr>;

/// Worker runtime failures.
#[derive(Debug)]
pub enum WorkerErr {
    Io(io::Error),
    Ml(MlErr),
    /// The aggregator answered with an error message.
    Server(String),
    UnexpectedMessage {
        expected: &'static str,
        got: &'static str,
    },
    MissingKey {
        key: String,
        attempts: usize,
    },
}

impl fmt::Display for WorkerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerErr::Io(e) => write!(f, "io error: {e}"),
            WorkerErr::Ml(e) => write!(f, "machine learning error: {e}"),
            WorkerErr::Server(detail) => write!(f, "aggregator error: {detail}"),
            WorkerErr::UnexpectedMessage { expected, got } => {
                write!(f, "unexpected message: expected {expected}, got {got}")
            }
            WorkerErr::MissingKey { key, attempts } => {
                write!(f, "key {key:?} still missing after {attempts} attempts")
            }
        }
    }
}

impl Error for WorkerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WorkerErr::Io(e) => Some(e),
            WorkerErr::Ml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for WorkerErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<MlErr> for WorkerErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<WorkerErr> for io::Error {
    fn from(value: WorkerErr) -> Self {
        match value {
            WorkerErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
