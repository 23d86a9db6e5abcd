use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use machine_learning::MlErr;

/// The result type used in the entire parameter server module.
pub type Result<T> = std::result::Result<T, ServerErr>;

/// The parameter server module's error type.
#[derive(Debug)]
pub enum ServerErr {
    Io(io::Error),
    Ml(MlErr),
    UnexpectedMessage {
        expected: &'static str,
        got: &'static str,
    },
    /// A request needs a key that holds no value yet.
    MissingKey(String),
    /// A new value does not fit the gradients already waiting to be folded into it.
    Conflict {
        key: String,
        source: MlErr,
    },
}

impl Display for ServerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerErr::Io(e) => write!(f, "io error: {e}"),
            ServerErr::Ml(e) => write!(f, "machine learning error: {e}"),
            ServerErr::UnexpectedMessage { expected, got } => write!(
                f,
                "Received an unexpected message kind, expected {expected} and got {got}"
            ),
            ServerErr::MissingKey(key) => write!(f, "The key {key:?} holds no value"),
            ServerErr::Conflict { key, source } => write!(
                f,
                "The new value of {key:?} does not fit the pending gradients: {source}"
            ),
        }
    }
}

impl Error for ServerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ServerErr::Io(e) => Some(e),
            ServerErr::Ml(e) | ServerErr::Conflict { source: e, .. } => Some(e),
            ServerErr::UnexpectedMessage { .. } | ServerErr::MissingKey(_) => None,
        }
    }
}

impl From<io::Error> for ServerErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<MlErr> for ServerErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}
