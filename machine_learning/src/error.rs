use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug, Clone, PartialEq)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    UnknownLayerType(String),
    UnknownPoolingType(String),
    InvalidShape(String),
    InvalidKernel {
        kernel: usize,
        stride: usize,
        height: usize,
        width: usize,
    },
    Distribution(String),
    NotLearnable {
        layer: usize,
    },
    Unsupported {
        op: &'static str,
        layer: usize,
    },
    InvalidRange {
        begin: usize,
        end: usize,
        layers: usize,
    },
    LabelOutOfRange {
        label: usize,
        outputs: usize,
    },
    LayerCountMismatch {
        got: usize,
        expected: usize,
    },
    EmptyNetwork,
    LearnableOutput {
        layer: usize,
    },
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch in {what}, got {got} and expected {expected}"
            ),
            MlErr::UnknownLayerType(kind) => write!(f, "Unknown layer type {kind:?}"),
            MlErr::UnknownPoolingType(kind) => write!(f, "Unknown pooling type {kind:?}"),
            MlErr::InvalidShape(shape) => write!(f, "Invalid input shape {shape:?}"),
            MlErr::InvalidKernel {
                kernel,
                stride,
                height,
                width,
            } => write!(
                f,
                "A kernel of size {kernel} with stride {stride} does not tile a {height}x{width} input"
            ),
            MlErr::Distribution(detail) => {
                write!(f, "Failed to build the initialization distribution: {detail}")
            }
            MlErr::NotLearnable { layer } => {
                write!(f, "Layer {layer} has no learnable parameters")
            }
            MlErr::Unsupported { op, layer } => {
                write!(f, "Layer {layer} does not support the {op} operation")
            }
            MlErr::InvalidRange { begin, end, layers } => write!(
                f,
                "The layer range [{begin}, {end}] is invalid for a network of {layers} layers"
            ),
            MlErr::LabelOutOfRange { label, outputs } => write!(
                f,
                "The label {label} is out of range for an output of size {outputs}"
            ),
            MlErr::LayerCountMismatch { got, expected } => write!(
                f,
                "Got {got} per-layer values for a network of {expected} layers"
            ),
            MlErr::EmptyNetwork => write!(f, "A network needs at least one layer"),
            MlErr::LearnableOutput { layer } => write!(
                f,
                "The output layer {layer} is learnable, the network must end in a loss layer"
            ),
        }
    }
}

impl Error for MlErr {}

impl From<rand_distr::uniform::Error> for MlErr {
    fn from(value: rand_distr::uniform::Error) -> Self {
        Self::Distribution(value.to_string())
    }
}
