use super::Shape;
use crate::{MlErr, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolingKind {
    Max,
    Average,
}

impl PoolingKind {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "max" => Ok(Self::Max),
            "average" => Ok(Self::Average),
            other => Err(MlErr::UnknownPoolingType(other.to_string())),
        }
    }
}

/// A channel-wise pooling over square windows.
///
/// Only its configuration is implemented, the passes report `MlErr::Unsupported`.
#[derive(Debug, Clone)]
pub struct Pooling {
    input: Shape,
    kind: PoolingKind,
    kernel: usize,
    stride: usize,
    out: (usize, usize),
}

impl Pooling {
    pub fn new(input: Shape, kind: PoolingKind, kernel: usize, stride: usize) -> Result<Self> {
        let out = input.windows(kernel, stride)?;

        Ok(Self {
            input,
            kind,
            kernel,
            stride,
            out,
        })
    }

    pub fn input(&self) -> Shape {
        self.input
    }

    pub fn kind(&self) -> PoolingKind {
        self.kind
    }

    pub fn kernel(&self) -> usize {
        self.kernel
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn num_output(&self) -> usize {
        self.out.0 * self.out.1 * self.input.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_channels() {
        let pool = Pooling::new(Shape::parse("4x4x3").unwrap(), PoolingKind::Max, 2, 2).unwrap();
        assert_eq!(pool.num_output(), 2 * 2 * 3);
    }

    #[test]
    fn unknown_kind() {
        assert_eq!(
            PoolingKind::parse("median"),
            Err(MlErr::UnknownPoolingType("median".into()))
        );
    }
}
