use crate::{MlErr, Result};

/// The dimensions of a layer input, flat inputs are `1 x N x 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl Shape {
    pub fn flat(len: usize) -> Self {
        Self {
            height: 1,
            width: len,
            channels: 1,
        }
    }

    /// Parses `HxWxC`, `HxW` or `N`.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || MlErr::InvalidShape(s.to_string());

        let dims = s
            .split('x')
            .map(|d| d.trim().parse::<usize>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>>>()?;

        if dims.contains(&0) {
            return Err(invalid());
        }

        match dims[..] {
            [len] => Ok(Self::flat(len)),
            [height, width] => Ok(Self {
                height,
                width,
                channels: 1,
            }),
            [height, width, channels] => Ok(Self {
                height,
                width,
                channels,
            }),
            _ => Err(invalid()),
        }
    }

    pub fn len(&self) -> usize {
        self.height * self.width * self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The output size of a square window sliding over this shape.
    ///
    /// # Returns
    /// `(out_height, out_width)`, or an error if the window does not tile the input exactly.
    pub fn windows(&self, kernel: usize, stride: usize) -> Result<(usize, usize)> {
        let tiles = |side: usize| kernel <= side && (side - kernel) % stride == 0;

        if kernel == 0 || stride == 0 || !tiles(self.height) || !tiles(self.width) {
            return Err(MlErr::InvalidKernel {
                kernel,
                stride,
                height: self.height,
                width: self.width,
            });
        }

        Ok((
            (self.height - kernel) / stride + 1,
            (self.width - kernel) / stride + 1,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_forms() {
        assert_eq!(Shape::parse("8").unwrap(), Shape::flat(8));
        assert_eq!(Shape::parse("28x28").unwrap().len(), 784);
        assert_eq!(Shape::parse("4 x 4 x 3").unwrap().channels, 3);
    }

    #[test]
    fn parse_rejects_garbage() {
        for s in ["", "0", "3x", "axb", "1x2x3x4", "-2"] {
            assert!(
                matches!(Shape::parse(s), Err(MlErr::InvalidShape(_))),
                "{s:?}"
            );
        }
    }

    #[test]
    fn windows_must_tile() {
        let shape = Shape::parse("5x5").unwrap();

        assert_eq!(shape.windows(3, 1).unwrap(), (3, 3));
        assert_eq!(shape.windows(3, 2).unwrap(), (2, 2));
        assert!(shape.windows(2, 2).is_err());
        assert!(shape.windows(6, 1).is_err());
        assert!(shape.windows(0, 1).is_err());
    }
}
