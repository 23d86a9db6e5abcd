use ndarray::{Array1, Array2};
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Uniform};

use super::Shape;
use crate::{LayerParameter, MlErr, Result};

/// A convolution over square windows, one weight column per filter.
///
/// Only its configuration and parameter bookkeeping are implemented, the
/// passes report `MlErr::Unsupported`.
#[derive(Debug, Clone)]
pub struct Convolution {
    input: Shape,
    kernel: usize,
    stride: usize,
    out: (usize, usize),
    param: LayerParameter,
}

impl Convolution {
    /// Creates a new `Convolution` layer.
    ///
    /// # Arguments
    /// * `input` - The shape of the input volume.
    /// * `kernel` - The side of the square window.
    /// * `stride` - The step between two windows.
    /// * `filters` - The amount of output channels.
    /// * `seed` - The seed of the weight initialization.
    ///
    /// # Returns
    /// The new layer, or an error if the window does not tile the input.
    pub fn new(
        input: Shape,
        kernel: usize,
        stride: usize,
        filters: usize,
        seed: u64,
    ) -> Result<Self> {
        let out = input.windows(kernel, stride)?;

        if filters == 0 {
            return Err(MlErr::InvalidShape(format!("{filters} filters")));
        }

        let fan_in = kernel * kernel * input.channels;
        let limit = (6. / (fan_in + filters) as f32).sqrt();
        let dist = Uniform::new(-limit, limit)?;
        let mut rng = StdRng::seed_from_u64(seed);

        let weight = Array2::from_shape_simple_fn((fan_in, filters), || dist.sample(&mut rng));
        let param = LayerParameter::new(weight, Array1::zeros(filters));

        Ok(Self {
            input,
            kernel,
            stride,
            out,
            param,
        })
    }

    pub fn input(&self) -> Shape {
        self.input
    }

    pub fn kernel(&self) -> usize {
        self.kernel
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn filters(&self) -> usize {
        self.param.bias().len()
    }

    pub fn num_output(&self) -> usize {
        self.out.0 * self.out.1 * self.filters()
    }

    pub fn parameter(&self) -> &LayerParameter {
        &self.param
    }

    pub fn set_parameter(&mut self, param: LayerParameter) -> Result<()> {
        if !self.param.same_shape(&param) {
            return Err(MlErr::SizeMismatch {
                what: "convolution parameter",
                got: param.weight().len() + param.bias().len(),
                expected: self.param.weight().len() + self.param.bias().len(),
            });
        }

        self.param = param;
        Ok(())
    }
}
