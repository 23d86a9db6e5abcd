use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Uniform};

use crate::{LayerParameter, MlErr, Result};

/// A fully connected layer computing `x · W + b` on row vectors.
#[derive(Debug, Clone)]
pub struct FullyConnected {
    param: LayerParameter,
}

impl FullyConnected {
    /// Creates a new `FullyConnected` layer with seeded uniform weights and zero biases.
    ///
    /// # Arguments
    /// * `inputs` - The size of the input vector.
    /// * `outputs` - The size of the output vector.
    /// * `seed` - The seed of the weight initialization.
    ///
    /// # Returns
    /// The new layer, or an error if either size is zero.
    pub fn new(inputs: usize, outputs: usize, seed: u64) -> Result<Self> {
        if inputs == 0 || outputs == 0 {
            return Err(MlErr::InvalidShape(format!("{inputs}x{outputs}")));
        }

        let limit = (6. / (inputs + outputs) as f32).sqrt();
        let dist = Uniform::new(-limit, limit)?;
        let mut rng = StdRng::seed_from_u64(seed);

        let weight = Array2::from_shape_simple_fn((inputs, outputs), || dist.sample(&mut rng));
        let bias = Array1::zeros(outputs);

        Ok(Self::from_parameter(LayerParameter::new(weight, bias)))
    }

    /// Creates a layer around an existing parameter, `weight` is `inputs x outputs`.
    pub fn from_parameter(param: LayerParameter) -> Self {
        Self { param }
    }

    pub fn inputs(&self) -> usize {
        self.param.weight().nrows()
    }

    pub fn outputs(&self) -> usize {
        self.param.weight().ncols()
    }

    pub fn parameter(&self) -> &LayerParameter {
        &self.param
    }

    /// Replaces the parameter, it must have the shape of the current one.
    pub fn set_parameter(&mut self, param: LayerParameter) -> Result<()> {
        if !self.param.same_shape(&param) {
            return Err(MlErr::SizeMismatch {
                what: "fully connected parameter",
                got: param.weight().len() + param.bias().len(),
                expected: self.param.weight().len() + self.param.bias().len(),
            });
        }

        self.param = param;
        Ok(())
    }

    pub fn forward(&self, x: ArrayView1<f32>) -> Result<Array1<f32>> {
        check_len("fully connected input", x.len(), self.inputs())?;
        Ok(x.dot(self.param.weight()) + self.param.bias())
    }

    /// Propagates `d`, the error at this layer's output, to its input.
    pub fn backward(&self, d: ArrayView1<f32>) -> Result<Array1<f32>> {
        check_len("fully connected error", d.len(), self.outputs())?;
        Ok(d.dot(&self.param.weight().t()))
    }

    /// The weight gradient is the outer product `xᵀ · d`, the bias gradient is `d`.
    pub fn gradient(&self, x: ArrayView1<f32>, d: ArrayView1<f32>) -> Result<LayerParameter> {
        check_len("fully connected input", x.len(), self.inputs())?;
        check_len("fully connected error", d.len(), self.outputs())?;

        let dw = x.insert_axis(Axis(1)).dot(&d.insert_axis(Axis(0)));
        Ok(LayerParameter::new(dw, d.to_owned()))
    }
}

pub(super) fn check_len(what: &'static str, got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(MlErr::SizeMismatch {
            what,
            got,
            expected,
        });
    }

    Ok(())
}
