//! Per-layer weight and bias arrays, and their conversion to the wire format.

use comms::wire::{Tensor2D, WireParameter};
use ndarray::{Array1, Array2};

use crate::{MlErr, Result};

/// The learnable values of a single layer.
///
/// Non learnable layers carry an empty parameter so that a network's parameter
/// array always has one entry per layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerParameter {
    weight: Array2<f32>,
    bias: Array1<f32>,
}

impl LayerParameter {
    /// Creates a new `LayerParameter`.
    ///
    /// # Arguments
    /// * `weight` - The weight matrix, shaped `(inputs, outputs)` for a fully connected layer.
    /// * `bias` - The bias vector.
    pub fn new(weight: Array2<f32>, bias: Array1<f32>) -> Self {
        Self { weight, bias }
    }

    /// The parameter of a layer with nothing to learn.
    pub fn empty() -> Self {
        Self::new(Array2::zeros((0, 0)), Array1::zeros(0))
    }

    /// A parameter of the same shape as this one filled with zeros.
    pub fn zeros_like(&self) -> Self {
        Self::new(Array2::zeros(self.weight.dim()), Array1::zeros(self.bias.len()))
    }

    pub fn is_empty(&self) -> bool {
        self.weight.is_empty() && self.bias.is_empty()
    }

    pub fn weight(&self) -> &Array2<f32> {
        &self.weight
    }

    pub fn bias(&self) -> &Array1<f32> {
        &self.bias
    }

    /// Whether `other` can be added to or subtracted from this parameter.
    pub fn same_shape(&self, other: &Self) -> bool {
        self.weight.dim() == other.weight.dim() && self.bias.len() == other.bias.len()
    }

    fn check_shape(&self, other: &Self) -> Result<()> {
        if self.same_shape(other) {
            return Ok(());
        }

        Err(MlErr::SizeMismatch {
            what: "layer parameter",
            got: other.weight.len() + other.bias.len(),
            expected: self.weight.len() + self.bias.len(),
        })
    }

    /// Accumulates `other` into this parameter element-wise.
    ///
    /// # Arguments
    /// * `other` - A parameter of the same shape.
    pub fn add_assign(&mut self, other: &Self) -> Result<()> {
        self.check_shape(other)?;
        self.weight += &other.weight;
        self.bias += &other.bias;
        Ok(())
    }

    /// Computes `self -= alpha * delta` element-wise.
    ///
    /// # Arguments
    /// * `alpha` - The factor applied to `delta`.
    /// * `delta` - A parameter of the same shape.
    pub fn scaled_sub(&mut self, alpha: f32, delta: &Self) -> Result<()> {
        self.check_shape(delta)?;
        self.weight.scaled_add(-alpha, &delta.weight);
        self.bias.scaled_add(-alpha, &delta.bias);
        Ok(())
    }
}

impl From<&LayerParameter> for WireParameter {
    fn from(param: &LayerParameter) -> Self {
        let (rows, cols) = param.weight.dim();

        Self {
            weight: Tensor2D {
                rows,
                cols,
                data: param.weight.iter().copied().collect(),
            },
            bias: Tensor2D {
                rows: 1,
                cols: param.bias.len(),
                data: param.bias.to_vec(),
            },
        }
    }
}

impl TryFrom<WireParameter> for LayerParameter {
    type Error = MlErr;

    fn try_from(wire: WireParameter) -> Result<Self> {
        let WireParameter { weight, bias } = wire;

        let expected = weight.rows * weight.cols;
        let got = weight.data.len();
        let weight = Array2::from_shape_vec((weight.rows, weight.cols), weight.data).map_err(
            |_| MlErr::SizeMismatch {
                what: "weight tensor",
                got,
                expected,
            },
        )?;

        if bias.rows > 1 {
            return Err(MlErr::SizeMismatch {
                what: "bias rows",
                got: bias.rows,
                expected: 1,
            });
        }

        Ok(Self::new(weight, Array1::from(bias.data)))
    }
}

/// Converts a per-layer parameter array to its wire form.
pub fn to_wire(params: &[LayerParameter]) -> Vec<WireParameter> {
    params.iter().map(WireParameter::from).collect()
}

/// Converts a per-layer parameter array from its wire form.
pub fn from_wire(params: Vec<WireParameter>) -> Result<Vec<LayerParameter>> {
    params.into_iter().map(LayerParameter::try_from).collect()
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn param() -> LayerParameter {
        LayerParameter::new(array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]], array![0.5, -0.5, 1.0])
    }

    #[test]
    fn scaled_sub_moves_against_the_delta() {
        let mut p = param();
        let delta = LayerParameter::new(Array2::ones((2, 3)), Array1::ones(3));

        p.scaled_sub(0.5, &delta).unwrap();

        assert_eq!(p.weight(), &array![[0.5, 1.5, 2.5], [3.5, 4.5, 5.5]]);
        assert_eq!(p.bias(), &array![0.0, -1.0, 0.5]);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let mut p = param();
        let other = LayerParameter::new(Array2::ones((3, 2)), Array1::ones(3));

        assert!(matches!(
            p.add_assign(&other),
            Err(MlErr::SizeMismatch { .. })
        ));
        assert_eq!(p, param());
    }

    #[test]
    fn wire_form_is_row_major_with_a_single_bias_row() {
        let wire = WireParameter::from(&param());

        assert_eq!((wire.weight.rows, wire.weight.cols), (2, 3));
        assert_eq!(wire.weight.data, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!((wire.bias.rows, wire.bias.cols), (1, 3));

        assert_eq!(LayerParameter::try_from(wire).unwrap(), param());
    }

    #[test]
    fn empty_parameter_survives_the_wire() {
        let params = vec![param(), LayerParameter::empty()];
        let back = from_wire(to_wire(&params)).unwrap();

        assert_eq!(back, params);
        assert!(back[1].is_empty());
    }

    #[test]
    fn multi_row_bias_is_rejected() {
        let wire = WireParameter {
            weight: Tensor2D::default(),
            bias: Tensor2D {
                rows: 2,
                cols: 1,
                data: vec![1.0, 2.0],
            },
        };

        assert!(LayerParameter::try_from(wire).is_err());
    }
}
