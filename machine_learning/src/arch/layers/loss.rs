use ndarray::{Array1, ArrayView1};

use super::dense::check_len;
use crate::{MlErr, Result, arch::activations::Sigmoid};

/// The activation applied by an output layer that also defines the loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossKind {
    /// Softmax with cross entropy.
    Softmax,
    /// Element-wise sigmoid with binary cross entropy.
    Sigmoid,
}

impl LossKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "softmax_loss" => Some(Self::Softmax),
            "sigmoid_loss" => Some(Self::Sigmoid),
            _ => None,
        }
    }
}

/// An output layer fusing an activation with its loss, so that the error at its
/// input is simply `activation - onehot(label)`.
#[derive(Debug, Clone)]
pub struct ActivationWithLoss {
    kind: LossKind,
    size: usize,
}

impl ActivationWithLoss {
    pub fn new(kind: LossKind, size: usize) -> Self {
        Self { kind, size }
    }

    pub fn kind(&self) -> LossKind {
        self.kind
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn forward(&self, x: ArrayView1<f32>) -> Result<Array1<f32>> {
        check_len("loss input", x.len(), self.size)?;

        let a = match self.kind {
            LossKind::Softmax => {
                let max = x.fold(f32::NEG_INFINITY, |m, &z| m.max(z));
                let exp = x.mapv(|z| (z - max).exp());
                let sum = exp.sum();
                exp / sum
            }
            LossKind::Sigmoid => x.mapv(|z| Sigmoid.f(z)),
        };

        Ok(a)
    }

    /// The loss derivative with respect to this layer's input.
    ///
    /// # Arguments
    /// * `x` - The input of this layer.
    /// * `label` - The index of the expected class.
    pub fn backward_output(&self, x: ArrayView1<f32>, label: usize) -> Result<Array1<f32>> {
        if label >= self.size {
            return Err(MlErr::LabelOutOfRange {
                label,
                outputs: self.size,
            });
        }

        let mut d = self.forward(x)?;
        d[label] -= 1.;
        Ok(d)
    }

    /// The vector-Jacobian product of the activation alone, for a loss layer used mid network.
    ///
    /// # Arguments
    /// * `a` - The activation this layer produced.
    /// * `d` - The error at this layer's output.
    pub fn backward(&self, a: ArrayView1<f32>, d: ArrayView1<f32>) -> Result<Array1<f32>> {
        check_len("loss activation", a.len(), self.size)?;
        check_len("loss error", d.len(), self.size)?;

        let e = match self.kind {
            LossKind::Softmax => {
                let dot = a.dot(&d);
                &a * &d.mapv(|d| d - dot)
            }
            LossKind::Sigmoid => &d * &a.mapv(|a| Sigmoid.df_from_output(a)),
        };

        Ok(e)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn close(a: &Array1<f32>, b: &Array1<f32>) -> bool {
        a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-6)
    }

    #[test]
    fn softmax_is_shift_invariant_and_sums_to_one() {
        let layer = ActivationWithLoss::new(LossKind::Softmax, 3);
        let a = layer.forward(array![1., 2., 3.].view()).unwrap();
        let b = layer.forward(array![101., 102., 103.].view()).unwrap();

        assert!((a.sum() - 1.).abs() < 1e-6);
        assert!(close(&a, &b));
    }

    #[test]
    fn output_error_is_activation_minus_onehot() {
        let layer = ActivationWithLoss::new(LossKind::Softmax, 2);
        let d = layer.backward_output(array![0., 0.].view(), 1).unwrap();

        assert_eq!(d, array![0.5, -0.5]);
    }

    #[test]
    fn label_out_of_range() {
        let layer = ActivationWithLoss::new(LossKind::Sigmoid, 2);

        assert_eq!(
            layer.backward_output(array![0., 0.].view(), 2),
            Err(MlErr::LabelOutOfRange {
                label: 2,
                outputs: 2
            })
        );
    }

    #[test]
    fn softmax_jacobian_kills_uniform_errors() {
        let layer = ActivationWithLoss::new(LossKind::Softmax, 3);
        let a = layer.forward(array![0.3, -0.2, 1.].view()).unwrap();
        let e = layer.backward(a.view(), array![2., 2., 2.].view()).unwrap();

        assert!(e.iter().all(|v| v.abs() < 1e-6));
    }
}
