use ndarray::{Array1, ArrayView1};

use super::{
    Activation, ActivationWithLoss, Convolution, FullyConnected, LossKind, Pooling, PoolingKind,
    Shape,
};
use crate::{LayerParameter, MlErr, Result, arch::activations::ActFn, config::LayerSpec};

/// The computation a layer performs.
#[derive(Debug, Clone)]
pub enum LayerKind {
    FullyConnected(FullyConnected),
    Activation(Activation),
    Loss(ActivationWithLoss),
    Convolution(Convolution),
    Pooling(Pooling),
}
use LayerKind::*;

/// A layer of a network, aware of its position in it.
#[derive(Debug, Clone)]
pub struct Layer {
    index: usize,
    kind: LayerKind,
}

impl Layer {
    pub fn new(index: usize, kind: LayerKind) -> Self {
        Self { index, kind }
    }

    /// Builds the layer described by `spec`.
    ///
    /// # Arguments
    /// * `index` - The position of the layer in its network.
    /// * `spec` - The layer description.
    ///
    /// # Returns
    /// The layer, or a configuration error.
    pub fn from_spec(index: usize, spec: &LayerSpec) -> Result<Self> {
        let shape = Shape::parse(&spec.input_shape)?;
        let size = shape.len();

        let kind = match spec.kind.as_str() {
            "fully_connected" => FullyConnected(super::FullyConnected::new(
                size,
                spec.num_output,
                spec.seed,
            )?),
            "convolution" => Convolution(super::Convolution::new(
                shape,
                spec.kernel,
                spec.stride,
                spec.num_output,
                spec.seed,
            )?),
            "pooling" => Pooling(super::Pooling::new(
                shape,
                PoolingKind::parse(&spec.pooling)?,
                spec.kernel,
                spec.stride,
            )?),
            name => {
                if let Some(act_fn) = ActFn::from_name(name) {
                    Activation(super::Activation::new(act_fn, size))
                } else if let Some(loss) = LossKind::from_name(name) {
                    Loss(ActivationWithLoss::new(loss, size))
                } else {
                    return Err(MlErr::UnknownLayerType(name.to_string()));
                }
            }
        };

        Ok(Self::new(index, kind))
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> &LayerKind {
        &self.kind
    }

    pub fn is_learnable(&self) -> bool {
        matches!(self.kind, FullyConnected(_) | Convolution(_))
    }

    /// The size of the flat input vector this layer expects.
    pub fn input_size(&self) -> usize {
        match &self.kind {
            FullyConnected(l) => l.inputs(),
            Activation(l) => l.size(),
            Loss(l) => l.size(),
            Convolution(l) => l.input().len(),
            Pooling(l) => l.input().len(),
        }
    }

    pub fn num_output(&self) -> usize {
        match &self.kind {
            FullyConnected(l) => l.outputs(),
            Activation(l) => l.size(),
            Loss(l) => l.size(),
            Convolution(l) => l.num_output(),
            Pooling(l) => l.num_output(),
        }
    }

    pub fn parameter(&self) -> Result<&LayerParameter> {
        match &self.kind {
            FullyConnected(l) => Ok(l.parameter()),
            Convolution(l) => Ok(l.parameter()),
            _ => Err(self.not_learnable()),
        }
    }

    pub fn set_parameter(&mut self, param: LayerParameter) -> Result<()> {
        match &mut self.kind {
            FullyConnected(l) => l.set_parameter(param),
            Convolution(l) => l.set_parameter(param),
            _ => Err(MlErr::NotLearnable { layer: self.index }),
        }
    }

    /// Computes this layer's activation.
    pub fn feed_forward(&self, input: ArrayView1<f32>) -> Result<Array1<f32>> {
        match &self.kind {
            FullyConnected(l) => l.forward(input),
            Activation(l) => l.forward(input),
            Loss(l) => l.forward(input),
            Convolution(_) | Pooling(_) => Err(self.unsupported("feed_forward")),
        }
    }

    /// Propagates the error at this layer's output to its input.
    ///
    /// # Arguments
    /// * `input` - What this layer received in the forward pass.
    /// * `activation` - What this layer produced in the forward pass.
    /// * `next_error` - The error produced by the following layer.
    pub fn back_propagate(
        &self,
        input: ArrayView1<f32>,
        activation: ArrayView1<f32>,
        next_error: ArrayView1<f32>,
    ) -> Result<Array1<f32>> {
        match &self.kind {
            FullyConnected(l) => l.backward(next_error),
            Activation(l) => l.backward(input, next_error),
            Loss(l) => l.backward(activation, next_error),
            Convolution(_) | Pooling(_) => Err(self.unsupported("back_propagate")),
        }
    }

    /// Computes the loss derivative with respect to the input of the output layer.
    ///
    /// An activation layer used as output is treated as a squared error loss.
    pub fn back_propagate_output(
        &self,
        input: ArrayView1<f32>,
        label: usize,
    ) -> Result<Array1<f32>> {
        match &self.kind {
            Loss(l) => l.backward_output(input, label),
            Activation(l) => {
                if label >= l.size() {
                    return Err(MlErr::LabelOutOfRange {
                        label,
                        outputs: l.size(),
                    });
                }

                let mut d = l.forward(input)?;
                d[label] -= 1.;
                l.backward(input, d.view())
            }
            _ => Err(self.unsupported("back_propagate_output")),
        }
    }

    /// Computes the gradient of this layer's parameter.
    ///
    /// # Arguments
    /// * `input` - What this layer received in the forward pass.
    /// * `error` - The error at this layer's output, produced by the following layer.
    pub fn generate_parameter_gradient(
        &self,
        input: ArrayView1<f32>,
        error: ArrayView1<f32>,
    ) -> Result<LayerParameter> {
        match &self.kind {
            FullyConnected(l) => l.gradient(input, error),
            _ => Err(self.unsupported("generate_parameter_gradient")),
        }
    }

    fn unsupported(&self, op: &'static str) -> MlErr {
        MlErr::Unsupported {
            op,
            layer: self.index,
        }
    }

    fn not_learnable(&self) -> MlErr {
        MlErr::NotLearnable { layer: self.index }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn from_spec_builds_every_kind() {
        let specs = [
            LayerSpec::new("fully_connected", "4").with_output(3),
            LayerSpec::new("tanh", "3"),
            LayerSpec::new("sigmoid_loss", "2x2"),
            LayerSpec::new("convolution", "4x4x1")
                .with_kernel(2, 2)
                .with_output(5),
            LayerSpec::new("pooling", "4x4x2")
                .with_kernel(2, 2)
                .with_pooling("average"),
        ];

        let outputs: Vec<_> = specs
            .iter()
            .enumerate()
            .map(|(i, s)| Layer::from_spec(i, s).unwrap().num_output())
            .collect();

        assert_eq!(outputs, vec![3, 3, 4, 20, 8]);
    }

    #[test]
    fn from_spec_rejects_unknown_kinds() {
        assert_eq!(
            Layer::from_spec(0, &LayerSpec::new("dropout", "4")).unwrap_err(),
            MlErr::UnknownLayerType("dropout".into())
        );
        assert_eq!(
            Layer::from_spec(0, &LayerSpec::new("pooling", "4x4").with_kernel(2, 2))
                .unwrap_err(),
            MlErr::UnknownPoolingType(String::new())
        );
    }

    #[test]
    fn non_learnable_parameter_access_is_an_error() {
        let mut layer = Layer::from_spec(3, &LayerSpec::new("relu", "2")).unwrap();

        assert!(!layer.is_learnable());
        assert_eq!(
            layer.parameter().unwrap_err(),
            MlErr::NotLearnable { layer: 3 }
        );
        assert_eq!(
            layer.set_parameter(LayerParameter::empty()).unwrap_err(),
            MlErr::NotLearnable { layer: 3 }
        );
    }

    #[test]
    fn convolution_passes_are_unsupported() {
        let spec = LayerSpec::new("convolution", "2x2").with_kernel(1, 1).with_output(1);
        let layer = Layer::from_spec(1, &spec).unwrap();
        let x = array![1., 2., 3., 4.];

        assert!(layer.is_learnable());
        assert_eq!(
            layer.feed_forward(x.view()).unwrap_err(),
            MlErr::Unsupported {
                op: "feed_forward",
                layer: 1
            }
        );
        assert!(
            layer
                .generate_parameter_gradient(x.view(), x.view())
                .is_err()
        );
    }

    #[test]
    fn fully_connected_rejects_zero_outputs() {
        let res = Layer::from_spec(0, &LayerSpec::new("fully_connected", "4"));
        assert!(matches!(res, Err(MlErr::InvalidShape(_))));
    }
}
