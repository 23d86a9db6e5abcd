use std::num::NonZeroUsize;

use log::debug;
use ndarray::{Array1, ArrayView1};

use super::layers::Layer;
use crate::{LayerParameter, MlErr, Result, config::LayerSpec};

/// An ordered stack of layers trained one sample at a time.
#[derive(Debug, Clone)]
pub struct Network {
    layers: Vec<Layer>,
    batch_size: NonZeroUsize,
    trained: usize,
}

impl Network {
    /// Creates a new `Network`.
    ///
    /// # Arguments
    /// * `layers` - The layers in order, `layers[i].index()` must be `i`.
    /// * `batch_size` - The amount of samples to train between two pulls.
    ///
    /// # Returns
    /// The network, or an error if it is empty, if two consecutive layers disagree
    /// on their size or if the output layer is learnable.
    pub fn new(layers: Vec<Layer>, batch_size: NonZeroUsize) -> Result<Self> {
        let Some(output) = layers.last() else {
            return Err(MlErr::EmptyNetwork);
        };

        if output.is_learnable() {
            return Err(MlErr::LearnableOutput {
                layer: output.index(),
            });
        }

        for (i, layer) in layers.iter().enumerate() {
            if layer.index() != i {
                return Err(MlErr::SizeMismatch {
                    what: "layer index",
                    got: layer.index(),
                    expected: i,
                });
            }
        }

        for pair in layers.windows(2) {
            if pair[0].num_output() != pair[1].input_size() {
                return Err(MlErr::SizeMismatch {
                    what: "layer input",
                    got: pair[1].input_size(),
                    expected: pair[0].num_output(),
                });
            }
        }

        Ok(Self {
            layers,
            batch_size,
            trained: 0,
        })
    }

    /// Builds every layer out of its spec and stacks them.
    pub fn from_specs(specs: &[LayerSpec], batch_size: NonZeroUsize) -> Result<Self> {
        let layers = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| Layer::from_spec(i, spec))
            .collect::<Result<Vec<_>>>()?;

        let network = Self::new(layers, batch_size)?;
        debug!(layers = network.len(), batch_size = batch_size.get(); "built network");
        Ok(network)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn batch_size(&self) -> NonZeroUsize {
        self.batch_size
    }

    /// The amount of samples trained since the last adoption.
    pub fn trained(&self) -> usize {
        self.trained
    }

    pub fn input_size(&self) -> usize {
        self.layers[0].input_size()
    }

    pub fn output_size(&self) -> usize {
        self.layers[self.len() - 1].num_output()
    }

    fn check_range(&self, begin: usize, end: usize) -> Result<()> {
        if begin > end || end >= self.len() {
            return Err(MlErr::InvalidRange {
                begin,
                end,
                layers: self.len(),
            });
        }

        Ok(())
    }

    fn check_activations(&self, activations: &[Array1<f32>]) -> Result<()> {
        if activations.len() != self.len() + 1 {
            return Err(MlErr::SizeMismatch {
                what: "activations",
                got: activations.len(),
                expected: self.len() + 1,
            });
        }

        Ok(())
    }

    /// Runs the whole forward pass.
    ///
    /// # Returns
    /// The input followed by every layer's activation, `len() + 1` entries.
    pub fn forward(&self, input: ArrayView1<f32>) -> Result<Vec<Array1<f32>>> {
        let mut activations = Vec::with_capacity(self.len() + 1);
        activations.push(input.to_owned());
        activations.extend(self.forward_range(0, self.len() - 1, input)?);
        Ok(activations)
    }

    /// Runs layers `begin..=end` starting from `input`.
    ///
    /// # Returns
    /// The `end - begin + 1` activations of those layers, in order.
    pub fn forward_range(
        &self,
        begin: usize,
        end: usize,
        input: ArrayView1<f32>,
    ) -> Result<Vec<Array1<f32>>> {
        self.check_range(begin, end)?;

        let mut activations: Vec<Array1<f32>> = Vec::with_capacity(end - begin + 1);

        for layer in &self.layers[begin..=end] {
            let x = activations.last().map_or(input, |a| a.view());
            let a = layer.feed_forward(x)?;
            activations.push(a);
        }

        Ok(activations)
    }

    /// Runs the whole backward pass for one sample.
    ///
    /// # Arguments
    /// * `activations` - The result of `forward` for the sample.
    /// * `label` - The expected class of the sample.
    ///
    /// # Returns
    /// The errors ordered from the output layer down to layer 1, `len() - 1`
    /// entries, none for a network of a single layer.
    pub fn backward(&self, activations: &[Array1<f32>], label: usize) -> Result<Vec<Array1<f32>>> {
        let n = self.len();
        if n < 2 {
            return Ok(Vec::new());
        }

        self.check_activations(activations)?;

        let output = &self.layers[n - 1];
        let error = output.back_propagate_output(activations[n - 1].view(), label)?;

        let mut errors = Vec::with_capacity(n - 1);
        if n > 2 {
            let rest = self.backward_range(1, n - 2, activations, error.view())?;
            errors.push(error);
            errors.extend(rest);
        } else {
            errors.push(error);
        }

        Ok(errors)
    }

    /// Propagates `error`, the error at the output of layer `end`, down to the
    /// input of layer `begin`.
    ///
    /// # Returns
    /// The errors produced by layers `end` down to `begin`, in that order.
    pub fn backward_range(
        &self,
        begin: usize,
        end: usize,
        activations: &[Array1<f32>],
        error: ArrayView1<f32>,
    ) -> Result<Vec<Array1<f32>>> {
        self.check_range(begin, end)?;
        self.check_activations(activations)?;

        let mut errors: Vec<Array1<f32>> = Vec::with_capacity(end - begin + 1);

        for i in (begin..=end).rev() {
            let next_error = errors.last().map_or(error, |e| e.view());
            let e = self.layers[i].back_propagate(
                activations[i].view(),
                activations[i + 1].view(),
                next_error,
            )?;
            errors.push(e);
        }

        Ok(errors)
    }

    /// Computes one gradient entry per layer, empty for the non learnable ones.
    ///
    /// Layer `i` is fed the error produced by layer `i + 1`. A network of a single
    /// layer has no errors and yields an empty array.
    pub fn gradients(
        &self,
        activations: &[Array1<f32>],
        errors: &[Array1<f32>],
    ) -> Result<Vec<LayerParameter>> {
        let n = self.len();
        if n < 2 {
            return Ok(Vec::new());
        }

        self.check_activations(activations)?;
        if errors.len() != n - 1 {
            return Err(MlErr::SizeMismatch {
                what: "errors",
                got: errors.len(),
                expected: n - 1,
            });
        }

        self.layers
            .iter()
            .enumerate()
            .map(|(i, layer)| {
                if !layer.is_learnable() {
                    return Ok(LayerParameter::empty());
                }

                let error = (n - 2)
                    .checked_sub(i)
                    .map(|k| &errors[k])
                    .ok_or(MlErr::LearnableOutput { layer: i })?;

                layer.generate_parameter_gradient(activations[i].view(), error.view())
            })
            .collect()
    }

    /// Runs the forward and backward passes for one sample.
    ///
    /// # Returns
    /// The network output and the per-layer gradients.
    pub fn compute_gradients(
        &self,
        input: ArrayView1<f32>,
        label: usize,
    ) -> Result<(Array1<f32>, Vec<LayerParameter>)> {
        let mut activations = self.forward(input)?;
        let errors = self.backward(&activations, label)?;
        let gradients = self.gradients(&activations, &errors)?;

        let output = activations.pop().unwrap_or_default();
        Ok((output, gradients))
    }

    /// Counts a trained sample.
    ///
    /// # Returns
    /// Whether a full batch was trained since the last adoption.
    pub fn note_trained(&mut self) -> bool {
        self.trained += 1;
        self.trained >= self.batch_size.get()
    }

    /// A copy of every layer's parameter, empty for the non learnable ones.
    pub fn parameters(&self) -> Vec<LayerParameter> {
        self.layers
            .iter()
            .map(|l| l.parameter().cloned().unwrap_or_else(|_| LayerParameter::empty()))
            .collect()
    }

    /// Overwrites every learnable layer with the matching entry of `params` and
    /// resets the trained counter.
    ///
    /// # Arguments
    /// * `params` - One entry per layer, entries of non learnable layers are ignored.
    pub fn adopt(&mut self, params: Vec<LayerParameter>) -> Result<()> {
        if params.len() != self.len() {
            return Err(MlErr::LayerCountMismatch {
                got: params.len(),
                expected: self.len(),
            });
        }

        if let Some((layer, param)) = self
            .layers
            .iter()
            .zip(&params)
            .find(|(l, p)| l.is_learnable() && !l.parameter().is_ok_and(|own| own.same_shape(p)))
        {
            return Err(MlErr::SizeMismatch {
                what: "adopted parameter",
                got: param.weight().len() + param.bias().len(),
                expected: layer.parameter().map_or(0, |p| p.weight().len() + p.bias().len()),
            });
        }

        for (layer, param) in self.layers.iter_mut().zip(params) {
            if layer.is_learnable() {
                layer.set_parameter(param)?;
            }
        }

        self.trained = 0;
        Ok(())
    }
}
