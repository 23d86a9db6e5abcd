use machine_learning::{LayerParameter, MlErr, Result};
use rayon::prelude::*;

fn elements(p: &LayerParameter) -> usize {
    p.weight().len() + p.bias().len()
}

/// Checks that `grads` can be applied to per-layer values shaped like `params`.
///
/// # Arguments
/// * `params` - One entry per layer.
/// * `grads` - Either empty, from a network too small to produce errors, or one
///   entry per layer where every non empty entry has its layer's shape.
///
/// # Returns
/// A `LayerCountMismatch` or a `SizeMismatch` naming the element counts of the
/// first offending layer.
pub fn check_gradients(params: &[LayerParameter], grads: &[LayerParameter]) -> Result<()> {
    if grads.is_empty() {
        return Ok(());
    }

    if grads.len() != params.len() {
        return Err(MlErr::LayerCountMismatch {
            got: grads.len(),
            expected: params.len(),
        });
    }

    match params
        .iter()
        .zip(grads)
        .find(|(p, g)| !g.is_empty() && !p.same_shape(g))
    {
        Some((p, g)) => Err(MlErr::SizeMismatch {
            what: "gradient layer",
            got: elements(g),
            expected: elements(p),
        }),
        None => Ok(()),
    }
}

/// A running per-layer sum of gradient arrays.
///
/// The sum is shaped after the parameters it will be applied to, so every
/// accepted array is known to fit them. Every added array counts as one
/// contribution, empty arrays included, so the averaged update divides by the
/// amount of samples that produced them.
#[derive(Debug, Clone)]
pub struct DeltaSum {
    sum: Vec<LayerParameter>,
    count: usize,
}

impl DeltaSum {
    /// Creates a new empty `DeltaSum`.
    ///
    /// # Arguments
    /// * `params` - The per-layer parameters the sum will be applied to.
    pub fn new(params: &[LayerParameter]) -> Self {
        Self {
            sum: params.iter().map(LayerParameter::zeros_like).collect(),
            count: 0,
        }
    }

    /// The amount of arrays added since the last reset.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn layers(&self) -> usize {
        self.sum.len()
    }

    /// Adds a gradient array to the sum.
    ///
    /// # Returns
    /// The error of `check_gradients`, the sum is left untouched in that case.
    pub fn add(&mut self, grads: &[LayerParameter]) -> Result<()> {
        check_gradients(&self.sum, grads)?;

        if !grads.is_empty() {
            self.sum
                .par_iter_mut()
                .zip(grads.par_iter())
                .filter(|(_, g)| !g.is_empty())
                .try_for_each(|(acc, g)| acc.add_assign(g))?;
        }

        self.count += 1;
        Ok(())
    }

    /// Applies `params -= (stepsize / count) * sum`, does nothing when no array was added.
    ///
    /// Every layer is checked before the first one is written, a failed apply
    /// leaves `params` untouched.
    ///
    /// # Arguments
    /// * `params` - One entry per layer.
    /// * `stepsize` - The learning rate.
    pub fn apply(&self, params: &mut [LayerParameter], stepsize: f32) -> Result<()> {
        if self.count == 0 {
            return Ok(());
        }

        if params.len() != self.sum.len() {
            return Err(MlErr::LayerCountMismatch {
                got: self.sum.len(),
                expected: params.len(),
            });
        }

        if let Some((p, delta)) = params.iter().zip(&self.sum).find(|(p, d)| !p.same_shape(d)) {
            return Err(MlErr::SizeMismatch {
                what: "layer update",
                got: elements(delta),
                expected: elements(p),
            });
        }

        let alpha = stepsize / self.count as f32;

        params
            .par_iter_mut()
            .zip(self.sum.par_iter())
            .filter(|(_, delta)| !delta.is_empty())
            .try_for_each(|(p, delta)| p.scaled_sub(alpha, delta))
    }

    /// Empties the sum, keeping its shape.
    pub fn reset(&mut self) {
        self.sum.iter_mut().for_each(|s| *s = s.zeros_like());
        self.count = 0;
    }
}
