use ndarray::{Array1, ArrayView1, Zip};

use super::dense::check_len;
use crate::{Result, arch::activations::ActFn};

/// An element-wise activation layer, it has nothing to learn.
#[derive(Debug, Clone)]
pub struct Activation {
    act_fn: ActFn,
    size: usize,
}

impl Activation {
    pub fn new(act_fn: ActFn, size: usize) -> Self {
        Self { act_fn, size }
    }

    pub fn act_fn(&self) -> ActFn {
        self.act_fn
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn forward(&self, x: ArrayView1<f32>) -> Result<Array1<f32>> {
        check_len("activation input", x.len(), self.size)?;
        Ok(x.mapv(|z| self.act_fn.f(z)))
    }

    /// Computes `d ⊙ f'(x)`.
    pub fn backward(&self, x: ArrayView1<f32>, d: ArrayView1<f32>) -> Result<Array1<f32>> {
        check_len("activation input", x.len(), self.size)?;
        check_len("activation error", d.len(), self.size)?;
        Ok(Zip::from(&x)
            .and(&d)
            .map_collect(|&z, &d| d * self.act_fn.df(z)))
    }
}
