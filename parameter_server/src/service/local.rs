use std::sync::Arc;

use machine_learning::{LayerParameter, Result};
use parking_lot::Mutex;

use crate::storage::DeltaSum;

#[derive(Debug)]
struct State {
    params: Vec<LayerParameter>,
    pending: DeltaSum,
}

/// An in-process aggregator shared by workers running in the same process.
///
/// Cloning it is cheap, every clone is a handle to the same state.
#[derive(Debug, Clone)]
pub struct LocalAggregator {
    state: Arc<Mutex<State>>,
    stepsize: f32,
}

impl LocalAggregator {
    /// Creates a new `LocalAggregator`.
    ///
    /// # Arguments
    /// * `params` - The initial per-layer parameters.
    /// * `stepsize` - The learning rate.
    pub fn new(params: Vec<LayerParameter>, stepsize: f32) -> Self {
        let pending = DeltaSum::new(&params);

        Self {
            state: Arc::new(Mutex::new(State { params, pending })),
            stepsize,
        }
    }

    /// Accumulates a gradient array.
    ///
    /// # Returns
    /// A `LayerCountMismatch` or `SizeMismatch` if `grads` does not fit the parameters,
    /// nothing is accumulated in that case.
    pub fn push(&self, grads: &[LayerParameter]) -> Result<()> {
        self.state.lock().pending.add(grads)
    }

    /// Applies whatever accumulated since the last pull and returns the result.
    ///
    /// # Returns
    /// A copy of the current parameters, unchanged if nothing accumulated.
    pub fn pull(&self) -> Result<Vec<LayerParameter>> {
        let mut state = self.state.lock();
        let State { params, pending } = &mut *state;

        if !pending.is_empty() {
            // a failed apply leaves the parameters untouched and is not retried
            let res = pending.apply(params, self.stepsize);
            pending.reset();
            res?;
        }

        Ok(params.clone())
    }

    /// A copy of the current parameters without applying anything.
    pub fn parameters(&self) -> Vec<LayerParameter> {
        self.state.lock().params.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use ndarray::array;

    use super::*;

    fn params() -> Vec<LayerParameter> {
        vec![LayerParameter::new(array![[1., 1.]], array![0., 0.])]
    }

    fn grad(v: f32) -> Vec<LayerParameter> {
        vec![LayerParameter::new(array![[v, v]], array![v, 0.])]
    }

    #[test]
    fn pull_without_pushes_is_a_no_op() {
        let agg = LocalAggregator::new(params(), 0.1);
        assert_eq!(agg.pull().unwrap(), params());
    }

    #[test]
    fn pull_applies_the_average_once() {
        let agg = LocalAggregator::new(params(), 1.);
        agg.push(&grad(0.5)).unwrap();
        agg.push(&grad(1.5)).unwrap();

        let expected = vec![LayerParameter::new(array![[0., 0.]], array![-1., 0.])];
        assert_eq!(agg.pull().unwrap(), expected);
        assert_eq!(agg.pull().unwrap(), expected);
    }

    #[test]
    fn clones_share_the_state_across_threads() {
        let agg = LocalAggregator::new(params(), 1.);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let agg = agg.clone();
                thread::spawn(move || agg.push(&grad(0.25)))
            })
            .collect();

        for h in handles {
            h.join().unwrap().unwrap();
        }

        let pulled = agg.pull().unwrap();
        assert_eq!(pulled[0].weight(), &array![[0.75, 0.75]]);
        assert_eq!(agg.parameters(), pulled);
    }

    #[test]
    fn layer_count_skew() {
        let agg = LocalAggregator::new(params(), 1.);
        let mut two = grad(1.);
        two.push(LayerParameter::empty());

        assert!(agg.push(&two).is_err());
    }

    #[test]
    fn misshaped_push_never_reaches_the_parameters() {
        let two_layers = vec![
            LayerParameter::new(array![[1.]], array![0.]),
            LayerParameter::new(array![[1.]], array![0.]),
        ];
        let agg = LocalAggregator::new(two_layers.clone(), 1.);

        let misshaped = vec![
            LayerParameter::new(array![[1.]], array![1.]),
            LayerParameter::new(array![[1., 1.]], array![1.]),
        ];
        assert!(agg.push(&misshaped).is_err());

        assert_eq!(agg.pull().unwrap(), two_layers);
        assert_eq!(agg.pull().unwrap(), two_layers);

        let good = vec![
            LayerParameter::new(array![[2.]], array![1.]),
            LayerParameter::new(array![[0.]], array![0.]),
        ];
        agg.push(&good).unwrap();

        let pulled = agg.pull().unwrap();
        assert_eq!(pulled[0].weight(), &array![[-1.]]);
        assert_eq!(pulled[1], two_layers[1]);
        assert_eq!(agg.pull().unwrap(), pulled);
    }
}
