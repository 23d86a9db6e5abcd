//! Classification accuracy bookkeeping.

use comms::wire::{self, StatsRecord};
use ndarray::ArrayView1;

use crate::{Result, arch::Network};

/// A counter of evaluated and correctly classified samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    total: usize,
    correct: usize,
}

impl ValidationStats {
    pub fn new(total: usize, correct: usize) -> Self {
        Self { total, correct }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn correct(&self) -> usize {
        self.correct
    }

    pub fn record(&mut self, correct: bool) {
        self.total += 1;
        self.correct += correct as usize;
    }

    pub fn merge(&mut self, other: &Self) {
        self.total += other.total;
        self.correct += other.correct;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// The misclassification rate, `None` before any sample was recorded.
    pub fn error(&self) -> Option<f32> {
        (self.total > 0).then(|| 1. - self.correct as f32 / self.total as f32)
    }
}

impl From<StatsRecord> for ValidationStats {
    fn from(record: StatsRecord) -> Self {
        Self::new(record.total, record.correct)
    }
}

impl From<ValidationStats> for StatsRecord {
    fn from(stats: ValidationStats) -> Self {
        Self {
            total: stats.total,
            correct: stats.correct,
        }
    }
}

/// The training and validation accuracy of one logical iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsPair {
    pub training: ValidationStats,
    pub validation: ValidationStats,
}

impl StatsPair {
    pub fn merge(&mut self, other: &Self) {
        self.training.merge(&other.training);
        self.validation.merge(&other.validation);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl From<wire::StatsPair> for StatsPair {
    fn from(pair: wire::StatsPair) -> Self {
        Self {
            training: pair.training.into(),
            validation: pair.validation.into(),
        }
    }
}

impl From<StatsPair> for wire::StatsPair {
    fn from(pair: StatsPair) -> Self {
        Self {
            training: pair.training.into(),
            validation: pair.validation.into(),
        }
    }
}

/// The index of the largest value, the first one wins ties.
///
/// # Returns
/// `None` for an empty vector.
pub fn argmax(values: ArrayView1<f32>) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;

    for (i, &v) in values.iter().enumerate() {
        if best.is_none_or(|(_, max)| v > max) {
            best = Some((i, v));
        }
    }

    best.map(|(i, _)| i)
}

/// Classifies `input` with a forward pass and records the outcome.
///
/// # Returns
/// Whether the predicted class is `label`.
pub fn evaluate(
    network: &Network,
    input: ArrayView1<f32>,
    label: usize,
    stats: &mut ValidationStats,
) -> Result<bool> {
    let activations = network.forward(input)?;
    let correct = activations
        .last()
        .and_then(|output| argmax(output.view()))
        .is_some_and(|predicted| predicted == label);

    stats.record(correct);
    Ok(correct)
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use ndarray::array;

    use super::*;
    use crate::config::LayerSpec;

    #[test]
    fn argmax_first_maximum_wins() {
        assert_eq!(argmax(array![0.1, 0.7, 0.7, 0.2].view()), Some(1));
        assert_eq!(argmax(array![3., 1.].view()), Some(0));
        assert_eq!(argmax(array![-2., -1.].view()), Some(1));
        assert_eq!(argmax(ArrayView1::from(&[] as &[f32])), None);
    }

    #[test]
    fn argmax_with_nan_first_is_still_defined() {
        assert_eq!(argmax(array![f32::NAN, 1.].view()), Some(0));
    }

    #[test]
    fn error_rate() {
        assert_eq!(ValidationStats::default().error(), None);
        assert_eq!(ValidationStats::new(4, 3).error(), Some(0.25));
        assert_eq!(ValidationStats::new(2, 2).error(), Some(0.));
    }

    #[test]
    fn merge_and_reset() {
        let mut pair = StatsPair {
            training: ValidationStats::new(3, 1),
            validation: ValidationStats::new(1, 1),
        };
        pair.merge(&StatsPair {
            training: ValidationStats::new(2, 2),
            validation: ValidationStats::default(),
        });

        assert_eq!(pair.training, ValidationStats::new(5, 3));
        assert_eq!(pair.validation, ValidationStats::new(1, 1));

        let wire: wire::StatsPair = pair.into();
        assert_eq!(StatsPair::from(wire), pair);

        pair.reset();
        assert_eq!(pair, StatsPair::default());
    }

    #[test]
    fn evaluate_counts_the_prediction() {
        let specs = [LayerSpec::new("softmax_loss", "3")];
        let network = Network::from_specs(&specs, NonZeroUsize::MIN).unwrap();
        let mut stats = ValidationStats::default();

        assert!(evaluate(&network, array![0., 5., 1.].view(), 1, &mut stats).unwrap());
        assert!(!evaluate(&network, array![0., 5., 1.].view(), 2, &mut stats).unwrap());
        assert_eq!(stats, ValidationStats::new(2, 1));
    }
}
