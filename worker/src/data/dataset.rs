use ndarray::Array1;

use super::DataSource;
use crate::Result;

/// A single labeled sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub input: Array1<f32>,
    pub label: usize,
    /// Held out samples are only evaluated, never trained on.
    pub validation: bool,
}

impl Sample {
    pub fn new(input: Array1<f32>, label: usize, validation: bool) -> Self {
        Self {
            input,
            label,
            validation,
        }
    }
}

/// A worker's data partition, split into its training and validation samples.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    training: Vec<Sample>,
    validation: Vec<Sample>,
}

impl Dataset {
    /// Creates a new `Dataset` splitting `samples` by their `validation` flag.
    pub fn new(samples: Vec<Sample>) -> Self {
        let (validation, training) = samples.into_iter().partition(|s| s.validation);
        Self {
            training,
            validation,
        }
    }

    /// Materializes every sample of `source`.
    pub fn load<D: DataSource>(source: &mut D) -> Result<Self> {
        Ok(Self::new(source.samples()?))
    }

    #[inline]
    pub fn training(&self) -> &[Sample] {
        &self.training
    }

    #[inline]
    pub fn validation(&self) -> &[Sample] {
        &self.validation
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.training.len() + self.validation.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
