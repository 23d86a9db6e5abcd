mod delta;

pub use delta::{DeltaSum, check_gradients};
