pub mod arch;
pub mod config;
pub mod error;
pub mod param;
pub mod validation;

pub use arch::Network;
pub use config::{LayerSpec, TrainingConfig};
pub use error::{MlErr, Result};
pub use param::LayerParameter;
pub use validation::{StatsPair, ValidationStats};
