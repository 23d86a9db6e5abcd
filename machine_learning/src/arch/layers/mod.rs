mod activation;
mod conv;
mod dense;
mod layer;
mod loss;
mod pool;
mod shape;

pub use activation::Activation;
pub use conv::Convolution;
pub use dense::FullyConnected;
pub use layer::{Layer, LayerKind};
pub use loss::{ActivationWithLoss, LossKind};
pub use pool::{Pooling, PoolingKind};
pub use shape::Shape;
