use super::{Relu, Sigmoid, Tanh};

/// An element-wise activation function.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ActFn {
    Sigmoid(Sigmoid),
    Tanh(Tanh),
    Relu(Relu),
}

impl ActFn {
    pub fn sigmoid() -> Self {
        Self::Sigmoid(Sigmoid)
    }

    pub fn tanh() -> Self {
        Self::Tanh(Tanh)
    }

    pub fn relu() -> Self {
        Self::Relu(Relu)
    }

    /// Looks up an activation function by its layer type name.
    ///
    /// # Returns
    /// The function, or `None` if `name` is not an activation layer type.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sigmoid" => Some(Self::sigmoid()),
            "tanh" => Some(Self::tanh()),
            "relu" => Some(Self::relu()),
            _ => None,
        }
    }

    pub fn f(&self, x: f32) -> f32 {
        match self {
            Self::Sigmoid(a) => a.f(x),
            Self::Tanh(a) => a.f(x),
            Self::Relu(a) => a.f(x),
        }
    }

    pub fn df(&self, x: f32) -> f32 {
        match self {
            Self::Sigmoid(a) => a.df(x),
            Self::Tanh(a) => a.df(x),
            Self::Relu(a) => a.df(x),
        }
    }
}
