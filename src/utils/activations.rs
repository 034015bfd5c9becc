//! Activation strategies attached to weighted-sum and convolution kernels.
//!
//! An [`Activation`] is a pair of plain function pointers: the transform
//! applied after a weighted sum, and the derivative used when the same
//! nonlinearity is back-propagated. Kernels receive it by value and apply it
//! inside the same work item that computed the sum.

/// Sigmoid activation function: 1 / (1 + exp(-x)).
///
/// No clamping: very negative inputs saturate to 0 and very positive inputs
/// to 1 through ordinary floating-point behaviour of `exp`.
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Sigmoid derivative assuming y = sigmoid(z).
///
/// Returns the derivative: y * (1 - y)
pub fn sigmoid_derivative(y: f32) -> f32 {
    y * (1.0 - y)
}

pub fn identity(x: f32) -> f32 {
    x
}

/// Activation transform and its derivative.
#[derive(Debug, Clone, Copy)]
pub struct Activation {
    /// Applied to the weighted sum of every output element.
    pub apply: fn(f32) -> f32,
    /// Applied to a propagated value during backpropagation.
    pub derivative: fn(f32) -> f32,
}

impl Activation {
    /// Plain weighted sum; backpropagation passes the error through unchanged.
    pub const IDENTITY: Activation = Activation {
        apply: identity,
        derivative: identity,
    };

    pub const SIGMOID: Activation = Activation {
        apply: sigmoid,
        derivative: sigmoid_derivative,
    };

    /// Look up an activation by its configuration name.
    pub fn from_name(name: &str) -> Option<Activation> {
        match name {
            "identity" | "linear" => Some(Self::IDENTITY),
            "sigmoid" => Some(Self::SIGMOID),
            _ => None,
        }
    }
}

impl Default for Activation {
    fn default() -> Self {
        Self::IDENTITY
    }
}
