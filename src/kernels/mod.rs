//! Numeric kernels and the calculators that bind them to connections
//!
//! - `weighted_sum`: fully connected weighted sum + activation
//! - `conv2d`: convolutional weighted sum + activation
//! - `conv2d_backprop`: convolutional error propagation and weight gradients
//! - `cd_updates`: contrastive-divergence weight and bias updates
//! - `updates`: momentum update and apply passes shared by the trainers
//!
//! Every kernel implements [`crate::execution::Kernel`] and can run under any
//! [`crate::execution::ExecutionStrategy`].

pub mod cd_updates;
pub mod conv2d;
pub mod conv2d_backprop;
pub mod updates;
pub mod weighted_sum;

pub use cd_updates::{BiasSide, CdBiasUpdatesKernel, CdKernelContext, CdWeightUpdatesKernel};
pub use conv2d::{Conv2DCalculator, Conv2DKernel};
pub use conv2d_backprop::{BackpropagationConv2D, Conv2DBackpropKernel};
pub use updates::{
    apply_momentum_update, ensure_buffer, ApplyUpdatesKernel, MomentumUpdateKernel,
    UpdateParameters,
};
pub use weighted_sum::{Decomposition, WeightedInput, WeightedSumCalculator, WeightedSumKernel};
