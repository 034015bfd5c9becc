//! Momentum-based parameter updates shared by backpropagation and CD.
//!
//! An update runs in two kernel passes over the parameter vector:
//!
//! 1. [`MomentumUpdateKernel`] overwrites each previous delta with
//!    `learning_rate * gradient + momentum * previous_delta - weight_decay * weight`
//! 2. [`ApplyUpdatesKernel`] adds every delta to its parameter
//!
//! The delta buffer therefore doubles as the momentum state and survives
//! across calls.

use tracing::debug;

use crate::execution::{ExecutionStrategy, Kernel};

/// Hyperparameters of a momentum update.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UpdateParameters {
    pub learning_rate: f32,
    pub momentum: f32,
    pub weight_decay: f32,
}

impl UpdateParameters {
    pub fn new(learning_rate: f32, momentum: f32, weight_decay: f32) -> Self {
        Self {
            learning_rate,
            momentum,
            weight_decay,
        }
    }

    /// New delta for one parameter.
    #[inline]
    pub fn delta(&self, gradient: f32, previous_delta: f32, weight: f32) -> f32 {
        self.learning_rate * gradient + self.momentum * previous_delta - self.weight_decay * weight
    }
}

/// Make `buffer` exactly `len` long.
///
/// A buffer of the wrong length is replaced by a zeroed one; a buffer of the
/// right length keeps its contents. Returns `true` when it was reallocated.
pub fn ensure_buffer(buffer: &mut Vec<f32>, len: usize) -> bool {
    if buffer.len() == len {
        return false;
    }
    debug!(old = buffer.len(), new = len, "reallocating kernel buffer");
    *buffer = vec![0.0f32; len];
    true
}

/// Computes new deltas in place over the previous deltas.
pub struct MomentumUpdateKernel<'a> {
    gradients: &'a [f32],
    weights: &'a [f32],
    parameters: UpdateParameters,
}

impl<'a> MomentumUpdateKernel<'a> {
    pub fn new(gradients: &'a [f32], weights: &'a [f32], parameters: UpdateParameters) -> Self {
        assert_eq!(gradients.len(), weights.len(), "Gradients and weights must have the same length");
        Self {
            gradients,
            weights,
            parameters,
        }
    }
}

impl Kernel for MomentumUpdateKernel<'_> {
    fn work_item_count(&self) -> usize {
        self.weights.len()
    }

    fn compute(&self, id: usize, slot: &mut [f32]) {
        slot[0] = self
            .parameters
            .delta(self.gradients[id], slot[0], self.weights[id]);
    }
}

/// Adds each delta to the parameter in the same slot.
pub struct ApplyUpdatesKernel<'a> {
    deltas: &'a [f32],
}

impl<'a> ApplyUpdatesKernel<'a> {
    pub fn new(deltas: &'a [f32]) -> Self {
        Self { deltas }
    }
}

impl Kernel for ApplyUpdatesKernel<'_> {
    fn work_item_count(&self) -> usize {
        self.deltas.len()
    }

    fn compute(&self, id: usize, slot: &mut [f32]) {
        slot[0] += self.deltas[id];
    }
}

/// Run both passes: refresh `deltas` from `gradients`, then add them to `weights`.
pub fn apply_momentum_update(
    strategy: &dyn ExecutionStrategy,
    parameters: UpdateParameters,
    gradients: &[f32],
    deltas: &mut [f32],
    weights: &mut [f32],
) {
    strategy.run_all(
        &MomentumUpdateKernel::new(gradients, weights, parameters),
        deltas,
    );
    strategy.run_all(&ApplyUpdatesKernel::new(deltas), weights);
}
