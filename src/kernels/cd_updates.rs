//! Contrastive-divergence weight and bias updates.
//!
//! Phase values are stored unit-major (`unit * M + p`), exactly as the layer
//! matrices produced by the feed-forward kernels.
//!
//! Bias unit `id`:
//!
//! ```text
//! gradient = (1/M) * sum_p (pos[id*M+p] - neg[id*M+p])
//! delta    = learning_rate * gradient + momentum * previous_delta
//! ```
//!
//! Weight `(h, v)` uses the outer product of the hidden and visible phases:
//!
//! ```text
//! gradient = (1/M) * sum_p (pos_h[h,p] * pos_v[v,p] - neg_h[h,p] * neg_v[v,p])
//! delta    = learning_rate * gradient + momentum * previous_delta - weight_decay * weight
//! ```
//!
//! Each kernel writes the new delta over the previous one; the deltas are then
//! added to the parameters with [`ApplyUpdatesKernel`].

use crate::execution::{ExecutionStrategy, Kernel};
use crate::kernels::updates::{ensure_buffer, ApplyUpdatesKernel, UpdateParameters};
use crate::matrix::Matrix;

/// Per-unit CD bias update.
pub struct CdBiasUpdatesKernel<'a> {
    positive: &'a [f32],
    negative: &'a [f32],
    mini_batch_size: usize,
    learning_rate: f32,
    momentum: f32,
}

impl<'a> CdBiasUpdatesKernel<'a> {
    pub fn new(positive: &'a Matrix, negative: &'a Matrix, parameters: UpdateParameters) -> Self {
        assert!(
            positive.has_shape(negative.rows(), negative.columns()),
            "Positive and negative phases must have the same shape"
        );
        Self {
            positive: positive.elements(),
            negative: negative.elements(),
            mini_batch_size: positive.columns(),
            learning_rate: parameters.learning_rate,
            momentum: parameters.momentum,
        }
    }
}

impl Kernel for CdBiasUpdatesKernel<'_> {
    fn work_item_count(&self) -> usize {
        self.positive.len() / self.mini_batch_size
    }

    fn compute(&self, id: usize, slot: &mut [f32]) {
        let mbs = self.mini_batch_size;
        let start = id * mbs;
        let mut gradient = 0.0f32;
        for p in start..start + mbs {
            gradient += self.positive[p] - self.negative[p];
        }
        slot[0] = self.learning_rate * (gradient / mbs as f32) + self.momentum * slot[0];
    }
}

/// Per-weight CD update for a `[hidden x visible]` weight matrix.
pub struct CdWeightUpdatesKernel<'a> {
    positive_visible: &'a [f32],
    positive_hidden: &'a [f32],
    negative_visible: &'a [f32],
    negative_hidden: &'a [f32],
    weights: &'a [f32],
    visible_units: usize,
    mini_batch_size: usize,
    parameters: UpdateParameters,
}

impl<'a> CdWeightUpdatesKernel<'a> {
    /// # Panics
    ///
    /// Panics if the phase matrices do not match the weight matrix and each other.
    pub fn new(
        weights: &'a Matrix,
        positive_visible: &'a Matrix,
        positive_hidden: &'a Matrix,
        negative_visible: &'a Matrix,
        negative_hidden: &'a Matrix,
        parameters: UpdateParameters,
    ) -> Self {
        let mbs = positive_visible.columns();
        let hidden_units = weights.rows();
        let visible_units = weights.columns();
        assert!(
            positive_visible.has_shape(visible_units, mbs) && negative_visible.has_shape(visible_units, mbs),
            "Visible phases do not match weights x minibatch"
        );
        assert!(
            positive_hidden.has_shape(hidden_units, mbs) && negative_hidden.has_shape(hidden_units, mbs),
            "Hidden phases do not match weights x minibatch"
        );
        Self {
            positive_visible: positive_visible.elements(),
            positive_hidden: positive_hidden.elements(),
            negative_visible: negative_visible.elements(),
            negative_hidden: negative_hidden.elements(),
            weights: weights.elements(),
            visible_units,
            mini_batch_size: mbs,
            parameters,
        }
    }
}

impl Kernel for CdWeightUpdatesKernel<'_> {
    fn work_item_count(&self) -> usize {
        self.weights.len()
    }

    fn compute(&self, id: usize, slot: &mut [f32]) {
        let mbs = self.mini_batch_size;
        let h = (id / self.visible_units) * mbs;
        let v = (id % self.visible_units) * mbs;

        let mut gradient = 0.0f32;
        for p in 0..mbs {
            gradient += self.positive_hidden[h + p] * self.positive_visible[v + p]
                - self.negative_hidden[h + p] * self.negative_visible[v + p];
        }
        slot[0] = self
            .parameters
            .delta(gradient / mbs as f32, slot[0], self.weights[id]);
    }
}

/// Which bias vector of an RBM an update targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiasSide {
    Visible,
    Hidden,
}

/// Momentum state of the CD kernels, owned by the trainer.
///
/// Each buffer holds the last delta computed for the matching parameter
/// vector. Buffers are reallocated (zeroed) when the parameter count changes
/// and otherwise survive from one minibatch to the next.
#[derive(Debug, Clone, Default)]
pub struct CdKernelContext {
    pub weight_deltas: Vec<f32>,
    pub visible_bias_deltas: Vec<f32>,
    pub hidden_bias_deltas: Vec<f32>,
}

impl CdKernelContext {
    pub fn reset(&mut self) {
        self.weight_deltas.clear();
        self.visible_bias_deltas.clear();
        self.hidden_bias_deltas.clear();
    }

    fn bias_deltas(&mut self, side: BiasSide) -> &mut Vec<f32> {
        match side {
            BiasSide::Visible => &mut self.visible_bias_deltas,
            BiasSide::Hidden => &mut self.hidden_bias_deltas,
        }
    }

    /// Overwrite the weight deltas with this minibatch's CD deltas.
    #[allow(clippy::too_many_arguments)]
    pub fn accumulate_weights(
        &mut self,
        strategy: &dyn ExecutionStrategy,
        parameters: UpdateParameters,
        weights: &Matrix,
        positive_visible: &Matrix,
        positive_hidden: &Matrix,
        negative_visible: &Matrix,
        negative_hidden: &Matrix,
    ) {
        ensure_buffer(&mut self.weight_deltas, weights.elements().len());
        let kernel = CdWeightUpdatesKernel::new(
            weights,
            positive_visible,
            positive_hidden,
            negative_visible,
            negative_hidden,
            parameters,
        );
        strategy.run_all(&kernel, &mut self.weight_deltas);
    }

    /// Overwrite one bias vector's deltas with this minibatch's CD deltas.
    pub fn accumulate_bias(
        &mut self,
        strategy: &dyn ExecutionStrategy,
        parameters: UpdateParameters,
        side: BiasSide,
        positive: &Matrix,
        negative: &Matrix,
    ) {
        let deltas = self.bias_deltas(side);
        ensure_buffer(deltas, positive.rows());
        strategy.run_all(&CdBiasUpdatesKernel::new(positive, negative, parameters), deltas);
    }

    pub fn apply_weights(&self, strategy: &dyn ExecutionStrategy, weights: &mut Matrix) {
        strategy.run_all(
            &ApplyUpdatesKernel::new(&self.weight_deltas),
            weights.elements_mut(),
        );
    }

    pub fn apply_bias(&self, strategy: &dyn ExecutionStrategy, side: BiasSide, bias: &mut Matrix) {
        let deltas = match side {
            BiasSide::Visible => &self.visible_bias_deltas,
            BiasSide::Hidden => &self.hidden_bias_deltas,
        };
        strategy.run_all(&ApplyUpdatesKernel::new(deltas), bias.elements_mut());
    }

    /// Accumulate and apply in one call.
    #[allow(clippy::too_many_arguments)]
    pub fn update_weights(
        &mut self,
        strategy: &dyn ExecutionStrategy,
        parameters: UpdateParameters,
        weights: &mut Matrix,
        positive_visible: &Matrix,
        positive_hidden: &Matrix,
        negative_visible: &Matrix,
        negative_hidden: &Matrix,
    ) {
        self.accumulate_weights(
            strategy,
            parameters,
            weights,
            positive_visible,
            positive_hidden,
            negative_visible,
            negative_hidden,
        );
        self.apply_weights(strategy, weights);
    }

    /// Accumulate and apply in one call.
    pub fn update_bias(
        &mut self,
        strategy: &dyn ExecutionStrategy,
        parameters: UpdateParameters,
        side: BiasSide,
        bias: &mut Matrix,
        positive: &Matrix,
        negative: &Matrix,
    ) {
        self.accumulate_bias(strategy, parameters, side, positive, negative);
        self.apply_bias(strategy, side, bias);
    }
}
