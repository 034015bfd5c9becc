//! Contrastive-divergence training of RBMs
//!
//! This module provides the [`CdTrainer`] and the collaborators it talks to:
//!
//! - [`RbmLayerCalculator`]: propagates values between the visible and hidden layers
//! - [`TrainingInputProvider`]: supplies minibatches
//! - [`OutputError`]: aggregates error during [`CdTrainer::test`]
//!
//! # Example
//!
//! ```
//! use neural_kernels::architecture::Rbm;
//! use neural_kernels::training::{CdTrainer, SimpleInputProvider, TrainingParameters};
//!
//! let rbm = Rbm::new(3, 2, true);
//! let params = TrainingParameters::new(0.1).with_momentum(0.5);
//! let mut trainer = CdTrainer::new(rbm, params);
//!
//! let mut input = SimpleInputProvider::new(vec![vec![1.0, 0.0, 1.0]], None, 4, 1);
//! trainer.train(&mut input).unwrap();
//! ```

mod cd_trainer;
pub mod input;
mod layer_calculator;
pub mod output_error;

pub use cd_trainer::CdTrainer;
pub use input::{SimpleInputProvider, TrainingBatch, TrainingInputProvider};
pub use layer_calculator::RbmLayerCalculator;
pub use output_error::{MeanSquaredError, MultipleNeuronsOutputError, OutputError};

use crate::kernels::UpdateParameters;

/// Hyperparameters of a CD training run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingParameters {
    pub learning_rate: f32,
    pub momentum: f32,
    pub weight_decay: f32,
    /// Number of Gibbs steps `k` in the negative phase.
    pub gibbs_sampling_count: usize,
    /// Keep the Gibbs chain across minibatches (Persistent CD).
    pub persistent: bool,
    /// Uniform range used to initialize weights and biases on the first
    /// `train()` call. `None` keeps the weights the RBM was built with.
    pub weight_init: Option<(f32, f32)>,
}

impl TrainingParameters {
    /// CD-1 with no momentum, no weight decay and no initialization.
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            momentum: 0.0,
            weight_decay: 0.0,
            gibbs_sampling_count: 1,
            persistent: false,
            weight_init: None,
        }
    }

    pub fn with_momentum(mut self, momentum: f32) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn with_weight_decay(mut self, weight_decay: f32) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    pub fn with_gibbs_sampling_count(mut self, k: usize) -> Self {
        self.gibbs_sampling_count = k;
        self
    }

    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    pub fn with_weight_init(mut self, low: f32, high: f32) -> Self {
        self.weight_init = Some((low, high));
        self
    }

    pub(crate) fn update_parameters(&self) -> UpdateParameters {
        UpdateParameters::new(self.learning_rate, self.momentum, self.weight_decay)
    }
}

/// Where a trainer is inside one minibatch step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerPhase {
    Idle,
    /// Positive phase: hidden activations from the minibatch's visible data.
    FeedForward,
    /// Negative phase, Gibbs step `i` of `k`.
    GibbsStep(usize),
    /// CD deltas are being computed for weights and biases.
    GradientAccumulate,
    /// Deltas are being added to the parameters.
    Apply,
}
