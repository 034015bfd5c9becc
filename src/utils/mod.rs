//! Shared utilities for the kernels and the trainer
//!
//! This module provides the random-number collaborator used for weight
//! initialization and Bernoulli sampling, and the activation strategies
//! attached to feed-forward kernels.

pub mod activations;
pub mod rng;

pub use activations::{sigmoid, sigmoid_derivative, Activation};
pub use rng::{RandomInitializer, SimpleRng};
