//! Neural network kernels and contrastive-divergence training
//!
//! This library expresses layer computations as data-parallel kernels: each
//! kernel is a set of independent work items run by an interchangeable
//! execution strategy, sequentially or on a rayon pool, with identical results.
//!
//! # Modules
//!
//! - `matrix`: Row-major `units x minibatch` value storage
//! - `architecture`: Layers, connections and the RBM topology
//! - `values`: Per-layer value storage for one minibatch
//! - `execution`: Kernel trait, execution strategies and atomic accumulation
//! - `kernels`: Weighted-sum, convolution, backpropagation and update kernels
//! - `training`: CD/PCD trainer, input providers and error aggregation
//! - `utils`: Shared utilities (RNG, activation functions)
//! - `config`: Training configuration structures
//! - `error`: Error type shared by fallible operations

pub mod architecture;
pub mod config;
pub mod error;
pub mod execution;
pub mod kernels;
pub mod matrix;
pub mod training;
pub mod utils;
pub mod values;

pub use error::{NetworkError, Result};
