//! Configuration structures for training
//!
//! This module parses CD/PCD training runs from JSON files and turns them into
//! the pieces a [`CdTrainer`](crate::training::CdTrainer) needs: hyperparameters,
//! an execution strategy and a seeded random source.

use serde::Deserialize;
use std::fs;
use std::sync::Arc;

use crate::error::{NetworkError, Result};
use crate::execution::{ExecutionStrategy, ParallelExecution, SequentialExecution};
use crate::training::{SimpleInputProvider, TrainingParameters};
use crate::utils::{Activation, SimpleRng};

/// Configuration for a contrastive-divergence training run
///
/// Only `learning_rate` is required. `init_low` and `init_high` must be given
/// together; when present, weights are drawn uniformly from that range on the
/// first `train()` call.
///
/// - **sequential**: kernels run work items in index order (default)
/// - **parallel**: kernels run on rayon, optionally on a dedicated pool of
///   `threads` workers
///
/// # Example
///
/// ```json
/// {
///   "learning_rate": 0.02,
///   "momentum": 0.5,
///   "gibbs_sampling_count": 1,
///   "persistent": true,
///   "mini_batch_size": 2,
///   "execution": "parallel",
///   "threads": 4
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingConfig {
    pub learning_rate: f32,

    #[serde(default)]
    pub momentum: f32,

    #[serde(default)]
    pub weight_decay: f32,

    /// Gibbs steps per negative phase (`k` in CD-k)
    #[serde(default = "default_gibbs_sampling_count")]
    pub gibbs_sampling_count: usize,

    /// Keep the Gibbs chain between minibatches (Persistent CD)
    #[serde(default)]
    pub persistent: bool,

    #[serde(default = "default_mini_batch_size")]
    pub mini_batch_size: usize,

    /// Unit activation of both RBM layers: "sigmoid" or "identity"
    #[serde(default = "default_activation")]
    pub activation: String,

    /// Execution strategy: "sequential" or "parallel"
    #[serde(default = "default_execution")]
    pub execution: String,

    /// Worker threads for the parallel strategy; rayon's global pool if unset
    pub threads: Option<usize>,

    /// Seed for weight initialization and Bernoulli sampling
    pub seed: Option<u64>,

    pub init_low: Option<f32>,

    pub init_high: Option<f32>,
}

fn default_gibbs_sampling_count() -> usize {
    1
}

fn default_mini_batch_size() -> usize {
    1
}

fn default_activation() -> String {
    "sigmoid".to_string()
}

fn default_execution() -> String {
    "sequential".to_string()
}

const EXECUTION_MODES: [&str; 2] = ["sequential", "parallel"];

impl TrainingConfig {
    /// Hyperparameters for [`CdTrainer`](crate::training::CdTrainer).
    pub fn parameters(&self) -> TrainingParameters {
        let mut parameters = TrainingParameters::new(self.learning_rate)
            .with_momentum(self.momentum)
            .with_weight_decay(self.weight_decay)
            .with_gibbs_sampling_count(self.gibbs_sampling_count)
            .with_persistent(self.persistent);
        if let (Some(low), Some(high)) = (self.init_low, self.init_high) {
            parameters = parameters.with_weight_init(low, high);
        }
        parameters
    }

    /// Activation named by `activation`.
    pub fn activation(&self) -> Result<Activation> {
        Activation::from_name(&self.activation).ok_or_else(|| {
            NetworkError::InvalidConfig(format!(
                "Invalid activation '{}'. Must be one of: sigmoid, identity",
                self.activation
            ))
        })
    }

    /// Build the execution strategy named by `execution`.
    pub fn execution_strategy(&self) -> Result<Arc<dyn ExecutionStrategy>> {
        match (self.execution.as_str(), self.threads) {
            ("sequential", _) => Ok(Arc::new(SequentialExecution)),
            ("parallel", None) => Ok(Arc::new(ParallelExecution::new())),
            ("parallel", Some(threads)) => {
                let strategy = ParallelExecution::with_threads(threads).map_err(|e| {
                    NetworkError::InvalidConfig(format!("cannot build thread pool: {e}"))
                })?;
                Ok(Arc::new(strategy))
            }
            (other, _) => Err(NetworkError::InvalidConfig(format!(
                "Invalid execution mode '{}'. Must be one of: {}",
                other,
                EXECUTION_MODES.join(", ")
            ))),
        }
    }

    /// Random source seeded from `seed`, or from the clock when unset.
    pub fn rng(&self) -> SimpleRng {
        match self.seed {
            Some(seed) => SimpleRng::new(seed),
            None => SimpleRng::from_time(),
        }
    }

    /// Input provider over `inputs` that yields minibatches of
    /// `mini_batch_size` examples, `input_size` examples per `train()` call.
    pub fn input_provider(
        &self,
        inputs: Vec<Vec<f32>>,
        targets: Option<Vec<Vec<f32>>>,
        input_size: usize,
    ) -> SimpleInputProvider {
        SimpleInputProvider::new(inputs, targets, input_size, self.mini_batch_size)
    }
}

/// Loads a training configuration from a JSON file.
///
/// Reads the file at `path`, deserializes it into a `TrainingConfig` and
/// validates the values.
///
/// # Examples
///
/// ```no_run
/// use neural_kernels::config::load_config;
///
/// let cfg = load_config("config/rbm_pcd.json").unwrap();
/// assert!(cfg.persistent);
/// ```
pub fn load_config(path: &str) -> Result<TrainingConfig> {
    let contents = fs::read_to_string(path)?;
    let config: TrainingConfig = serde_json::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}

fn invalid(message: impl Into<String>) -> NetworkError {
    NetworkError::InvalidConfig(message.into())
}

fn validate_config(config: &TrainingConfig) -> Result<()> {
    if config.learning_rate.is_nan() || config.learning_rate <= 0.0 {
        return Err(invalid("learning_rate must be positive"));
    }

    if config.momentum < 0.0 {
        return Err(invalid("momentum must be non-negative"));
    }

    if config.weight_decay < 0.0 {
        return Err(invalid("weight_decay must be non-negative"));
    }

    if config.gibbs_sampling_count == 0 {
        return Err(invalid("gibbs_sampling_count must be at least 1"));
    }

    if config.mini_batch_size == 0 {
        return Err(invalid("mini_batch_size must be at least 1"));
    }

    if !EXECUTION_MODES.contains(&config.execution.as_str()) {
        return Err(invalid(format!(
            "Invalid execution mode '{}'. Must be one of: {}",
            config.execution,
            EXECUTION_MODES.join(", ")
        )));
    }

    config.activation()?;

    if config.threads == Some(0) {
        return Err(invalid("threads must be at least 1"));
    }

    match (config.init_low, config.init_high) {
        (Some(low), Some(high)) if low > high => {
            return Err(invalid("init_low must not exceed init_high"));
        }
        (Some(_), None) | (None, Some(_)) => {
            return Err(invalid("init_low and init_high must be given together"));
        }
        _ => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> TrainingConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(r#"{ "learning_rate": 0.1 }"#);
        assert_eq!(config.gibbs_sampling_count, 1);
        assert_eq!(config.mini_batch_size, 1);
        assert_eq!(config.execution, "sequential");
        assert_eq!(config.activation, "sigmoid");
        assert!(!config.persistent);
        assert!(validate_config(&config).is_ok());
        assert!(config.parameters().weight_init.is_none());
    }

    #[test]
    fn test_rejects_half_init_range() {
        let config = parse(r#"{ "learning_rate": 0.1, "init_low": -0.1 }"#);
        assert!(matches!(
            validate_config(&config),
            Err(NetworkError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_execution() {
        let config = parse(r#"{ "learning_rate": 0.1, "execution": "gpu" }"#);
        assert!(validate_config(&config).is_err());
        assert!(config.execution_strategy().is_err());
    }

    #[test]
    fn test_rejects_unknown_activation() {
        let config = parse(r#"{ "learning_rate": 0.1, "activation": "relu" }"#);
        assert!(validate_config(&config).is_err());

        let config = parse(r#"{ "learning_rate": 0.1, "activation": "linear" }"#);
        assert!(config.activation().is_ok());
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        use crate::utils::RandomInitializer;

        let config = parse(r#"{ "learning_rate": 0.1, "seed": 9 }"#);
        let (mut a, mut b) = (config.rng(), config.rng());
        assert_eq!(a.next_f32(), b.next_f32());
    }
}
