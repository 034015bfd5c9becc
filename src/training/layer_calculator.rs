//! Propagation between the two layers of an RBM.

use std::fmt;
use std::sync::Arc;

use crate::architecture::Rbm;
use crate::execution::{ExecutionStrategy, SequentialExecution};
use crate::kernels::{WeightedInput, WeightedSumCalculator};
use crate::matrix::Matrix;
use crate::utils::Activation;

/// Computes hidden values from visible values and back, through the RBM's
/// symmetric weights and the bias of the layer being computed.
///
/// The calculator carries the execution strategy every kernel of a training
/// run is scheduled with.
///
/// # Example
///
/// ```
/// use neural_kernels::architecture::Rbm;
/// use neural_kernels::matrix::Matrix;
/// use neural_kernels::training::RbmLayerCalculator;
///
/// let mut rbm = Rbm::new(2, 2, false);
/// rbm.main_mut().weights_mut().elements_mut().copy_from_slice(&[0.1, 0.8, 0.4, 0.6]);
///
/// let calculator = RbmLayerCalculator::sigmoid();
/// let visible = Matrix::from_elements(vec![0.35, 0.9], 1);
/// let mut hidden = Matrix::new(2, 1);
/// calculator.calculate_hidden(&rbm, &visible, &mut hidden);
/// assert!((hidden.get(0, 0) - 0.68).abs() < 0.01);
/// ```
#[derive(Clone)]
pub struct RbmLayerCalculator {
    hidden: WeightedSumCalculator,
    visible: WeightedSumCalculator,
    strategy: Arc<dyn ExecutionStrategy>,
}

impl RbmLayerCalculator {
    /// Sigmoid units on both layers, sequential execution.
    pub fn sigmoid() -> Self {
        Self::new(
            Activation::SIGMOID,
            Activation::SIGMOID,
            Arc::new(SequentialExecution),
        )
    }

    pub fn new(
        visible: Activation,
        hidden: Activation,
        strategy: Arc<dyn ExecutionStrategy>,
    ) -> Self {
        Self {
            hidden: WeightedSumCalculator::new(hidden),
            visible: WeightedSumCalculator::new(visible),
            strategy,
        }
    }

    /// Replace the execution strategy, keeping the activations.
    pub fn with_strategy(mut self, strategy: Arc<dyn ExecutionStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Replace the weighted-sum calculators, e.g. to force a decomposition.
    pub fn with_calculators(
        mut self,
        visible: WeightedSumCalculator,
        hidden: WeightedSumCalculator,
    ) -> Self {
        self.visible = visible;
        self.hidden = hidden;
        self
    }

    pub fn strategy(&self) -> &dyn ExecutionStrategy {
        self.strategy.as_ref()
    }

    /// Overwrite `hidden` with the activations caused by `visible`.
    pub fn calculate_hidden(&self, rbm: &Rbm, visible: &Matrix, hidden: &mut Matrix) {
        let inputs = [WeightedInput::forward(rbm.main().weights(), visible)];
        let bias = rbm.hidden_bias().map(|b| b.weights().elements());
        self.hidden
            .calculate_into(self.strategy(), &inputs, bias, hidden);
    }

    /// Overwrite `visible` with the activations caused by `hidden`, reading
    /// the main weights transposed.
    pub fn calculate_visible(&self, rbm: &Rbm, visible: &mut Matrix, hidden: &Matrix) {
        let inputs = [WeightedInput::backward(rbm.main().weights(), hidden)];
        let bias = rbm.visible_bias().map(|b| b.weights().elements());
        self.visible
            .calculate_into(self.strategy(), &inputs, bias, visible);
    }
}

impl fmt::Debug for RbmLayerCalculator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RbmLayerCalculator")
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ParallelExecution;

    #[test]
    fn test_hidden_with_bias() {
        let mut rbm = Rbm::new(3, 2, true);
        rbm.main_mut()
            .weights_mut()
            .elements_mut()
            .copy_from_slice(&[0.2, 0.4, -0.5, -0.3, 0.1, 0.2]);
        rbm.hidden_bias_mut()
            .unwrap()
            .weights_mut()
            .elements_mut()
            .copy_from_slice(&[-0.4, 0.2]);

        let visible = Matrix::from_elements(vec![1.0, 0.0, 1.0], 1);
        let mut hidden = Matrix::new(2, 1);
        RbmLayerCalculator::sigmoid().calculate_hidden(&rbm, &visible, &mut hidden);

        assert!((hidden.get(0, 0) - 0.332).abs() < 0.001);
        assert!((hidden.get(1, 0) - 0.525).abs() < 0.001);
    }

    #[test]
    fn test_strategy_does_not_change_values() {
        let mut rbm = Rbm::new(4, 3, true);
        rbm.main_mut()
            .weights_mut()
            .elements_mut()
            .iter_mut()
            .enumerate()
            .for_each(|(i, w)| *w = (i as f32 * 0.37).sin());
        let visible = Matrix::from_elements((0..8).map(|i| (i % 2) as f32).collect(), 2);

        let mut sequential = Matrix::new(3, 2);
        let mut parallel = Matrix::new(3, 2);
        RbmLayerCalculator::sigmoid().calculate_hidden(&rbm, &visible, &mut sequential);
        RbmLayerCalculator::sigmoid()
            .with_strategy(Arc::new(ParallelExecution::new()))
            .calculate_hidden(&rbm, &visible, &mut parallel);

        assert_eq!(sequential, parallel);
    }
}
