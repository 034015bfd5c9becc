//! Tests for forward propagation through weighted-sum and convolution kernels
//!
//! This file covers:
//! - RBM layer propagation reference values (both directions)
//! - Sigmoid saturation behaviour
//! - Row and column decompositions producing identical outputs
//! - Calculators driven through connections and a values provider

use approx::assert_relative_eq;
use neural_kernels::architecture::{
    BiasConnection, Connection, Conv2DConnection, FullyConnected, Layer, LayerId, Rbm,
};
use neural_kernels::execution::{ParallelExecution, SequentialExecution};
use neural_kernels::kernels::{
    Conv2DCalculator, Decomposition, WeightedInput, WeightedSumCalculator,
};
use neural_kernels::matrix::Matrix;
use neural_kernels::training::RbmLayerCalculator;
use neural_kernels::utils::{sigmoid, Activation};
use neural_kernels::values::ValuesProvider;

fn two_by_two_rbm(weights: [f32; 4], add_bias: bool) -> Rbm {
    let mut rbm = Rbm::new(2, 2, add_bias);
    rbm.main_mut()
        .weights_mut()
        .elements_mut()
        .copy_from_slice(&weights);
    rbm
}

// ============================================================================
// RBM Layer Propagation Tests
// ============================================================================

mod rbm_propagation_tests {
    use super::*;

    #[test]
    fn test_hidden_from_visible() {
        let rbm = two_by_two_rbm([0.1, 0.8, 0.4, 0.6], false);
        let visible = Matrix::from_elements(vec![0.35, 0.9], 1);
        let mut hidden = Matrix::new(2, 1);

        RbmLayerCalculator::sigmoid().calculate_hidden(&rbm, &visible, &mut hidden);

        assert_relative_eq!(hidden.get(0, 0), 0.68, epsilon = 0.01);
        assert_relative_eq!(hidden.get(1, 0), 0.6637, epsilon = 0.01);
    }

    #[test]
    fn test_visible_from_hidden_reads_weights_transposed() {
        // Mirror of the forward case: the visible layer now plays the role
        // the hidden layer had, so the weight matrix is the transpose.
        let rbm = two_by_two_rbm([0.1, 0.4, 0.8, 0.6], false);
        let hidden = Matrix::from_elements(vec![0.35, 0.9], 1);
        let mut visible = Matrix::new(2, 1);

        RbmLayerCalculator::sigmoid().calculate_visible(&rbm, &mut visible, &hidden);

        assert_relative_eq!(visible.get(0, 0), 0.68, epsilon = 0.01);
        assert_relative_eq!(visible.get(1, 0), 0.6637, epsilon = 0.01);
    }

    #[test]
    fn test_hidden_bias_is_added() {
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

        assert_relative_eq!(hidden.get(0, 0), sigmoid(-0.7), epsilon = 1e-6);
        assert_relative_eq!(hidden.get(1, 0), sigmoid(0.1), epsilon = 1e-6);
    }

    #[test]
    fn test_minibatch_columns_are_independent() {
        let rbm = two_by_two_rbm([0.1, 0.8, 0.4, 0.6], false);
        // Example 0 is [0.35, 0.9], example 1 is [0, 0].
        let visible = Matrix::from_elements(vec![0.35, 0.0, 0.9, 0.0], 2);
        let mut hidden = Matrix::new(2, 2);

        RbmLayerCalculator::sigmoid().calculate_hidden(&rbm, &visible, &mut hidden);

        assert_relative_eq!(hidden.get(0, 0), 0.68, epsilon = 0.01);
        assert_relative_eq!(hidden.get(0, 1), 0.5, epsilon = 1e-6);
        assert_relative_eq!(hidden.get(1, 1), 0.5, epsilon = 1e-6);
    }
}

// ============================================================================
// Sigmoid Tests
// ============================================================================

mod sigmoid_tests {
    use super::*;

    fn single_unit_output(z: f32) -> f32 {
        let weights = Matrix::from_elements(vec![z], 1);
        let input = Matrix::from_elements(vec![1.0], 1);
        let mut output = Matrix::new(1, 1);
        WeightedSumCalculator::sigmoid().calculate_into(
            &SequentialExecution,
            &[WeightedInput::forward(&weights, &input)],
            None,
            &mut output,
        );
        output.get(0, 0)
    }

    #[test]
    fn test_sigmoid_matches_logistic_function() {
        for z in [-10.0f32, 0.0, 10.0] {
            let expected = 1.0 / (1.0 + (-z).exp());
            assert_relative_eq!(single_unit_output(z), expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_sigmoid_saturates_without_reaching_bounds() {
        let low = single_unit_output(-10.0);
        let high = single_unit_output(10.0);
        assert!(low > 0.0 && low < 1e-4);
        assert!(high < 1.0 && high > 1.0 - 1e-4);
        assert_eq!(single_unit_output(0.0), 0.5);
    }
}

// ============================================================================
// Decomposition Tests
// ============================================================================

mod decomposition_tests {
    use super::*;

    fn pseudo_random_matrix(rows: usize, columns: usize, seed: f32) -> Matrix {
        let elements = (0..rows * columns)
            .map(|i| ((i as f32 + seed) * 0.618).sin())
            .collect();
        Matrix::from_elements(elements, columns)
    }

    #[test]
    fn test_rows_and_columns_are_bit_identical() {
        let weights = pseudo_random_matrix(5, 7, 1.0);
        let values = pseudo_random_matrix(7, 3, 2.0);
        let bias: Vec<f32> = (0..5).map(|i| i as f32 * 0.1 - 0.2).collect();
        let inputs = [WeightedInput::forward(&weights, &values)];

        let mut by_rows = Matrix::new(5, 3);
        let mut by_columns = Matrix::new(5, 3);
        WeightedSumCalculator::sigmoid()
            .with_decomposition(Decomposition::ByRows)
            .calculate_into(&SequentialExecution, &inputs, Some(&bias), &mut by_rows);
        WeightedSumCalculator::sigmoid()
            .with_decomposition(Decomposition::ByColumns)
            .calculate_into(&SequentialExecution, &inputs, Some(&bias), &mut by_columns);

        assert_eq!(by_rows, by_columns);
    }

    #[test]
    fn test_decomposition_choice() {
        assert_eq!(Decomposition::for_shape(10, 4), Decomposition::ByRows);
        assert_eq!(Decomposition::for_shape(4, 4), Decomposition::ByRows);
        assert_eq!(Decomposition::for_shape(2, 16), Decomposition::ByColumns);
    }

    #[test]
    fn test_parallel_columns_match_sequential_rows() {
        let weights = pseudo_random_matrix(3, 4, 3.0);
        let values = pseudo_random_matrix(4, 9, 4.0);
        let inputs = [WeightedInput::forward(&weights, &values)];
        let parallel = ParallelExecution::new();

        let mut sequential_rows = Matrix::new(3, 9);
        let mut parallel_columns = Matrix::new(3, 9);
        WeightedSumCalculator::new(Activation::IDENTITY)
            .with_decomposition(Decomposition::ByRows)
            .calculate_into(&SequentialExecution, &inputs, None, &mut sequential_rows);
        WeightedSumCalculator::new(Activation::IDENTITY).calculate_into(
            &parallel,
            &inputs,
            None,
            &mut parallel_columns,
        );

        assert_eq!(sequential_rows, parallel_columns);
    }
}

// ============================================================================
// Calculator Tests
// ============================================================================

mod calculator_tests {
    use super::*;

    #[test]
    fn test_weighted_sum_from_connections() {
        let input = Layer::new(0, 2);
        let output = Layer::new(1, 1);
        let mut fc = FullyConnected::new(&input, &output);
        fc.weights_mut()
            .elements_mut()
            .copy_from_slice(&[1.0, 2.0]);
        let mut bias = BiasConnection::new(&output);
        bias.weights_mut().set(0, 0, 0.5);
        let connections = vec![Connection::FullyConnected(fc), Connection::Bias(bias)];

        let mut values = ValuesProvider::new(1);
        values.insert(LayerId(0), Matrix::from_elements(vec![3.0, 4.0], 1));

        let calculated = WeightedSumCalculator::new(Activation::IDENTITY).calculate(
            &SequentialExecution,
            &connections,
            &mut values,
            &output,
        );

        assert!(calculated);
        assert_eq!(values.get(LayerId(1)).unwrap().get(0, 0), 11.5);
    }

    #[test]
    fn test_missing_connection_skips_calculation() {
        let target = Layer::new(5, 2);
        let connections = vec![Connection::Bias(BiasConnection::new(&target))];
        let mut values = ValuesProvider::new(1);

        let calculated = WeightedSumCalculator::sigmoid().calculate(
            &SequentialExecution,
            &connections,
            &mut values,
            &target,
        );

        assert!(!calculated);
        assert!(values.get(LayerId(5)).is_none());
    }

    #[test]
    fn test_conv2d_calculator_with_bias() {
        let mut conv = Conv2DConnection::new(LayerId(0), LayerId(1), 1, 3, 3, 2, 2, 1, 1);
        conv.weights_mut()
            .elements_mut()
            .copy_from_slice(&[1.0, 0.0, 0.0, 1.0]);
        let mut bias = BiasConnection::with_units(LayerId(1), 1);
        bias.weights_mut().set(0, 0, 0.5);
        let connections = vec![Connection::Conv2D(conv), Connection::Bias(bias)];

        let mut values = ValuesProvider::new(1);
        values.insert(
            LayerId(0),
            Matrix::from_elements((1..=9).map(|v| v as f32).collect(), 1),
        );

        let calculator = Conv2DCalculator::new(Activation::IDENTITY);
        assert!(calculator.calculate(&ParallelExecution::new(), &connections, &mut values));

        let output = values.get(LayerId(1)).unwrap();
        assert_eq!(output.elements(), &[6.5, 8.5, 12.5, 14.5]);
    }

    #[test]
    fn test_conv2d_calculator_without_convolution() {
        let mut values = ValuesProvider::new(1);
        let calculated = Conv2DCalculator::new(Activation::SIGMOID).calculate(
            &SequentialExecution,
            &[],
            &mut values,
        );
        assert!(!calculated);
    }
}
