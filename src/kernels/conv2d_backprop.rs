//! Backpropagation through a convolutional connection.
//!
//! One work item per output unit of the convolution. For every minibatch
//! example `p` the item
//!
//! 1. replaces the error signal `out[id*M+p]` by `derivative(out[id*M+p])`
//! 2. for every filter weight `i`, adds `d * ff_activation[input]` to the
//!    gradient of that weight and `d * weight` to the error of the input unit
//!
//! The filter is shared by every position of a feature map and receptive
//! fields overlap, so both additions go through an [`Accumulator`]. After
//! all items finish, weights get a momentum update and the gradients are
//! cleared for the next call.

use tracing::warn;

use crate::architecture::{Connection, Conv2DConnection};
use crate::execution::{Accumulator, ExecutionStrategy, Kernel};
use crate::kernels::updates::{apply_momentum_update, ensure_buffer, UpdateParameters};
use crate::matrix::Matrix;
use crate::utils::Activation;
use crate::values::ValuesProvider;

pub struct Conv2DBackpropKernel<'a> {
    connection: &'a Conv2DConnection,
    ff_activation: &'a [f32],
    derivative: fn(f32) -> f32,
    gradients: &'a Accumulator,
    input_error: &'a Accumulator,
    mini_batch_size: usize,
}

impl<'a> Conv2DBackpropKernel<'a> {
    pub fn new(
        connection: &'a Conv2DConnection,
        ff_activation: &'a Matrix,
        derivative: fn(f32) -> f32,
        gradients: &'a Accumulator,
        input_error: &'a Accumulator,
    ) -> Self {
        let mini_batch_size = ff_activation.columns();
        assert_eq!(
            ff_activation.rows(),
            connection.input_units(),
            "Feed-forward activations do not match convolution input"
        );
        assert_eq!(
            gradients.len(),
            connection.weights().elements().len(),
            "Gradient accumulator does not match convolution weights"
        );
        assert_eq!(
            input_error.len(),
            connection.input_units() * mini_batch_size,
            "Input error accumulator does not match convolution input x minibatch"
        );
        Self {
            connection,
            ff_activation: ff_activation.elements(),
            derivative,
            gradients,
            input_error,
            mini_batch_size,
        }
    }
}

impl Kernel for Conv2DBackpropKernel<'_> {
    fn work_item_count(&self) -> usize {
        self.connection.output_units()
    }

    fn slot_width(&self) -> usize {
        self.mini_batch_size
    }

    fn compute(&self, id: usize, slot: &mut [f32]) {
        let c = self.connection;
        let mb = self.mini_batch_size;
        let map = c.feature_map_of(id);
        let start = c.input_start(id);
        let weights = c.weights().elements();

        for (p, error) in slot.iter_mut().enumerate() {
            let d = (self.derivative)(*error);
            *error = d;

            for (i, &offset) in c.feature_map_offsets().iter().enumerate() {
                let input_id = (start + offset) * mb + p;
                let weight_id = c.weight_index(map, i);
                self.gradients.add(weight_id, d * self.ff_activation[input_id]);
                self.input_error.add(input_id, d * weights[weight_id]);
            }
        }
    }
}

/// Backpropagation calculator for a convolutional connection.
///
/// Owns the gradient and momentum buffers of the connection it updates.
/// Both are sized to the weight vector and reallocated (zeroed) when that
/// size changes; otherwise the momentum deltas persist between calls.
#[derive(Debug, Clone)]
pub struct BackpropagationConv2D {
    parameters: UpdateParameters,
    activation: Activation,
    gradients: Vec<f32>,
    deltas: Vec<f32>,
}

impl BackpropagationConv2D {
    /// `activation` is the nonlinearity used in the forward pass; its
    /// derivative is applied to the incoming error signal.
    pub fn new(parameters: UpdateParameters, activation: Activation) -> Self {
        Self {
            parameters,
            activation,
            gradients: Vec::new(),
            deltas: Vec::new(),
        }
    }

    pub fn parameters(&self) -> UpdateParameters {
        self.parameters
    }

    pub fn set_parameters(&mut self, parameters: UpdateParameters) {
        self.parameters = parameters;
    }

    /// Weight gradients accumulated by the last [`backpropagate`](Self::backpropagate).
    pub fn gradients(&self) -> &[f32] {
        &self.gradients
    }

    /// Last applied weight deltas (the momentum state).
    pub fn deltas(&self) -> &[f32] {
        &self.deltas
    }

    /// Forget momentum, e.g. before an independent training run.
    pub fn reset(&mut self) {
        self.gradients.clear();
        self.deltas.clear();
    }

    /// Accumulate weight gradients and add the propagated error to `input_error`.
    ///
    /// `output_error` is overwritten with the activation derivative of its values.
    pub fn backpropagate(
        &mut self,
        strategy: &dyn ExecutionStrategy,
        connection: &Conv2DConnection,
        ff_activation: &Matrix,
        output_error: &mut Matrix,
        input_error: &mut Matrix,
    ) {
        let weight_count = connection.weights().elements().len();
        ensure_buffer(&mut self.deltas, weight_count);
        if !ensure_buffer(&mut self.gradients, weight_count) {
            self.gradients.fill(0.0);
        }

        let gradients = Accumulator::from_slice(&self.gradients);
        let input_acc = Accumulator::from_slice(input_error.elements());
        let kernel = Conv2DBackpropKernel::new(
            connection,
            ff_activation,
            self.activation.derivative,
            &gradients,
            &input_acc,
        );
        strategy.run_all(&kernel, output_error.elements_mut());

        gradients.write_to(&mut self.gradients);
        input_acc.write_to(input_error.elements_mut());
    }

    /// Apply the accumulated gradients to the weights and clear them.
    pub fn update_weights(&mut self, strategy: &dyn ExecutionStrategy, connection: &mut Conv2DConnection) {
        let weights = connection.weights_mut().elements_mut();
        ensure_buffer(&mut self.deltas, weights.len());
        if self.gradients.len() != weights.len() {
            // Nothing was accumulated for this weight vector.
            self.gradients = vec![0.0f32; weights.len()];
        }
        apply_momentum_update(
            strategy,
            self.parameters,
            &self.gradients,
            &mut self.deltas,
            weights,
        );
        self.gradients.fill(0.0);
    }

    /// Backpropagate and update in one call.
    pub fn calculate_into(
        &mut self,
        strategy: &dyn ExecutionStrategy,
        connection: &mut Conv2DConnection,
        ff_activation: &Matrix,
        output_error: &mut Matrix,
        input_error: &mut Matrix,
    ) {
        self.backpropagate(strategy, connection, ff_activation, output_error, input_error);
        self.update_weights(strategy, connection);
    }

    /// Backpropagate through the first convolution among `connections`.
    ///
    /// Error signals are read from and written to `values` (output layer and
    /// input layer of the convolution); forward activations of the input
    /// layer come from `activations`. Returns `false`, updating nothing, when
    /// no convolutional connection is supplied or a buffer is missing.
    pub fn calculate(
        &mut self,
        strategy: &dyn ExecutionStrategy,
        connections: &mut [Connection],
        activations: &ValuesProvider,
        values: &mut ValuesProvider,
    ) -> bool {
        let Some(conv) = connections.iter_mut().find_map(Connection::as_conv2d_mut) else {
            warn!("no convolutional connection supplied, skipping backpropagation");
            return false;
        };
        let Some(ff_activation) = activations.get(conv.input_layer()) else {
            warn!(input_layer = ?conv.input_layer(), "no forward activations for convolution input, skipping");
            return false;
        };
        let Some(mut output_error) = values.take(conv.output_layer()) else {
            warn!(output_layer = ?conv.output_layer(), "no error signal for convolution output, skipping");
            return false;
        };

        let mut input_error = values
            .take(conv.input_layer())
            .filter(|m| m.has_shape(conv.input_units(), ff_activation.columns()))
            .unwrap_or_else(|| Matrix::new(conv.input_units(), ff_activation.columns()));

        self.calculate_into(strategy, conv, ff_activation, &mut output_error, &mut input_error);

        values.insert(conv.output_layer(), output_error);
        values.insert(conv.input_layer(), input_error);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architecture::LayerId;
    use crate::execution::SequentialExecution;

    fn small_conv() -> Conv2DConnection {
        let mut conv = Conv2DConnection::new(LayerId(0), LayerId(1), 1, 3, 3, 2, 2, 1, 1);
        conv.weights_mut()
            .elements_mut()
            .copy_from_slice(&[0.1, 0.2, 0.3, 0.4]);
        conv
    }

    #[test]
    fn test_backpropagate_accumulates_shared_filter_gradients() {
        let conv = small_conv();
        let ff = Matrix::from_elements((1..=9).map(|v| v as f32).collect(), 1);
        let mut output_error = Matrix::from_elements(vec![1.0, 0.0, 0.0, 1.0], 1);
        let mut input_error = Matrix::new(9, 1);

        let mut bp = BackpropagationConv2D::new(UpdateParameters::new(0.1, 0.0, 0.0), Activation::IDENTITY);
        bp.backpropagate(&SequentialExecution, &conv, &ff, &mut output_error, &mut input_error);

        assert_eq!(bp.gradients(), &[6.0, 8.0, 12.0, 14.0]);
        let expected_input = [0.1, 0.2, 0.0, 0.3, 0.5, 0.2, 0.0, 0.3, 0.4];
        for (got, want) in input_error.elements().iter().zip(expected_input) {
            assert!((got - want).abs() < 1e-6);
        }
        assert_eq!(output_error.elements(), &[1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_derivative_is_applied_in_place() {
        let conv = small_conv();
        let ff = Matrix::new(9, 1);
        let mut output_error = Matrix::from_elements(vec![0.5, 0.5, 0.5, 0.5], 1);
        let mut input_error = Matrix::new(9, 1);

        let mut bp = BackpropagationConv2D::new(UpdateParameters::default(), Activation::SIGMOID);
        bp.backpropagate(&SequentialExecution, &conv, &ff, &mut output_error, &mut input_error);

        assert!(output_error.elements().iter().all(|&v| (v - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_update_clears_gradients() {
        let mut conv = small_conv();
        let ff = Matrix::from_elements((1..=9).map(|v| v as f32).collect(), 1);
        let mut output_error = Matrix::from_elements(vec![1.0, 0.0, 0.0, 1.0], 1);
        let mut input_error = Matrix::new(9, 1);

        let mut bp = BackpropagationConv2D::new(UpdateParameters::new(0.1, 0.0, 0.0), Activation::IDENTITY);
        bp.calculate_into(&SequentialExecution, &mut conv, &ff, &mut output_error, &mut input_error);

        assert!(bp.gradients().iter().all(|&g| g == 0.0));
        let expected = [0.7, 1.0, 1.5, 1.8];
        for (got, want) in conv.weights().elements().iter().zip(expected) {
            assert!((got - want).abs() < 1e-5);
        }
    }
}
