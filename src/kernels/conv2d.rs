//! Convolutional feed-forward kernel.
//!
//! One work item per output unit (every spatial position of every output
//! feature map). The item walks the filter's offset table from the top-left
//! input unit of its receptive field for each minibatch example.

use tracing::warn;

use crate::architecture::connections::BIAS_INPUT;
use crate::architecture::{Connection, Conv2DConnection};
use crate::execution::{ExecutionStrategy, Kernel};
use crate::matrix::Matrix;
use crate::utils::Activation;
use crate::values::ValuesProvider;

pub struct Conv2DKernel<'a> {
    connection: &'a Conv2DConnection,
    input: &'a [f32],
    bias: Option<&'a [f32]>,
    activation: Activation,
    mini_batch_size: usize,
}

impl<'a> Conv2DKernel<'a> {
    pub fn new(
        connection: &'a Conv2DConnection,
        input: &'a Matrix,
        bias: Option<&'a [f32]>,
        activation: Activation,
    ) -> Self {
        assert_eq!(
            input.rows(),
            connection.input_units(),
            "Input values do not match convolution input"
        );
        if let Some(bias) = bias {
            assert_eq!(
                bias.len(),
                connection.output_feature_maps(),
                "Convolution bias needs one value per feature map"
            );
        }
        Self {
            connection,
            input: input.elements(),
            bias,
            activation,
            mini_batch_size: input.columns(),
        }
    }
}

impl Kernel for Conv2DKernel<'_> {
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

        for (p, out) in slot.iter_mut().enumerate() {
            let mut sum = 0.0f32;
            for (i, &offset) in c.feature_map_offsets().iter().enumerate() {
                sum += weights[c.weight_index(map, i)] * self.input[(start + offset) * mb + p];
            }
            if let Some(bias) = self.bias {
                sum += bias[map] * BIAS_INPUT;
            }
            *out = (self.activation.apply)(sum);
        }
    }
}

/// Feed-forward calculator for a convolutional connection.
#[derive(Debug, Clone, Copy)]
pub struct Conv2DCalculator {
    activation: Activation,
}

impl Conv2DCalculator {
    pub fn new(activation: Activation) -> Self {
        Self { activation }
    }

    /// Overwrite `output` with the activated convolution of `input`.
    pub fn calculate_into(
        &self,
        strategy: &dyn ExecutionStrategy,
        connection: &Conv2DConnection,
        bias: Option<&[f32]>,
        input: &Matrix,
        output: &mut Matrix,
    ) {
        assert!(
            output.has_shape(connection.output_units(), input.columns()),
            "Output values do not match convolution output x minibatch"
        );
        let kernel = Conv2DKernel::new(connection, input, bias, self.activation);
        strategy.run_all(&kernel, output.elements_mut());
    }

    /// Compute the output layer of the first convolution among `connections`.
    ///
    /// Returns `false` without touching anything when there is no
    /// convolutional connection or its input layer has no values.
    pub fn calculate(
        &self,
        strategy: &dyn ExecutionStrategy,
        connections: &[Connection],
        values: &mut ValuesProvider,
    ) -> bool {
        let Some(conv) = connections.iter().find_map(Connection::as_conv2d) else {
            warn!("no convolutional connection supplied, skipping convolution");
            return false;
        };
        let Some(input) = values.get(conv.input_layer()) else {
            warn!(input_layer = ?conv.input_layer(), "convolution input has no values, skipping");
            return false;
        };

        let bias = connections
            .iter()
            .filter_map(Connection::as_bias)
            .find(|b| b.output_layer() == conv.output_layer())
            .map(|b| b.weights().elements());

        let mut output = Matrix::new(conv.output_units(), input.columns());
        self.calculate_into(strategy, conv, bias, input, &mut output);
        values.insert(conv.output_layer(), output);
        true
    }
}
