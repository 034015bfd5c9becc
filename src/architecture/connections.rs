//! Weighted edge sets between two layers.
//!
//! Weight shapes:
//!
//! - fully connected: `[output units x input units]`, so row `u` holds the
//!   incoming weights of output unit `u`
//! - convolutional: `[feature map weights x output feature maps]`
//! - bias: `[units x 1]`, driven by a constant synthetic input of `1.0`
//!
//! Changing the minibatch size never touches these matrices; only the value
//! buffers the kernels read and write depend on it.

use super::{Layer, LayerId};
use crate::error::{NetworkError, Result};
use crate::matrix::Matrix;

/// Value of the synthetic input unit feeding every bias connection.
pub const BIAS_INPUT: f32 = 1.0;

/// Fully connected weights between two layers.
#[derive(Debug, Clone)]
pub struct FullyConnected {
    input_layer: LayerId,
    output_layer: LayerId,
    weights: Matrix,
}

impl FullyConnected {
    /// Create a zero-initialized connection from `input` to `output`.
    pub fn new(input: &Layer, output: &Layer) -> Self {
        Self {
            input_layer: input.id,
            output_layer: output.id,
            weights: Matrix::new(output.units, input.units),
        }
    }

    pub fn input_layer(&self) -> LayerId {
        self.input_layer
    }

    pub fn output_layer(&self) -> LayerId {
        self.output_layer
    }

    pub fn input_units(&self) -> usize {
        self.weights.columns()
    }

    pub fn output_units(&self) -> usize {
        self.weights.rows()
    }

    pub fn weights(&self) -> &Matrix {
        &self.weights
    }

    pub fn weights_mut(&mut self) -> &mut Matrix {
        &mut self.weights
    }
}

/// Bias weights of a single layer.
#[derive(Debug, Clone)]
pub struct BiasConnection {
    output_layer: LayerId,
    weights: Matrix,
}

impl BiasConnection {
    /// One bias per unit of `output`.
    pub fn new(output: &Layer) -> Self {
        Self::with_units(output.id, output.units)
    }

    /// Bias vector of an explicit length, e.g. one bias per convolutional feature map.
    pub fn with_units(output_layer: LayerId, units: usize) -> Self {
        Self {
            output_layer,
            weights: Matrix::new(units, 1),
        }
    }

    pub fn output_layer(&self) -> LayerId {
        self.output_layer
    }

    pub fn units(&self) -> usize {
        self.weights.rows()
    }

    pub fn weights(&self) -> &Matrix {
        &self.weights
    }

    pub fn weights_mut(&mut self) -> &mut Matrix {
        &mut self.weights
    }
}

/// 2D convolution between stacked feature maps.
///
/// Input units are laid out feature map by feature map, each map row-major
/// (`map * rows * columns + row * columns + col`). Output units follow the same
/// convention with the output geometry.
#[derive(Debug, Clone)]
pub struct Conv2DConnection {
    input_layer: LayerId,
    output_layer: LayerId,
    input_feature_maps: usize,
    input_rows: usize,
    input_columns: usize,
    filter_rows: usize,
    filter_columns: usize,
    output_feature_maps: usize,
    stride: usize,
    feature_map_offsets: Vec<usize>,
    weights: Matrix,
}

impl Conv2DConnection {
    /// Create a zero-initialized convolution.
    ///
    /// # Panics
    ///
    /// Panics if the geometry is rejected by [`Conv2DConnection::try_new`].
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        input_layer: LayerId,
        output_layer: LayerId,
        input_feature_maps: usize,
        input_rows: usize,
        input_columns: usize,
        filter_rows: usize,
        filter_columns: usize,
        output_feature_maps: usize,
        stride: usize,
    ) -> Self {
        match Self::try_new(
            input_layer,
            output_layer,
            input_feature_maps,
            input_rows,
            input_columns,
            filter_rows,
            filter_columns,
            output_feature_maps,
            stride,
        ) {
            Ok(connection) => connection,
            Err(e) => panic!("{}", e),
        }
    }

    /// Create a zero-initialized convolution, rejecting a zero stride, empty
    /// feature maps or a filter that does not fit inside the input.
    #[allow(clippy::too_many_arguments)]
    pub fn try_new(
        input_layer: LayerId,
        output_layer: LayerId,
        input_feature_maps: usize,
        input_rows: usize,
        input_columns: usize,
        filter_rows: usize,
        filter_columns: usize,
        output_feature_maps: usize,
        stride: usize,
    ) -> Result<Self> {
        if stride == 0 {
            return Err(NetworkError::InvalidTopology(
                "stride must be positive".to_string(),
            ));
        }
        if input_feature_maps == 0
            || output_feature_maps == 0
            || filter_rows == 0
            || filter_columns == 0
        {
            return Err(NetworkError::InvalidTopology(
                "feature maps and filter dimensions must be positive".to_string(),
            ));
        }
        if filter_rows > input_rows || filter_columns > input_columns {
            return Err(NetworkError::InvalidTopology(format!(
                "filter {}x{} does not fit a {}x{} input",
                filter_rows, filter_columns, input_rows, input_columns
            )));
        }

        let map_size = input_rows * input_columns;
        let mut feature_map_offsets =
            Vec::with_capacity(input_feature_maps * filter_rows * filter_columns);
        for map in 0..input_feature_maps {
            for r in 0..filter_rows {
                for c in 0..filter_columns {
                    feature_map_offsets.push(map * map_size + r * input_columns + c);
                }
            }
        }

        let weights = Matrix::new(feature_map_offsets.len(), output_feature_maps);

        Ok(Self {
            input_layer,
            output_layer,
            input_feature_maps,
            input_rows,
            input_columns,
            filter_rows,
            filter_columns,
            output_feature_maps,
            stride,
            feature_map_offsets,
            weights,
        })
    }

    pub fn input_layer(&self) -> LayerId {
        self.input_layer
    }

    pub fn output_layer(&self) -> LayerId {
        self.output_layer
    }

    pub fn filter_rows(&self) -> usize {
        self.filter_rows
    }

    pub fn filter_columns(&self) -> usize {
        self.filter_columns
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn output_feature_maps(&self) -> usize {
        self.output_feature_maps
    }

    /// Calculated as: (input_rows - filter_rows) / stride + 1
    pub fn output_rows(&self) -> usize {
        (self.input_rows - self.filter_rows) / self.stride + 1
    }

    /// Calculated as: (input_columns - filter_columns) / stride + 1
    pub fn output_columns(&self) -> usize {
        (self.input_columns - self.filter_columns) / self.stride + 1
    }

    pub fn input_units(&self) -> usize {
        self.input_feature_maps * self.input_rows * self.input_columns
    }

    pub fn output_units(&self) -> usize {
        self.output_feature_maps * self.output_rows() * self.output_columns()
    }

    /// Number of weights in one filter (across all input feature maps).
    pub fn feature_map_weights(&self) -> usize {
        self.feature_map_offsets.len()
    }

    /// Input unit offsets of every filter weight relative to the top-left
    /// corner of the receptive field.
    pub fn feature_map_offsets(&self) -> &[usize] {
        &self.feature_map_offsets
    }

    /// Output feature map that output unit `id` belongs to.
    pub fn feature_map_of(&self, id: usize) -> usize {
        id / (self.output_rows() * self.output_columns())
    }

    /// Input unit at the top-left corner of the receptive field of output unit `id`.
    pub fn input_start(&self, id: usize) -> usize {
        let out_columns = self.output_columns();
        let position = id % (self.output_rows() * out_columns);
        let row = position / out_columns;
        let col = position % out_columns;
        row * self.stride * self.input_columns + col * self.stride
    }

    /// Flat index of filter weight `i` of feature map `map`.
    #[inline]
    pub fn weight_index(&self, map: usize, i: usize) -> usize {
        i * self.output_feature_maps + map
    }

    pub fn weights(&self) -> &Matrix {
        &self.weights
    }

    pub fn weights_mut(&mut self) -> &mut Matrix {
        &mut self.weights
    }
}

/// Any connection a calculator may be handed.
#[derive(Debug, Clone)]
pub enum Connection {
    FullyConnected(FullyConnected),
    Conv2D(Conv2DConnection),
    Bias(BiasConnection),
}

impl Connection {
    /// Layer feeding the connection. Bias connections have no real input layer.
    pub fn input_layer(&self) -> Option<LayerId> {
        match self {
            Connection::FullyConnected(c) => Some(c.input_layer()),
            Connection::Conv2D(c) => Some(c.input_layer()),
            Connection::Bias(_) => None,
        }
    }

    pub fn output_layer(&self) -> LayerId {
        match self {
            Connection::FullyConnected(c) => c.output_layer(),
            Connection::Conv2D(c) => c.output_layer(),
            Connection::Bias(c) => c.output_layer(),
        }
    }

    /// True if the connection touches `layer` on either side.
    pub fn touches(&self, layer: LayerId) -> bool {
        self.output_layer() == layer || self.input_layer() == Some(layer)
    }

    pub fn as_conv2d_mut(&mut self) -> Option<&mut Conv2DConnection> {
        match self {
            Connection::Conv2D(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_conv2d(&self) -> Option<&Conv2DConnection> {
        match self {
            Connection::Conv2D(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_fully_connected(&self) -> Option<&FullyConnected> {
        match self {
            Connection::FullyConnected(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_bias(&self) -> Option<&BiasConnection> {
        match self {
            Connection::Bias(c) => Some(c),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fully_connected_shape() {
        let visible = Layer::new(0, 3);
        let hidden = Layer::new(1, 2);
        let c = FullyConnected::new(&visible, &hidden);

        assert_eq!(c.weights().rows(), 2);
        assert_eq!(c.weights().columns(), 3);
        assert_eq!(c.input_units(), 3);
        assert_eq!(c.output_units(), 2);
    }

    #[test]
    fn test_conv2d_geometry() {
        // 2 input maps of 4x4, 3x3 filter, stride 1, 5 output maps.
        let c = Conv2DConnection::new(LayerId(0), LayerId(1), 2, 4, 4, 3, 3, 5, 1);

        assert_eq!(c.output_rows(), 2);
        assert_eq!(c.output_columns(), 2);
        assert_eq!(c.feature_map_weights(), 18);
        assert_eq!(c.weights().rows(), 18);
        assert_eq!(c.weights().columns(), 5);
        assert_eq!(c.input_units(), 32);
        assert_eq!(c.output_units(), 20);
    }

    #[test]
    fn test_conv2d_offsets_cover_receptive_field() {
        let c = Conv2DConnection::new(LayerId(0), LayerId(1), 2, 3, 3, 2, 2, 1, 1);
        assert_eq!(c.feature_map_offsets(), &[0, 1, 3, 4, 9, 10, 12, 13]);
    }

    #[test]
    fn test_conv2d_input_start_with_stride() {
        // 5x5 input, 3x3 filter, stride 2 -> 2x2 output.
        let c = Conv2DConnection::new(LayerId(0), LayerId(1), 1, 5, 5, 3, 3, 2, 2);

        assert_eq!(c.output_rows(), 2);
        assert_eq!(c.input_start(0), 0);
        assert_eq!(c.input_start(1), 2);
        assert_eq!(c.input_start(2), 10);
        assert_eq!(c.input_start(3), 12);
        // Second feature map repeats the same positions.
        assert_eq!(c.feature_map_of(5), 1);
        assert_eq!(c.input_start(5), 2);
    }

    #[test]
    fn test_conv2d_rejects_oversized_filter() {
        let err = Conv2DConnection::try_new(LayerId(0), LayerId(1), 1, 2, 2, 3, 3, 1, 1).unwrap_err();
        assert!(matches!(err, NetworkError::InvalidTopology(_)));
        assert!(Conv2DConnection::try_new(LayerId(0), LayerId(1), 1, 4, 4, 2, 2, 1, 0).is_err());
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn test_conv2d_new_panics_on_bad_geometry() {
        Conv2DConnection::new(LayerId(0), LayerId(1), 1, 2, 2, 3, 3, 1, 1);
    }

    #[test]
    fn test_connection_accessors() {
        let visible = Layer::new(0, 3);
        let hidden = Layer::new(1, 2);
        let connections = vec![
            Connection::FullyConnected(FullyConnected::new(&visible, &hidden)),
            Connection::Bias(BiasConnection::new(&hidden)),
        ];

        assert!(connections[0].touches(LayerId(0)));
        assert!(connections[1].touches(LayerId(1)));
        assert!(!connections[1].touches(LayerId(0)));
        assert!(connections.iter().all(|c| c.as_conv2d().is_none()));
        assert_eq!(connections[1].as_bias().map(|b| b.units()), Some(2));
    }
}
