//! Weighted sum + activation over fully connected connections.
//!
//! For a target layer of `O` units and a minibatch of `M` examples every
//! output element is
//!
//! ```text
//! out[u][p] = activation( sum_c sum_k w_c(u, k) * in_c[k][p] + bias[u] )
//! ```
//!
//! The index space can be decomposed by rows (one work item per output unit)
//! or by columns (one work item per minibatch example). Both decompositions
//! evaluate each element with the same sequence of additions, so they produce
//! bit-identical results.

use tracing::warn;

use crate::architecture::connections::BIAS_INPUT;
use crate::architecture::{Connection, FullyConnected, Layer, LayerId};
use crate::execution::{ExecutionStrategy, Kernel};
use crate::matrix::Matrix;
use crate::utils::Activation;
use crate::values::ValuesProvider;

/// How the output index space is split into work items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decomposition {
    /// One work item per output unit, iterating over minibatch columns.
    ByRows,
    /// One work item per minibatch column, iterating over output units.
    ByColumns,
}

impl Decomposition {
    /// Pick the decomposition with more work items.
    pub fn for_shape(output_units: usize, mini_batch_size: usize) -> Self {
        if output_units >= mini_batch_size {
            Decomposition::ByRows
        } else {
            Decomposition::ByColumns
        }
    }
}

/// One fully connected input to a weighted sum, oriented towards the target layer.
#[derive(Debug, Clone, Copy)]
pub struct WeightedInput<'a> {
    weights: &'a Matrix,
    /// True when the target is the connection's input layer, i.e. the
    /// weight matrix is read against its direction.
    transposed: bool,
    values: &'a Matrix,
}

impl<'a> WeightedInput<'a> {
    /// Propagate along the connection (`values` belong to its input layer).
    pub fn forward(weights: &'a Matrix, values: &'a Matrix) -> Self {
        Self {
            weights,
            transposed: false,
            values,
        }
    }

    /// Propagate against the connection (`values` belong to its output layer).
    pub fn backward(weights: &'a Matrix, values: &'a Matrix) -> Self {
        Self {
            weights,
            transposed: true,
            values,
        }
    }

    /// Orient `connection` towards `target`, or `None` if it does not end there.
    pub fn towards(
        connection: &'a FullyConnected,
        target: LayerId,
        values: &'a Matrix,
    ) -> Option<Self> {
        if connection.output_layer() == target {
            Some(Self::forward(connection.weights(), values))
        } else if connection.input_layer() == target {
            Some(Self::backward(connection.weights(), values))
        } else {
            None
        }
    }

    fn source_units(&self) -> usize {
        if self.transposed {
            self.weights.rows()
        } else {
            self.weights.columns()
        }
    }

    fn target_units(&self) -> usize {
        if self.transposed {
            self.weights.columns()
        } else {
            self.weights.rows()
        }
    }

    #[inline]
    fn weight(&self, unit: usize, k: usize) -> f32 {
        let w = self.weights.elements();
        let columns = self.weights.columns();
        if self.transposed {
            w[k * columns + unit]
        } else {
            w[unit * columns + k]
        }
    }
}

/// Kernel computing a whole target layer for one minibatch.
pub struct WeightedSumKernel<'a> {
    inputs: &'a [WeightedInput<'a>],
    bias: Option<&'a [f32]>,
    activation: Activation,
    output_units: usize,
    mini_batch_size: usize,
    decomposition: Decomposition,
}

impl<'a> WeightedSumKernel<'a> {
    /// # Panics
    ///
    /// Panics if an input does not provide `mini_batch_size` columns for every
    /// source unit, or disagrees with `output_units`.
    pub fn new(
        inputs: &'a [WeightedInput<'a>],
        bias: Option<&'a [f32]>,
        activation: Activation,
        output_units: usize,
        mini_batch_size: usize,
        decomposition: Decomposition,
    ) -> Self {
        for input in inputs {
            assert_eq!(input.target_units(), output_units, "Weights do not match target layer");
            assert!(
                input.values.has_shape(input.source_units(), mini_batch_size),
                "Input values do not match source layer x minibatch"
            );
        }
        if let Some(bias) = bias {
            assert_eq!(bias.len(), output_units, "Bias does not match target layer");
        }
        Self {
            inputs,
            bias,
            activation,
            output_units,
            mini_batch_size,
            decomposition,
        }
    }

    #[inline]
    fn value(&self, row: usize, col: usize) -> f32 {
        let mb = self.mini_batch_size;
        let mut sum = 0.0f32;
        for input in self.inputs {
            let x = input.values.elements();
            for k in 0..input.source_units() {
                sum += input.weight(row, k) * x[k * mb + col];
            }
        }
        if let Some(bias) = self.bias {
            sum += bias[row] * BIAS_INPUT;
        }
        (self.activation.apply)(sum)
    }
}

impl Kernel for WeightedSumKernel<'_> {
    fn work_item_count(&self) -> usize {
        match self.decomposition {
            Decomposition::ByRows => self.output_units,
            Decomposition::ByColumns => self.mini_batch_size,
        }
    }

    fn slot_width(&self) -> usize {
        match self.decomposition {
            Decomposition::ByRows => self.mini_batch_size,
            Decomposition::ByColumns => self.output_units,
        }
    }

    fn compute(&self, id: usize, slot: &mut [f32]) {
        match self.decomposition {
            Decomposition::ByRows => {
                for (col, out) in slot.iter_mut().enumerate() {
                    *out = self.value(id, col);
                }
            }
            Decomposition::ByColumns => {
                for (row, out) in slot.iter_mut().enumerate() {
                    *out = self.value(row, id);
                }
            }
        }
    }
}

/// Binds the weighted-sum kernel to layers and connections.
#[derive(Debug, Clone, Copy)]
pub struct WeightedSumCalculator {
    activation: Activation,
    decomposition: Option<Decomposition>,
}

impl WeightedSumCalculator {
    pub fn new(activation: Activation) -> Self {
        Self {
            activation,
            decomposition: None,
        }
    }

    pub fn sigmoid() -> Self {
        Self::new(Activation::SIGMOID)
    }

    /// Force a decomposition instead of choosing one from the output shape.
    pub fn with_decomposition(mut self, decomposition: Decomposition) -> Self {
        self.decomposition = Some(decomposition);
        self
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Overwrite `output` with the activated weighted sum of `inputs`.
    pub fn calculate_into(
        &self,
        strategy: &dyn ExecutionStrategy,
        inputs: &[WeightedInput<'_>],
        bias: Option<&[f32]>,
        output: &mut Matrix,
    ) {
        let units = output.rows();
        let mini_batch = output.columns();
        let decomposition = self
            .decomposition
            .unwrap_or_else(|| Decomposition::for_shape(units, mini_batch));
        let kernel = WeightedSumKernel::new(
            inputs,
            bias,
            self.activation,
            units,
            mini_batch,
            decomposition,
        );

        match decomposition {
            Decomposition::ByRows => strategy.run_all(&kernel, output.elements_mut()),
            Decomposition::ByColumns => {
                // Column slots are strided in the row-major output, so items
                // write a transposed staging buffer that is scattered back.
                let mut staging = vec![0.0f32; units * mini_batch];
                strategy.run_all(&kernel, &mut staging);
                let out = output.elements_mut();
                for (col, column) in staging.chunks_exact(units).enumerate() {
                    for (row, &value) in column.iter().enumerate() {
                        out[row * mini_batch + col] = value;
                    }
                }
            }
        }
    }

    /// Compute `target` from every fully connected connection touching it and
    /// its bias connection, reading source values from `values`.
    ///
    /// Returns `false` without touching anything when no fully connected
    /// connection leads to `target`.
    pub fn calculate(
        &self,
        strategy: &dyn ExecutionStrategy,
        connections: &[Connection],
        values: &mut ValuesProvider,
        target: &Layer,
    ) -> bool {
        let sources: Vec<(&FullyConnected, LayerId)> = connections
            .iter()
            .filter_map(Connection::as_fully_connected)
            .filter_map(|c| {
                if c.output_layer() == target.id {
                    Some((c, c.input_layer()))
                } else if c.input_layer() == target.id {
                    Some((c, c.output_layer()))
                } else {
                    None
                }
            })
            .collect();

        if sources.is_empty() {
            warn!(target_layer = ?target.id, "no fully connected connection leads to target layer, skipping weighted sum");
            return false;
        }
        if let Some(&(_, missing)) = sources.iter().find(|(_, source)| values.get(*source).is_none()) {
            warn!(source_layer = ?missing, "source layer has no values, skipping weighted sum");
            return false;
        }

        let bias = connections
            .iter()
            .filter_map(Connection::as_bias)
            .find(|b| b.output_layer() == target.id);

        let mut output = values
            .take(target.id)
            .filter(|m| m.has_shape(target.units, values.mini_batch_size()))
            .unwrap_or_else(|| Matrix::new(target.units, values.mini_batch_size()));

        {
            let inputs: Vec<WeightedInput<'_>> = sources
                .iter()
                .filter_map(|&(c, source)| {
                    values
                        .get(source)
                        .and_then(|v| WeightedInput::towards(c, target.id, v))
                })
                .collect();
            self.calculate_into(
                strategy,
                &inputs,
                bias.map(|b| b.weights().elements()),
                &mut output,
            );
        }

        values.insert(target.id, output);
        true
    }
}
