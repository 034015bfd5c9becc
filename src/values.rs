//! Per-pass storage of layer values.
//!
//! A [`ValuesProvider`] maps each layer to the matrix holding its values for
//! the current minibatch (`units x mini_batch_size`). It is shared by all
//! kernels that run during one training or inference pass.

use std::collections::HashMap;

use crate::architecture::{Layer, LayerId};
use crate::matrix::Matrix;

#[derive(Debug, Clone, Default)]
pub struct ValuesProvider {
    mini_batch_size: usize,
    values: HashMap<LayerId, Matrix>,
}

impl ValuesProvider {
    pub fn new(mini_batch_size: usize) -> Self {
        Self {
            mini_batch_size,
            values: HashMap::new(),
        }
    }

    pub fn mini_batch_size(&self) -> usize {
        self.mini_batch_size
    }

    /// Change the minibatch size. Stored matrices of the old size are dropped
    /// and reallocated on next access.
    pub fn set_mini_batch_size(&mut self, mini_batch_size: usize) {
        if mini_batch_size != self.mini_batch_size {
            self.mini_batch_size = mini_batch_size;
            self.values.clear();
        }
    }

    pub fn get(&self, layer: LayerId) -> Option<&Matrix> {
        self.values.get(&layer)
    }

    pub fn get_mut(&mut self, layer: LayerId) -> Option<&mut Matrix> {
        self.values.get_mut(&layer)
    }

    /// Matrix of `layer`, allocated zero-filled (or replaced when its shape is
    /// stale) on first use.
    pub fn values_mut(&mut self, layer: &Layer) -> &mut Matrix {
        let columns = self.mini_batch_size;
        let matrix = self
            .values
            .entry(layer.id)
            .or_insert_with(|| Matrix::new(layer.units, columns));
        if !matrix.has_shape(layer.units, columns) {
            *matrix = Matrix::new(layer.units, columns);
        }
        matrix
    }

    /// Store a matrix for `layer`, replacing any previous one.
    pub fn insert(&mut self, layer: LayerId, values: Matrix) {
        self.values.insert(layer, values);
    }

    /// Temporarily take ownership of a layer's matrix.
    ///
    /// Used when a calculation needs mutable access to two layers at once;
    /// put it back with [`ValuesProvider::insert`].
    pub fn take(&mut self, layer: LayerId) -> Option<Matrix> {
        self.values.remove(&layer)
    }
}
