//! Restricted Boltzmann Machine topology.

use super::connections::{BiasConnection, FullyConnected};
use super::{Layer, UnitKind};
use crate::utils::RandomInitializer;

/// Two-layer RBM: a visible layer, a hidden layer, the symmetric weights
/// between them and optional biases on each side.
///
/// The main connection is directed visible -> hidden, so its weight matrix is
/// `[hidden x visible]`. Computing the visible layer reads it transposed.
///
/// # Example
///
/// ```
/// use neural_kernels::architecture::Rbm;
///
/// let rbm = Rbm::new(3, 2, true);
/// assert_eq!(rbm.main().weights().rows(), 2);
/// assert_eq!(rbm.main().weights().columns(), 3);
/// assert!(rbm.hidden_bias().is_some());
/// ```
#[derive(Debug, Clone)]
pub struct Rbm {
    visible: Layer,
    hidden: Layer,
    main: FullyConnected,
    visible_bias: Option<BiasConnection>,
    hidden_bias: Option<BiasConnection>,
}

impl Rbm {
    /// Create an RBM with zero weights and continuous units on both layers.
    pub fn new(visible_units: usize, hidden_units: usize, add_bias: bool) -> Self {
        let visible = Layer::new(0, visible_units);
        let hidden = Layer::new(1, hidden_units);
        let main = FullyConnected::new(&visible, &hidden);
        let (visible_bias, hidden_bias) = if add_bias {
            (
                Some(BiasConnection::new(&visible)),
                Some(BiasConnection::new(&hidden)),
            )
        } else {
            (None, None)
        };

        Self {
            visible,
            hidden,
            main,
            visible_bias,
            hidden_bias,
        }
    }

    /// Set how each layer is sampled during Gibbs steps.
    pub fn with_unit_kinds(mut self, visible: UnitKind, hidden: UnitKind) -> Self {
        self.visible = self.visible.with_kind(visible);
        self.hidden = self.hidden.with_kind(hidden);
        self
    }

    pub fn visible(&self) -> &Layer {
        &self.visible
    }

    pub fn hidden(&self) -> &Layer {
        &self.hidden
    }

    pub fn main(&self) -> &FullyConnected {
        &self.main
    }

    pub fn main_mut(&mut self) -> &mut FullyConnected {
        &mut self.main
    }

    pub fn visible_bias(&self) -> Option<&BiasConnection> {
        self.visible_bias.as_ref()
    }

    pub fn visible_bias_mut(&mut self) -> Option<&mut BiasConnection> {
        self.visible_bias.as_mut()
    }

    pub fn hidden_bias(&self) -> Option<&BiasConnection> {
        self.hidden_bias.as_ref()
    }

    pub fn hidden_bias_mut(&mut self) -> Option<&mut BiasConnection> {
        self.hidden_bias.as_mut()
    }

    /// Fill every weight and bias with uniform samples in [low, high).
    pub fn randomize(&mut self, rng: &mut dyn RandomInitializer, low: f32, high: f32) {
        let biases = self
            .visible_bias
            .iter_mut()
            .chain(self.hidden_bias.iter_mut())
            .map(|b| b.weights_mut());

        for matrix in std::iter::once(self.main.weights_mut()).chain(biases) {
            for value in matrix.elements_mut() {
                *value = rng.gen_range_f32(low, high);
            }
        }
    }

    /// Total count of weights and biases.
    pub fn parameter_count(&self) -> usize {
        self.main.weights().elements().len()
            + self.visible_bias.as_ref().map_or(0, |b| b.units())
            + self.hidden_bias.as_ref().map_or(0, |b| b.units())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::SimpleRng;

    #[test]
    fn test_rbm_without_bias() {
        let rbm = Rbm::new(6, 2, false);
        assert!(rbm.visible_bias().is_none());
        assert!(rbm.hidden_bias().is_none());
        assert_eq!(rbm.parameter_count(), 12);
    }

    #[test]
    fn test_rbm_unit_kinds() {
        let rbm = Rbm::new(4, 3, true).with_unit_kinds(UnitKind::Binary, UnitKind::Continuous);
        assert!(rbm.visible().is_binary());
        assert!(!rbm.hidden().is_binary());
        assert_eq!(rbm.parameter_count(), 12 + 4 + 3);
    }

    #[test]
    fn test_randomize_bounds_and_determinism() {
        let mut a = Rbm::new(5, 4, true);
        let mut b = Rbm::new(5, 4, true);
        a.randomize(&mut SimpleRng::new(9), -0.01, 0.01);
        b.randomize(&mut SimpleRng::new(9), -0.01, 0.01);

        assert_eq!(a.main().weights(), b.main().weights());
        for &w in a.main().weights().elements() {
            assert!((-0.01..0.01).contains(&w));
        }
        let hb = a.hidden_bias().unwrap().weights().elements();
        assert!(hb.iter().any(|&v| v != 0.0));
    }
}
