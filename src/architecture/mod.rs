//! Network topology consumed by the kernels
//!
//! Layers are plain unit counts identified by a [`LayerId`]; connections own
//! their weight matrices and name the two layers they join. Kernels and
//! calculators only read layer sizes and borrow connection weights.

pub mod connections;
pub mod rbm;

pub use connections::{BiasConnection, Connection, Conv2DConnection, FullyConnected};
pub use rbm::Rbm;

/// Identifier of a layer inside one network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub usize);

/// How the values of a layer are propagated to the next Gibbs step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitKind {
    /// Stochastic binary units: the next step sees a Bernoulli sample
    /// drawn with the activation as probability.
    Binary,
    /// Continuous units: the activation itself is propagated.
    #[default]
    Continuous,
}

/// A layer of units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layer {
    pub id: LayerId,
    pub units: usize,
    pub kind: UnitKind,
}

impl Layer {
    pub fn new(id: usize, units: usize) -> Self {
        Self {
            id: LayerId(id),
            units,
            kind: UnitKind::Continuous,
        }
    }

    pub fn with_kind(mut self, kind: UnitKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_binary(&self) -> bool {
        self.kind == UnitKind::Binary
    }
}
