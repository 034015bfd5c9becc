use std::sync::Arc;

use tracing::{debug, instrument, trace};

use super::input::TrainingInputProvider;
use super::layer_calculator::RbmLayerCalculator;
use super::output_error::OutputError;
use super::{TrainerPhase, TrainingParameters};
use crate::architecture::{Rbm, UnitKind};
use crate::config::TrainingConfig;
use crate::error::{ensure_len, NetworkError, Result};
use crate::execution::ExecutionStrategy;
use crate::kernels::{BiasSide, CdKernelContext};
use crate::matrix::Matrix;
use crate::utils::{RandomInitializer, SimpleRng};

/// Layer values of one minibatch step.
#[derive(Debug, Clone)]
struct PhaseBuffers {
    positive_visible: Matrix,
    positive_hidden: Matrix,
    negative_visible: Matrix,
    negative_hidden: Matrix,
    /// Gibbs chain states: samples for binary layers, activations otherwise.
    visible_state: Matrix,
    hidden_state: Matrix,
}

impl PhaseBuffers {
    fn new(visible: usize, hidden: usize, mini_batch_size: usize) -> Self {
        Self {
            positive_visible: Matrix::new(visible, mini_batch_size),
            positive_hidden: Matrix::new(hidden, mini_batch_size),
            negative_visible: Matrix::new(visible, mini_batch_size),
            negative_hidden: Matrix::new(hidden, mini_batch_size),
            visible_state: Matrix::new(visible, mini_batch_size),
            hidden_state: Matrix::new(hidden, mini_batch_size),
        }
    }

    fn fits(&self, visible: usize, hidden: usize, mini_batch_size: usize) -> bool {
        self.positive_visible.has_shape(visible, mini_batch_size)
            && self.positive_hidden.has_shape(hidden, mini_batch_size)
    }
}

/// Copy `source` into `state`, drawing Bernoulli samples for binary units.
fn propagate_state(
    source: &Matrix,
    kind: UnitKind,
    rng: &mut dyn RandomInitializer,
    state: &mut Matrix,
) {
    match kind {
        UnitKind::Binary => {
            for (s, &p) in state.elements_mut().iter_mut().zip(source.elements()) {
                *s = rng.bernoulli(p);
            }
        }
        UnitKind::Continuous => state.elements_mut().copy_from_slice(source.elements()),
    }
}

/// Contrastive-divergence trainer for a single RBM.
///
/// Each minibatch step runs the positive phase from the minibatch's visible
/// data, `k` Gibbs steps for the negative phase, then the CD weight and bias
/// kernels. With `persistent` set, the hidden state at the end of one
/// negative phase seeds the next minibatch's chain (Persistent CD); otherwise
/// every chain starts from the positive phase.
///
/// Kernels run strictly one after another within a step; parallelism only
/// happens inside a kernel, under the calculator's execution strategy.
pub struct CdTrainer {
    rbm: Rbm,
    parameters: TrainingParameters,
    calculator: RbmLayerCalculator,
    rng: Box<dyn RandomInitializer>,
    context: CdKernelContext,
    buffers: PhaseBuffers,
    chain: Option<Matrix>,
    phase: TrainerPhase,
    initialized: bool,
}

impl CdTrainer {
    /// Sigmoid units, sequential execution, time-seeded random draws.
    pub fn new(rbm: Rbm, parameters: TrainingParameters) -> Self {
        let buffers = PhaseBuffers::new(rbm.visible().units, rbm.hidden().units, 1);
        Self {
            rbm,
            parameters,
            calculator: RbmLayerCalculator::sigmoid(),
            rng: Box::new(SimpleRng::from_time()),
            context: CdKernelContext::default(),
            buffers,
            chain: None,
            phase: TrainerPhase::Idle,
            initialized: false,
        }
    }

    /// Build a trainer from a loaded configuration.
    pub fn from_config(rbm: Rbm, config: &TrainingConfig) -> Result<Self> {
        let activation = config.activation()?;
        let calculator =
            RbmLayerCalculator::new(activation, activation, config.execution_strategy()?);
        Ok(Self::new(rbm, config.parameters())
            .with_calculator(calculator)
            .with_rng(Box::new(config.rng())))
    }

    pub fn with_calculator(mut self, calculator: RbmLayerCalculator) -> Self {
        self.calculator = calculator;
        self
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn ExecutionStrategy>) -> Self {
        self.calculator = self.calculator.with_strategy(strategy);
        self
    }

    pub fn with_rng(mut self, rng: Box<dyn RandomInitializer>) -> Self {
        self.rng = rng;
        self
    }

    pub fn rbm(&self) -> &Rbm {
        &self.rbm
    }

    pub fn rbm_mut(&mut self) -> &mut Rbm {
        &mut self.rbm
    }

    pub fn into_rbm(self) -> Rbm {
        self.rbm
    }

    pub fn parameters(&self) -> &TrainingParameters {
        &self.parameters
    }

    /// Change hyperparameters between calls; momentum and chain state are kept.
    pub fn set_parameters(&mut self, parameters: TrainingParameters) {
        self.parameters = parameters;
    }

    pub fn calculator(&self) -> &RbmLayerCalculator {
        &self.calculator
    }

    pub fn phase(&self) -> TrainerPhase {
        self.phase
    }

    /// Persistent chain state written at the end of the last negative phase.
    pub fn chain_state(&self) -> Option<&Matrix> {
        self.chain.as_ref()
    }

    /// Momentum buffers of the CD kernels.
    pub fn context(&self) -> &CdKernelContext {
        &self.context
    }

    pub fn positive_hidden(&self) -> &Matrix {
        &self.buffers.positive_hidden
    }

    pub fn negative_visible(&self) -> &Matrix {
        &self.buffers.negative_visible
    }

    pub fn negative_hidden(&self) -> &Matrix {
        &self.buffers.negative_hidden
    }

    /// Forget chain state and momentum; the next `train()` re-initializes
    /// weights if the parameters ask for it.
    pub fn reset(&mut self) {
        self.chain = None;
        self.context.reset();
        self.initialized = false;
        self.phase = TrainerPhase::Idle;
    }

    fn set_phase(&mut self, phase: TrainerPhase) {
        trace!(from = ?self.phase, to = ?phase, "trainer phase");
        self.phase = phase;
    }

    /// Process every minibatch the provider supplies, once.
    #[instrument(skip_all)]
    pub fn train(&mut self, input: &mut dyn TrainingInputProvider) -> Result<()> {
        if !self.initialized {
            if let Some((low, high)) = self.parameters.weight_init {
                debug!(low, high, "initializing weights");
                self.rbm.randomize(self.rng.as_mut(), low, high);
            }
            self.initialized = true;
        }

        input.reset();
        let batches = input.input_size() / input.mini_batch_size().max(1);
        for i in 0..batches {
            let Some(batch) = input.next_batch() else {
                break;
            };
            self.step(&batch.input)?;
            trace!(minibatch = i, "minibatch trained");
        }
        debug!(batches, "training pass finished");
        Ok(())
    }

    /// Run one CD (or PCD) step on a `visible units x M` minibatch.
    pub fn step(&mut self, visible: &Matrix) -> Result<()> {
        let visible_units = self.rbm.visible().units;
        let hidden_units = self.rbm.hidden().units;
        ensure_len(visible_units, visible.rows())?;
        let k = self.parameters.gibbs_sampling_count;
        if k == 0 {
            return Err(NetworkError::InvalidConfig(
                "gibbs_sampling_count must be at least 1".to_string(),
            ));
        }

        let mbs = visible.columns();
        if !self.buffers.fits(visible_units, hidden_units, mbs) {
            debug!(mini_batch_size = mbs, "reallocating phase buffers");
            self.buffers = PhaseBuffers::new(visible_units, hidden_units, mbs);
        }

        // Positive phase.
        self.set_phase(TrainerPhase::FeedForward);
        let b = &mut self.buffers;
        b.positive_visible
            .elements_mut()
            .copy_from_slice(visible.elements());
        self.calculator
            .calculate_hidden(&self.rbm, &b.positive_visible, &mut b.positive_hidden);

        let persisted = self
            .chain
            .as_ref()
            .filter(|c| self.parameters.persistent && c.has_shape(hidden_units, mbs));
        match persisted {
            Some(chain) => b
                .hidden_state
                .elements_mut()
                .copy_from_slice(chain.elements()),
            None => propagate_state(
                &b.positive_hidden,
                self.rbm.hidden().kind,
                self.rng.as_mut(),
                &mut b.hidden_state,
            ),
        }

        // Negative phase.
        for i in 0..k {
            self.set_phase(TrainerPhase::GibbsStep(i));
            let b = &mut self.buffers;
            self.calculator
                .calculate_visible(&self.rbm, &mut b.negative_visible, &b.hidden_state);
            propagate_state(
                &b.negative_visible,
                self.rbm.visible().kind,
                self.rng.as_mut(),
                &mut b.visible_state,
            );
            self.calculator
                .calculate_hidden(&self.rbm, &b.visible_state, &mut b.negative_hidden);
            propagate_state(
                &b.negative_hidden,
                self.rbm.hidden().kind,
                self.rng.as_mut(),
                &mut b.hidden_state,
            );
        }

        if self.parameters.persistent {
            match &mut self.chain {
                Some(chain) if chain.has_shape(hidden_units, mbs) => chain
                    .elements_mut()
                    .copy_from_slice(self.buffers.hidden_state.elements()),
                _ => self.chain = Some(self.buffers.hidden_state.clone()),
            }
        }

        self.set_phase(TrainerPhase::GradientAccumulate);
        let params = self.parameters.update_parameters();
        let strategy = self.calculator.strategy();
        let b = &self.buffers;
        self.context.accumulate_weights(
            strategy,
            params,
            self.rbm.main().weights(),
            &b.positive_visible,
            &b.positive_hidden,
            &b.negative_visible,
            &b.negative_hidden,
        );
        if self.rbm.visible_bias().is_some() {
            self.context.accumulate_bias(
                strategy,
                params,
                BiasSide::Visible,
                &b.positive_visible,
                &b.negative_visible,
            );
        }
        if self.rbm.hidden_bias().is_some() {
            self.context.accumulate_bias(
                strategy,
                params,
                BiasSide::Hidden,
                &b.positive_hidden,
                &b.negative_hidden,
            );
        }

        self.set_phase(TrainerPhase::Apply);
        let strategy = self.calculator.strategy();
        self.context
            .apply_weights(strategy, self.rbm.main_mut().weights_mut());
        if let Some(bias) = self.rbm.visible_bias_mut() {
            self.context
                .apply_bias(strategy, BiasSide::Visible, bias.weights_mut());
        }
        if let Some(bias) = self.rbm.hidden_bias_mut() {
            self.context
                .apply_bias(strategy, BiasSide::Hidden, bias.weights_mut());
        }

        self.set_phase(TrainerPhase::Idle);
        Ok(())
    }

    /// Evaluate the RBM without updating it.
    ///
    /// When the provider supplies targets, hidden activations are compared to
    /// them; otherwise the one-step reconstruction of the visible layer is
    /// compared to the input. Returns the aggregated error.
    #[instrument(skip_all)]
    pub fn test(
        &self,
        input: &mut dyn TrainingInputProvider,
        error: &mut dyn OutputError,
    ) -> Result<f32> {
        let visible_units = self.rbm.visible().units;
        let hidden_units = self.rbm.hidden().units;
        input.reset();
        error.reset();

        let batches = input.input_size() / input.mini_batch_size().max(1);
        for _ in 0..batches {
            let Some(batch) = input.next_batch() else {
                break;
            };
            ensure_len(visible_units, batch.input.rows())?;
            let mbs = batch.input.columns();

            let mut hidden = Matrix::new(hidden_units, mbs);
            self.calculator
                .calculate_hidden(&self.rbm, &batch.input, &mut hidden);

            match &batch.target {
                Some(target) => {
                    ensure_len(hidden_units * mbs, target.elements().len())?;
                    for p in 0..mbs {
                        error.add_item(&hidden.column(p), &target.column(p));
                    }
                }
                None => {
                    let mut reconstruction = Matrix::new(visible_units, mbs);
                    self.calculator
                        .calculate_visible(&self.rbm, &mut reconstruction, &hidden);
                    for p in 0..mbs {
                        error.add_item(&reconstruction.column(p), &batch.input.column(p));
                    }
                }
            }
        }

        let total = error.total_network_error();
        debug!(total, "test pass finished");
        Ok(total)
    }
}
