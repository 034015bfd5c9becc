//! Minibatch sources for training and testing.

use crate::matrix::Matrix;

/// One minibatch: input values and optional targets, both `units x M`.
#[derive(Debug, Clone)]
pub struct TrainingBatch {
    pub input: Matrix,
    pub target: Option<Matrix>,
}

/// Supplies minibatches to a trainer.
///
/// A trainer asks for `input_size() / mini_batch_size()` batches per call.
pub trait TrainingInputProvider {
    /// Total number of examples delivered per pass.
    fn input_size(&self) -> usize;

    fn mini_batch_size(&self) -> usize;

    /// Next minibatch, or `None` once `input_size()` examples were delivered.
    fn next_batch(&mut self) -> Option<TrainingBatch>;

    /// Restart from the first example.
    fn reset(&mut self);
}

/// In-memory provider cycling over a fixed list of examples.
///
/// `input_size` may exceed the number of examples: the provider wraps around,
/// so a small data set can be replayed many times in a single pass.
#[derive(Debug, Clone)]
pub struct SimpleInputProvider {
    inputs: Vec<Vec<f32>>,
    targets: Option<Vec<Vec<f32>>>,
    input_size: usize,
    mini_batch_size: usize,
    delivered: usize,
}

impl SimpleInputProvider {
    /// # Panics
    ///
    /// Panics if there are no examples, rows have different lengths, targets
    /// do not pair up with inputs, or the minibatch size is zero.
    pub fn new(
        inputs: Vec<Vec<f32>>,
        targets: Option<Vec<Vec<f32>>>,
        input_size: usize,
        mini_batch_size: usize,
    ) -> Self {
        assert!(!inputs.is_empty(), "Input provider needs at least one example");
        assert!(mini_batch_size > 0, "Minibatch size must be positive");
        let width = inputs[0].len();
        assert!(
            inputs.iter().all(|row| row.len() == width),
            "All input examples must have the same length"
        );
        if let Some(targets) = &targets {
            assert_eq!(targets.len(), inputs.len(), "Every input needs a target");
            let target_width = targets[0].len();
            assert!(
                targets.iter().all(|row| row.len() == target_width),
                "All targets must have the same length"
            );
        }

        Self {
            inputs,
            targets,
            input_size,
            mini_batch_size,
            delivered: 0,
        }
    }

    /// Width of one input example.
    pub fn input_units(&self) -> usize {
        self.inputs[0].len()
    }

    fn gather(rows: &[Vec<f32>], first: usize, mini_batch_size: usize) -> Matrix {
        let units = rows[0].len();
        let mut matrix = Matrix::new(units, mini_batch_size);
        for p in 0..mini_batch_size {
            let example = &rows[(first + p) % rows.len()];
            for (unit, &value) in example.iter().enumerate() {
                matrix.set(unit, p, value);
            }
        }
        matrix
    }
}

impl TrainingInputProvider for SimpleInputProvider {
    fn input_size(&self) -> usize {
        self.input_size
    }

    fn mini_batch_size(&self) -> usize {
        self.mini_batch_size
    }

    fn next_batch(&mut self) -> Option<TrainingBatch> {
        if self.delivered + self.mini_batch_size > self.input_size {
            return None;
        }
        let first = self.delivered;
        self.delivered += self.mini_batch_size;

        Some(TrainingBatch {
            input: Self::gather(&self.inputs, first, self.mini_batch_size),
            target: self
                .targets
                .as_ref()
                .map(|t| Self::gather(t, first, self.mini_batch_size)),
        })
    }

    fn reset(&mut self) {
        self.delivered = 0;
    }
}
