//! Error aggregation during evaluation.

/// Accumulates per-example error while a trainer evaluates a network.
pub trait OutputError {
    /// Record one example: the network's output and the expected values.
    fn add_item(&mut self, network_output: &[f32], target: &[f32]);

    /// Error over every example recorded since the last reset.
    fn total_network_error(&self) -> f32;

    fn reset(&mut self);
}

/// Fraction of examples whose strongest output unit differs from the
/// strongest target unit.
#[derive(Debug, Clone, Default)]
pub struct MultipleNeuronsOutputError {
    wrong: usize,
    total: usize,
}

impl MultipleNeuronsOutputError {
    pub fn new() -> Self {
        Self::default()
    }

    fn arg_max(values: &[f32]) -> Option<usize> {
        values
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
                Some((_, b)) if b >= v => best,
                _ => Some((i, v)),
            })
            .map(|(i, _)| i)
    }
}

impl OutputError for MultipleNeuronsOutputError {
    fn add_item(&mut self, network_output: &[f32], target: &[f32]) {
        if Self::arg_max(network_output) != Self::arg_max(target) {
            self.wrong += 1;
        }
        self.total += 1;
    }

    fn total_network_error(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.wrong as f32 / self.total as f32
        }
    }

    fn reset(&mut self) {
        self.wrong = 0;
        self.total = 0;
    }
}

/// Mean over examples of the summed squared difference per example.
#[derive(Debug, Clone, Default)]
pub struct MeanSquaredError {
    sum: f64,
    total: usize,
}

impl MeanSquaredError {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputError for MeanSquaredError {
    fn add_item(&mut self, network_output: &[f32], target: &[f32]) {
        assert_eq!(network_output.len(), target.len(), "Output and target lengths differ");
        self.sum += network_output
            .iter()
            .zip(target)
            .map(|(&o, &t)| {
                let d = (o - t) as f64;
                d * d
            })
            .sum::<f64>();
        self.total += 1;
    }

    fn total_network_error(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            (self.sum / self.total as f64) as f32
        }
    }

    fn reset(&mut self) {
        self.sum = 0.0;
        self.total = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiple_neurons_error_ratio() {
        let mut error = MultipleNeuronsOutputError::new();
        error.add_item(&[0.9, 0.1], &[1.0, 0.0]);
        error.add_item(&[0.2, 0.7], &[1.0, 0.0]);
        assert_eq!(error.total_network_error(), 0.5);

        error.reset();
        assert_eq!(error.total_network_error(), 0.0);
    }

    #[test]
    fn test_arg_max_prefers_first_on_ties() {
        assert_eq!(MultipleNeuronsOutputError::arg_max(&[0.5, 0.5]), Some(0));
        assert_eq!(MultipleNeuronsOutputError::arg_max(&[]), None);
    }

    #[test]
    fn test_mean_squared_error() {
        let mut error = MeanSquaredError::new();
        error.add_item(&[1.0, 0.0], &[0.0, 0.0]);
        error.add_item(&[0.5, 0.5], &[0.0, 1.0]);
        assert!((error.total_network_error() - 0.75).abs() < 1e-6);
    }
}
