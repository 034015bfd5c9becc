use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

use super::{checked_slot_width, ExecutionStrategy, Kernel};

/// Spreads work items over rayon worker threads.
///
/// By default the global rayon pool is used. [`ParallelExecution::with_threads`]
/// builds a dedicated pool so that kernel execution does not compete with
/// other rayon work in the process.
#[derive(Clone, Default)]
pub struct ParallelExecution {
    pool: Option<Arc<ThreadPool>>,
}

impl ParallelExecution {
    /// Use the global rayon thread pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a dedicated pool with a fixed number of threads.
    pub fn with_threads(threads: usize) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("kernel-worker-{}", i))
            .build()?;
        Ok(Self {
            pool: Some(Arc::new(pool)),
        })
    }

    pub fn threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }
}

impl fmt::Debug for ParallelExecution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelExecution")
            .field("threads", &self.threads())
            .finish()
    }
}

impl ExecutionStrategy for ParallelExecution {
    fn run_all(&self, kernel: &dyn Kernel, output: &mut [f32]) {
        let width = checked_slot_width(kernel, output);
        if output.is_empty() {
            return;
        }
        let mut run = || {
            output
                .par_chunks_mut(width)
                .enumerate()
                .for_each(|(id, slot)| kernel.compute(id, slot));
        };
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::SequentialExecution;

    struct Polynomial<'a> {
        input: &'a [f32],
    }

    impl Kernel for Polynomial<'_> {
        fn work_item_count(&self) -> usize {
            self.input.len()
        }

        fn compute(&self, id: usize, slot: &mut [f32]) {
            let x = self.input[id];
            slot[0] = 0.5 * x * x - 3.0 * x + 1.25;
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let input: Vec<f32> = (0..1000).map(|i| i as f32 * 0.01).collect();
        let kernel = Polynomial { input: &input };

        let mut sequential = vec![0.0f32; input.len()];
        let mut parallel = vec![0.0f32; input.len()];
        SequentialExecution.run_all(&kernel, &mut sequential);
        ParallelExecution::new().run_all(&kernel, &mut parallel);

        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_dedicated_pool() {
        let strategy = ParallelExecution::with_threads(2).unwrap();
        assert_eq!(strategy.threads(), 2);

        let input = vec![1.0f32; 16];
        let mut output = vec![0.0f32; 16];
        strategy.run_all(&Polynomial { input: &input }, &mut output);
        assert!(output.iter().all(|&v| v == -1.25));
    }
}
