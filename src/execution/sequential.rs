use super::{checked_slot_width, ExecutionStrategy, Kernel};

/// Runs work items one after another, in index order, on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialExecution;

impl ExecutionStrategy for SequentialExecution {
    fn run_all(&self, kernel: &dyn Kernel, output: &mut [f32]) {
        let width = checked_slot_width(kernel, output);
        if output.is_empty() {
            return;
        }
        for (id, slot) in output.chunks_mut(width).enumerate() {
            kernel.compute(id, slot);
        }
    }
}
