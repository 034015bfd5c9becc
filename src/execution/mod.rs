//! Kernel execution contract
//!
//! Every numeric kernel in this crate is a fixed-size array of independent
//! work items. A [`Kernel`] reports how many items it has and computes one of
//! them at a time; an [`ExecutionStrategy`] decides how the items are
//! scheduled (in order on one thread, or spread over a rayon pool).
//!
//! # Ownership model
//!
//! The strategy receives the kernel's output buffer and splits it into
//! `work_item_count` consecutive slots of `slot_width` values. Each work item
//! gets exclusive `&mut` access to its own slot and shared `&` access to the
//! inputs the kernel borrowed at construction, so no two items can write the
//! same location and the result does not depend on execution order.
//!
//! Writes that genuinely overlap between items (shared convolution filters,
//! overlapping receptive fields) go through an [`Accumulator`], whose atomic
//! add is order independent up to floating-point rounding.
//!
//! # Example
//!
//! ```
//! use neural_kernels::execution::{ExecutionStrategy, Kernel, SequentialExecution};
//!
//! struct Double<'a> {
//!     input: &'a [f32],
//! }
//!
//! impl Kernel for Double<'_> {
//!     fn work_item_count(&self) -> usize {
//!         self.input.len()
//!     }
//!
//!     fn compute(&self, id: usize, slot: &mut [f32]) {
//!         slot[0] = 2.0 * self.input[id];
//!     }
//! }
//!
//! let input = [1.0, 2.0, 3.0];
//! let mut output = [0.0; 3];
//! SequentialExecution.run_all(&Double { input: &input }, &mut output);
//! assert_eq!(output, [2.0, 4.0, 6.0]);
//! ```

mod accumulator;
mod parallel;
mod sequential;

use std::fmt::Debug;

pub use accumulator::Accumulator;
pub use parallel::ParallelExecution;
pub use sequential::SequentialExecution;

/// A data-parallel computation over `work_item_count` independent items.
pub trait Kernel: Sync {
    /// Number of work items per invocation.
    fn work_item_count(&self) -> usize;

    /// Number of output values owned by each work item.
    fn slot_width(&self) -> usize {
        1
    }

    /// Compute work item `id`, writing only into `slot`.
    ///
    /// `slot` already holds the previous contents of the output buffer, so
    /// a kernel may read its own slot before overwriting it.
    fn compute(&self, id: usize, slot: &mut [f32]);
}

/// Schedules every work item of a kernel exactly once per call.
pub trait ExecutionStrategy: Send + Sync + Debug {
    /// Run all work items of `kernel` against `output`.
    ///
    /// # Panics
    ///
    /// Panics if `output.len()` differs from
    /// `kernel.work_item_count() * kernel.slot_width()`.
    fn run_all(&self, kernel: &dyn Kernel, output: &mut [f32]);
}

/// Slot width after validating the output buffer against the kernel.
pub(crate) fn checked_slot_width(kernel: &dyn Kernel, output: &[f32]) -> usize {
    let width = kernel.slot_width();
    assert!(width > 0, "Kernel slot width must be positive");
    assert_eq!(
        output.len(),
        kernel.work_item_count() * width,
        "Output buffer does not match work item count x slot width"
    );
    width
}
