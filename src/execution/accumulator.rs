use std::sync::atomic::{AtomicU32, Ordering};

/// Shared `f32` buffer supporting concurrent additive writes.
///
/// Each cell stores the bit pattern of an `f32` in an `AtomicU32`; [`add`]
/// retries a compare-and-swap until its addition lands. Additions from
/// different work items commute, so the final sums are independent of
/// scheduling except for floating-point rounding.
///
/// [`add`]: Accumulator::add
#[derive(Debug)]
pub struct Accumulator {
    cells: Vec<AtomicU32>,
}

impl Accumulator {
    pub fn zeroed(len: usize) -> Self {
        Self {
            cells: (0..len).map(|_| AtomicU32::new(0.0f32.to_bits())).collect(),
        }
    }

    /// Start from existing values; later additions are added on top.
    pub fn from_slice(values: &[f32]) -> Self {
        Self {
            cells: values.iter().map(|v| AtomicU32::new(v.to_bits())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn add(&self, index: usize, value: f32) {
        let cell = &self.cells[index];
        let mut current = cell.load(Ordering::Relaxed);
        loop {
            let next = (f32::from_bits(current) + value).to_bits();
            match cell.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn get(&self, index: usize) -> f32 {
        f32::from_bits(self.cells[index].load(Ordering::Relaxed))
    }

    /// Copy the accumulated values into `out`.
    ///
    /// # Panics
    ///
    /// Panics if `out` has a different length.
    pub fn write_to(&self, out: &mut [f32]) {
        assert_eq!(out.len(), self.cells.len(), "Accumulator length mismatch");
        for (dst, cell) in out.iter_mut().zip(&self.cells) {
            *dst = f32::from_bits(cell.load(Ordering::Relaxed));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_add_on_top_of_initial_values() {
        let acc = Accumulator::from_slice(&[1.0, 2.0]);
        acc.add(0, 0.5);
        acc.add(1, -2.0);
        assert_eq!(acc.get(0), 1.5);
        assert_eq!(acc.get(1), 0.0);
    }

    #[test]
    fn test_concurrent_adds_are_not_lost() {
        let acc = Accumulator::zeroed(4);
        (0..4000).into_par_iter().for_each(|i| acc.add(i % 4, 1.0));

        let mut out = vec![0.0f32; 4];
        acc.write_to(&mut out);
        assert_eq!(out, vec![1000.0; 4]);
    }
}
