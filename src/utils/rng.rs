//! Random draws for weight initialization and stochastic unit sampling.
//!
//! The trainer only needs draw-on-demand access to uniform values, so the
//! dependency is expressed through the [`RandomInitializer`] trait. The
//! bundled [`SimpleRng`] is a small xorshift generator that keeps runs
//! reproducible from a seed.

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of uniform random values.
pub trait RandomInitializer: Send {
    /// Uniform sample in [0, 1).
    fn next_f32(&mut self) -> f32;

    /// Uniform sample in [low, high).
    fn gen_range_f32(&mut self, low: f32, high: f32) -> f32 {
        low + (high - low) * self.next_f32()
    }

    /// Bernoulli draw: 1.0 with probability `p`, 0.0 otherwise.
    fn bernoulli(&mut self, p: f32) -> f32 {
        if self.next_f32() < p {
            1.0
        } else {
            0.0
        }
    }
}

/// Simple RNG for reproducibility without external crates.
///
/// Uses xorshift algorithm for fast, deterministic random number generation.
#[derive(Debug, Clone)]
pub struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    /// Create a new RNG with explicit seed (if zero, use a fixed value).
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 0x9e3779b97f4a7c15 } else { seed };
        Self { state }
    }

    /// Create an RNG seeded from the current time.
    pub fn from_time() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        Self::new(nanos)
    }

    /// Basic xorshift to generate u32.
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        (x >> 32) as u32
    }
}

impl RandomInitializer for SimpleRng {
    fn next_f32(&mut self) -> f32 {
        // 24 random bits keep the result strictly below 1.0 in f32.
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_deterministic() {
        let mut rng1 = SimpleRng::new(42);
        let mut rng2 = SimpleRng::new(42);

        for _ in 0..100 {
            assert_eq!(rng1.next_u32(), rng2.next_u32());
        }
    }

    #[test]
    fn test_rng_zero_seed_is_usable() {
        let mut rng = SimpleRng::new(0);
        assert_ne!(rng.next_u32(), 0);
    }

    #[test]
    fn test_rng_next_f32_range() {
        let mut rng = SimpleRng::new(12345);

        for _ in 0..1000 {
            let val = rng.next_f32();
            assert!((0.0..1.0).contains(&val));
        }
    }

    #[test]
    fn test_rng_gen_range_f32() {
        let mut rng = SimpleRng::new(67890);

        for _ in 0..1000 {
            let val = rng.gen_range_f32(-0.01, 0.01);
            assert!((-0.01..0.01).contains(&val));
        }
    }

    #[test]
    fn test_bernoulli_extremes() {
        let mut rng = SimpleRng::new(11111);

        for _ in 0..100 {
            assert_eq!(rng.bernoulli(0.0), 0.0);
            assert_eq!(rng.bernoulli(1.0), 1.0);
        }
    }

    #[test]
    fn test_bernoulli_frequency() {
        let mut rng = SimpleRng::new(22222);
        let ones: f32 = (0..10_000).map(|_| rng.bernoulli(0.3)).sum();
        let freq = ones / 10_000.0;
        assert!((freq - 0.3).abs() < 0.03, "frequency {} too far from 0.3", freq);
    }
}
