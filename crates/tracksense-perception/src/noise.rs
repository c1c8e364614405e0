//! Gaussian noise source for the sensor model.
//!
//! Each [`DetectionEngine`][crate::detection::DetectionEngine] owns exactly one
//! source; it is never shared across threads. Seed it for reproducible runs.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

pub struct NoiseSource {
    rng: StdRng,
}

impl NoiseSource {
    /// Deterministic source.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Source seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Seeded when `seed` is given, OS entropy otherwise.
    pub fn new(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::seeded)
    }

    /// One zero-mean sample with the given standard deviation.
    ///
    /// A zero deviation returns exactly `0.0` without consuming randomness.
    pub fn gaussian(&mut self, std_dev: f64) -> f64 {
        if std_dev == 0.0 {
            return 0.0;
        }
        let n: f64 = self.rng.sample(StandardNormal);
        n * std_dev
    }
}

impl std::fmt::Debug for NoiseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseSource").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = NoiseSource::seeded(42);
        let mut b = NoiseSource::seeded(42);
        for _ in 0..100 {
            assert_eq!(a.gaussian(1.0).to_bits(), b.gaussian(1.0).to_bits());
        }
    }

    #[test]
    fn zero_deviation_is_silent() {
        let mut noise = NoiseSource::seeded(7);
        for _ in 0..10 {
            assert_eq!(noise.gaussian(0.0), 0.0);
        }
    }

    #[test]
    fn successive_draws_differ() {
        let mut noise = NoiseSource::seeded(3);
        let a = noise.gaussian(1.0);
        let b = noise.gaussian(1.0);
        assert_ne!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn sample_statistics_match_the_deviation() {
        let mut noise = NoiseSource::seeded(1234);
        let n = 20_000;
        let samples: Vec<f64> = (0..n).map(|_| noise.gaussian(2.0)).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.1, "mean={mean}");
        assert!((var.sqrt() - 2.0).abs() < 0.1, "std={}", var.sqrt());
    }

    #[test]
    fn optional_seed_selects_constructor() {
        let mut a = NoiseSource::new(Some(9));
        let mut b = NoiseSource::seeded(9);
        assert_eq!(a.gaussian(1.0).to_bits(), b.gaussian(1.0).to_bits());
        let mut c = NoiseSource::new(None);
        assert!(c.gaussian(1.0).is_finite());
    }
}
