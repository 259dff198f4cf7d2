//! Seeded random number generation for samplers and simulations.
//!
//! Every chain owns one [`SamplerRng`]; given the same seed it replays the
//! same sequence, so a chain is reproducible on its own regardless of how
//! chains are scheduled across threads.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Binomial, Distribution, Exp, Gamma, Normal, Poisson, StandardNormal};

/// Deterministic RNG with the draws the counting model needs.
#[derive(Debug, Clone)]
pub struct SamplerRng {
    rng: StdRng,
    seed: u64,
}

impl SamplerRng {
    /// Create a generator from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    /// Create a generator seeded from the operating system.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    /// Seed this generator was created with.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform draw on `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Uniform draw on `[low, high)`.
    pub fn uniform_range(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.uniform()
    }

    /// Standard normal draw.
    pub fn standard_normal(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }

    /// Normal draw; a non-positive `sd` returns `mean`.
    pub fn normal(&mut self, mean: f64, sd: f64) -> f64 {
        match Normal::new(mean, sd) {
            Ok(dist) if sd > 0.0 => dist.sample(&mut self.rng),
            _ => mean,
        }
    }

    /// Gamma draw parameterized by shape and rate.
    pub fn gamma(&mut self, shape: f64, rate: f64) -> f64 {
        match Gamma::new(shape, 1.0 / rate) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => shape / rate,
        }
    }

    /// Exponential draw with the given rate.
    pub fn exponential(&mut self, rate: f64) -> f64 {
        match Exp::new(rate) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => 1.0 / rate,
        }
    }

    /// Poisson draw; a non-positive or non-finite mean yields zero.
    pub fn poisson(&mut self, mean: f64) -> u64 {
        if !(mean.is_finite() && mean > 0.0) {
            return 0;
        }
        match Poisson::new(mean) {
            Ok(dist) => {
                let draw: f64 = dist.sample(&mut self.rng);
                draw as u64
            }
            Err(_) => 0,
        }
    }

    /// Binomial draw of `trials` with success probability `p`.
    pub fn binomial(&mut self, trials: u64, p: f64) -> u64 {
        match Binomial::new(trials, p.clamp(0.0, 1.0)) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => 0,
        }
    }
}
