//! Posterior sampling.
//!
//! Any model exposing a differentiable log density over unconstrained
//! parameters (the [`LogDensity`] trait) can be sampled with [`sample`].
//! Chains run Hamiltonian Monte Carlo with dual-averaging step-size and
//! windowed diagonal mass-matrix adaptation during warmup; tuned draws are
//! discarded and the kept draws are returned as a [`Posterior`] with
//! convergence [`Diagnostics`].
//!
//! # Example
//!
//! ```
//! use hemocount::prelude::*;
//!
//! let config = CountingConfig::default();
//! let model = CountingModel::from_config(&config).unwrap();
//! let sampler = SamplerConfig::default()
//!     .with_draws(200)
//!     .with_tune(200)
//!     .with_seed(7);
//! let posterior = sample(&model, &sampler).unwrap();
//! assert_eq!(posterior.trace.n_draws(), 200);
//! ```

mod adaptation;
pub mod diagnostics;
mod hmc;
mod init;
mod rng;
pub mod trace;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

pub use diagnostics::{ChainStats, Diagnostics, QualityWarning, VariableDiagnostics};
pub use hmc::MAX_ENERGY_ERROR;
pub use rng::SamplerRng;
pub use trace::{Trace, VariableId, CONCENTRATION_KEY};

use crate::error::{HemocountError, Result};

/// A target distribution over unconstrained real parameters.
pub trait LogDensity {
    /// Number of unconstrained parameters.
    fn dim(&self) -> usize;

    /// Log density (up to a constant) and its gradient at `theta`.
    ///
    /// Returns `None` outside the support.
    fn log_density_gradient(&self, theta: &[f64]) -> Option<(f64, Vec<f64>)>;

    /// A point in the bulk of the prior.
    fn initial_point(&self) -> Vec<f64>;

    /// Typical scale of each parameter, used for jitter, the initial
    /// metric and preconditioning.
    fn scales(&self) -> Vec<f64>;

    /// Variables written per draw, in record order.
    fn variables(&self) -> Vec<VariableId>;

    /// Values of [`LogDensity::variables`] for the draw at `theta`;
    /// generated quantities may consume randomness.
    fn record(&self, theta: &[f64], rng: &mut SamplerRng) -> Vec<f64>;
}

/// How chains pick their starting point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Initialization {
    /// Prior centers
    Prior,
    /// Prior centers plus uniform jitter of one prior scale
    Jitter,
    /// Mode of the posterior, found from the prior centers
    #[default]
    Map,
}

/// Sampler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Kept draws per chain
    pub draws: usize,
    /// Warmup iterations per chain (discarded)
    pub tune: usize,
    /// Number of chains
    pub chains: usize,
    /// Starting-point strategy
    pub init: Initialization,
    /// Acceptance probability the step size is tuned towards
    pub target_accept: f64,
    /// Leapfrog steps per transition
    pub leapfrog_steps: usize,
    /// Base seed; chains derive their own from it
    pub seed: Option<u64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            draws: 1000,
            tune: 2000,
            chains: 2,
            init: Initialization::Map,
            target_accept: 0.8,
            leapfrog_steps: 16,
            seed: None,
        }
    }
}

impl SamplerConfig {
    /// Sets the number of kept draws per chain.
    #[must_use]
    pub fn with_draws(mut self, draws: usize) -> Self {
        self.draws = draws;
        self
    }

    /// Sets the number of warmup iterations per chain.
    #[must_use]
    pub fn with_tune(mut self, tune: usize) -> Self {
        self.tune = tune;
        self
    }

    /// Sets the number of chains.
    #[must_use]
    pub fn with_chains(mut self, chains: usize) -> Self {
        self.chains = chains;
        self
    }

    /// Sets the initialization strategy.
    #[must_use]
    pub fn with_init(mut self, init: Initialization) -> Self {
        self.init = init;
        self
    }

    /// Sets the target acceptance probability.
    #[must_use]
    pub fn with_target_accept(mut self, target_accept: f64) -> Self {
        self.target_accept = target_accept;
        self
    }

    /// Sets the number of leapfrog steps per transition.
    #[must_use]
    pub fn with_leapfrog_steps(mut self, steps: usize) -> Self {
        self.leapfrog_steps = steps;
        self
    }

    /// Fixes the base seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check the settings.
    ///
    /// # Errors
    ///
    /// Returns error for zero draws, chains or leapfrog steps, or a target
    /// acceptance outside (0, 1).
    pub fn validate(&self) -> Result<()> {
        if self.draws == 0 {
            return Err(HemocountError::invalid("draws", self.draws, ">= 1"));
        }
        if self.chains == 0 {
            return Err(HemocountError::invalid("chains", self.chains, ">= 1"));
        }
        if self.leapfrog_steps == 0 {
            return Err(HemocountError::invalid(
                "leapfrog_steps",
                self.leapfrog_steps,
                ">= 1",
            ));
        }
        if !(self.target_accept > 0.0 && self.target_accept < 1.0) {
            return Err(HemocountError::invalid(
                "target_accept",
                self.target_accept,
                "in (0, 1)",
            ));
        }
        Ok(())
    }
}

/// Kept draws and their diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Posterior {
    /// Draws of every model variable
    pub trace: Trace,
    /// Sampler statistics and convergence checks
    pub diagnostics: Diagnostics,
}

/// Seed of chain `chain` derived from the run's base seed.
#[must_use]
pub fn chain_seed(base: u64, chain: usize) -> u64 {
    base.wrapping_add((chain as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Draw from the posterior of `model`.
///
/// # Errors
///
/// Returns a configuration error for invalid settings, or
/// [`HemocountError::SamplerInitialization`] if a chain finds no finite
/// starting point.
pub fn sample<M: LogDensity + Sync + ?Sized>(
    model: &M,
    config: &SamplerConfig,
) -> Result<Posterior> {
    config.validate()?;
    let base_seed = config
        .seed
        .unwrap_or_else(|| SamplerRng::from_entropy().seed());
    info!(
        chains = config.chains,
        draws = config.draws,
        tune = config.tune,
        dim = model.dim(),
        seed = base_seed,
        "sampling"
    );

    #[cfg(feature = "parallel")]
    let outputs: Vec<Result<hmc::ChainOutput>> = (0..config.chains)
        .into_par_iter()
        .map(|chain| hmc::run_chain(model, config, chain, chain_seed(base_seed, chain)))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let outputs: Vec<Result<hmc::ChainOutput>> = (0..config.chains)
        .map(|chain| hmc::run_chain(model, config, chain, chain_seed(base_seed, chain)))
        .collect();

    let (rows, stats): (Vec<_>, Vec<_>) = outputs
        .into_iter()
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .map(|output| (output.draws, output.stats))
        .unzip();

    let trace = Trace::from_chains(model.variables(), rows)?;
    let diagnostics = Diagnostics::assess(stats, &trace, config.target_accept);
    info!(
        divergences = diagnostics.total_divergences(),
        acceptance = diagnostics.mean_acceptance(),
        warnings = diagnostics.warnings.len(),
        "sampling finished"
    );
    Ok(Posterior { trace, diagnostics })
}

#[cfg(test)]
#[path = "inference_tests.rs"]
mod tests;
