//! Hemocount: Bayesian cell counting with a hemocytometer.
//!
//! Estimates a yeast slurry's cell concentration from a manual count of a
//! few hemocytometer squares. The sample's path to the microscope is
//! modeled generatively (noisy serial dilutions, a chamber of uncertain
//! volume, Poisson cells in the chamber, Binomial thinning to the squares
//! actually counted) and the posterior is sampled with Hamiltonian Monte
//! Carlo. A logistic growth variant tracks the concentration over time.
//!
//! # Quick Start
//!
//! ```
//! use hemocount::prelude::*;
//!
//! // 20 cells in 5 squares, undiluted, prior 0..10 billion cells/mL
//! let config = CountingConfig::default();
//! let sampler = SamplerConfig::default()
//!     .with_draws(300)
//!     .with_tune(300)
//!     .with_seed(1);
//! let (posterior, _model) = generate_model(&config, &sampler).unwrap();
//!
//! let summary = posterior.summary(CONCENTRATION_KEY, 0.95).unwrap();
//! // 20 / (5 / 25) / 1e-4 mL = 1e6 cells/mL = 0.001 billion/mL
//! assert!((summary.mean - 0.001).abs() < 0.0005);
//! ```
//!
//! # Modules
//!
//! - [`priors`]: Prior families and their unconstrained transforms
//! - [`dilution`]: Serial dilution steps and chained dilution factors
//! - [`measurement`]: Chamber volume, Poisson/Binomial counting
//! - [`growth`]: Logistic growth curve and its configuration
//! - [`model`]: The joint model handed to the sampler
//! - [`inference`]: HMC sampler, trace and convergence diagnostics
//! - [`report`]: Summaries, histograms and growth-curve bands
//!
//! All concentrations are in billions of cells per mL.

pub mod dilution;
pub mod error;
pub mod growth;
pub mod inference;
pub mod measurement;
pub mod model;
pub mod prelude;
pub mod priors;
pub mod report;

pub use error::{HemocountError, Result};
pub use growth::GrowthConfig;
pub use inference::{Posterior, SamplerConfig, CONCENTRATION_KEY};
pub use model::{CountingConfig, CountingModel};

/// Build the static model for one count and sample its posterior.
///
/// # Errors
///
/// Returns a configuration error before any sampling for invalid inputs,
/// [`HemocountError::ModelInconsistency`] for an implausible count, or
/// [`HemocountError::SamplerInitialization`] if sampling cannot start.
pub fn generate_model(
    config: &CountingConfig,
    sampler: &SamplerConfig,
) -> Result<(Posterior, CountingModel)> {
    sampler.validate()?;
    let model = CountingModel::from_config(config)?;
    let posterior = model.sample(sampler)?;
    Ok((posterior, model))
}

/// Build the growth-curve model and sample its posterior.
///
/// # Errors
///
/// As [`generate_model`].
pub fn generate_growth_model(
    config: &GrowthConfig,
    sampler: &SamplerConfig,
) -> Result<(Posterior, CountingModel)> {
    sampler.validate()?;
    let model = CountingModel::growth(config)?;
    let posterior = model.sample(sampler)?;
    Ok((posterior, model))
}
