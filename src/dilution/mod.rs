//! Serial dilution chain.
//!
//! A slurry of unknown concentration is diluted by transferring a small
//! volume into a shaker of fresh medium, possibly several times in series.
//! Each step multiplies the concentration by
//!
//! ```text
//! d_i = transferred / (transferred + receiving)
//! ```
//!
//! and both volumes are measured with pipetting error, so every `d_i` is a
//! random variable. The chained factor is the product of the step factors;
//! with no steps it is exactly 1.
//!
//! # Example
//!
//! ```
//! use hemocount::dilution::DilutionSeries;
//!
//! // Two 1 mL → 9 mL dilutions
//! let series = DilutionSeries::serial(2, 9.0, 1.0).unwrap();
//! assert_eq!(series.len(), 2);
//! assert!((series.nominal_factor() - 0.01).abs() < 1e-12);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{HemocountError, Result};
use crate::inference::SamplerRng;
use crate::priors::Prior;

/// Pipetting error (sd, mL) on the transferred slurry volume.
pub const SLURRY_SD_ML: f64 = 0.01;

/// Measurement error (sd, mL) on the receiving shaker volume.
pub const SHAKER_SD_ML: f64 = 0.05;

/// Nominal volumes of one dilution step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DilutionStep {
    /// Slurry transferred into the shaker (mL)
    pub slurry_ml: f64,
    /// Fresh medium already in the shaker (mL)
    pub shaker_ml: f64,
}

impl DilutionStep {
    /// Create a step from nominal volumes.
    ///
    /// # Errors
    ///
    /// Returns error unless both volumes are finite and positive.
    pub fn new(slurry_ml: f64, shaker_ml: f64) -> Result<Self> {
        if !(slurry_ml.is_finite() && slurry_ml > 0.0) {
            return Err(HemocountError::invalid(
                "ml_of_slurry_transferred",
                slurry_ml,
                "> 0",
            ));
        }
        if !(shaker_ml.is_finite() && shaker_ml > 0.0) {
            return Err(HemocountError::invalid("ml_of_each_dilution", shaker_ml, "> 0"));
        }
        Ok(Self {
            slurry_ml,
            shaker_ml,
        })
    }

    /// Dilution factor at the nominal volumes.
    #[must_use]
    pub fn nominal_ratio(&self) -> f64 {
        self.slurry_ml / (self.slurry_ml + self.shaker_ml)
    }

    /// Prior over the transferred volume.
    #[must_use]
    pub fn slurry_prior(&self) -> Prior {
        Prior::PositiveNormal {
            mean: self.slurry_ml,
            sd: SLURRY_SD_ML,
        }
    }

    /// Prior over the receiving volume.
    #[must_use]
    pub fn shaker_prior(&self) -> Prior {
        Prior::PositiveNormal {
            mean: self.shaker_ml,
            sd: SHAKER_SD_ML,
        }
    }

    /// Draw noisy volumes for this step.
    pub fn sample(&self, rng: &mut SamplerRng) -> StepDraw {
        StepDraw {
            slurry_ml: self.slurry_prior().sample(rng),
            shaker_ml: self.shaker_prior().sample(rng),
        }
    }
}

/// Realized volumes of one dilution step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepDraw {
    /// Transferred slurry volume (mL)
    pub slurry_ml: f64,
    /// Receiving shaker volume (mL)
    pub shaker_ml: f64,
}

impl StepDraw {
    /// Fraction of the concentration that survives this step.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        self.slurry_ml / (self.slurry_ml + self.shaker_ml)
    }
}

/// Ordered sequence of dilution steps applied to the slurry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DilutionSeries {
    steps: Vec<DilutionStep>,
}

impl DilutionSeries {
    /// No dilution: the slurry is counted directly.
    #[must_use]
    pub fn undiluted() -> Self {
        Self::default()
    }

    /// Series from explicit steps.
    #[must_use]
    pub fn new(steps: Vec<DilutionStep>) -> Self {
        Self { steps }
    }

    /// `count` identical steps of `slurry_ml` into `shaker_ml`.
    ///
    /// # Errors
    ///
    /// Returns error if `count` is negative or a volume is not positive,
    /// even when no step is requested.
    pub fn serial(count: i32, shaker_ml: f64, slurry_ml: f64) -> Result<Self> {
        let count = usize::try_from(count).map_err(|_| {
            HemocountError::invalid("number_of_serial_dilutions", count, ">= 0")
        })?;
        let step = DilutionStep::new(slurry_ml, shaker_ml)?;
        if count == 0 {
            return Ok(Self::undiluted());
        }
        Ok(Self::new(vec![step; count]))
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the slurry is counted undiluted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps in application order.
    #[must_use]
    pub fn steps(&self) -> &[DilutionStep] {
        &self.steps
    }

    /// Chained factor at nominal volumes.
    #[must_use]
    pub fn nominal_factor(&self) -> f64 {
        self.steps.iter().map(DilutionStep::nominal_ratio).product()
    }

    /// Chained factor for realized volumes.
    #[must_use]
    pub fn factor(draws: &[StepDraw]) -> f64 {
        draws.iter().map(StepDraw::ratio).product()
    }

    /// Largest chained factor within the plausible range of the volume
    /// priors (most slurry, least medium).
    #[must_use]
    pub fn max_plausible_factor(&self) -> f64 {
        self.steps
            .iter()
            .map(|step| {
                let slurry = step.slurry_prior().plausible_upper();
                let shaker = step.shaker_prior().plausible_lower();
                slurry / (slurry + shaker)
            })
            .product()
    }

    /// Draw noisy volumes for every step.
    pub fn sample_draws(&self, rng: &mut SamplerRng) -> Vec<StepDraw> {
        self.steps.iter().map(|step| step.sample(rng)).collect()
    }

    /// Monte Carlo estimate of the prior expected chained factor.
    pub fn expected_factor(&self, rng: &mut SamplerRng, n_draws: usize) -> f64 {
        if self.is_empty() || n_draws == 0 {
            return self.nominal_factor();
        }
        let total: f64 = (0..n_draws)
            .map(|_| Self::factor(&self.sample_draws(rng)))
            .sum();
        total / n_draws as f64
    }
}

#[cfg(test)]
#[path = "dilution_tests.rs"]
mod tests;
