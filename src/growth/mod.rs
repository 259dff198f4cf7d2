//! Logistic growth extension.
//!
//! Instead of one static concentration, the culture follows
//!
//! ```text
//! c(t) = P0 + K / (1 + exp(-r (t - Δt)))
//! ```
//!
//! with priors
//!
//! - K ~ Normal (carrying capacity above baseline)
//! - P0 ~ Normal (baseline concentration)
//! - r ~ Exponential(λ) (growth rate per hour)
//! - Δt ~ Uniform(0, lag window) (end of the lag phase)
//!
//! Every observation time gets its own dilution chain, chamber and count;
//! the branches are conditionally independent given (K, P0, r, Δt).
//! All concentrations are in billions of cells per mL.

use serde::{Deserialize, Serialize};

use crate::dilution::DilutionSeries;
use crate::error::{HemocountError, Result};
use crate::measurement::{CountObservation, MeasurementBranch};
use crate::priors::{sigmoid, Prior};

/// Default width of the lag-phase window (hours after inoculation).
pub const LAG_WINDOW_HOURS: f64 = 24.0;

/// A single logistic growth curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticCurve {
    /// Growth above baseline at saturation, K
    pub carrying_capacity: f64,
    /// Concentration before growth, P0
    pub baseline: f64,
    /// Growth rate per hour, r
    pub rate: f64,
    /// Midpoint offset in hours, Δt
    pub lag: f64,
}

impl LogisticCurve {
    /// Growth above baseline at time `t`.
    #[must_use]
    pub fn logistic(&self, t: f64) -> f64 {
        self.carrying_capacity * sigmoid(self.rate * (t - self.lag))
    }

    /// Concentration at time `t`.
    #[must_use]
    pub fn evaluate(&self, t: f64) -> f64 {
        self.baseline + self.logistic(t)
    }

    /// Concentration at each time.
    #[must_use]
    pub fn evaluate_many(&self, times: &[f64]) -> Vec<f64> {
        times.iter().map(|&t| self.evaluate(t)).collect()
    }

    /// Partial derivatives of `evaluate(t)` with respect to
    /// `(K, P0, r, Δt)`.
    #[must_use]
    pub fn gradient(&self, t: f64) -> [f64; 4] {
        let s = sigmoid(self.rate * (t - self.lag));
        let slope = self.carrying_capacity * s * (1.0 - s);
        [s, 1.0, slope * (t - self.lag), -slope * self.rate]
    }
}

/// Prior hyperparameters of the growth curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthPriors {
    /// Mean of K (billions/mL)
    pub carrying_capacity_mean: f64,
    /// Standard deviation of K
    pub carrying_capacity_sd: f64,
    /// Mean of P0 (billions/mL)
    pub baseline_mean: f64,
    /// Standard deviation of P0
    pub baseline_sd: f64,
    /// Rate λ of the exponential prior on r
    pub growth_rate_lambda: f64,
    /// Upper end of the uniform prior on Δt (hours)
    pub lag_window_hours: f64,
}

impl Default for GrowthPriors {
    fn default() -> Self {
        // About 50% growth over a 0.1 billion/mL pitch
        Self {
            carrying_capacity_mean: 0.05,
            carrying_capacity_sd: 0.025,
            baseline_mean: 0.1,
            baseline_sd: 0.025,
            growth_rate_lambda: 2.5,
            lag_window_hours: LAG_WINDOW_HOURS,
        }
    }
}

impl GrowthPriors {
    /// Prior over K.
    ///
    /// # Errors
    ///
    /// Returns error if the standard deviation is not positive.
    pub fn carrying_capacity(&self) -> Result<Prior> {
        Prior::normal(self.carrying_capacity_mean, self.carrying_capacity_sd)
            .map_err(|_| self.invalid("carrying_capacity_sd", self.carrying_capacity_sd))
    }

    /// Prior over P0.
    ///
    /// # Errors
    ///
    /// Returns error if the standard deviation is not positive.
    pub fn baseline(&self) -> Result<Prior> {
        Prior::normal(self.baseline_mean, self.baseline_sd)
            .map_err(|_| self.invalid("baseline_sd", self.baseline_sd))
    }

    /// Prior over r.
    ///
    /// # Errors
    ///
    /// Returns error if λ is not positive.
    pub fn growth_rate(&self) -> Result<Prior> {
        Prior::exponential(self.growth_rate_lambda)
            .map_err(|_| self.invalid("growth_rate_lambda", self.growth_rate_lambda))
    }

    /// Prior over Δt.
    ///
    /// # Errors
    ///
    /// Returns error if the window is not positive.
    pub fn lag(&self) -> Result<Prior> {
        Prior::uniform(0.0, self.lag_window_hours)
            .map_err(|_| self.invalid("lag_window_hours", self.lag_window_hours))
    }

    /// All four priors in parameter order `(K, P0, r, Δt)`.
    ///
    /// # Errors
    ///
    /// Returns the first invalid hyperparameter.
    pub fn priors(&self) -> Result<[Prior; 4]> {
        Ok([
            self.carrying_capacity()?,
            self.baseline()?,
            self.growth_rate()?,
            self.lag()?,
        ])
    }

    /// Highest concentration the priors make plausible.
    ///
    /// # Errors
    ///
    /// Returns error if a hyperparameter is invalid.
    pub fn plausible_max_concentration(&self) -> Result<f64> {
        let [k, p0, _, _] = self.priors()?;
        Ok(p0.plausible_upper() + k.plausible_upper().max(0.0))
    }

    fn invalid(&self, param: &str, value: f64) -> HemocountError {
        HemocountError::invalid(param, value, "> 0")
    }
}

/// Inputs of the growth-curve model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthConfig {
    /// Observation times (hours since inoculation)
    pub hours_since_inoculation: Vec<f64>,
    /// Cells counted at each time
    pub cells_counted: Vec<u64>,
    /// Squares counted at every time
    pub squares_counted: u32,
    /// Serial dilutions before every count
    pub number_of_serial_dilutions: i32,
    /// Shaker volume of each dilution (mL)
    pub ml_of_each_dilution: f64,
    /// Slurry transferred per dilution (mL)
    pub ml_of_slurry_transferred: f64,
    /// Nominal chamber depth (cm)
    pub depth_of_chamber: f64,
    /// Growth-curve priors
    pub priors: GrowthPriors,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            hours_since_inoculation: vec![0.0, 12.5, 17.5, 23.0, 36.5, 42.5, 48.0, 65.0],
            cells_counted: vec![20, 21, 28, 34, 34, 31, 32, 32],
            squares_counted: 4,
            number_of_serial_dilutions: 2,
            ml_of_each_dilution: 9.0,
            ml_of_slurry_transferred: 1.0,
            depth_of_chamber: 0.01,
            priors: GrowthPriors::default(),
        }
    }
}

impl GrowthConfig {
    /// Config for the given observations with default settings otherwise.
    #[must_use]
    pub fn new(hours_since_inoculation: Vec<f64>, cells_counted: Vec<u64>) -> Self {
        Self {
            hours_since_inoculation,
            cells_counted,
            ..Self::default()
        }
    }

    /// Sets the number of squares counted at every time.
    #[must_use]
    pub fn with_squares_counted(mut self, squares: u32) -> Self {
        self.squares_counted = squares;
        self
    }

    /// Sets the dilution protocol applied before every count.
    #[must_use]
    pub fn with_dilutions(mut self, count: i32, shaker_ml: f64, slurry_ml: f64) -> Self {
        self.number_of_serial_dilutions = count;
        self.ml_of_each_dilution = shaker_ml;
        self.ml_of_slurry_transferred = slurry_ml;
        self
    }

    /// Sets the growth-curve priors.
    #[must_use]
    pub fn with_priors(mut self, priors: GrowthPriors) -> Self {
        self.priors = priors;
        self
    }

    /// Check every field and build one measurement branch per time.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for mismatched lengths, no
    /// observations, non-finite or negative times, or any invalid setting.
    pub fn branches(&self) -> Result<Vec<MeasurementBranch>> {
        let m = self.hours_since_inoculation.len();
        if m == 0 {
            return Err(HemocountError::invalid(
                "hours_since_inoculation",
                "[]",
                "at least one observation time",
            ));
        }
        if self.cells_counted.len() != m {
            return Err(HemocountError::dimension_mismatch(
                "cells_counted",
                m,
                self.cells_counted.len(),
            ));
        }
        if let Some(&t) = self
            .hours_since_inoculation
            .iter()
            .find(|t| !(t.is_finite() && **t >= 0.0))
        {
            return Err(HemocountError::invalid("hours_since_inoculation", t, ">= 0"));
        }
        for (name, value) in [
            ("ml_of_each_dilution", self.ml_of_each_dilution),
            ("ml_of_slurry_transferred", self.ml_of_slurry_transferred),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(HemocountError::invalid(name, value, "> 0"));
            }
        }
        self.priors.priors()?;

        let dilution = DilutionSeries::serial(
            self.number_of_serial_dilutions,
            self.ml_of_each_dilution,
            self.ml_of_slurry_transferred,
        )?;
        self.cells_counted
            .iter()
            .map(|&cells| {
                let observation = CountObservation::new(self.squares_counted, cells)?;
                MeasurementBranch::new(dilution.clone(), self.depth_of_chamber, observation)
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "growth_tests.rs"]
mod tests;
