//! Posterior summaries for the dashboard.
//!
//! Everything here works on draws looked up by their stable display key
//! (e.g. [`crate::CONCENTRATION_KEY`]), so callers never touch the model's
//! internal wiring.

mod curves;

use std::fmt;

use serde::Serialize;

pub use curves::{sample_curves, GrowthCurveBand};

use crate::error::{HemocountError, Result};
use crate::inference::diagnostics::{effective_sample_size, mcse, split_r_hat};
use crate::inference::Posterior;

/// Credible mass used by the dashboard.
pub const DEFAULT_CREDIBLE_MASS: f64 = 0.95;

/// Summary statistics of one variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableSummary {
    /// Display key
    pub variable: String,
    /// Posterior mean
    pub mean: f64,
    /// Posterior standard deviation
    pub sd: f64,
    /// Lower end of the equal-tailed interval
    pub lower: f64,
    /// Upper end of the equal-tailed interval
    pub upper: f64,
    /// Lower end of the highest density interval
    pub hdi_lower: f64,
    /// Upper end of the highest density interval
    pub hdi_upper: f64,
    /// Probability mass of both intervals
    pub credible_mass: f64,
    /// Split R-hat
    pub r_hat: f64,
    /// Effective sample size
    pub ess: f64,
    /// Monte Carlo standard error of the mean
    pub mcse: f64,
}

impl fmt::Display for VariableSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: mean {:.4e}, sd {:.4e}, {:.0}% HDI [{:.4e}, {:.4e}], r_hat {:.3}, ess {:.0}",
            self.variable,
            self.mean,
            self.sd,
            100.0 * self.credible_mass,
            self.hdi_lower,
            self.hdi_upper,
            self.r_hat,
            self.ess
        )
    }
}

/// Binned draws.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    /// `bins + 1` bin edges, ascending
    pub edges: Vec<f64>,
    /// Draws per bin
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Bin `values` into `bins` equal-width bins spanning their range.
    ///
    /// # Errors
    ///
    /// Returns error for zero bins or no values.
    pub fn from_values(values: &[f64], bins: usize) -> Result<Self> {
        if bins == 0 {
            return Err(HemocountError::invalid("bins", bins, ">= 1"));
        }
        if values.is_empty() {
            return Err(HemocountError::invalid("values", "[]", "at least one draw"));
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        // constant draws still get a bin of positive width
        let width = if max > min { (max - min) / bins as f64 } else { 1.0 };
        let edges: Vec<f64> = (0..=bins).map(|i| min + width * i as f64).collect();
        let mut counts = vec![0; bins];
        for &v in values {
            let bin = (((v - min) / width) as usize).min(bins - 1);
            counts[bin] += 1;
        }
        Ok(Self { edges, counts })
    }

    /// Bin centers.
    #[must_use]
    pub fn centers(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }

    /// Counts normalized to a probability density.
    #[must_use]
    pub fn density(&self) -> Vec<f64> {
        let total: usize = self.counts.iter().sum();
        self.counts
            .iter()
            .zip(self.edges.windows(2))
            .map(|(&c, w)| c as f64 / (total as f64 * (w[1] - w[0])))
            .collect()
    }
}

/// Linearly interpolated percentile, `p` in [0, 1].
#[must_use]
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile_sorted(&sorted, p)
}

fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let idx = p.clamp(0.0, 1.0) * (n - 1) as f64;
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;
    let frac = idx - lower as f64;
    sorted[lower] * (1.0 - frac) + sorted[upper] * frac
}

/// Narrowest interval holding `mass` of the draws.
#[must_use]
pub fn hdi(values: &[f64], mass: f64) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    hdi_sorted(&sorted, mass)
}

fn hdi_sorted(sorted: &[f64], mass: f64) -> (f64, f64) {
    let n = sorted.len();
    let inside = ((mass.clamp(0.0, 1.0) * n as f64).ceil() as usize).clamp(1, n);
    let (start, _) = (0..=n - inside)
        .map(|i| (i, sorted[i + inside - 1] - sorted[i]))
        .fold((0, f64::INFINITY), |best, cur| {
            if cur.1 < best.1 {
                cur
            } else {
                best
            }
        });
    (sorted[start], sorted[start + inside - 1])
}

fn check_mass(mass: f64) -> Result<()> {
    if mass > 0.0 && mass < 1.0 {
        Ok(())
    } else {
        Err(HemocountError::invalid("credible_mass", mass, "in (0, 1)"))
    }
}

impl Posterior {
    /// Summary statistics of the variable with display key `key`.
    ///
    /// # Errors
    ///
    /// Returns [`HemocountError::UnknownVariable`] for an unrecorded key and
    /// a configuration error for a mass outside (0, 1).
    pub fn summary(&self, key: &str, credible_mass: f64) -> Result<VariableSummary> {
        check_mass(credible_mass)?;
        let chains = self.trace.get(key)?;
        let mut sorted: Vec<f64> = chains.iter().flatten().copied().collect();
        if sorted.is_empty() {
            return Err(HemocountError::invalid(key, "[]", "at least one draw"));
        }
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let sd = (sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0).max(1.0))
            .sqrt();
        let tail = 0.5 * (1.0 - credible_mass);
        let (hdi_lower, hdi_upper) = hdi_sorted(&sorted, credible_mass);
        let ess = effective_sample_size(chains);

        Ok(VariableSummary {
            variable: key.to_string(),
            mean,
            sd,
            lower: percentile_sorted(&sorted, tail),
            upper: percentile_sorted(&sorted, 1.0 - tail),
            hdi_lower,
            hdi_upper,
            credible_mass,
            r_hat: split_r_hat(chains),
            ess,
            mcse: mcse(sd, ess),
        })
    }

    /// Histogram of the variable with display key `key`.
    ///
    /// # Errors
    ///
    /// Returns [`HemocountError::UnknownVariable`] for an unrecorded key or
    /// a configuration error for zero bins.
    pub fn histogram(&self, key: &str, bins: usize) -> Result<Histogram> {
        Histogram::from_values(&self.trace.samples(key)?, bins)
    }
}

/// Summaries of several variables; every recorded variable when `keys` is
/// empty.
///
/// # Errors
///
/// Returns the first lookup or configuration error.
pub fn summarize(
    posterior: &Posterior,
    keys: &[&str],
    credible_mass: f64,
) -> Result<Vec<VariableSummary>> {
    if keys.is_empty() {
        posterior
            .trace
            .keys()
            .iter()
            .map(|key| posterior.summary(key, credible_mass))
            .collect()
    } else {
        keys.iter()
            .map(|key| posterior.summary(key, credible_mass))
            .collect()
    }
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
