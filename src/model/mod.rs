//! The joint counting model.
//!
//! A [`CountingModel`] couples a concentration model (one static value or a
//! logistic growth curve) with one [`MeasurementBranch`] per observed count
//! and exposes the joint log density to the sampler. The parameter vector is
//! laid out as
//!
//! ```text
//! static:  [z_c, branch_0...]
//! growth:  [K, P0, ln r, z_Δt, branch_0..., branch_1..., ...]
//! ```
//!
//! where every branch block holds its log volumes (see
//! [`MeasurementBranch`]).

mod config;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub use config::CountingConfig;

use crate::error::Result;
use crate::growth::{GrowthConfig, LogisticCurve};
use crate::inference::{self, LogDensity, Posterior, SamplerConfig, SamplerRng, VariableId};
use crate::measurement::{expected_visible_count, MeasurementBranch};
use crate::priors::Prior;

/// What drives the concentration seen by each branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConcentrationModel {
    /// One concentration shared by the single branch
    Static {
        /// Prior over the concentration
        prior: Prior,
    },
    /// Logistic growth evaluated at each branch's observation time
    Growth {
        /// Observation times (hours since inoculation)
        hours: Vec<f64>,
        /// Priors over `(K, P0, r, Δt)`
        priors: [Prior; 4],
    },
}

impl ConcentrationModel {
    fn n_params(&self) -> usize {
        match self {
            Self::Static { .. } => 1,
            Self::Growth { .. } => 4,
        }
    }
}

/// Joint model over concentration, dilution volumes and chamber volumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountingModel {
    concentration: ConcentrationModel,
    branches: Vec<MeasurementBranch>,
    offsets: Vec<usize>,
    dim: usize,
}

impl CountingModel {
    fn assemble(concentration: ConcentrationModel, branches: Vec<MeasurementBranch>) -> Self {
        let mut offsets = Vec::with_capacity(branches.len());
        let mut next = concentration.n_params();
        for branch in &branches {
            offsets.push(next);
            next += branch.n_params();
        }
        Self {
            concentration,
            branches,
            offsets,
            dim: next,
        }
    }

    /// Static model for one count.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid settings, or
    /// [`crate::HemocountError::ModelInconsistency`] when the count is
    /// implausible under the prior range.
    pub fn from_config(config: &CountingConfig) -> Result<Self> {
        config.validate()?;
        let prior = config.concentration_prior()?;
        let branch = config.branch()?;
        branch.check_consistency(prior.plausible_upper())?;
        warn_if_empty(&branch, 0);
        Ok(Self::assemble(
            ConcentrationModel::Static { prior },
            vec![branch],
        ))
    }

    /// Growth-curve model with one branch per observation time.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid settings, or
    /// [`crate::HemocountError::ModelInconsistency`] when a count is
    /// implausible under the growth priors.
    pub fn growth(config: &GrowthConfig) -> Result<Self> {
        let branches = config.branches()?;
        let priors = config.priors.priors()?;
        let upper = config.priors.plausible_max_concentration()?;
        for (i, branch) in branches.iter().enumerate() {
            branch.check_consistency(upper)?;
            warn_if_empty(branch, i);
        }
        Ok(Self::assemble(
            ConcentrationModel::Growth {
                hours: config.hours_since_inoculation.clone(),
                priors,
            },
            branches,
        ))
    }

    /// Concentration model.
    #[must_use]
    pub fn concentration_model(&self) -> &ConcentrationModel {
        &self.concentration
    }

    /// Measurement branches in observation order.
    #[must_use]
    pub fn branches(&self) -> &[MeasurementBranch] {
        &self.branches
    }

    /// Whether the concentration follows a growth curve.
    #[must_use]
    pub fn is_growth(&self) -> bool {
        matches!(self.concentration, ConcentrationModel::Growth { .. })
    }

    /// Observation times of the growth model.
    #[must_use]
    pub fn observation_times(&self) -> Option<&[f64]> {
        match &self.concentration {
            ConcentrationModel::Growth { hours, .. } => Some(hours),
            ConcentrationModel::Static { .. } => None,
        }
    }

    fn block<'a>(&self, theta: &'a [f64], i: usize) -> &'a [f64] {
        let start = self.offsets[i];
        &theta[start..start + self.branches[i].n_params()]
    }

    /// Growth curve encoded by `theta`, if this is a growth model.
    #[must_use]
    pub fn curve(&self, theta: &[f64]) -> Option<LogisticCurve> {
        match &self.concentration {
            ConcentrationModel::Growth { priors, .. } => Some(LogisticCurve {
                carrying_capacity: priors[0].constrain(theta[0]),
                baseline: priors[1].constrain(theta[1]),
                rate: priors[2].constrain(theta[2]),
                lag: priors[3].constrain(theta[3]),
            }),
            ConcentrationModel::Static { .. } => None,
        }
    }

    /// Concentration seen by each branch at `theta` (billions/mL).
    #[must_use]
    pub fn concentrations(&self, theta: &[f64]) -> Vec<f64> {
        match &self.concentration {
            ConcentrationModel::Static { prior } => vec![prior.constrain(theta[0])],
            ConcentrationModel::Growth { hours, .. } => self
                .curve(theta)
                .map(|curve| curve.evaluate_many(hours))
                .unwrap_or_default(),
        }
    }

    /// Simulate the counted cells of every branch at a fixed concentration.
    ///
    /// Dilution and chamber volumes are drawn from their priors, so repeated
    /// calls show the full measurement noise.
    pub fn simulate_counts(&self, rng: &mut SamplerRng, concentration: f64) -> Vec<u64> {
        self.branches
            .iter()
            .map(|b| b.simulate(rng, concentration).counted)
            .collect()
    }

    /// Simulate the counted cells of every branch along a growth curve.
    ///
    /// `None` for the static model, which has no observation times.
    pub fn simulate_curve_counts(
        &self,
        rng: &mut SamplerRng,
        curve: &LogisticCurve,
    ) -> Option<Vec<u64>> {
        let hours = self.observation_times()?;
        Some(
            self.branches
                .iter()
                .zip(hours)
                .map(|(b, &t)| b.simulate(rng, curve.evaluate(t)).counted)
                .collect(),
        )
    }

    /// Draw from the posterior.
    ///
    /// # Errors
    ///
    /// See [`inference::sample`].
    pub fn sample(&self, config: &SamplerConfig) -> Result<Posterior> {
        inference::sample(self, config)
    }
}

fn warn_if_empty(branch: &MeasurementBranch, index: usize) {
    if branch.observation().cells_counted() == 0 {
        warn!(
            branch = index,
            squares = branch.observation().squares_counted(),
            "no cells counted; the posterior will mostly reflect the prior's lower region"
        );
    }
}

impl LogDensity for CountingModel {
    fn dim(&self) -> usize {
        self.dim
    }

    fn log_density_gradient(&self, theta: &[f64]) -> Option<(f64, Vec<f64>)> {
        let mut grad = vec![0.0; self.dim];
        let mut lp = 0.0;
        match &self.concentration {
            ConcentrationModel::Static { prior } => {
                let z = theta[0];
                let (lp_prior, g_prior) = prior.log_density(z);
                let c = prior.constrain(z);
                let start = self.offsets[0];
                let (lp_branch, dc) =
                    self.branches[0].log_density(self.block(theta, 0), c, &mut grad[start..])?;
                lp += lp_prior + lp_branch;
                grad[0] += g_prior + dc * prior.dconstrain(z);
            }
            ConcentrationModel::Growth { hours, priors } => {
                for (k, prior) in priors.iter().enumerate() {
                    let (lp_prior, g_prior) = prior.log_density(theta[k]);
                    lp += lp_prior;
                    grad[k] += g_prior;
                }
                let curve = self.curve(theta)?;
                let dr = priors[2].dconstrain(theta[2]);
                let dlag = priors[3].dconstrain(theta[3]);
                for (i, (branch, &t)) in self.branches.iter().zip(hours).enumerate() {
                    let start = self.offsets[i];
                    let end = start + branch.n_params();
                    let (lp_branch, dc) = branch.log_density(
                        &theta[start..end],
                        curve.evaluate(t),
                        &mut grad[start..end],
                    )?;
                    lp += lp_branch;
                    let [g_k, g_p0, g_r, g_lag] = curve.gradient(t);
                    grad[0] += dc * g_k;
                    grad[1] += dc * g_p0;
                    grad[2] += dc * g_r * dr;
                    grad[3] += dc * g_lag * dlag;
                }
            }
        }
        lp.is_finite().then_some((lp, grad))
    }

    fn initial_point(&self) -> Vec<f64> {
        let mut theta = match &self.concentration {
            ConcentrationModel::Static { prior } => vec![prior.center()],
            ConcentrationModel::Growth { priors, .. } => priors.iter().map(Prior::center).collect(),
        };
        for branch in &self.branches {
            theta.extend(branch.centers());
        }
        theta
    }

    fn scales(&self) -> Vec<f64> {
        let mut scales = match &self.concentration {
            ConcentrationModel::Static { prior } => vec![prior.scale()],
            ConcentrationModel::Growth { priors, .. } => priors.iter().map(Prior::scale).collect(),
        };
        for branch in &self.branches {
            scales.extend(branch.scales());
        }
        scales
    }

    fn variables(&self) -> Vec<VariableId> {
        let mut vars = match self.concentration {
            ConcentrationModel::Static { .. } => vec![VariableId::Concentration],
            ConcentrationModel::Growth { .. } => vec![
                VariableId::CarryingCapacity,
                VariableId::Baseline,
                VariableId::GrowthRate,
                VariableId::LagOffset,
            ],
        };
        let growth = self.is_growth();
        for (branch, b) in self.branches.iter().enumerate() {
            if growth {
                vars.push(VariableId::ConcentrationAt { branch });
            }
            for step in 0..b.dilution().len() {
                vars.push(VariableId::SlurryVolume { branch, step });
                vars.push(VariableId::ShakerVolume { branch, step });
            }
            vars.push(VariableId::DilutionFactor { branch });
            vars.push(VariableId::ChamberVolume { branch });
            vars.push(VariableId::VisibleCells { branch });
        }
        vars
    }

    fn record(&self, theta: &[f64], rng: &mut SamplerRng) -> Vec<f64> {
        let mut row = match (&self.concentration, self.curve(theta)) {
            (ConcentrationModel::Static { prior }, _) => vec![prior.constrain(theta[0])],
            (ConcentrationModel::Growth { .. }, Some(curve)) => vec![
                curve.carrying_capacity,
                curve.baseline,
                curve.rate,
                curve.lag,
            ],
            (ConcentrationModel::Growth { .. }, None) => Vec::new(),
        };
        let concentrations = self.concentrations(theta);
        let growth = self.is_growth();
        for (i, (branch, &c)) in self.branches.iter().zip(&concentrations).enumerate() {
            let state = branch.realize(self.block(theta, i));
            if growth {
                row.push(c);
            }
            for draw in &state.draws {
                row.push(draw.slurry_ml);
                row.push(draw.shaker_ml);
            }
            row.push(state.dilution_factor);
            row.push(state.chamber_ml);
            let mean = expected_visible_count(c, state.dilution_factor, state.chamber_ml);
            row.push(branch.draw_visible(rng, mean) as f64);
        }
        row
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
