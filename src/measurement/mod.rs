//! Hemocytometer measurement model.
//!
//! After dilution the sample is loaded into a counting chamber of volume
//! `V` (depth × grid area). The number of cells physically present in the
//! chamber is
//!
//! ```text
//! visible ~ Poisson(c × BILLION × d × V)
//! ```
//!
//! where `c` is the slurry concentration in billions of cells per mL and `d`
//! the chained dilution factor. Strictly, `visible` is a Binomial thinning of
//! the cells in the whole shaker with an enormous number of trials and a tiny
//! success probability; the Poisson is its limiting form.
//!
//! The experimenter counts only `squares_counted` of the grid's
//! [`TOTAL_SQUARES`] squares, which thins `visible` once more:
//!
//! ```text
//! counted ~ Binomial(visible, squares_counted / TOTAL_SQUARES)
//! ```
//!
//! `counted` is the only observed quantity in the model.

use serde::{Deserialize, Serialize};
use statrs::function::factorial::{ln_binomial, ln_factorial};

use crate::dilution::{DilutionSeries, StepDraw};
use crate::error::{HemocountError, Result};
use crate::inference::SamplerRng;
use crate::priors::{ln_sigmoid, sigmoid, Prior};

/// Squares on the hemocytometer's counting grid.
pub const TOTAL_SQUARES: u32 = 25;

/// Concentrations are expressed in billions of cells per mL.
pub const BILLION: f64 = 1e9;

/// Area of the 5×5 counting grid (1 mm × 1 mm) in cm².
pub const GRID_AREA_CM2: f64 = 0.1 * 0.1;

/// Manufacturer tolerance on the chamber depth (cm).
pub const DEPTH_TOLERANCE_CM: f64 = 0.0004;

/// Expected number of cells in the chamber.
///
/// `concentration` is in billions of cells per mL and `chamber_ml` in mL;
/// this is the one place the [`BILLION`] scale is applied.
///
/// # Example
///
/// ```
/// use hemocount::measurement::expected_visible_count;
///
/// // 0.001 billion/mL undiluted in a 1e-4 mL chamber
/// let mean = expected_visible_count(0.001, 1.0, 1e-4);
/// assert!((mean - 100.0).abs() < 1e-9);
/// ```
#[must_use]
pub fn expected_visible_count(concentration: f64, dilution_factor: f64, chamber_ml: f64) -> f64 {
    concentration * BILLION * dilution_factor * chamber_ml
}

/// Prior over the chamber volume for a given nominal depth.
///
/// Gamma with mean `depth × GRID_AREA_CM2` and standard deviation
/// `2 × DEPTH_TOLERANCE_CM × GRID_AREA_CM2` (the manufacturer's tolerance,
/// doubled).
///
/// # Errors
///
/// Returns error if `depth_cm` is not positive.
pub fn chamber_volume_prior(depth_cm: f64) -> Result<Prior> {
    if !(depth_cm.is_finite() && depth_cm > 0.0) {
        return Err(HemocountError::invalid("depth_of_chamber", depth_cm, "> 0"));
    }
    Prior::gamma_from_mean_sd(
        depth_cm * GRID_AREA_CM2,
        2.0 * DEPTH_TOLERANCE_CM * GRID_AREA_CM2,
    )
}

/// One manual count: how many squares were counted and how many cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountObservation {
    squares_counted: u32,
    cells_counted: u64,
}

impl CountObservation {
    /// Create an observation.
    ///
    /// # Errors
    ///
    /// Returns error unless `1 <= squares_counted <= TOTAL_SQUARES`.
    pub fn new(squares_counted: u32, cells_counted: u64) -> Result<Self> {
        if squares_counted == 0 || squares_counted > TOTAL_SQUARES {
            return Err(HemocountError::invalid(
                "squares_counted",
                squares_counted,
                "in 1..=25",
            ));
        }
        Ok(Self {
            squares_counted,
            cells_counted,
        })
    }

    /// Squares counted.
    #[must_use]
    pub fn squares_counted(&self) -> u32 {
        self.squares_counted
    }

    /// Cells counted in those squares.
    #[must_use]
    pub fn cells_counted(&self) -> u64 {
        self.cells_counted
    }

    /// Probability that a visible cell lands in a counted square, in (0, 1].
    #[must_use]
    pub fn success_probability(&self) -> f64 {
        f64::from(self.squares_counted) / f64::from(TOTAL_SQUARES)
    }
}

/// One synthetic pass through the generative chain.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedCount {
    /// Realized dilution volumes
    pub draws: Vec<StepDraw>,
    /// Chained dilution factor
    pub dilution_factor: f64,
    /// Realized chamber volume (mL)
    pub chamber_ml: f64,
    /// Poisson mean of the visible cells
    pub expected_visible: f64,
    /// Cells in the whole chamber
    pub visible: u64,
    /// Cells in the counted squares
    pub counted: u64,
}

/// Constrained values of one branch's continuous parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchState {
    /// Realized dilution volumes
    pub draws: Vec<StepDraw>,
    /// Chained dilution factor
    pub dilution_factor: f64,
    /// Chamber volume (mL)
    pub chamber_ml: f64,
}

/// Dilution chain, chamber and count for one sample.
///
/// The static model has exactly one branch; the growth model has one per
/// observation time. Branches share nothing but the concentration they are
/// handed.
///
/// A branch owns `2 × steps + 1` unconstrained parameters laid out as
/// `[slurry_0, shaker_0, slurry_1, shaker_1, ..., chamber]`, all on the
/// log scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementBranch {
    dilution: DilutionSeries,
    chamber: Prior,
    observation: CountObservation,
}

impl MeasurementBranch {
    /// Create a branch.
    ///
    /// # Errors
    ///
    /// Returns error if `depth_cm` is not positive.
    pub fn new(
        dilution: DilutionSeries,
        depth_cm: f64,
        observation: CountObservation,
    ) -> Result<Self> {
        Ok(Self {
            dilution,
            chamber: chamber_volume_prior(depth_cm)?,
            observation,
        })
    }

    /// Dilution steps applied before counting.
    #[must_use]
    pub fn dilution(&self) -> &DilutionSeries {
        &self.dilution
    }

    /// Prior over the chamber volume.
    #[must_use]
    pub fn chamber_prior(&self) -> Prior {
        self.chamber
    }

    /// The observed count.
    #[must_use]
    pub fn observation(&self) -> CountObservation {
        self.observation
    }

    /// Number of unconstrained parameters this branch owns.
    #[must_use]
    pub fn n_params(&self) -> usize {
        2 * self.dilution.len() + 1
    }

    /// Prior centers of this branch's parameters.
    #[must_use]
    pub fn centers(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.n_params());
        for step in self.dilution.steps() {
            out.push(step.slurry_prior().center());
            out.push(step.shaker_prior().center());
        }
        out.push(self.chamber.center());
        out
    }

    /// Unconstrained prior scales of this branch's parameters.
    #[must_use]
    pub fn scales(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.n_params());
        for step in self.dilution.steps() {
            out.push(step.slurry_prior().scale());
            out.push(step.shaker_prior().scale());
        }
        out.push(self.chamber.scale());
        out
    }

    /// Constrained dilution and chamber values for a parameter block.
    #[must_use]
    pub fn realize(&self, block: &[f64]) -> BranchState {
        let draws: Vec<StepDraw> = self
            .dilution
            .steps()
            .iter()
            .enumerate()
            .map(|(i, step)| StepDraw {
                slurry_ml: step.slurry_prior().constrain(block[2 * i]),
                shaker_ml: step.shaker_prior().constrain(block[2 * i + 1]),
            })
            .collect();
        BranchState {
            dilution_factor: DilutionSeries::factor(&draws),
            chamber_ml: self.chamber.constrain(block[2 * self.dilution.len()]),
            draws,
        }
    }

    /// Poisson mean of the visible cells for a parameter block.
    #[must_use]
    pub fn visible_mean(&self, block: &[f64], concentration: f64) -> f64 {
        let state = self.realize(block);
        expected_visible_count(concentration, state.dilution_factor, state.chamber_ml)
    }

    /// Log density of the branch given the concentration.
    ///
    /// Adds the volume and chamber priors plus the marginal likelihood of
    /// the count to the returned value and their derivatives to `grad`.
    /// Summing the Poisson/Binomial pair over the unobserved visible count
    /// leaves `counted ~ Poisson(p × mean)`, so the sampler never has to
    /// move the discrete count; it is drawn afterwards with
    /// [`MeasurementBranch::draw_visible`]. The second element is the
    /// derivative with respect to `concentration`.
    ///
    /// Returns `None` when `concentration` is not strictly positive.
    pub(crate) fn log_density(
        &self,
        block: &[f64],
        concentration: f64,
        grad: &mut [f64],
    ) -> Option<(f64, f64)> {
        if !(concentration.is_finite() && concentration > 0.0) {
            return None;
        }
        let n_steps = self.dilution.len();
        let mut lp = 0.0;
        let mut ln_factor = 0.0;
        for (i, step) in self.dilution.steps().iter().enumerate() {
            let (a, b) = (block[2 * i], block[2 * i + 1]);
            let (lp_slurry, g_slurry) = step.slurry_prior().log_density(a);
            let (lp_shaker, g_shaker) = step.shaker_prior().log_density(b);
            lp += lp_slurry + lp_shaker;
            grad[2 * i] += g_slurry;
            grad[2 * i + 1] += g_shaker;
            // ln(s / (s + w)) with s = e^a, w = e^b
            ln_factor += ln_sigmoid(a - b);
        }
        let u = block[2 * n_steps];
        let (lp_chamber, g_chamber) = self.chamber.log_density(u);
        lp += lp_chamber;
        grad[2 * n_steps] += g_chamber;

        let p = self.observation.success_probability();
        let ln_rate = p.ln() + BILLION.ln() + concentration.ln() + ln_factor + u;
        let rate = ln_rate.exp();
        let counted = self.observation.cells_counted;
        lp += counted as f64 * ln_rate - rate - ln_factorial(counted);

        // d lp / d ln(rate)
        let g = counted as f64 - rate;
        for i in 0..n_steps {
            let medium_fraction = sigmoid(block[2 * i + 1] - block[2 * i]);
            grad[2 * i] += g * medium_fraction;
            grad[2 * i + 1] -= g * medium_fraction;
        }
        grad[2 * n_steps] += g;

        if lp.is_finite() {
            Some((lp, g / concentration))
        } else {
            None
        }
    }

    /// `ln P(visible, counted | mean)` for the Poisson/Binomial pair.
    #[must_use]
    pub fn log_likelihood(&self, visible: u64, mean: f64) -> f64 {
        let counted = self.observation.cells_counted;
        if visible < counted || !(mean > 0.0) {
            return f64::NEG_INFINITY;
        }
        let n = visible as f64;
        let poisson = n * mean.ln() - mean - ln_factorial(visible);
        let p = self.observation.success_probability();
        let misses = (visible - counted) as f64;
        let binomial = if p >= 1.0 {
            if visible == counted {
                0.0
            } else {
                f64::NEG_INFINITY
            }
        } else {
            ln_binomial(visible, counted) + counted as f64 * p.ln() + misses * (1.0 - p).ln()
        };
        poisson + binomial
    }

    /// Draw the visible count from its conditional given the observation.
    ///
    /// Thinning a Poisson(mean) by `p` leaves the unseen cells independent
    /// Poisson(mean × (1 − p)), so `visible = counted + unseen`.
    pub fn draw_visible(&self, rng: &mut SamplerRng, mean: f64) -> u64 {
        let p = self.observation.success_probability();
        self.observation.cells_counted + rng.poisson(mean * (1.0 - p))
    }

    /// Run the generative chain forward for a known concentration.
    pub fn simulate(&self, rng: &mut SamplerRng, concentration: f64) -> SimulatedCount {
        let draws = self.dilution.sample_draws(rng);
        let dilution_factor = DilutionSeries::factor(&draws);
        let chamber_ml = self.chamber.sample(rng);
        let expected_visible = expected_visible_count(concentration, dilution_factor, chamber_ml);
        let visible = rng.poisson(expected_visible);
        let counted = rng.binomial(visible, self.observation.success_probability());
        SimulatedCount {
            draws,
            dilution_factor,
            chamber_ml,
            expected_visible,
            visible,
            counted,
        }
    }

    /// Reject observations no plausible visible count could produce.
    ///
    /// # Errors
    ///
    /// Returns [`HemocountError::ModelInconsistency`] when the count exceeds
    /// the Poisson tail of the largest plausible expected count.
    pub fn check_consistency(&self, concentration_upper: f64) -> Result<()> {
        let max_factor = self.dilution.max_plausible_factor();
        let max_chamber = self.chamber.plausible_upper();
        let max_mean =
            expected_visible_count(concentration_upper.max(0.0), max_factor, max_chamber)
                * self.observation.success_probability();
        let ceiling = max_mean + 10.0 * max_mean.sqrt() + 10.0;
        let counted = self.observation.cells_counted;
        if counted as f64 > ceiling {
            return Err(HemocountError::ModelInconsistency {
                message: format!(
                    "{counted} cells counted in {} of {TOTAL_SQUARES} squares, \
                     but at most ~{ceiling:.0} are plausible with \
                     concentration <= {concentration_upper} billion/mL, \
                     dilution factor <= {max_factor:.3e} and \
                     chamber volume <= {max_chamber:.3e} mL",
                    self.observation.squares_counted,
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "measurement_tests.rs"]
mod tests;
