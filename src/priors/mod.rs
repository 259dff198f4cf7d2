//! Prior distributions over the model's continuous latent quantities.
//!
//! The sampler works on an unconstrained real vector. Every prior knows how
//! to map its coordinate between the unconstrained line and its support:
//!
//! | Prior            | Support   | Transform          |
//! |------------------|-----------|--------------------|
//! | `Uniform`        | (a, b)    | scaled logistic    |
//! | `Normal`         | ℝ         | identity           |
//! | `PositiveNormal` | (0, ∞)    | exp                |
//! | `Gamma`          | (0, ∞)    | exp                |
//! | `Exponential`    | (0, ∞)    | exp                |
//!
//! [`Prior::log_density`] returns the log density of the transformed
//! coordinate, i.e. the prior log density plus the log-Jacobian of the
//! transform, together with its derivative.

use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;
use statrs::function::gamma::ln_gamma;
use std::f64::consts::{PI, SQRT_2};

use crate::error::{HemocountError, Result};
use crate::inference::SamplerRng;

/// Number of standard deviations treated as the edge of plausible prior mass.
pub const PLAUSIBLE_SDS: f64 = 6.0;

/// A univariate prior with a fixed unconstraining transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Prior {
    /// Uniform on `(lower, upper)`.
    Uniform {
        /// Lower bound
        lower: f64,
        /// Upper bound
        upper: f64,
    },
    /// Normal on the whole real line.
    Normal {
        /// Mean
        mean: f64,
        /// Standard deviation
        sd: f64,
    },
    /// Normal truncated to positive values.
    PositiveNormal {
        /// Location of the untruncated normal
        mean: f64,
        /// Scale of the untruncated normal
        sd: f64,
    },
    /// Gamma with shape/rate parameterization.
    Gamma {
        /// Shape k
        shape: f64,
        /// Rate β
        rate: f64,
    },
    /// Exponential with rate λ.
    Exponential {
        /// Rate λ
        rate: f64,
    },
}

fn require(param: &str, value: f64, ok: bool, constraint: &str) -> Result<()> {
    if ok && value.is_finite() {
        Ok(())
    } else {
        Err(HemocountError::invalid(param, value, constraint))
    }
}

impl Prior {
    /// Uniform prior on `(lower, upper)`.
    ///
    /// # Errors
    ///
    /// Returns error unless both bounds are finite and `lower < upper`.
    pub fn uniform(lower: f64, upper: f64) -> Result<Self> {
        require("lower", lower, true, "finite")?;
        require("upper", upper, upper > lower, "> lower")?;
        Ok(Self::Uniform { lower, upper })
    }

    /// Normal prior.
    ///
    /// # Errors
    ///
    /// Returns error if `sd` is not positive.
    pub fn normal(mean: f64, sd: f64) -> Result<Self> {
        require("mean", mean, true, "finite")?;
        require("sd", sd, sd > 0.0, "> 0")?;
        Ok(Self::Normal { mean, sd })
    }

    /// Normal prior truncated to `(0, ∞)`.
    ///
    /// # Errors
    ///
    /// Returns error unless `mean > 0` and `sd > 0`.
    pub fn positive_normal(mean: f64, sd: f64) -> Result<Self> {
        require("mean", mean, mean > 0.0, "> 0")?;
        require("sd", sd, sd > 0.0, "> 0")?;
        Ok(Self::PositiveNormal { mean, sd })
    }

    /// Gamma prior matched to a mean and standard deviation.
    ///
    /// shape = (μ/σ)², rate = μ/σ².
    ///
    /// # Errors
    ///
    /// Returns error unless both moments are positive.
    pub fn gamma_from_mean_sd(mean: f64, sd: f64) -> Result<Self> {
        require("mean", mean, mean > 0.0, "> 0")?;
        require("sd", sd, sd > 0.0, "> 0")?;
        Ok(Self::Gamma {
            shape: (mean / sd).powi(2),
            rate: mean / (sd * sd),
        })
    }

    /// Exponential prior with rate λ.
    ///
    /// # Errors
    ///
    /// Returns error if `rate` is not positive.
    pub fn exponential(rate: f64) -> Result<Self> {
        require("rate", rate, rate > 0.0, "> 0")?;
        Ok(Self::Exponential { rate })
    }

    /// Map an unconstrained coordinate onto the support.
    #[must_use]
    pub fn constrain(&self, z: f64) -> f64 {
        match *self {
            Self::Uniform { lower, upper } => lower + (upper - lower) * sigmoid(z),
            Self::Normal { .. } => z,
            Self::PositiveNormal { .. } | Self::Gamma { .. } | Self::Exponential { .. } => z.exp(),
        }
    }

    /// Map a value on the support to the unconstrained line.
    #[must_use]
    pub fn unconstrain(&self, x: f64) -> f64 {
        match *self {
            Self::Uniform { lower, upper } => {
                let width = upper - lower;
                let u = ((x - lower) / width).clamp(1e-12, 1.0 - 1e-12);
                (u / (1.0 - u)).ln()
            }
            Self::Normal { .. } => x,
            Self::PositiveNormal { .. } | Self::Gamma { .. } | Self::Exponential { .. } => {
                x.max(f64::MIN_POSITIVE).ln()
            }
        }
    }

    /// Derivative of [`Prior::constrain`] at `z`.
    #[must_use]
    pub fn dconstrain(&self, z: f64) -> f64 {
        match *self {
            Self::Uniform { lower, upper } => {
                let s = sigmoid(z);
                (upper - lower) * s * (1.0 - s)
            }
            Self::Normal { .. } => 1.0,
            Self::PositiveNormal { .. } | Self::Gamma { .. } | Self::Exponential { .. } => z.exp(),
        }
    }

    /// Log density of the unconstrained coordinate and its derivative.
    #[must_use]
    pub fn log_density(&self, z: f64) -> (f64, f64) {
        match *self {
            Self::Uniform { .. } => {
                let lp = ln_sigmoid(z) + ln_sigmoid(-z);
                (lp, 1.0 - 2.0 * sigmoid(z))
            }
            Self::Normal { mean, sd } => {
                let d = (z - mean) / sd;
                let lp = -0.5 * (2.0 * PI).ln() - sd.ln() - 0.5 * d * d;
                (lp, -d / sd)
            }
            Self::PositiveNormal { mean, sd } => {
                let x = z.exp();
                let d = (x - mean) / sd;
                // P(X > 0) for the untruncated normal
                let mass = 0.5 * erfc(-mean / (sd * SQRT_2));
                let lp = -0.5 * (2.0 * PI).ln() - sd.ln() - mass.ln() - 0.5 * d * d + z;
                (lp, -d * x / sd + 1.0)
            }
            Self::Gamma { shape, rate } => {
                let x = z.exp();
                let lp = shape * rate.ln() - ln_gamma(shape) + shape * z - rate * x;
                (lp, shape - rate * x)
            }
            Self::Exponential { rate } => {
                let x = z.exp();
                (rate.ln() - rate * x + z, 1.0 - rate * x)
            }
        }
    }

    /// Unconstrained coordinate of the prior's central value.
    #[must_use]
    pub fn center(&self) -> f64 {
        match *self {
            Self::Uniform { .. } => 0.0,
            Self::Normal { mean, .. } => mean,
            _ => self.mean().ln(),
        }
    }

    /// Typical spread of the prior on the unconstrained line.
    #[must_use]
    pub fn scale(&self) -> f64 {
        match *self {
            Self::Uniform { .. } | Self::Exponential { .. } => 1.0,
            Self::Normal { sd, .. } => sd,
            Self::PositiveNormal { mean, sd } => (sd / mean).min(1.0),
            Self::Gamma { shape, .. } => (1.0 / shape.sqrt()).min(1.0),
        }
    }

    /// Prior mean on the support.
    #[must_use]
    pub fn mean(&self) -> f64 {
        match *self {
            Self::Uniform { lower, upper } => 0.5 * (lower + upper),
            Self::Normal { mean, .. } | Self::PositiveNormal { mean, .. } => mean,
            Self::Gamma { shape, rate } => shape / rate,
            Self::Exponential { rate } => 1.0 / rate,
        }
    }

    /// Prior standard deviation on the support.
    #[must_use]
    pub fn sd(&self) -> f64 {
        match *self {
            Self::Uniform { lower, upper } => (upper - lower) / 12f64.sqrt(),
            Self::Normal { sd, .. } | Self::PositiveNormal { sd, .. } => sd,
            Self::Gamma { shape, rate } => shape.sqrt() / rate,
            Self::Exponential { rate } => 1.0 / rate,
        }
    }

    /// Largest value the prior gives non-negligible mass to.
    #[must_use]
    pub fn plausible_upper(&self) -> f64 {
        match *self {
            Self::Uniform { upper, .. } => upper,
            _ => self.mean() + PLAUSIBLE_SDS * self.sd(),
        }
    }

    /// Smallest value the prior gives non-negligible mass to.
    #[must_use]
    pub fn plausible_lower(&self) -> f64 {
        match *self {
            Self::Uniform { lower, .. } => lower,
            Self::Normal { mean, sd } => mean - PLAUSIBLE_SDS * sd,
            _ => (self.mean() - PLAUSIBLE_SDS * self.sd()).max(0.0),
        }
    }

    /// Draw a value on the support.
    pub fn sample(&self, rng: &mut SamplerRng) -> f64 {
        match *self {
            Self::Uniform { lower, upper } => rng.uniform_range(lower, upper),
            Self::Normal { mean, sd } => rng.normal(mean, sd),
            Self::PositiveNormal { mean, sd } => loop {
                let x = rng.normal(mean, sd);
                if x > 0.0 {
                    break x;
                }
            },
            Self::Gamma { shape, rate } => rng.gamma(shape, rate),
            Self::Exponential { rate } => rng.exponential(rate),
        }
    }
}

/// Logistic sigmoid, stable for large |z|.
#[must_use]
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `ln σ(z)` without overflow.
#[must_use]
pub fn ln_sigmoid(z: f64) -> f64 {
    -softplus(-z)
}

fn softplus(x: f64) -> f64 {
    if x > 0.0 {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}

#[cfg(test)]
#[path = "priors_tests.rs"]
mod tests;
