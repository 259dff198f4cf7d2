//! Convergence diagnostics for multi-chain MCMC output.
//!
//! Split R-hat and the multi-chain effective sample size follow
//! Gelman et al. (2013), "Bayesian Data Analysis", Ch. 11, with Geyer's
//! initial monotone sequence truncating the autocorrelation sum.

use std::fmt;

use serde::Serialize;
use tracing::warn;

use super::trace::{Trace, VariableId};

/// R-hat above this suggests the chains have not mixed.
pub const R_HAT_THRESHOLD: f64 = 1.05;

/// Effective sample sizes below this give noisy summaries.
pub const MIN_EFFECTIVE_SAMPLE_SIZE: f64 = 100.0;

/// Acceptance further than this below the target is reported.
pub const ACCEPTANCE_SLACK: f64 = 0.15;

/// Per-chain sampler statistics over the kept draws.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainStats {
    /// Chain index
    pub chain: usize,
    /// Seed the chain's generator was started from
    pub seed: u64,
    /// Mean Metropolis acceptance probability
    pub acceptance_rate: f64,
    /// Divergent transitions after warmup
    pub divergences: usize,
    /// Adapted leapfrog step size
    pub step_size: f64,
    /// Kept draws
    pub n_draws: usize,
}

/// A problem with the run worth telling the user about.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum QualityWarning {
    /// The chain hit divergent transitions
    Divergences {
        /// Chain index
        chain: usize,
        /// Number of divergent transitions
        count: usize,
    },
    /// Acceptance far below the target
    LowAcceptance {
        /// Chain index
        chain: usize,
        /// Observed mean acceptance
        rate: f64,
        /// Requested acceptance
        target: f64,
    },
    /// Chains disagree about a variable
    HighRhat {
        /// Affected variable
        variable: VariableId,
        /// Split R-hat
        r_hat: f64,
    },
    /// Too few effective draws of a variable
    LowEffectiveSampleSize {
        /// Affected variable
        variable: VariableId,
        /// Effective sample size
        ess: f64,
    },
}

impl fmt::Display for QualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Divergences { chain, count } => {
                write!(f, "chain {chain}: {count} divergent transitions after tuning")
            }
            Self::LowAcceptance {
                chain,
                rate,
                target,
            } => write!(
                f,
                "chain {chain}: acceptance rate {rate:.3} is well below the target {target:.3}"
            ),
            Self::HighRhat { variable, r_hat } => {
                write!(f, "{variable}: R-hat {r_hat:.3} > {R_HAT_THRESHOLD}")
            }
            Self::LowEffectiveSampleSize { variable, ess } => write!(
                f,
                "{variable}: effective sample size {ess:.0} < {MIN_EFFECTIVE_SAMPLE_SIZE}"
            ),
        }
    }
}

/// R-hat and ESS of one variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VariableDiagnostics {
    /// The variable
    pub variable: VariableId,
    /// Split R-hat (NaN for constant draws)
    pub r_hat: f64,
    /// Effective sample size (NaN for constant draws)
    pub ess: f64,
}

/// Sampler statistics, per-variable convergence and warnings of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    /// Per-chain statistics
    pub chains: Vec<ChainStats>,
    /// Per-variable R-hat and ESS
    pub variables: Vec<VariableDiagnostics>,
    /// Problems found
    pub warnings: Vec<QualityWarning>,
}

impl Diagnostics {
    /// Compute diagnostics for a finished run and log every warning.
    #[must_use]
    pub fn assess(chains: Vec<ChainStats>, trace: &Trace, target_accept: f64) -> Self {
        let mut warnings = Vec::new();
        for stats in &chains {
            if stats.divergences > 0 {
                warnings.push(QualityWarning::Divergences {
                    chain: stats.chain,
                    count: stats.divergences,
                });
            }
            if stats.acceptance_rate < target_accept - ACCEPTANCE_SLACK {
                warnings.push(QualityWarning::LowAcceptance {
                    chain: stats.chain,
                    rate: stats.acceptance_rate,
                    target: target_accept,
                });
            }
        }

        let variables: Vec<VariableDiagnostics> = trace
            .iter()
            .map(|(variable, draws)| VariableDiagnostics {
                variable,
                r_hat: split_r_hat(draws),
                ess: effective_sample_size(draws),
            })
            .collect();

        for v in &variables {
            // NaN (constant draws) compares false and is skipped
            if v.r_hat > R_HAT_THRESHOLD {
                warnings.push(QualityWarning::HighRhat {
                    variable: v.variable,
                    r_hat: v.r_hat,
                });
            }
            if v.ess < MIN_EFFECTIVE_SAMPLE_SIZE {
                warnings.push(QualityWarning::LowEffectiveSampleSize {
                    variable: v.variable,
                    ess: v.ess,
                });
            }
        }

        for w in &warnings {
            warn!("{w}");
        }

        Self {
            chains,
            variables,
            warnings,
        }
    }

    /// Divergent transitions summed over chains.
    #[must_use]
    pub fn total_divergences(&self) -> usize {
        self.chains.iter().map(|c| c.divergences).sum()
    }

    /// Acceptance rate averaged over chains.
    #[must_use]
    pub fn mean_acceptance(&self) -> f64 {
        if self.chains.is_empty() {
            return 0.0;
        }
        self.chains.iter().map(|c| c.acceptance_rate).sum::<f64>() / self.chains.len() as f64
    }

    /// No warnings were raised.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Split R-hat of a variable.
    #[must_use]
    pub fn r_hat(&self, id: VariableId) -> Option<f64> {
        self.find(id).map(|v| v.r_hat)
    }

    /// Effective sample size of a variable.
    #[must_use]
    pub fn ess(&self, id: VariableId) -> Option<f64> {
        self.find(id).map(|v| v.ess)
    }

    fn find(&self, id: VariableId) -> Option<&VariableDiagnostics> {
        self.variables.iter().find(|v| v.variable == id)
    }
}

/// Mean and unbiased variance.
fn mean_var(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0).max(1.0);
    (mean, var)
}

/// Halve every chain, dropping the middle draw of odd-length chains.
fn split_chains(chains: &[Vec<f64>]) -> Vec<&[f64]> {
    let n = chains.iter().map(Vec::len).min().unwrap_or(0);
    let half = n / 2;
    if half == 0 {
        return Vec::new();
    }
    chains
        .iter()
        .flat_map(|c| [&c[..half], &c[n - half..n]])
        .collect()
}

/// Within-chain variance and the pooled variance estimate `var⁺`.
fn variance_components(splits: &[&[f64]]) -> (f64, f64) {
    let n = splits[0].len() as f64;
    let stats: Vec<(f64, f64)> = splits.iter().map(|s| mean_var(s)).collect();
    let within = stats.iter().map(|s| s.1).sum::<f64>() / stats.len() as f64;
    let between_over_n = if stats.len() > 1 {
        let means: Vec<f64> = stats.iter().map(|s| s.0).collect();
        mean_var(&means).1
    } else {
        0.0
    };
    (within, within * (n - 1.0) / n + between_over_n)
}

/// Split R-hat of per-chain draws.
///
/// Returns NaN when there are fewer than two draws per half-chain or the
/// draws are constant, and infinity when every chain is constant at a
/// different value.
#[must_use]
pub fn split_r_hat(chains: &[Vec<f64>]) -> f64 {
    let splits = split_chains(chains);
    if splits.is_empty() || splits[0].len() < 2 {
        return f64::NAN;
    }
    let (within, var_plus) = variance_components(&splits);
    if within <= f64::EPSILON * var_plus.abs().max(f64::MIN_POSITIVE) {
        return if var_plus > 0.0 { f64::INFINITY } else { f64::NAN };
    }
    (var_plus / within).sqrt()
}

/// Autocovariance at `lag` with the biased `1/n` normalization.
#[must_use]
pub fn autocovariance(values: &[f64], lag: usize) -> f64 {
    let n = values.len();
    if lag >= n {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    values[..n - lag]
        .iter()
        .zip(values[lag..].iter())
        .map(|(x, y)| (x - mean) * (y - mean))
        .sum::<f64>()
        / n as f64
}

/// Multi-chain effective sample size.
///
/// Combines the chains' autocovariances with the between-chain variance and
/// sums autocorrelation pairs while they stay positive, forcing the pairs to
/// decrease. NaN for constant draws.
#[must_use]
pub fn effective_sample_size(chains: &[Vec<f64>]) -> f64 {
    let splits = split_chains(chains);
    if splits.is_empty() {
        return 0.0;
    }
    let m = splits.len();
    let n = splits[0].len();
    let total = (m * n) as f64;
    if n < 4 {
        return total;
    }
    let (within, var_plus) = variance_components(&splits);
    if !(var_plus > 0.0) || within <= f64::EPSILON * var_plus {
        return f64::NAN;
    }

    let rho = |lag: usize| -> f64 {
        if lag == 0 {
            return 1.0;
        }
        let mean_acov = splits.iter().map(|s| autocovariance(s, lag)).sum::<f64>() / m as f64;
        1.0 - (within - mean_acov) / var_plus
    };

    let mut sum_pairs = 0.0;
    let mut previous = f64::INFINITY;
    let mut lag = 0;
    while lag + 1 < n {
        let pair = rho(lag) + rho(lag + 1);
        if pair <= 0.0 {
            break;
        }
        let pair = pair.min(previous);
        sum_pairs += pair;
        previous = pair;
        lag += 2;
    }

    let tau = (2.0 * sum_pairs - 1.0).max(1.0 / total.log10());
    total / tau
}

/// Monte Carlo standard error of the mean.
#[must_use]
pub fn mcse(sd: f64, ess: f64) -> f64 {
    if ess > 0.0 {
        sd / ess.sqrt()
    } else {
        f64::INFINITY
    }
}

#[cfg(test)]
#[path = "diagnostics_tests.rs"]
mod tests;
