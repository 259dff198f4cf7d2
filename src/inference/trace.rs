//! Posterior draws keyed by model variable.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{HemocountError, Result};

/// Trace key of the slurry concentration (billions of cells per mL).
pub const CONCENTRATION_KEY: &str = "cells/mL";

/// A recorded model quantity.
///
/// Branch-indexed variables carry the index of the dilution chain they
/// belong to: `0` in the static model, one per observation time in the
/// growth model. `step` is the 0-based position in that chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VariableId {
    /// Static slurry concentration
    Concentration,
    /// Growth above baseline at saturation, K
    CarryingCapacity,
    /// Baseline concentration, P0
    Baseline,
    /// Growth rate, r
    GrowthRate,
    /// End of the lag phase, Δt
    LagOffset,
    /// Growth-curve concentration at one observation time
    ConcentrationAt {
        /// Observation index
        branch: usize,
    },
    /// Slurry volume transferred in one dilution step
    SlurryVolume {
        /// Dilution chain
        branch: usize,
        /// Step within the chain
        step: usize,
    },
    /// Shaker volume of one dilution step
    ShakerVolume {
        /// Dilution chain
        branch: usize,
        /// Step within the chain
        step: usize,
    },
    /// Chained dilution factor
    DilutionFactor {
        /// Dilution chain
        branch: usize,
    },
    /// Realized chamber volume
    ChamberVolume {
        /// Dilution chain
        branch: usize,
    },
    /// Cells in the whole counting chamber
    VisibleCells {
        /// Dilution chain
        branch: usize,
    },
}

impl VariableId {
    /// Whether the variable takes integer values.
    #[must_use]
    pub fn is_discrete(&self) -> bool {
        matches!(self, Self::VisibleCells { .. })
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concentration => f.write_str(CONCENTRATION_KEY),
            Self::CarryingCapacity => f.write_str("K"),
            Self::Baseline => f.write_str("P0"),
            Self::GrowthRate => f.write_str("r"),
            Self::LagOffset => f.write_str("delta_t"),
            Self::ConcentrationAt { branch } => write!(f, "{CONCENTRATION_KEY}[{branch}]"),
            Self::SlurryVolume { branch, step } => {
                write!(f, "slurry volume (mL)[{branch}, {step}]")
            }
            Self::ShakerVolume { branch, step } => {
                write!(f, "shaker volume (mL)[{branch}, {step}]")
            }
            Self::DilutionFactor { branch } => write!(f, "dilution factor[{branch}]"),
            Self::ChamberVolume { branch } => write!(f, "chamber volume (mL)[{branch}]"),
            Self::VisibleCells { branch } => write!(f, "cells in visible portion[{branch}]"),
        }
    }
}

/// Draws of every recorded variable, per chain.
///
/// Storage is `draws[variable][chain][draw]`; every chain holds the same
/// number of draws.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    variables: Vec<VariableId>,
    draws: Vec<Vec<Vec<f64>>>,
}

impl Trace {
    /// Build a trace from per-chain rows.
    ///
    /// `chains[chain][draw]` is one record, ordered like `variables`.
    ///
    /// # Errors
    ///
    /// Returns [`HemocountError::DimensionMismatch`] if a record has the
    /// wrong width or the chains differ in length.
    pub fn from_chains(variables: Vec<VariableId>, chains: Vec<Vec<Vec<f64>>>) -> Result<Self> {
        let n_draws = chains.first().map_or(0, Vec::len);
        let mut draws = vec![Vec::with_capacity(chains.len()); variables.len()];
        for rows in &chains {
            if rows.len() != n_draws {
                return Err(HemocountError::dimension_mismatch(
                    "draws per chain",
                    n_draws,
                    rows.len(),
                ));
            }
            let mut columns = vec![Vec::with_capacity(n_draws); variables.len()];
            for row in rows {
                if row.len() != variables.len() {
                    return Err(HemocountError::dimension_mismatch(
                        "values per draw",
                        variables.len(),
                        row.len(),
                    ));
                }
                for (column, &value) in columns.iter_mut().zip(row) {
                    column.push(value);
                }
            }
            for (var, column) in draws.iter_mut().zip(columns) {
                var.push(column);
            }
        }
        Ok(Self { variables, draws })
    }

    /// Recorded variables in model order.
    #[must_use]
    pub fn variables(&self) -> &[VariableId] {
        &self.variables
    }

    /// Display keys of the recorded variables.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.variables.iter().map(ToString::to_string).collect()
    }

    /// Number of chains.
    #[must_use]
    pub fn n_chains(&self) -> usize {
        self.draws.first().map_or(0, Vec::len)
    }

    /// Draws per chain.
    #[must_use]
    pub fn n_draws(&self) -> usize {
        self.draws
            .first()
            .and_then(|chains| chains.first())
            .map_or(0, Vec::len)
    }

    fn position(&self, id: VariableId) -> Option<usize> {
        self.variables.iter().position(|&v| v == id)
    }

    /// Per-chain draws of one variable.
    #[must_use]
    pub fn variable(&self, id: VariableId) -> Option<&[Vec<f64>]> {
        self.position(id).map(|i| self.draws[i].as_slice())
    }

    /// Per-chain draws looked up by display key, e.g. `"cells/mL"`.
    ///
    /// # Errors
    ///
    /// Returns [`HemocountError::UnknownVariable`] for an unrecorded key.
    pub fn get(&self, key: &str) -> Result<&[Vec<f64>]> {
        self.variables
            .iter()
            .position(|v| v.to_string() == key)
            .map(|i| self.draws[i].as_slice())
            .ok_or_else(|| HemocountError::UnknownVariable(key.to_string()))
    }

    /// All draws of one variable, chains concatenated.
    ///
    /// Empty if the variable was not recorded.
    #[must_use]
    pub fn draws(&self, id: VariableId) -> Vec<f64> {
        self.variable(id)
            .map(|chains| chains.iter().flatten().copied().collect())
            .unwrap_or_default()
    }

    /// All draws of a variable looked up by display key.
    ///
    /// # Errors
    ///
    /// Returns [`HemocountError::UnknownVariable`] for an unrecorded key.
    pub fn samples(&self, key: &str) -> Result<Vec<f64>> {
        Ok(self.get(key)?.iter().flatten().copied().collect())
    }

    /// Iterate over `(variable, per-chain draws)`.
    pub fn iter(&self) -> impl Iterator<Item = (VariableId, &[Vec<f64>])> {
        self.variables
            .iter()
            .copied()
            .zip(self.draws.iter().map(Vec::as_slice))
    }
}

#[cfg(test)]
#[path = "trace_tests.rs"]
mod tests;
