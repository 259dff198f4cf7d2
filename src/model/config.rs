//! Inputs of the static counting model.

use serde::{Deserialize, Serialize};

use crate::dilution::DilutionSeries;
use crate::error::{HemocountError, Result};
use crate::measurement::{chamber_volume_prior, CountObservation, MeasurementBranch};
use crate::priors::Prior;

/// One hemocytometer count and how the sample was prepared.
///
/// Concentration bounds are in billions of cells per mL.
///
/// # Example
///
/// ```
/// use hemocount::model::CountingConfig;
///
/// let config = CountingConfig::default()
///     .with_count(4, 71)
///     .with_dilutions(1, 9.0, 1.0);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountingConfig {
    /// Serial dilutions before counting
    pub number_of_serial_dilutions: i32,
    /// Shaker volume of each dilution (mL)
    pub ml_of_each_dilution: f64,
    /// Slurry transferred per dilution (mL)
    pub ml_of_slurry_transferred: f64,
    /// Grid squares counted, out of 25
    pub squares_counted: u32,
    /// Cells seen in those squares
    pub cells_counted: u64,
    /// Lower end of the uniform concentration prior
    pub prior_lower_bound: f64,
    /// Upper end of the uniform concentration prior
    pub prior_upper_bound: f64,
    /// Nominal chamber depth (cm)
    pub depth_of_chamber: f64,
}

impl Default for CountingConfig {
    fn default() -> Self {
        Self {
            number_of_serial_dilutions: 0,
            ml_of_each_dilution: 9.0,
            ml_of_slurry_transferred: 1.0,
            squares_counted: 5,
            cells_counted: 20,
            prior_lower_bound: 0.0,
            prior_upper_bound: 10.0,
            depth_of_chamber: 0.01,
        }
    }
}

impl CountingConfig {
    /// Sets the observed count.
    #[must_use]
    pub fn with_count(mut self, squares_counted: u32, cells_counted: u64) -> Self {
        self.squares_counted = squares_counted;
        self.cells_counted = cells_counted;
        self
    }

    /// Sets the dilution protocol.
    #[must_use]
    pub fn with_dilutions(mut self, count: i32, shaker_ml: f64, slurry_ml: f64) -> Self {
        self.number_of_serial_dilutions = count;
        self.ml_of_each_dilution = shaker_ml;
        self.ml_of_slurry_transferred = slurry_ml;
        self
    }

    /// Sets the concentration prior range (billions/mL).
    #[must_use]
    pub fn with_prior_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.prior_lower_bound = lower;
        self.prior_upper_bound = upper;
        self
    }

    /// Sets the nominal chamber depth (cm).
    #[must_use]
    pub fn with_depth(mut self, depth_cm: f64) -> Self {
        self.depth_of_chamber = depth_cm;
        self
    }

    /// Check every setting.
    ///
    /// # Errors
    ///
    /// Returns [`HemocountError::InvalidConfiguration`] naming the first
    /// invalid field.
    pub fn validate(&self) -> Result<()> {
        self.concentration_prior()?;
        self.dilution()?;
        self.observation()?;
        chamber_volume_prior(self.depth_of_chamber)?;
        Ok(())
    }

    /// Uniform prior over the concentration.
    ///
    /// # Errors
    ///
    /// Returns error for a negative lower bound or an empty range.
    pub fn concentration_prior(&self) -> Result<Prior> {
        let (lower, upper) = (self.prior_lower_bound, self.prior_upper_bound);
        if !(lower.is_finite() && lower >= 0.0) {
            return Err(HemocountError::invalid("prior_lower_bound", lower, ">= 0"));
        }
        if !(upper.is_finite() && upper > lower) {
            return Err(HemocountError::invalid(
                "prior_upper_bound",
                upper,
                "> prior_lower_bound",
            ));
        }
        Prior::uniform(lower, upper)
    }

    /// Dilution steps described by the config.
    ///
    /// # Errors
    ///
    /// Returns error for a negative count or non-positive volumes.
    pub fn dilution(&self) -> Result<DilutionSeries> {
        DilutionSeries::serial(
            self.number_of_serial_dilutions,
            self.ml_of_each_dilution,
            self.ml_of_slurry_transferred,
        )
    }

    /// The observed count.
    ///
    /// # Errors
    ///
    /// Returns error unless `1 <= squares_counted <= 25`.
    pub fn observation(&self) -> Result<CountObservation> {
        CountObservation::new(self.squares_counted, self.cells_counted)
    }

    /// The single measurement branch of the static model.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error.
    pub fn branch(&self) -> Result<MeasurementBranch> {
        MeasurementBranch::new(self.dilution()?, self.depth_of_chamber, self.observation()?)
    }
}
