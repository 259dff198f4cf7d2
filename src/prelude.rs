//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use hemocount::prelude::*;
//! ```

pub use crate::dilution::{DilutionSeries, DilutionStep};
pub use crate::error::{HemocountError, Result};
pub use crate::growth::{GrowthConfig, GrowthPriors, LogisticCurve};
pub use crate::inference::{
    sample, Diagnostics, Initialization, LogDensity, Posterior, QualityWarning, SamplerConfig,
    SamplerRng, Trace, VariableId, CONCENTRATION_KEY,
};
pub use crate::measurement::{CountObservation, MeasurementBranch, TOTAL_SQUARES};
pub use crate::model::{CountingConfig, CountingModel};
pub use crate::report::{
    sample_curves, summarize, GrowthCurveBand, Histogram, VariableSummary,
    DEFAULT_CREDIBLE_MASS,
};
pub use crate::{generate_growth_model, generate_model};
