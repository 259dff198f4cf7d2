//! Posterior growth curves.

use serde::Serialize;

use crate::error::{HemocountError, Result};
use crate::growth::LogisticCurve;
use crate::inference::{Posterior, VariableId};

/// Flattened draws of the four curve parameters.
fn curve_draws(posterior: &Posterior) -> Result<Vec<LogisticCurve>> {
    let column = |id: VariableId| {
        posterior
            .trace
            .variable(id)
            .map(|chains| chains.iter().flatten().copied().collect::<Vec<f64>>())
            .ok_or_else(|| HemocountError::UnknownVariable(id.to_string()))
    };
    let k = column(VariableId::CarryingCapacity)?;
    let p0 = column(VariableId::Baseline)?;
    let r = column(VariableId::GrowthRate)?;
    let lag = column(VariableId::LagOffset)?;
    Ok(k.iter()
        .zip(&p0)
        .zip(&r)
        .zip(&lag)
        .map(|(((&k, &p0), &r), &lag)| LogisticCurve {
            carrying_capacity: k,
            baseline: p0,
            rate: r,
            lag,
        })
        .collect())
}

/// Mean growth curve with a ±1 standard deviation band.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthCurveBand {
    /// Evaluation times (hours)
    pub times: Vec<f64>,
    /// Mean concentration at each time
    pub mean: Vec<f64>,
    /// Mean minus one standard deviation
    pub lower: Vec<f64>,
    /// Mean plus one standard deviation
    pub upper: Vec<f64>,
    /// Draws the band was computed from
    pub n_curves: usize,
}

impl GrowthCurveBand {
    /// Evaluate every `stride`-th posterior curve on `times`.
    ///
    /// # Errors
    ///
    /// Returns [`HemocountError::UnknownVariable`] if the posterior has no
    /// growth parameters, or a configuration error for a zero stride.
    pub fn from_posterior(posterior: &Posterior, times: &[f64], stride: usize) -> Result<Self> {
        if stride == 0 {
            return Err(HemocountError::invalid("stride", stride, ">= 1"));
        }
        let curves: Vec<LogisticCurve> = curve_draws(posterior)?
            .into_iter()
            .step_by(stride)
            .collect();
        let n = curves.len() as f64;
        let mut mean = Vec::with_capacity(times.len());
        let mut lower = Vec::with_capacity(times.len());
        let mut upper = Vec::with_capacity(times.len());
        for &t in times {
            let values: Vec<f64> = curves.iter().map(|c| c.evaluate(t)).collect();
            let m = values.iter().sum::<f64>() / n;
            let sd = (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n).sqrt();
            mean.push(m);
            lower.push(m - sd);
            upper.push(m + sd);
        }
        Ok(Self {
            times: times.to_vec(),
            mean,
            lower,
            upper,
            n_curves: curves.len(),
        })
    }
}

/// `count` posterior curves evaluated on `times`, spread evenly over the
/// draws.
///
/// # Errors
///
/// Returns [`HemocountError::UnknownVariable`] if the posterior has no
/// growth parameters.
pub fn sample_curves(posterior: &Posterior, times: &[f64], count: usize) -> Result<Vec<Vec<f64>>> {
    let curves = curve_draws(posterior)?;
    if curves.is_empty() || count == 0 {
        return Ok(Vec::new());
    }
    let count = count.min(curves.len());
    Ok((0..count)
        .map(|i| curves[i * curves.len() / count].evaluate_many(times))
        .collect())
}
