use super::*;
use crate::inference::{Diagnostics, SamplerRng, Trace, VariableId};

fn posterior_of(variables: Vec<VariableId>, chains: Vec<Vec<Vec<f64>>>) -> Posterior {
    Posterior {
        trace: Trace::from_chains(variables, chains).expect("consistent shapes"),
        diagnostics: Diagnostics::default(),
    }
}

fn normal_posterior(seed: u64, mean: f64, sd: f64) -> Posterior {
    let mut rng = SamplerRng::new(seed);
    let chains = (0..2)
        .map(|_| (0..2000).map(|_| vec![rng.normal(mean, sd)]).collect())
        .collect();
    posterior_of(vec![VariableId::Concentration], chains)
}

#[test]
fn test_percentile_interpolates() {
    let values = [4.0, 1.0, 3.0, 2.0, 5.0];
    assert_eq!(percentile(&values, 0.0), 1.0);
    assert_eq!(percentile(&values, 0.5), 3.0);
    assert_eq!(percentile(&values, 1.0), 5.0);
    assert!((percentile(&values, 0.125) - 1.5).abs() < 1e-12);
    assert!(percentile(&[], 0.5).is_nan());
}

#[test]
fn test_hdi_prefers_dense_region() {
    // skewed: most mass near zero, long right tail
    let values: Vec<f64> = (0..100).map(|i| (f64::from(i) / 10.0).powi(2)).collect();
    let (lo, hi) = hdi(&values, 0.5);
    let equal_tailed = (percentile(&values, 0.25), percentile(&values, 0.75));
    assert_eq!(lo, 0.0);
    assert!(hi - lo < equal_tailed.1 - equal_tailed.0);
}

#[test]
fn test_summary_of_normal_draws() {
    let posterior = normal_posterior(4, 2.0, 0.5);
    let s = posterior
        .summary(crate::CONCENTRATION_KEY, 0.95)
        .expect("recorded");
    assert_eq!(s.variable, "cells/mL");
    assert!((s.mean - 2.0).abs() < 0.05);
    assert!((s.sd - 0.5).abs() < 0.05);
    assert!((s.lower - (2.0 - 1.96 * 0.5)).abs() < 0.1);
    assert!((s.upper - (2.0 + 1.96 * 0.5)).abs() < 0.1);
    assert!(s.hdi_lower < s.mean && s.mean < s.hdi_upper);
    assert!((s.r_hat - 1.0).abs() < 0.05);
    assert!(s.ess > 1000.0);
    assert!(s.mcse < 0.02);
    assert!(s.to_string().starts_with("cells/mL: mean"));
}

#[test]
fn test_summary_errors() {
    let posterior = normal_posterior(5, 0.0, 1.0);
    assert!(matches!(
        posterior.summary("K", 0.95),
        Err(HemocountError::UnknownVariable(_))
    ));
    assert!(posterior.summary("cells/mL", 1.0).is_err());
    assert!(posterior.summary("cells/mL", 0.0).is_err());
}

#[test]
fn test_summarize_all_and_selected() {
    let mut rng = SamplerRng::new(6);
    let chains = (0..2)
        .map(|_| {
            (0..200)
                .map(|_| vec![rng.normal(1.0, 0.1), rng.normal(5.0, 1.0)])
                .collect()
        })
        .collect();
    let posterior = posterior_of(
        vec![VariableId::Concentration, VariableId::ChamberVolume { branch: 0 }],
        chains,
    );
    assert_eq!(summarize(&posterior, &[], 0.9).expect("recorded").len(), 2);
    let selected = summarize(&posterior, &["cells/mL"], 0.9).expect("recorded");
    assert_eq!(selected.len(), 1);
    assert!((selected[0].mean - 1.0).abs() < 0.05);
}

#[test]
fn test_histogram() {
    let values = [0.0, 0.1, 0.2, 0.9, 1.0];
    let h = Histogram::from_values(&values, 2).expect("valid bins");
    assert_eq!(h.edges, vec![0.0, 0.5, 1.0]);
    assert_eq!(h.counts, vec![3, 2]);
    assert_eq!(h.centers(), vec![0.25, 0.75]);
    let area: f64 = h.density().iter().map(|d| d * 0.5).sum();
    assert!((area - 1.0).abs() < 1e-12);

    assert!(Histogram::from_values(&values, 0).is_err());
    assert!(Histogram::from_values(&[], 3).is_err());
    let flat = Histogram::from_values(&[2.0, 2.0], 4).expect("constant draws");
    assert_eq!(flat.counts.iter().sum::<usize>(), 2);

    let posterior = normal_posterior(7, 0.0, 1.0);
    let h = posterior.histogram("cells/mL", 20).expect("recorded");
    assert_eq!(h.counts.iter().sum::<usize>(), 4000);
}

fn growth_posterior() -> Posterior {
    // two fixed curves per chain
    let row = |k: f64| vec![k, 0.1, 0.3, 12.0];
    posterior_of(
        vec![
            VariableId::CarryingCapacity,
            VariableId::Baseline,
            VariableId::GrowthRate,
            VariableId::LagOffset,
        ],
        vec![vec![row(0.04), row(0.06)], vec![row(0.04), row(0.06)]],
    )
}

#[test]
fn test_growth_curve_band() {
    let posterior = growth_posterior();
    let band = GrowthCurveBand::from_posterior(&posterior, &[12.0, 200.0], 1).expect("growth");
    assert_eq!(band.n_curves, 4);
    // at the midpoint the curves sit at 0.1 + K/2
    assert!((band.mean[0] - 0.125).abs() < 1e-12);
    assert!((band.upper[0] - band.mean[0] - 0.005).abs() < 1e-12);
    assert!((band.mean[1] - 0.15).abs() < 1e-9);
    assert!((band.lower[1] - 0.14).abs() < 1e-9);

    let thinned = GrowthCurveBand::from_posterior(&posterior, &[0.0], 2).expect("growth");
    assert_eq!(thinned.n_curves, 2);
    assert!(GrowthCurveBand::from_posterior(&posterior, &[0.0], 0).is_err());
}

#[test]
fn test_sample_curves() {
    let posterior = growth_posterior();
    let curves = sample_curves(&posterior, &[0.0, 12.0, 24.0], 2).expect("growth");
    assert_eq!(curves.len(), 2);
    assert!(curves.iter().all(|c| c.len() == 3));
    assert_eq!(sample_curves(&posterior, &[1.0], 10).expect("growth").len(), 4);

    let static_posterior = normal_posterior(8, 0.0, 1.0);
    assert!(sample_curves(&static_posterior, &[1.0], 2).is_err());
}
