use super::*;
use crate::error::HemocountError;
use crate::inference::Initialization;

fn check_gradient(model: &CountingModel, theta: &[f64]) {
    let (_, grad) = model
        .log_density_gradient(theta)
        .expect("point inside support");
    let value = |t: &[f64]| model.log_density_gradient(t).expect("inside support").0;
    let h = 1e-6;
    for i in 0..theta.len() {
        let mut plus = theta.to_vec();
        let mut minus = theta.to_vec();
        plus[i] += h;
        minus[i] -= h;
        let numeric = (value(&plus) - value(&minus)) / (2.0 * h);
        assert!(
            (grad[i] - numeric).abs() < 1e-4 * (1.0 + numeric.abs()),
            "coordinate {i}: analytic {}, numeric {numeric}",
            grad[i]
        );
    }
}

fn static_point(model: &CountingModel, concentration: f64) -> Vec<f64> {
    let mut theta = model.initial_point();
    if let ConcentrationModel::Static { prior } = model.concentration_model() {
        theta[0] = prior.unconstrain(concentration);
    }
    theta
}

#[test]
fn test_default_static_layout() {
    let model = CountingModel::from_config(&CountingConfig::default()).expect("valid defaults");
    assert!(!model.is_growth());
    assert_eq!(model.dim(), 2);
    assert_eq!(model.branches().len(), 1);
    assert!(model.observation_times().is_none());
    assert_eq!(
        model.variables(),
        vec![
            VariableId::Concentration,
            VariableId::DilutionFactor { branch: 0 },
            VariableId::ChamberVolume { branch: 0 },
            VariableId::VisibleCells { branch: 0 },
        ]
    );
    assert_eq!(model.scales().len(), model.dim());
}

#[test]
fn test_static_gradient_matches_finite_difference() {
    let config = CountingConfig::default()
        .with_count(4, 71)
        .with_dilutions(2, 9.0, 1.0);
    let model = CountingModel::from_config(&config).expect("valid config");
    assert_eq!(model.dim(), 6);
    let mut theta = static_point(&model, 0.11);
    theta[1] += 0.003;
    theta[4] -= 0.002;
    theta[5] += 0.02;
    check_gradient(&model, &theta);
}

#[test]
fn test_growth_gradient_matches_finite_difference() {
    let model = CountingModel::growth(&GrowthConfig::default()).expect("valid defaults");
    assert!(model.is_growth());
    assert_eq!(model.dim(), 4 + 8 * 5);
    let mut theta = model.initial_point();
    theta[0] += 0.01;
    theta[2] += 0.3;
    theta[3] -= 0.4;
    for (i, x) in theta.iter_mut().enumerate().skip(4) {
        *x += 0.001 * ((i % 5) as f64 - 2.0);
    }
    check_gradient(&model, &theta);
}

#[test]
fn test_negative_growth_concentration_is_outside_support() {
    let model = CountingModel::growth(&GrowthConfig::default()).expect("valid defaults");
    let mut theta = model.initial_point();
    theta[1] = -1.0;
    assert!(model.log_density_gradient(&theta).is_none());
}

#[test]
fn test_record_matches_variables() {
    let config = CountingConfig::default().with_dilutions(1, 9.0, 1.0);
    let model = CountingModel::from_config(&config).expect("valid config");
    let theta = static_point(&model, 0.02);
    let mut rng = SamplerRng::new(8);
    let row = model.record(&theta, &mut rng);
    let vars = model.variables();
    assert_eq!(row.len(), vars.len());

    let at = |id: VariableId| row[vars.iter().position(|&v| v == id).expect("recorded")];
    assert!((at(VariableId::Concentration) - 0.02).abs() < 1e-9);
    let factor = at(VariableId::DilutionFactor { branch: 0 });
    let slurry = at(VariableId::SlurryVolume { branch: 0, step: 0 });
    let shaker = at(VariableId::ShakerVolume { branch: 0, step: 0 });
    assert!((factor - slurry / (slurry + shaker)).abs() < 1e-12);
    assert!(at(VariableId::VisibleCells { branch: 0 }) >= 20.0);
}

#[test]
fn test_growth_record_includes_curve_values() {
    let model = CountingModel::growth(&GrowthConfig::default()).expect("valid defaults");
    let theta = model.initial_point();
    let mut rng = SamplerRng::new(2);
    let row = model.record(&theta, &mut rng);
    let vars = model.variables();
    assert_eq!(row.len(), vars.len());
    assert_eq!(vars[0], VariableId::CarryingCapacity);
    assert_eq!(vars[4], VariableId::ConcentrationAt { branch: 0 });

    let curve = model.curve(&theta).expect("growth model");
    assert!((row[4] - curve.evaluate(0.0)).abs() < 1e-12);
    assert_eq!(model.concentrations(&theta).len(), 8);
}

#[test]
fn test_invalid_configs_rejected_before_sampling() {
    let cases = [
        CountingConfig::default().with_count(0, 20),
        CountingConfig::default().with_count(26, 20),
        CountingConfig::default().with_dilutions(-1, 9.0, 1.0),
        CountingConfig::default().with_dilutions(1, 0.0, 1.0),
        CountingConfig::default().with_dilutions(1, 9.0, -1.0),
        CountingConfig::default().with_prior_bounds(5.0, 5.0),
        CountingConfig::default().with_prior_bounds(-1.0, 5.0),
        CountingConfig::default().with_depth(0.0),
    ];
    for config in &cases {
        let err = CountingModel::from_config(config).expect_err("invalid config");
        assert!(err.is_configuration(), "{config:?}: {err}");
    }
}

#[test]
fn test_implausible_count_is_inconsistent() {
    let config = CountingConfig::default()
        .with_count(5, 5000)
        .with_prior_bounds(0.0, 0.001);
    let err = CountingModel::from_config(&config).expect_err("too many cells");
    assert!(matches!(err, HemocountError::ModelInconsistency { .. }));
}

#[test]
fn test_zero_cells_is_allowed() {
    let config = CountingConfig::default().with_count(5, 0);
    assert!(CountingModel::from_config(&config).is_ok());
}

#[test]
fn test_simulated_counts() {
    let model = CountingModel::from_config(&CountingConfig::default()).expect("valid defaults");
    let mut rng = SamplerRng::new(31);
    let n = 2000;
    // 0.001 billion/mL in 1e-4 mL: 100 visible, 20 in five squares
    let total: u64 = (0..n).map(|_| model.simulate_counts(&mut rng, 0.001)[0]).sum();
    let mean = total as f64 / f64::from(n);
    assert!((mean - 20.0).abs() < 1.0, "mean = {mean}");

    let curve = LogisticCurve {
        carrying_capacity: 0.05,
        baseline: 0.1,
        rate: 0.3,
        lag: 12.0,
    };
    assert!(model.simulate_curve_counts(&mut rng, &curve).is_none());
    let growth = CountingModel::growth(&GrowthConfig::default()).expect("valid defaults");
    let counts = growth
        .simulate_curve_counts(&mut rng, &curve)
        .expect("growth model");
    assert_eq!(counts.len(), 8);
}

#[test]
fn test_short_sampling_run() {
    let model = CountingModel::from_config(&CountingConfig::default()).expect("valid defaults");
    let sampler = SamplerConfig::default()
        .with_draws(300)
        .with_tune(300)
        .with_init(Initialization::Map)
        .with_seed(3);
    let posterior = model.sample(&sampler).expect("sampling succeeds");
    let draws = posterior.trace.draws(VariableId::Concentration);
    assert_eq!(draws.len(), 600);
    assert!(draws.iter().all(|&c| c > 0.0 && c < 10.0));
    let visible = posterior.trace.draws(VariableId::VisibleCells { branch: 0 });
    assert!(visible.iter().all(|&v| v >= 20.0 && v.fract() == 0.0));
}
