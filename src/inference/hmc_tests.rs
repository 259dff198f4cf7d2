use super::*;
use crate::inference::{Initialization, VariableId};

/// Independent normals.
struct Gaussian {
    mean: Vec<f64>,
    sd: Vec<f64>,
}

impl LogDensity for Gaussian {
    fn dim(&self) -> usize {
        self.mean.len()
    }

    fn log_density_gradient(&self, theta: &[f64]) -> Option<(f64, Vec<f64>)> {
        let mut lp = 0.0;
        let mut grad = Vec::with_capacity(theta.len());
        for ((x, m), s) in theta.iter().zip(&self.mean).zip(&self.sd) {
            let z = (x - m) / s;
            lp -= 0.5 * z * z;
            grad.push(-z / s);
        }
        Some((lp, grad))
    }

    fn initial_point(&self) -> Vec<f64> {
        vec![0.0; self.dim()]
    }

    fn scales(&self) -> Vec<f64> {
        self.sd.clone()
    }

    fn variables(&self) -> Vec<VariableId> {
        vec![VariableId::Concentration, VariableId::Baseline]
    }

    fn record(&self, theta: &[f64], _rng: &mut SamplerRng) -> Vec<f64> {
        theta.to_vec()
    }
}

/// Exponential(1) on x > 0 without a transform, to exercise the support edge.
struct HalfLine;

impl LogDensity for HalfLine {
    fn dim(&self) -> usize {
        1
    }

    fn log_density_gradient(&self, theta: &[f64]) -> Option<(f64, Vec<f64>)> {
        (theta[0] > 0.0).then(|| (-theta[0], vec![-1.0]))
    }

    fn initial_point(&self) -> Vec<f64> {
        vec![1.0]
    }

    fn scales(&self) -> Vec<f64> {
        vec![1.0]
    }

    fn variables(&self) -> Vec<VariableId> {
        vec![VariableId::Concentration]
    }

    fn record(&self, theta: &[f64], _rng: &mut SamplerRng) -> Vec<f64> {
        theta.to_vec()
    }
}

fn gaussian() -> Gaussian {
    Gaussian {
        mean: vec![1.0, -20.0],
        sd: vec![1.0, 10.0],
    }
}

fn mean_sd(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let values: Vec<f64> = values.collect();
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

#[test]
fn test_leapfrog_nearly_conserves_energy() {
    let model = gaussian();
    let start = State::at(&model, vec![0.0, 0.0]).expect("finite");
    let inv_mass = vec![1.0, 100.0];
    let momentum = vec![0.7, -0.05];
    let (end, p) = leapfrog(&model, &start, &momentum, &inv_mass, 0.01, 200).expect("finite");
    let h0 = -start.lp + kinetic(&momentum, &inv_mass);
    let h1 = -end.lp + kinetic(&p, &inv_mass);
    assert!((h1 - h0).abs() < 1e-3, "energy drift {}", h1 - h0);
}

#[test]
fn test_leapfrog_is_reversible() {
    let model = gaussian();
    let start = State::at(&model, vec![0.5, -3.0]).expect("finite");
    let inv_mass = vec![1.0, 100.0];
    let (end, p) = leapfrog(&model, &start, &[0.3, 0.2], &inv_mass, 0.1, 20).expect("finite");
    let flipped: Vec<f64> = p.iter().map(|x| -x).collect();
    let (back, _) = leapfrog(&model, &end, &flipped, &inv_mass, 0.1, 20).expect("finite");
    for (a, b) in back.theta.iter().zip(&start.theta) {
        assert!((a - b).abs() < 1e-9);
    }
}

#[test]
fn test_leaving_support_is_divergent() {
    let model = HalfLine;
    let start = State::at(&model, vec![0.01]).expect("inside support");
    let mut rng = SamplerRng::new(3);
    // a huge step always jumps across zero for some momenta
    let mut saw_divergence = false;
    for _ in 0..50 {
        let t = transition(&model, &start, &[1.0], 5.0, 3, &mut rng);
        if t.divergent {
            assert_eq!(t.accept_prob, 0.0);
            assert_eq!(t.state.theta, start.theta);
            saw_divergence = true;
        }
    }
    assert!(saw_divergence);
}

#[test]
fn test_reasonable_step_size_is_positive() {
    let model = gaussian();
    let state = State::at(&model, vec![1.0, -20.0]).expect("finite");
    let mut rng = SamplerRng::new(9);
    let step = find_reasonable_step_size(&model, &state, &[1.0, 100.0], &mut rng);
    assert!(step > 0.05 && step < 100.0, "step = {step}");
}

#[test]
fn test_chain_recovers_gaussian_moments() {
    let model = gaussian();
    let config = SamplerConfig::default()
        .with_draws(2000)
        .with_tune(1000)
        .with_init(Initialization::Jitter);
    let output = run_chain(&model, &config, 0, 42).expect("chain runs");
    assert_eq!(output.draws.len(), 2000);
    assert_eq!(output.stats.n_draws, 2000);
    assert_eq!(output.stats.divergences, 0);
    assert!(output.stats.acceptance_rate > 0.6, "{:?}", output.stats);

    let (m0, s0) = mean_sd(output.draws.iter().map(|d| d[0]));
    let (m1, s1) = mean_sd(output.draws.iter().map(|d| d[1]));
    assert!((m0 - 1.0).abs() < 0.2, "mean0 = {m0}");
    assert!((s0 - 1.0).abs() < 0.15, "sd0 = {s0}");
    assert!((m1 + 20.0).abs() < 2.0, "mean1 = {m1}");
    assert!((s1 - 10.0).abs() < 1.5, "sd1 = {s1}");
}

#[test]
fn test_chain_is_reproducible() {
    let model = gaussian();
    let config = SamplerConfig::default().with_draws(50).with_tune(50);
    let a = run_chain(&model, &config, 0, 5).expect("chain runs");
    let b = run_chain(&model, &config, 0, 5).expect("chain runs");
    assert_eq!(a.draws, b.draws);
    assert_eq!(a.stats, b.stats);
}

#[test]
fn test_chain_without_warmup() {
    let model = HalfLine;
    let config = SamplerConfig::default()
        .with_draws(100)
        .with_tune(0)
        .with_init(Initialization::Prior);
    let output = run_chain(&model, &config, 1, 11).expect("chain runs");
    assert!(output.draws.iter().all(|d| d[0] > 0.0));
    assert!(output.stats.step_size > 0.0);
}
