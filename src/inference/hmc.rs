//! Hamiltonian Monte Carlo with a diagonal metric.
//!
//! Each transition draws a fresh momentum, integrates a fixed number of
//! leapfrog steps with a slightly jittered step size and accepts the end
//! point with the Metropolis probability `min(1, exp(-ΔH))`.

use std::f64::consts::LN_2;

use tracing::debug;

use super::adaptation::{regularized_inverse_mass, DualAveraging, WarmupSchedule, WelfordVariance};
use super::diagnostics::ChainStats;
use super::init::initial_state;
use super::{LogDensity, SamplerConfig, SamplerRng};
use crate::error::{HemocountError, Result};

/// Energy error beyond which a transition is divergent.
pub const MAX_ENERGY_ERROR: f64 = 1000.0;

const MIN_STEP: f64 = 1e-10;
const MAX_STEP: f64 = 1e3;

/// Position with its log density and gradient.
#[derive(Debug, Clone)]
pub(crate) struct State {
    pub(crate) theta: Vec<f64>,
    pub(crate) lp: f64,
    pub(crate) grad: Vec<f64>,
}

impl State {
    /// Evaluate the model at `theta`; `None` outside the support.
    pub(crate) fn at<M: LogDensity + ?Sized>(model: &M, theta: Vec<f64>) -> Option<Self> {
        let (lp, grad) = model.log_density_gradient(&theta)?;
        if lp.is_finite() && grad.iter().all(|g| g.is_finite()) {
            Some(Self { theta, lp, grad })
        } else {
            None
        }
    }
}

#[derive(Debug)]
pub(crate) struct Transition {
    pub(crate) state: State,
    pub(crate) accept_prob: f64,
    pub(crate) divergent: bool,
}

fn kinetic(momentum: &[f64], inv_mass: &[f64]) -> f64 {
    0.5 * momentum
        .iter()
        .zip(inv_mass)
        .map(|(p, m)| p * p * m)
        .sum::<f64>()
}

fn sample_momentum(rng: &mut SamplerRng, inv_mass: &[f64]) -> Vec<f64> {
    inv_mass
        .iter()
        .map(|m| rng.standard_normal() / m.sqrt())
        .collect()
}

/// Integrate `n_steps` leapfrog steps from `start`.
///
/// Returns the end state and momentum, or `None` once the trajectory
/// leaves the support.
pub(crate) fn leapfrog<M: LogDensity + ?Sized>(
    model: &M,
    start: &State,
    momentum: &[f64],
    inv_mass: &[f64],
    step: f64,
    n_steps: usize,
) -> Option<(State, Vec<f64>)> {
    let mut p = momentum.to_vec();
    let mut theta = start.theta.clone();
    let mut grad = start.grad.clone();
    let mut lp = start.lp;
    for _ in 0..n_steps {
        for (pi, g) in p.iter_mut().zip(&grad) {
            *pi += 0.5 * step * g;
        }
        for ((x, pi), m) in theta.iter_mut().zip(&p).zip(inv_mass) {
            *x += step * m * pi;
        }
        let (next_lp, next_grad) = model.log_density_gradient(&theta)?;
        if !(next_lp.is_finite() && next_grad.iter().all(|g| g.is_finite())) {
            return None;
        }
        lp = next_lp;
        grad = next_grad;
        for (pi, g) in p.iter_mut().zip(&grad) {
            *pi += 0.5 * step * g;
        }
    }
    Some((State { theta, lp, grad }, p))
}

/// One HMC transition from `current`.
pub(crate) fn transition<M: LogDensity + ?Sized>(
    model: &M,
    current: &State,
    inv_mass: &[f64],
    step: f64,
    n_steps: usize,
    rng: &mut SamplerRng,
) -> Transition {
    let momentum = sample_momentum(rng, inv_mass);
    let h0 = -current.lp + kinetic(&momentum, inv_mass);
    let rejected = |divergent| Transition {
        state: current.clone(),
        accept_prob: 0.0,
        divergent,
    };

    let Some((proposal, end_momentum)) =
        leapfrog(model, current, &momentum, inv_mass, step, n_steps)
    else {
        return rejected(true);
    };
    let energy_error = -proposal.lp + kinetic(&end_momentum, inv_mass) - h0;
    if !energy_error.is_finite() || energy_error > MAX_ENERGY_ERROR {
        return rejected(true);
    }
    let accept_prob = (-energy_error).exp().min(1.0);
    if rng.uniform() < accept_prob {
        Transition {
            state: proposal,
            accept_prob,
            divergent: false,
        }
    } else {
        Transition {
            state: current.clone(),
            accept_prob,
            divergent: false,
        }
    }
}

/// Double or halve the step size until a single leapfrog step crosses
/// acceptance 1/2 (Hoffman & Gelman, Algorithm 4).
pub(crate) fn find_reasonable_step_size<M: LogDensity + ?Sized>(
    model: &M,
    state: &State,
    inv_mass: &[f64],
    rng: &mut SamplerRng,
) -> f64 {
    let momentum = sample_momentum(rng, inv_mass);
    let h0 = -state.lp + kinetic(&momentum, inv_mass);
    let log_accept = |step: f64| -> f64 {
        match leapfrog(model, state, &momentum, inv_mass, step, 1) {
            Some((end, p)) => h0 - (-end.lp + kinetic(&p, inv_mass)),
            None => f64::NEG_INFINITY,
        }
    };

    let mut step: f64 = 1.0;
    let mut la = log_accept(step);
    let direction = if la > -LN_2 { 1.0 } else { -1.0 };
    for _ in 0..100 {
        // a^d > 2^-d
        if !(direction * la > -direction * LN_2) {
            break;
        }
        step *= 2f64.powf(direction);
        if !(MIN_STEP..=MAX_STEP).contains(&step) {
            break;
        }
        la = log_accept(step);
    }
    step.clamp(MIN_STEP, MAX_STEP)
}

/// Draws and statistics of one finished chain.
#[derive(Debug)]
pub(crate) struct ChainOutput {
    pub(crate) draws: Vec<Vec<f64>>,
    pub(crate) stats: ChainStats,
}

/// Run warmup and sampling for one chain.
pub(crate) fn run_chain<M: LogDensity + ?Sized>(
    model: &M,
    config: &SamplerConfig,
    chain: usize,
    seed: u64,
) -> Result<ChainOutput> {
    let mut rng = SamplerRng::new(seed);
    let scales = model.scales();
    let mut state = initial_state(model, config.init, &scales, &mut rng).ok_or_else(|| {
        HemocountError::SamplerInitialization {
            chain,
            reason: "no starting point with finite log density".to_string(),
        }
    })?;

    let mut inv_mass: Vec<f64> = scales.iter().map(|s| (s * s).max(1e-12)).collect();
    let mut step = find_reasonable_step_size(model, &state, &inv_mass, &mut rng);
    let mut dual = DualAveraging::new(step, config.target_accept);
    let mut schedule = WarmupSchedule::new(config.tune);
    let mut window = WelfordVariance::new(model.dim());
    let mut warmup_divergences = 0;

    for i in 0..config.tune {
        let jitter = rng.uniform_range(0.9, 1.1);
        let t = transition(
            model,
            &state,
            &inv_mass,
            step * jitter,
            config.leapfrog_steps,
            &mut rng,
        );
        warmup_divergences += usize::from(t.divergent);
        state = t.state;
        step = dual.update(t.accept_prob).clamp(MIN_STEP, MAX_STEP);

        if schedule.in_slow_window(i) {
            window.add(&state.theta);
        }
        if schedule.end_of_window(i) {
            inv_mass = regularized_inverse_mass(&window.variance(), window.count(), &scales);
            window.reset();
            step = find_reasonable_step_size(model, &state, &inv_mass, &mut rng);
            dual.restart(step);
        }
    }
    if config.tune > 0 {
        step = dual.final_step().clamp(MIN_STEP, MAX_STEP);
    }
    debug!(
        chain,
        step_size = step,
        warmup_divergences,
        "warmup finished"
    );

    let mut draws = Vec::with_capacity(config.draws);
    let mut accept_sum = 0.0;
    let mut divergences = 0;
    for _ in 0..config.draws {
        let jitter = rng.uniform_range(0.9, 1.1);
        let t = transition(
            model,
            &state,
            &inv_mass,
            step * jitter,
            config.leapfrog_steps,
            &mut rng,
        );
        accept_sum += t.accept_prob;
        divergences += usize::from(t.divergent);
        state = t.state;
        draws.push(model.record(&state.theta, &mut rng));
    }

    let n_draws = draws.len();
    Ok(ChainOutput {
        draws,
        stats: ChainStats {
            chain,
            seed,
            acceptance_rate: accept_sum / n_draws.max(1) as f64,
            divergences,
            step_size: step,
            n_draws,
        },
    })
}

#[cfg(test)]
#[path = "hmc_tests.rs"]
mod tests;
