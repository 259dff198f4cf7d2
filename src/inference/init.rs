//! Chain starting points.

use super::hmc::State;
use super::{Initialization, LogDensity, SamplerRng};

const MAX_INIT_ATTEMPTS: usize = 100;
const MAP_MAX_ITER: usize = 500;
const MAP_BACKTRACKS: usize = 40;
const ARMIJO: f64 = 1e-4;

fn jitter(center: &[f64], scales: &[f64], rng: &mut SamplerRng) -> Vec<f64> {
    center
        .iter()
        .zip(scales)
        .map(|(c, s)| c + rng.uniform_range(-1.0, 1.0) * s)
        .collect()
}

/// Starting state for one chain.
///
/// Falls back to jittered prior centers when the requested start has no
/// finite density; `None` if none of those do either.
pub(crate) fn initial_state<M: LogDensity + ?Sized>(
    model: &M,
    init: Initialization,
    scales: &[f64],
    rng: &mut SamplerRng,
) -> Option<State> {
    let center = model.initial_point();
    let start = match init {
        Initialization::Jitter => jitter(&center, scales, rng),
        Initialization::Prior | Initialization::Map => center.clone(),
    };
    let state = match State::at(model, start) {
        Some(state) => state,
        None => (0..MAX_INIT_ATTEMPTS)
            .find_map(|_| State::at(model, jitter(&center, scales, rng)))?,
    };
    Some(match init {
        Initialization::Map => find_mode(model, state, scales),
        Initialization::Prior | Initialization::Jitter => state,
    })
}

/// Climb to the mode by gradient ascent preconditioned with the squared
/// prior scales, backtracking until the Armijo condition holds.
pub(crate) fn find_mode<M: LogDensity + ?Sized>(model: &M, start: State, scales: &[f64]) -> State {
    let mut state = start;
    for _ in 0..MAP_MAX_ITER {
        let direction: Vec<f64> = state
            .grad
            .iter()
            .zip(scales)
            .map(|(g, s)| s * s * g)
            .collect();
        let slope: f64 = direction.iter().zip(&state.grad).map(|(d, g)| d * g).sum();
        if slope < 1e-10 {
            break;
        }

        let mut alpha = 1.0;
        let mut accepted = None;
        for _ in 0..MAP_BACKTRACKS {
            let candidate = state
                .theta
                .iter()
                .zip(&direction)
                .map(|(x, d)| x + alpha * d)
                .collect();
            if let Some(next) = State::at(model, candidate) {
                if next.lp >= state.lp + ARMIJO * alpha * slope {
                    accepted = Some(next);
                    break;
                }
            }
            alpha *= 0.5;
        }

        let Some(next) = accepted else { break };
        let gain = next.lp - state.lp;
        state = next;
        if gain < 1e-10 {
            break;
        }
    }
    state
}
