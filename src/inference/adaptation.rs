//! Warmup adaptation: dual-averaging step size and windowed diagonal mass.
//!
//! Reference: Hoffman & Gelman (2014), "The No-U-Turn Sampler", §3.2;
//! the window layout matches Stan's default warmup.

/// Nesterov dual averaging of the log step size towards a target
/// acceptance probability.
#[derive(Debug, Clone)]
pub(crate) struct DualAveraging {
    target: f64,
    mu: f64,
    counter: f64,
    h_bar: f64,
    log_step: f64,
    log_step_bar: f64,
}

const GAMMA: f64 = 0.05;
const T0: f64 = 10.0;
const KAPPA: f64 = 0.75;

impl DualAveraging {
    pub(crate) fn new(initial_step: f64, target: f64) -> Self {
        let mut da = Self {
            target,
            mu: 0.0,
            counter: 0.0,
            h_bar: 0.0,
            log_step: 0.0,
            log_step_bar: 0.0,
        };
        da.restart(initial_step);
        da
    }

    /// Forget the history and shrink towards ten times `step`.
    pub(crate) fn restart(&mut self, step: f64) {
        self.mu = (10.0 * step).ln();
        self.counter = 0.0;
        self.h_bar = 0.0;
        self.log_step = step.ln();
        self.log_step_bar = 0.0;
    }

    /// Feed one acceptance probability; returns the next step size.
    pub(crate) fn update(&mut self, accept_prob: f64) -> f64 {
        self.counter += 1.0;
        let eta = 1.0 / (self.counter + T0);
        self.h_bar = (1.0 - eta) * self.h_bar + eta * (self.target - accept_prob);
        self.log_step = self.mu - self.counter.sqrt() / GAMMA * self.h_bar;
        let weight = self.counter.powf(-KAPPA);
        self.log_step_bar = weight * self.log_step + (1.0 - weight) * self.log_step_bar;
        self.log_step.exp()
    }

    /// Averaged step size used after warmup.
    pub(crate) fn final_step(&self) -> f64 {
        if self.counter > 0.0 {
            self.log_step_bar.exp()
        } else {
            self.log_step.exp()
        }
    }
}

/// Running mean and variance per coordinate (Welford).
#[derive(Debug, Clone)]
pub(crate) struct WelfordVariance {
    count: usize,
    mean: Vec<f64>,
    m2: Vec<f64>,
}

impl WelfordVariance {
    pub(crate) fn new(dim: usize) -> Self {
        Self {
            count: 0,
            mean: vec![0.0; dim],
            m2: vec![0.0; dim],
        }
    }

    pub(crate) fn add(&mut self, x: &[f64]) {
        self.count += 1;
        let n = self.count as f64;
        for ((mean, m2), &xi) in self.mean.iter_mut().zip(self.m2.iter_mut()).zip(x) {
            let delta = xi - *mean;
            *mean += delta / n;
            *m2 += delta * (xi - *mean);
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.count
    }

    pub(crate) fn variance(&self) -> Vec<f64> {
        let denom = (self.count.max(2) - 1) as f64;
        self.m2.iter().map(|m2| m2 / denom).collect()
    }

    pub(crate) fn reset(&mut self) {
        self.count = 0;
        self.mean.iter_mut().for_each(|m| *m = 0.0);
        self.m2.iter_mut().for_each(|m| *m = 0.0);
    }
}

/// Inverse mass from a window's variance estimate, shrunk towards a small
/// multiple of the prior scales.
pub(crate) fn regularized_inverse_mass(variance: &[f64], count: usize, scales: &[f64]) -> Vec<f64> {
    let n = count as f64;
    variance
        .iter()
        .zip(scales)
        .map(|(v, s)| {
            let shrunk = (n / (n + 5.0)) * v + 1e-3 * (5.0 / (n + 5.0)) * s * s;
            shrunk.max(1e-12)
        })
        .collect()
}

/// Warmup iteration layout.
///
/// A fast initial buffer adapts only the step size, a series of doubling
/// slow windows estimates the mass matrix, and a terminal buffer settles
/// the step size for the final metric.
#[derive(Debug, Clone)]
pub(crate) struct WarmupSchedule {
    tune: usize,
    init_buffer: usize,
    term_buffer: usize,
    window_size: usize,
    window_end: usize,
    adapt_metric: bool,
}

const INIT_BUFFER: usize = 75;
const TERM_BUFFER: usize = 50;
const BASE_WINDOW: usize = 25;

impl WarmupSchedule {
    pub(crate) fn new(tune: usize) -> Self {
        if tune < 20 {
            return Self {
                tune,
                init_buffer: tune,
                term_buffer: 0,
                window_size: 0,
                window_end: 0,
                adapt_metric: false,
            };
        }
        let (init_buffer, term_buffer, window_size) =
            if INIT_BUFFER + BASE_WINDOW + TERM_BUFFER > tune {
                let init = tune * 15 / 100;
                let term = tune / 10;
                (init, term, tune - init - term)
            } else {
                (INIT_BUFFER, TERM_BUFFER, BASE_WINDOW)
            };
        let mut schedule = Self {
            tune,
            init_buffer,
            term_buffer,
            window_size,
            window_end: init_buffer + window_size - 1,
            adapt_metric: true,
        };
        schedule.clamp_window_end();
        schedule
    }

    fn last_slow_iteration(&self) -> usize {
        self.tune - self.term_buffer - 1
    }

    fn clamp_window_end(&mut self) {
        // stretch the window if the next one would not fit
        let last = self.last_slow_iteration();
        if self.window_end >= last || self.window_end + 2 * self.window_size > last {
            self.window_end = last;
        }
    }

    /// Whether iteration `i` contributes to the mass-matrix estimate.
    pub(crate) fn in_slow_window(&self, i: usize) -> bool {
        self.adapt_metric && i >= self.init_buffer && i < self.tune - self.term_buffer
    }

    /// Whether a slow window closes at iteration `i`; advances to the
    /// next window when it does.
    pub(crate) fn end_of_window(&mut self, i: usize) -> bool {
        if !self.adapt_metric || i != self.window_end {
            return false;
        }
        if self.window_end < self.last_slow_iteration() {
            self.window_size *= 2;
            self.window_end = i + self.window_size;
            self.clamp_window_end();
        }
        true
    }
}

#[cfg(test)]
#[path = "adaptation_tests.rs"]
mod tests;
