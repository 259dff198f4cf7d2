use super::*;

#[test]
fn test_dual_averaging_hits_target() {
    // acceptance falls off with the step size: a(ε) = exp(-ε)
    let target = 0.8;
    let mut da = DualAveraging::new(1.0, target);
    let mut step: f64 = 1.0;
    for _ in 0..2000 {
        step = da.update((-step).exp());
    }
    let expected = -f64::ln(target);
    let final_step = da.final_step();
    assert!(
        (final_step - expected).abs() < 0.1 * expected,
        "final step {final_step}, expected {expected}"
    );
}

#[test]
fn test_dual_averaging_restart_without_updates() {
    let mut da = DualAveraging::new(0.3, 0.8);
    da.update(0.1);
    da.restart(0.05);
    assert!((da.final_step() - 0.05).abs() < 1e-12);
}

#[test]
fn test_welford_matches_two_pass() {
    let rows = [[1.0, 10.0], [2.0, 14.0], [4.0, 9.0], [7.0, 11.0]];
    let mut w = WelfordVariance::new(2);
    for row in &rows {
        w.add(row);
    }
    assert_eq!(w.count(), 4);
    let var = w.variance();
    // column 0: mean 3.5, sum of squares 21
    assert!((var[0] - 7.0).abs() < 1e-12);
    // column 1: mean 11, sum of squares 14
    assert!((var[1] - 14.0 / 3.0).abs() < 1e-12);

    w.reset();
    assert_eq!(w.count(), 0);
    w.add(&[5.0, 5.0]);
    assert_eq!(w.variance(), vec![0.0, 0.0]);
}

#[test]
fn test_regularization_shrinks_towards_scale() {
    let inv = regularized_inverse_mass(&[4.0, 0.0], 95, &[1.0, 2.0]);
    assert!((inv[0] - (0.95 * 4.0 + 0.05 * 1e-3)).abs() < 1e-12);
    assert!((inv[1] - 0.05 * 1e-3 * 4.0).abs() < 1e-12);
}

fn window_ends(tune: usize) -> Vec<usize> {
    let mut schedule = WarmupSchedule::new(tune);
    (0..tune).filter(|&i| schedule.end_of_window(i)).collect()
}

#[test]
fn test_default_windows() {
    assert_eq!(window_ends(1000), vec![99, 149, 249, 449, 949]);
    let schedule = WarmupSchedule::new(1000);
    assert!(!schedule.in_slow_window(74));
    assert!(schedule.in_slow_window(75));
    assert!(schedule.in_slow_window(949));
    assert!(!schedule.in_slow_window(950));
}

#[test]
fn test_short_warmup_uses_fractions() {
    assert_eq!(window_ends(100), vec![89]);
    let schedule = WarmupSchedule::new(100);
    assert!(!schedule.in_slow_window(14));
    assert!(schedule.in_slow_window(15));
    assert!(!schedule.in_slow_window(90));
}

#[test]
fn test_tiny_warmup_skips_metric() {
    assert!(window_ends(10).is_empty());
    assert!(!WarmupSchedule::new(10).in_slow_window(5));
}
