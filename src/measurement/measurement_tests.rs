use super::*;

fn branch(steps: i32, squares: u32, cells: u64) -> MeasurementBranch {
    MeasurementBranch::new(
        DilutionSeries::serial(steps, 9.0, 1.0).expect("valid series"),
        0.01,
        CountObservation::new(squares, cells).expect("valid observation"),
    )
    .expect("valid branch")
}

fn value(branch: &MeasurementBranch, block: &[f64], c: f64) -> f64 {
    let mut scratch = vec![0.0; block.len()];
    branch
        .log_density(block, c, &mut scratch)
        .expect("inside support")
        .0
}

#[test]
fn test_squares_counted_bounds() {
    assert!(CountObservation::new(0, 10).is_err());
    assert!(CountObservation::new(26, 10).is_err());
    let full = CountObservation::new(25, 10).expect("whole grid is valid");
    assert_eq!(full.success_probability(), 1.0);
    let five = CountObservation::new(5, 20).expect("valid observation");
    assert!((five.success_probability() - 0.2).abs() < 1e-12);
}

#[test]
fn test_chamber_prior_from_depth() {
    let prior = chamber_volume_prior(0.01).expect("valid depth");
    assert!((prior.mean() - 1e-4).abs() < 1e-15);
    assert!((prior.sd() - 8e-6).abs() < 1e-15);
    assert!(chamber_volume_prior(0.0).is_err());
    assert!(chamber_volume_prior(-0.01).is_err());
}

#[test]
fn test_expected_visible_count_is_linear_in_concentration() {
    let base = expected_visible_count(0.5, 0.1, 1e-4);
    for k in [0.5, 2.0, 7.0] {
        let scaled = expected_visible_count(0.5 * k, 0.1, 1e-4);
        assert!((scaled - k * base).abs() < 1e-9 * scaled);
    }
}

#[test]
fn test_log_density_gradient_matches_finite_difference() {
    let b = branch(2, 4, 71);
    let mut block = b.centers();
    block[0] += 0.004;
    block[3] -= 0.002;
    block[4] += 0.03;
    let c = 0.45;

    let mut grad = vec![0.0; block.len()];
    let (_, dc) = b.log_density(&block, c, &mut grad).expect("inside support");

    let h = 1e-6;
    for i in 0..block.len() {
        let mut plus = block.clone();
        let mut minus = block.clone();
        plus[i] += h;
        minus[i] -= h;
        let numeric = (value(&b, &plus, c) - value(&b, &minus, c)) / (2.0 * h);
        let tol = 1e-3 * (1.0 + grad[i].abs());
        assert!(
            (grad[i] - numeric).abs() < tol,
            "coordinate {i}: analytic {}, numeric {numeric}",
            grad[i]
        );
    }

    let hc = 1e-7;
    let numeric_c = (value(&b, &block, c + hc) - value(&b, &block, c - hc)) / (2.0 * hc);
    assert!((dc - numeric_c).abs() < 1e-3 * (1.0 + dc.abs()));
}

#[test]
fn test_log_density_rejects_non_positive_concentration() {
    let b = branch(0, 5, 20);
    let block = b.centers();
    let mut grad = vec![0.0; block.len()];
    assert!(b.log_density(&block, 0.0, &mut grad).is_none());
    assert!(b.log_density(&block, -1.0, &mut grad).is_none());
}

#[test]
fn test_marginal_likelihood_sums_joint_over_visible() {
    // undiluted: log density minus the chamber prior is the marginal count term
    let b = branch(0, 5, 20);
    let block = b.centers();
    let c = 0.0011;
    let mean = b.visible_mean(&block, c);

    let mut grad = vec![0.0; block.len()];
    let (lp, _) = b.log_density(&block, c, &mut grad).expect("inside support");
    let (chamber_lp, _) = b.chamber_prior().log_density(block[0]);
    let marginal = lp - chamber_lp;

    let summed: f64 = (20..2000).map(|n| b.log_likelihood(n, mean).exp()).sum();
    assert!(
        (summed.ln() - marginal).abs() < 1e-8,
        "summed {} vs marginal {marginal}",
        summed.ln()
    );
}

#[test]
fn test_realize_at_centers_matches_nominal() {
    let b = branch(1, 4, 71);
    let state = b.realize(&b.centers());
    assert_eq!(state.draws.len(), 1);
    assert!((state.dilution_factor - 0.1).abs() < 1e-9);
    assert!((state.chamber_ml - 1e-4).abs() < 1e-12);
}

#[test]
fn test_visible_draws_never_below_counted() {
    let b = branch(0, 5, 20);
    let mut rng = SamplerRng::new(4);
    for _ in 0..1000 {
        assert!(b.draw_visible(&mut rng, 100.0) >= 20);
    }
    let whole_grid = branch(0, 25, 20);
    for _ in 0..100 {
        assert_eq!(whole_grid.draw_visible(&mut rng, 100.0), 20);
    }
}

#[test]
fn test_log_likelihood_support() {
    let b = branch(0, 5, 20);
    assert_eq!(b.log_likelihood(19, 100.0), f64::NEG_INFINITY);
    assert!(b.log_likelihood(100, 100.0).is_finite());
    // the most likely visible count sits near counted / p
    assert!(b.log_likelihood(100, 100.0) > b.log_likelihood(30, 100.0));

    let whole_grid = branch(0, 25, 20);
    assert!(whole_grid.log_likelihood(20, 20.0).is_finite());
    assert_eq!(whole_grid.log_likelihood(21, 20.0), f64::NEG_INFINITY);
}

#[test]
fn test_simulated_counts_track_expectation() {
    let b = branch(1, 5, 0);
    let mut rng = SamplerRng::new(12);
    let n = 4000;
    // 0.01 billion/mL × 0.1 × 1e-4 mL = 100 visible, 20 counted on average
    let total: u64 = (0..n).map(|_| b.simulate(&mut rng, 0.01).counted).sum();
    let mean = total as f64 / n as f64;
    assert!((mean - 20.0).abs() < 0.6, "mean = {mean}");
}

#[test]
fn test_consistency_check() {
    assert!(branch(0, 5, 20).check_consistency(10.0).is_ok());

    // 1e5 cells/mL upper bound can never put 500 cells in 5 squares
    let err = branch(0, 5, 500)
        .check_consistency(1e-4)
        .expect_err("implausible count");
    assert!(matches!(err, HemocountError::ModelInconsistency { .. }));
    assert!(err.to_string().contains("500 cells"));
}
