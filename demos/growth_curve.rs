//! Fit a logistic growth curve to counts taken over a fermentation.
//!
//! Run with: `cargo run --example growth_curve`

use hemocount::prelude::*;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn main() -> hemocount::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .compact()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    println!("=== Logistic Growth Curve ===\n");

    let config = GrowthConfig::default();
    for (t, cells) in config
        .hours_since_inoculation
        .iter()
        .zip(&config.cells_counted)
    {
        println!("t = {t:>5.1} h: {cells} cells in {} squares", config.squares_counted);
    }

    let sampler = SamplerConfig::default().with_seed(2024);
    let (posterior, _model) = generate_growth_model(&config, &sampler)?;

    println!("\n--- Growth parameters ---");
    for summary in summarize(&posterior, &["K", "P0", "r", "delta_t"], DEFAULT_CREDIBLE_MASS)? {
        println!("{summary}");
    }

    let times: Vec<f64> = (0..=16).map(|i| f64::from(i) * 5.0).collect();
    let band = GrowthCurveBand::from_posterior(&posterior, &times, 5)?;
    println!("\n--- Curve band over {} posterior draws ---", band.n_curves);
    println!("{:>6}  {:>9}  {:>9}  {:>9}", "hours", "lower", "mean", "upper");
    for i in 0..band.times.len() {
        println!(
            "{:>6.1}  {:>9.5}  {:>9.5}  {:>9.5}",
            band.times[i], band.lower[i], band.mean[i], band.upper[i]
        );
    }

    if !posterior.diagnostics.is_clean() {
        for warning in &posterior.diagnostics.warnings {
            println!("warning: {warning}");
        }
    }

    Ok(())
}
