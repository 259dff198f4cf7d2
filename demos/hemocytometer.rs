//! Estimate a slurry's cell concentration from one hemocytometer count.
//!
//! Run with: `cargo run --example hemocytometer -- [squares] [cells] [dilutions]`
//!
//! Defaults to 71 cells in 4 squares after one 1 mL into 9 mL dilution.

use hemocount::prelude::*;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn setup_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .compact()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn arg<T: std::str::FromStr>(index: usize, default: T) -> T {
    std::env::args()
        .nth(index)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn main() -> hemocount::Result<()> {
    setup_logging();
    println!("=== Hemocytometer Cell Count ===\n");

    let config = CountingConfig::default()
        .with_count(arg(1, 4), arg(2, 71))
        .with_dilutions(arg(3, 1), 9.0, 1.0);
    println!(
        "{} cells in {} of {} squares, {} serial dilution(s)",
        config.cells_counted,
        config.squares_counted,
        TOTAL_SQUARES,
        config.number_of_serial_dilutions
    );

    let sampler = SamplerConfig::default().with_seed(42);
    let (posterior, model) = generate_model(&config, &sampler)?;

    println!("\n--- Posterior summaries (95% credible) ---");
    for summary in summarize(&posterior, &[], DEFAULT_CREDIBLE_MASS)? {
        println!("{summary}");
    }

    let concentration = posterior.summary(CONCENTRATION_KEY, DEFAULT_CREDIBLE_MASS)?;
    println!(
        "\nEstimated concentration: {:.3e} cells/mL ({:.3e} .. {:.3e})",
        concentration.mean * 1e9,
        concentration.hdi_lower * 1e9,
        concentration.hdi_upper * 1e9,
    );

    println!("\n--- Posterior histogram of {CONCENTRATION_KEY} ---");
    let histogram = posterior.histogram(CONCENTRATION_KEY, 20)?;
    let peak = histogram.counts.iter().copied().max().unwrap_or(1).max(1);
    for (center, count) in histogram.centers().iter().zip(&histogram.counts) {
        let bar = "#".repeat(count * 50 / peak);
        println!("{center:>10.5} | {bar}");
    }

    println!("\n--- Sampler ---");
    for chain in &posterior.diagnostics.chains {
        println!(
            "chain {}: acceptance {:.2}, step size {:.3}, divergences {}",
            chain.chain, chain.acceptance_rate, chain.step_size, chain.divergences
        );
    }
    for warning in &posterior.diagnostics.warnings {
        println!("warning: {warning}");
    }

    // simulated recount at the posterior mean
    let mut rng = SamplerRng::new(7);
    let replicate = model.simulate_counts(&mut rng, concentration.mean);
    println!("\nReplicate count at the posterior mean: {replicate:?}");

    Ok(())
}
