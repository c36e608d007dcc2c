//! Compute one trip's reimbursement.
//!
//! Prints exactly the amount with two decimals on stdout. Diagnostics and
//! logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use reimburse::rules::{layer_total, Layer};
use reimburse::{env_config, estimate, shared_model, Estimate, ModelState, Trip};

#[derive(Parser, Debug)]
#[command(
    name = "reimburse",
    version,
    about = "Estimate a legacy travel reimbursement"
)]
struct Cli {
    /// Trip duration in whole days
    #[arg(allow_negative_numbers = true)]
    days: String,
    /// Miles traveled
    #[arg(allow_negative_numbers = true)]
    miles: String,
    /// Total receipts amount
    #[arg(allow_negative_numbers = true)]
    receipts: String,
    #[arg(long, help = "Model artifact (overrides REIMBURSE_MODEL_PATH)")]
    model: Option<PathBuf>,
    #[arg(long, help = "Print the rule breakdown and correction to stderr")]
    explain: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_config::init_logging();

    let trip = match Trip::parse(&cli.days, &cli.miles, &cli.receipts) {
        Ok(trip) => trip,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(1);
        }
    };

    let loaded;
    let model: &ModelState = match &cli.model {
        Some(path) => {
            loaded = ModelState::load(path);
            &loaded
        }
        None => shared_model(),
    };

    match estimate(&trip, model) {
        Ok(e) => {
            if cli.explain {
                explain(&e, model);
            }
            println!("{}", e.amount);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    }
}

fn explain(e: &Estimate, model: &ModelState) {
    for (name, amount) in e.breakdown.entries() {
        eprintln!("  {:<28} {:>12}", name, amount);
    }
    for (label, layer) in [
        ("per-diem layer", Layer::PerDiem),
        ("mileage layer", Layer::Mileage),
        ("receipt layer", Layer::Receipts),
        ("efficiency layer", Layer::Efficiency),
        ("special layer", Layer::Special),
    ] {
        eprintln!("  {:<28} {:>12}", label, layer_total(&e.breakdown, layer));
    }
    eprintln!("  {:<28} {:>12}", "base", e.base);
    match model.model() {
        Some(m) => {
            for (i, b) in m.boosters().iter().enumerate() {
                eprintln!(
                    "  booster {}: bias {} learning rate {} trees {} max depth {}",
                    i,
                    b.bias(),
                    b.learning_rate(),
                    b.trees().len(),
                    b.max_depth()
                );
            }
            eprintln!("  {:<28} {:>12}", "raw residual", e.raw_residual);
        }
        None => {
            if let ModelState::Unavailable { reason } = model {
                eprintln!("  model unavailable: {}", reason);
            }
        }
    }
    eprintln!("  {:<28} {:>12}", "correction cap", e.cap);
    eprintln!("  {:<28} {:>12}", "adjustment", e.adjustment);
}
