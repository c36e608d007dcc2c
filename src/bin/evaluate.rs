//! Score the estimator against labelled historical cases.
//!
//! Reads a JSON array of cases, evaluates them in parallel, and prints exact
//! and close match rates plus the worst offenders.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use reimburse::batch::{parse_cases, score_cases, CLOSE_TOLERANCE, EXACT_TOLERANCE};
use reimburse::{env_config, shared_model, ModelState};

#[derive(Parser, Debug)]
#[command(name = "reimburse-evaluate", version, about = "Score against labelled cases")]
struct Cli {
    /// JSON array of {"input": {...}, "expected_output": ...} cases
    cases: PathBuf,
    #[arg(long, default_value_t = 5, help = "Number of worst cases to show")]
    top: usize,
    #[arg(long, help = "Write the summary as JSON")]
    output: Option<PathBuf>,
    #[arg(long, help = "Model artifact (overrides REIMBURSE_MODEL_PATH)")]
    model: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_config::init_logging();
    let num_threads = env_config::init_rayon_threads_lenient();

    let total_start = Instant::now();

    println!("Loading cases from {}...", cli.cases.display());
    let json = match std::fs::read_to_string(&cli.cases) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to read {}: {}", cli.cases.display(), e);
            return ExitCode::from(1);
        }
    };
    let cases = match parse_cases(&json) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to parse cases: {}", e);
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
    match model {
        ModelState::Ready(m) => println!(
            "  Residual model: {} booster(s), {} trees",
            m.boosters().len(),
            m.tree_count()
        ),
        ModelState::Unavailable { reason } => println!("  Residual model unavailable: {}", reason),
    }

    println!("Scoring {} cases (threads={})...", cases.len(), num_threads);
    let score_start = Instant::now();
    let summary = score_cases(&cases, model, cli.top);
    println!("  Done in {:.2}s", score_start.elapsed().as_secs_f64());

    println!();
    println!("  Cases:         {}", summary.total);
    println!("  Rejected:      {}", summary.rejected);
    println!(
        "  Exact (±{}): {} ({:.1}%)",
        EXACT_TOLERANCE,
        summary.exact,
        summary.exact_ratio() * 100.0
    );
    println!(
        "  Close (±{}): {} ({:.1}%)",
        CLOSE_TOLERANCE,
        summary.close,
        summary.close_ratio() * 100.0
    );
    println!("  Average error: ${}", summary.average_error);
    println!("  Max error:     ${}", summary.max_error);

    if !summary.worst.is_empty() {
        println!();
        println!("  Worst cases:");
        for r in &summary.worst {
            println!(
                "    #{:<5} {:>3}d {:>8}mi ${:>9}  expected {:>9}  got {:>9}  err {}",
                r.index, r.trip.days, r.trip.miles, r.trip.receipts, r.expected, r.actual, r.error
            );
        }
    }

    if let Some(path) = &cli.output {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    eprintln!("Failed to create {}: {}", parent.display(), e);
                    return ExitCode::from(1);
                }
            }
        }
        let written = serde_json::to_string_pretty(&summary)
            .map_err(|e| e.to_string())
            .and_then(|s| std::fs::write(path, s).map_err(|e| e.to_string()));
        if let Err(e) = written {
            eprintln!("Failed to write {}: {}", path.display(), e);
            return ExitCode::from(1);
        }
        println!("\nResults saved to {}", path.display());
    }

    println!("\nTotal time: {:.2}s", total_start.elapsed().as_secs_f64());
    ExitCode::SUCCESS
}
