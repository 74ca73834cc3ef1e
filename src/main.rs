use anyhow::Result;
use clap::Parser;
use std::{
    io::{self, Write},
    process::ExitCode,
};
use tracing::{error, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod detect;
mod engine;
mod errors;
mod loader;
mod models;
mod normalize;
mod processor;
mod summary;
mod traits;
mod writer;

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env(config::LOG_ENV)
                .unwrap_or_else(|_| EnvFilter::new(config::DEFAULT_LOG_FILTER)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn main() -> ExitCode {
    let args = config::Args::parse();
    init_tracing();

    let outcome = run(&args);
    if let Err(err) = &outcome {
        error!(error = %format!("{err:#}"), "reconciliation failed, no output written");
    }

    if args.pause {
        if let Err(err) = wait_for_enter() {
            warn!(error = %err, "could not wait for ENTER");
        }
    }

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

/// Runs one reconciliation and prints its summary; failures are left to the caller to report.
fn run(args: &config::Args) -> Result<()> {
    let engine = engine::Engine::new(
        loader::DirectoryLoader::new(),
        writer::FileExporter::new(args.output_dir.clone()),
        args.insales_dir.clone(),
        args.liquidaciones_dir.clone(),
    );

    let report = engine.run()?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn print_summary(report: &engine::RunReport) {
    let summary = report.summary();
    let elapsed = report.elapsed().as_secs_f64();

    println!(
        "Detected: INSALÉS {} | settlement {}",
        report.variant(),
        report.source()
    );
    println!("Output: {}", report.output().display());
    println!();
    println!("Total records processed: {}", thousands(*summary.total()));
    println!(
        "Matched: {} ({:.2}%)",
        thousands(*summary.matched()),
        summary.match_percentage()
    );
    println!("Not found: {}", thousands(*summary.unmatched()));
    println!(
        "Elapsed: {} min {} s ({elapsed:.2} seconds)",
        (elapsed / 60.0) as u64,
        (elapsed % 60.0) as u64
    );
    println!(
        "Logic applied: INSALÉS {} + {}",
        report.variant(),
        report.source()
    );
}

fn thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn wait_for_enter() -> Result<()> {
    print!("\nPress ENTER to close...");
    io::stdout().flush()?;
    io::stdin().read_line(&mut String::new())?;
    Ok(())
}
