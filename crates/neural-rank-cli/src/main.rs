//! CLI for the neural-rank experiments

use anyhow::Context;
use clap::Parser;
use colored::*;
use neural_rank::config::{ExperimentConfig, Mode};
use neural_rank::trial::{
    DeterministicReport, ExperimentReport, MonteCarloReport, RankComparison, TrialDriver,
    TruthReport,
};
use neural_rank::types::MeanDistances;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "neural-rank", version)]
#[command(
    about = "Compare nonlinear fixed-point node rankings against PageRank",
    long_about = None
)]
struct Cli {
    /// Train the matrix toward A·Aᵀ ≈ I, write the cost curve, then rank the trained matrix.
    /// Training usually drives some weights negative; the trained matrix is then not ranked
    /// and the report says why.
    #[arg(long)]
    truth: bool,

    /// JSON experiment configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed of the Monte Carlo campaign
    #[arg(long)]
    seed: Option<u64>,

    /// Number of Monte Carlo trials
    #[arg(short, long)]
    trials: Option<usize>,

    /// Evaluate trials on all cores
    #[arg(long)]
    parallel: bool,

    /// Where the truth run writes its cost curve
    #[arg(long, default_value = "cost.json")]
    cost_out: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

impl Cli {
    fn experiment_config(&self) -> anyhow::Result<ExperimentConfig> {
        let mut config = match &self.config {
            Some(path) => ExperimentConfig::from_json_file(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => ExperimentConfig::default(),
        };
        if self.truth {
            config.mode = Mode::Truth;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(trials) = self.trials {
            config.trials = trials;
        }
        if self.parallel {
            config.parallel = true;
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = cli.experiment_config()?;
    tracing::debug!(?config, "effective configuration");
    let driver = TrialDriver::new(config).context("invalid experiment configuration")?;

    let start = Instant::now();
    let report = driver.run()?;

    if let ExperimentReport::Truth(truth) = &report {
        truth
            .training
            .write_cost_curve(&cli.cost_out)
            .with_context(|| format!("writing cost curve to {}", cli.cost_out.display()))?;
        tracing::info!(path = %cli.cost_out.display(), "cost curve written");
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match &report {
        ExperimentReport::Experiment {
            deterministic,
            monte_carlo,
        } => {
            print_deterministic(deterministic);
            print_monte_carlo(monte_carlo);
        }
        ExperimentReport::Truth(truth) => print_truth(truth, &cli.cost_out),
    }
    println!(
        "{} Finished in {:.2}s",
        "✓".green().bold(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Text output
// ---------------------------------------------------------------------------

fn print_matrix(values: &[f32], size: usize) {
    for row in values.chunks(size) {
        let cells: Vec<String> = row.iter().map(|v| format!("{v:9.6}")).collect();
        println!("    {}", cells.join(" "));
    }
}

fn print_comparison(label: &str, cmp: &RankComparison) {
    println!("  {}", label.cyan().bold());
    println!("    {:<12} {}", "pagerank", cmp.baseline);
    println!("    {:<12} {}", "middle", cmp.middle);
    println!("    {:<12} {}", "fixed point", cmp.fixed_point);
    println!(
        "    {:<12} middle={} fixed_point={}",
        "distance",
        cmp.distances.middle.to_string().yellow(),
        cmp.distances.fixed_point.to_string().yellow()
    );
    println!(
        "    {:<12} {} iterations, loss {:.3e}{}",
        "search",
        cmp.iterations,
        cmp.final_loss,
        if cmp.converged { " (converged)" } else { "" }
    );
}

fn print_deterministic(report: &DeterministicReport) {
    println!(
        "{} Deterministic comparison on the baseline graph",
        "→".green().bold()
    );
    print_comparison("real", &report.real);
    print_comparison("complex", &report.complex);
    println!("  {}", "complex fixed point (|z|, phase)".cyan().bold());
    for (node, p) in report.complex_scores.iter().enumerate() {
        println!("    {node}: {:.6} {:+.6}", p.magnitude, p.phase);
    }
}

fn format_mean(mean: Option<MeanDistances>) -> String {
    match mean {
        Some(m) => format!("middle={:.4} fixed_point={:.4}", m.middle, m.fixed_point),
        None => "no contributing trials".red().to_string(),
    }
}

fn print_monte_carlo(report: &MonteCarloReport) {
    println!(
        "{} Monte Carlo campaign: {} trials, seed {}{}",
        "→".green().bold(),
        report.trials,
        report.seed,
        if report.parallel { ", parallel" } else { "" }
    );
    println!("  {:<8} {}", "real".cyan().bold(), format_mean(report.real_mean));
    println!("  {:<8} {}", "complex".cyan().bold(), format_mean(report.complex_mean));
    if !report.failures.is_empty() {
        println!(
            "  {} {} trials failed",
            "!".yellow().bold(),
            report.failures.len()
        );
        for f in &report.failures {
            println!("    trial {}: {}", f.trial, f.error);
        }
    }
}

fn print_truth(report: &TruthReport, cost_out: &std::path::Path) {
    let t = &report.training;
    println!(
        "{} Self-consistency training: {} epochs, final cost {:.6}{}",
        "→".green().bold(),
        t.iterations,
        t.history.last().map_or(f64::NAN, |h| h.loss),
        if t.converged { " (converged)" } else { "" }
    );
    println!("  {}", "initial".cyan().bold());
    print_matrix(&t.initial, t.size);
    println!("  {}", "trained".cyan().bold());
    print_matrix(&t.trained, t.size);
    println!("  {}", "A·A'ᵀ".cyan().bold());
    print_matrix(&t.product, t.size);
    println!("  cost curve written to {}", cost_out.display());

    match (&report.comparison, &report.comparison_error) {
        (Some(cmp), _) => print_comparison("real (trained matrix)", cmp),
        (None, Some(err)) => println!(
            "  {} trained matrix could not be ranked: {}",
            "!".yellow().bold(),
            err
        ),
        (None, None) => {}
    }
}
