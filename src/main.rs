//! lip-gait — steady-state walking and perturbation trials for the two-axis
//! LIP stepping model.
//!
//! Walks the baseline gait to steady state, optionally forks it into one trial
//! per configured velocity perturbation, and writes every selected step as a
//! JSON report.
//!
//! Usage:
//!   lip-gait [--config gait_config.json] [--perturb] [--output report.json]

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

use lip_gait::{
    run_trials, Diagnostics, GaitConfig, GaitSummary, PerturbationTrial, SampleStore, Simulator,
};

/// Two-axis linear inverted pendulum walking model.
#[derive(Parser, Debug)]
#[command(name = "lip-gait")]
#[command(about = "Energy-optimal foot placement for a two-axis LIP walker")]
struct Args {
    /// Path to the gait configuration JSON file.
    #[arg(long, default_value = "./gait_config.json")]
    config: PathBuf,

    /// Steady-state steps (overrides the config).
    #[arg(short = 'n', long)]
    steps: Option<usize>,

    /// Steps walked after each perturbation (overrides the config).
    #[arg(long)]
    post_steps: Option<usize>,

    /// Fork the steady-state gait into one trial per perturbation magnitude.
    #[arg(long, default_value_t = false)]
    perturb: bool,

    /// Keep every per-candidate cost curve of the baseline run.
    #[arg(long, default_value_t = false)]
    record_landscapes: bool,

    /// Write the JSON report here instead of stdout.
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
struct Report<'a> {
    config: &'a GaitConfig,
    baseline: &'a SampleStore,
    baseline_summary: Option<GaitSummary>,
    diagnostics: Diagnostics,
    trials: Vec<PerturbationTrial>,
}

fn main() -> Result<()> {
    // Initialize structured JSON logging
    tracing_subscriber::fmt()
        .json()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = GaitConfig::load(&args.config).context("Failed to load gait config")?;
    if let Some(steps) = args.steps {
        config.n_step_steady_state = steps;
    }
    if let Some(steps) = args.post_steps {
        config.n_step_post_perturbation = steps;
    }
    if args.record_landscapes {
        config.record_landscapes = true;
    }

    tracing::info!(
        gain_swing_ap = config.gains.swing_ap,
        gain_swing_ml = config.gains.swing_ml,
        gain_sts = config.gains.sts,
        gain_ankle_ap = config.gains.ankle_ap,
        gain_ankle_ml = config.gains.ankle_ml,
        "Cost gains"
    );

    // ── Steady-state gait ──

    let mut baseline = Simulator::new(config.clone(), config.cop_modulation_steady_state)
        .context("Failed to build simulator")?;
    baseline
        .run(config.n_step_steady_state)
        .context("Steady-state walk failed")?;

    let summary = baseline.samples().summary();
    if let Some(summary) = &summary {
        tracing::info!(
            step_length = summary.mean_step_length,
            step_width = summary.mean_step_width,
            swing_time = summary.mean_swing_time,
            forward_velocity = summary.mean_forward_velocity,
            "Steady-state gait"
        );
    }

    // ── Perturbation trials ──

    let trials = if args.perturb {
        run_trials(
            &baseline,
            config.perturbation.axis,
            &config.perturbation.magnitudes,
            config.n_step_post_perturbation,
            config.cop_modulation_perturbation,
        )
        .context("Perturbation trials failed")?
    } else {
        Vec::new()
    };

    let report = Report {
        config: &config,
        baseline: baseline.samples(),
        baseline_summary: summary,
        diagnostics: baseline.diagnostics(),
        trials,
    };

    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            tracing::info!("Report written to {}", path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}
