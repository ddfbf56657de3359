use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use regionflags_cli::{Replay, Scenario};
use regionflags_core::load_config_or_default;
use tracing_subscriber::filter::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Replay a region flag scenario against an in-memory host")]
struct Cli {
    /// Scenario file (TOML)
    scenario: PathBuf,

    /// Engine config file; overrides the scenario's inline [config]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the final state of every tracked entity
    #[arg(short, long)]
    summary: bool,
}

/// Initialize logging to stderr, INFO unless RUST_LOG says otherwise.
fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let scenario = match Scenario::load(&cli.scenario) {
        Ok(scenario) => scenario,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load scenario");
            return ExitCode::FAILURE;
        }
    };

    let config = match &cli.config {
        Some(path) => load_config_or_default(path),
        None => scenario.config.clone().unwrap_or_default(),
    };

    let mut replay = Replay::new(&scenario, config);
    let reports = replay.run(&scenario);

    let mut out = std::io::stdout().lock();
    let mut lines: Vec<String> = reports.iter().map(ToString::to_string).collect();
    if cli.summary {
        lines.push("final:".to_string());
        lines.extend(replay.final_state().into_iter().map(|line| format!("        {line}")));
    }
    for line in lines {
        if let Err(e) = writeln!(out, "{line}") {
            tracing::error!(error = %e, "Failed to write output");
            return ExitCode::FAILURE;
        }
    }

    tracing::info!(
        steps = scenario.steps.len(),
        tracked = replay.sessions().tracked_count(),
        "Replay finished"
    );
    ExitCode::SUCCESS
}
