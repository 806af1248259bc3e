use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod error;
mod runner;
mod scenario;

use error::CliResult;
use scenario::Scenario;

#[derive(Parser)]
#[command(name = "nl-cli")]
#[command(about = "nodelink CLI - node-link network scenario runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a scenario and initialize every link without stepping
    Validate {
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
    },
    /// Run major steps and print a JSON report
    Run {
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
        /// Major steps to run (overrides the scenario)
        #[arg(long)]
        steps: Option<usize>,
        /// Step size (overrides the scenario)
        #[arg(long)]
        dt: Option<f64>,
        /// Pretty-print the report
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> CliResult<()> {
    // Logs go to stderr so stdout stays clean JSON.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { scenario_path } => cmd_validate(&scenario_path),
        Commands::Run {
            scenario_path,
            steps,
            dt,
            pretty,
        } => cmd_run(&scenario_path, steps, dt, pretty),
    }
}

fn load(path: &Path) -> CliResult<Scenario> {
    let text = std::fs::read_to_string(path)?;
    Scenario::from_yaml(&text)
}

fn cmd_validate(scenario_path: &Path) -> CliResult<()> {
    println!("Validating scenario: {}", scenario_path.display());
    let scenario = load(scenario_path)?;
    let network = scenario.build()?;
    println!(
        "✓ Scenario is valid ({} nodes, {} links)",
        network.nodes().num_nodes(),
        network.links().count()
    );
    Ok(())
}

fn cmd_run(
    scenario_path: &Path,
    steps: Option<usize>,
    dt: Option<f64>,
    pretty: bool,
) -> CliResult<()> {
    let scenario = load(scenario_path)?;
    let steps = steps.unwrap_or(scenario.run.steps);
    let dt = dt.unwrap_or(scenario.run.dt);

    let output = runner::run(&scenario, steps, dt)?;
    let json = if pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{json}");
    Ok(())
}
