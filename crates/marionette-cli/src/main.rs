//! `marionette` - command-line entry point of the control plane
//!
//! Subcommands:
//! - `simulate`: discover a simulated fleet and run one A/B/n experiment over it
//! - `run`: keep discovery and scheduled experiments going until Ctrl-C
//! - `settings`: print the resolved settings

use anyhow::{Context, Result};
use clap::{crate_version, value_parser, Arg, ArgAction, ArgMatches, Command};
use marionette_abntest::ranking::render_table;
use marionette_abntest::{AbnTestOutcome, ExperimentCancellation, SingleAbnTestResult};
use marionette_core::{ControlPlane, ControlPlaneSettings, Gateways, SimulatedFleet, SimulationConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("marionette")
        .version(crate_version!())
        .about("Runtime behaviour switching and A/B/n experimentation for microservices")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML settings file; environment variables override it"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            fleet_args(Command::new("simulate"))
                .about("Discover a simulated fleet and rank all of its configurations")
                .arg(
                    Arg::new("total-time")
                        .long("total-time")
                        .value_parser(value_parser!(u64))
                        .help("Experiment budget in seconds, overriding the settings"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the stored result as JSON instead of a table"),
                ),
        )
        .subcommand(
            fleet_args(Command::new("run"))
                .about("Run discovery and scheduled experiments against a simulated fleet until Ctrl-C"),
        )
        .subcommand(Command::new("settings").about("Print the resolved settings as JSON"))
}

fn fleet_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("seed")
                .long("seed")
                .default_value("42")
                .value_parser(value_parser!(u64))
                .help("Random seed for reproducibility"),
        )
        .arg(
            Arg::new("services")
                .long("services")
                .default_value("3")
                .value_parser(value_parser!(usize))
                .help("Number of simulated services"),
        )
        .arg(
            Arg::new("methods")
                .long("methods")
                .default_value("2")
                .value_parser(value_parser!(usize))
                .help("Switchable methods per service"),
        )
        .arg(
            Arg::new("behaviours")
                .long("behaviours")
                .default_value("3")
                .value_parser(value_parser!(usize))
                .help("Upper bound of behaviours per method"),
        )
}

fn arg<T: Clone + Send + Sync + 'static>(args: &ArgMatches, name: &str) -> Result<T> {
    args.get_one::<T>(name)
        .cloned()
        .with_context(|| format!("missing --{name}"))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_settings(matches: &ArgMatches) -> Result<ControlPlaneSettings> {
    let path = matches.get_one::<PathBuf>("config");
    ControlPlaneSettings::load(path.map(PathBuf::as_path)).context("loading settings")
}

fn simulated_fleet(args: &ArgMatches) -> Result<Arc<SimulatedFleet>> {
    let config = SimulationConfig {
        seed: arg(args, "seed")?,
        services: arg(args, "services")?,
        methods_per_class: arg(args, "methods")?,
        max_behaviours: arg(args, "behaviours")?,
        ..SimulationConfig::default()
    };
    Ok(Arc::new(SimulatedFleet::generate(&config)?))
}

/// Settings with the simulated metrics filled in when none are configured
fn simulation_settings(mut settings: ControlPlaneSettings) -> ControlPlaneSettings {
    if settings.metrics.queries.is_empty() {
        tracing::info!("No metric queries configured; using the simulated fleet's metrics");
        settings.metrics.queries = SimulatedFleet::metric_queries();
    }
    settings
}

fn print_result(plane: &ControlPlane, result: &SingleAbnTestResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }
    let metrics = plane.settings().metrics_configuration()?;
    println!("Run {} ({})", result.run_id, if result.complete { "complete" } else { "partial" });
    print!("{}", render_table(&metrics, &result.ranking));
    if let Some(best) = result.best() {
        if let Some(sample) = result.metrics_registry.get(best.configuration) {
            println!("\nBest configuration {}:", best.configuration);
            for selection in sample.configuration.selections() {
                println!("  {} -> {}", selection.point(), selection.behaviour());
            }
        }
    }
    Ok(())
}

async fn simulate(matches: &ArgMatches, args: &ArgMatches) -> Result<()> {
    let mut settings = simulation_settings(load_settings(matches)?);
    if let Some(total) = args.get_one::<u64>("total-time") {
        settings.experiment.total_time_secs = *total;
    }
    let fleet = simulated_fleet(args)?;
    let plane = ControlPlane::new(settings, Gateways::simulated(fleet))?;

    let report = plane.discover().await?;
    tracing::info!(services = report.registered.len(), "Fleet discovered");

    let cancel = ExperimentCancellation::new();
    let run = plane.run_experiment(&cancel);
    tokio::pin!(run);
    let outcome = tokio::select! {
        outcome = &mut run => outcome?,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::warn!("Interrupted; keeping the configurations sampled so far");
            cancel.cancel();
            run.await?
        }
    };

    match outcome {
        AbnTestOutcome::Skipped { reason } => println!("Nothing to experiment on: {reason}"),
        AbnTestOutcome::Completed { index, .. } => {
            let result = plane
                .result(index)
                .with_context(|| format!("result {index} missing from storage"))?;
            print_result(&plane, &result, arg(args, "json")?)?;
        }
    }
    Ok(())
}

async fn run(matches: &ArgMatches, args: &ArgMatches) -> Result<()> {
    let settings = simulation_settings(load_settings(matches)?);
    let plane = ControlPlane::new(settings, Gateways::simulated(simulated_fleet(args)?))?;

    let shutdown = ExperimentCancellation::new();
    let tasks = plane.spawn_background(&shutdown);
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    shutdown.cancel();
    tasks.join().await;

    if let Some(result) = plane.latest_result() {
        print_result(&plane, &result, false)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("simulate", args)) => simulate(&matches, args).await,
        Some(("run", args)) => run(&matches, args).await,
        Some(("settings", _)) => {
            let settings = load_settings(&matches)?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
        other => anyhow::bail!("unknown subcommand {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn simulate_defaults() {
        let matches = cli().try_get_matches_from(["marionette", "simulate"]).unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "simulate");
        assert_eq!(arg::<u64>(args, "seed").unwrap(), 42);
        assert_eq!(arg::<usize>(args, "services").unwrap(), 3);
        assert!(args.get_one::<u64>("total-time").is_none());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let matches = cli()
            .try_get_matches_from(["marionette", "run", "--log-json", "--config", "plane.toml"])
            .unwrap();
        assert!(matches.get_flag("log-json"));
        assert_eq!(
            matches.get_one::<PathBuf>("config"),
            Some(&PathBuf::from("plane.toml"))
        );
    }

    #[test]
    fn subcommand_is_required() {
        assert!(cli().try_get_matches_from(["marionette"]).is_err());
    }

    #[test]
    fn simulated_metrics_fill_empty_settings() {
        let settings = simulation_settings(ControlPlaneSettings::default());
        assert_eq!(settings.metrics.queries.len(), 3);
        assert!(settings.metrics_configuration().is_ok());
    }
}
