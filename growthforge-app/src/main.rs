use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use growthforge_schemas::chemostat::ChemostatParameters;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod config;
mod plotting;
mod workflow;

#[derive(Parser)]
#[command(
    name = "growthforge",
    version,
    about = "Monod growth-curve fitting for plate-reader experiments"
)]
struct Cli {
    /// Log optimizer restarts and other debug output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fit v_max and Km for every selected species and carbon source.
    Fit(FitArgs),
    /// Simulate a chemostat and plot its steady states.
    Chemostat(ChemostatArgs),
}

#[derive(Args)]
struct FitArgs {
    /// Directory holding metadata.csv and measurements.csv.
    #[arg(long)]
    data_dir: PathBuf,

    /// YAML settings file. Defaults are used when omitted.
    #[arg(long)]
    settings: Option<PathBuf>,

    #[arg(long = "project")]
    projects: Vec<String>,

    #[arg(long)]
    species: Vec<String>,

    #[arg(long = "carbon-source")]
    carbon_sources: Vec<String>,

    #[arg(long, default_value = "./data/runs")]
    output: PathBuf,

    /// Seed for the multi-start sampler; overrides the settings file.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args)]
struct ChemostatArgs {
    #[arg(long, default_value_t = 1.0)]
    km: f64,
    #[arg(long, default_value_t = 0.3)]
    v: f64,
    #[arg(long, default_value_t = 0.1)]
    q: f64,
    /// Resource concentration of the inflowing medium.
    #[arg(long, default_value_t = 10.0)]
    supply: f64,
    #[arg(long, default_value_t = 0.1)]
    dilution: f64,
    #[arg(long, default_value_t = 100.0)]
    hours: f64,
    #[arg(long, default_value = "./data/runs")]
    output: PathBuf,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    println!("--- Growthforge ---");

    match cli.command {
        Command::Fit(args) => {
            let request = workflow::FitRequest {
                data_dir: args.data_dir,
                settings: args.settings,
                selection: config::Selection {
                    projects: args.projects,
                    species: args.species,
                    carbon_sources: args.carbon_sources,
                },
                output: args.output,
                seed: args.seed,
            };
            workflow::run_fit(&request)?;
        }
        Command::Chemostat(args) => {
            let params = ChemostatParameters {
                km: args.km,
                v: args.v,
                q: args.q,
                supply: args.supply,
                dilution: args.dilution,
            };
            workflow::run_chemostat(&params, args.hours, &args.output)?;
        }
    }

    Ok(())
}
