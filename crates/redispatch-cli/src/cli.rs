use crate::config::ZoneStrategy;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum, ValueHint};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "redispatch", author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the network, market and redispatch models for one network
    Run(RunArgs),
    /// Print size statistics and validation diagnostics of a network folder
    Inspect {
        /// Network folder (CSV tables)
        #[arg(value_hint = ValueHint::DirPath)]
        path: PathBuf,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
        format: OutputFormat,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// Network identifier, a folder below `<FOLDER>/../networks/`
    pub network_id: String,

    /// Working folder; results go to `<FOLDER>/results_redispatch/`
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub folder: PathBuf,

    /// LP solver (overrides the config file)
    #[arg(long)]
    pub solver: Option<String>,

    /// Solver settings preset (overrides the config file)
    #[arg(long)]
    pub settings: Option<String>,

    /// TOML configuration file
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Bidding zones: `country` or `latitude[:<degrees>]`
    #[arg(long)]
    pub zones: Option<ZoneStrategy>,

    /// Bid ramp-up at twice and ramp-down at minus half the marginal cost
    #[arg(long)]
    pub asymmetric_bids: bool,

    /// Summary format
    #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Plain,
    Json,
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}
