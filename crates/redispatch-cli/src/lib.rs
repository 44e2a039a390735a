pub mod cli;
pub mod config;

pub use cli::{build_cli_command, Cli, Commands, OutputFormat, RunArgs};
pub use config::{load_config, RedispatchConfig, ZoneStrategy};
