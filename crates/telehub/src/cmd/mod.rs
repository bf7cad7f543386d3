use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::logging::LogHandle;
use crate::output::OutputFormat;

pub mod doctor;
pub mod run;
pub mod show_settings;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start every configured reader and print decoded frames.
    Run(RunArgs),
    /// Print the effective configuration and exit.
    ShowSettings(ShowSettingsArgs),
    /// Run local environment health checks.
    Doctor(DoctorArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat, logging: Option<&LogHandle>) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format, logging),
        Command::ShowSettings(args) => show_settings::run(args, format),
        Command::Doctor(args) => doctor::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Configuration file (JSON).
    #[arg(long, short = 'c', env = "TELEHUB_CONFIG")]
    pub config: PathBuf,
    /// Exit after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ShowSettingsArgs {
    /// Configuration file (JSON).
    #[arg(long, short = 'c', env = "TELEHUB_CONFIG")]
    pub config: PathBuf,
}

#[derive(Args, Debug, Default)]
pub struct DoctorArgs {
    /// Also check the devices and ports named in this configuration.
    #[arg(long, short = 'c', env = "TELEHUB_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build information.
    #[arg(long)]
    pub extended: bool,
}
