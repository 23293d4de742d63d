//! Cadenza CLI - play or render Standard MIDI Files through a software graph.

mod commands;
mod config;
mod report;

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cadenza")]
#[command(author, version, about = "Cadenza MIDI sequence player", long_about = None)]
struct Cli {
    /// Configuration file (default: <config dir>/cadenza/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a MIDI file through the audio device
    Play(commands::play::PlayArgs),

    /// Render a MIDI file to an audio file
    Render(commands::render::RenderArgs),

    /// Print a MIDI file's tracks and playback graph
    Info(commands::info::InfoArgs),

    /// List audio output devices
    Devices(commands::devices::DevicesArgs),
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = config::Config::load(cli.config.as_deref())?;
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Play(args) => commands::play::run(args, &config),
        Commands::Render(args) => commands::render::run(args, &config),
        Commands::Info(args) => commands::info::run(args),
        Commands::Devices(args) => commands::devices::run(args),
    }
}
