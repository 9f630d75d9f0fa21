//! Gammou CLI - offline rendering and configuration tools for the gammou
//! synthesizer.

mod commands;
mod patch;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gammou")]
#[command(author, version, about = "Gammou synthesizer CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render notes through the demo patch to a WAV file
    Render(commands::render::RenderArgs),

    /// Show or check synthesizer configuration files
    Config(commands::config::ConfigArgs),

    /// List available circuit nodes
    Nodes(commands::nodes::NodesArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render(args) => commands::render::run(args),
        Commands::Config(args) => commands::config::run(args),
        Commands::Nodes(args) => commands::nodes::run(args),
    }
}
