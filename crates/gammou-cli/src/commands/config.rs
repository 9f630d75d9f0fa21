//! Configuration inspection commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use gammou_config::SynthConfig;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show {
        /// Configuration file; defaults are shown when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Validate a configuration file
    Check {
        /// Configuration file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Write the default configuration to a file
    Init {
        /// Destination file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn run(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommand::Show { config } => {
            let config = match config {
                Some(path) => SynthConfig::load(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => SynthConfig::default(),
            };
            print!("{}", config.to_toml()?);
        }
        ConfigCommand::Check { file } => {
            let config = SynthConfig::load(&file)
                .with_context(|| format!("checking {}", file.display()))?;
            println!(
                "{}: OK ({} voices, {} Hz, {} in / {} out)",
                file.display(),
                config.voice_count,
                config.sample_rate,
                config.input_count,
                config.output_count
            );
        }
        ConfigCommand::Init { file, force } => {
            if file.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", file.display());
            }
            SynthConfig::default().save(&file)?;
            println!("Wrote default configuration to {}", file.display());
        }
    }
    Ok(())
}
