#![forbid(unsafe_code)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rating_harness::config::RunConfig;
use rating_harness::gateway::{nanos_to_usd, Provider};
use rating_harness::prompts::PRESETS;

#[derive(Parser)]
#[command(name = "rating-harness", version, about = "Repeated LLM ratings of images and text")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rate every stimulus described by a JSON run config
    Run {
        #[arg(long)]
        config: PathBuf,
        /// Overrides the config's output CSV path
        #[arg(long)]
        out: Option<PathBuf>,
        /// Write one JSON line per judged completion
        #[arg(long)]
        trace: Option<PathBuf>,
        /// Write the run manifest as JSON
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
    /// List built-in prompt presets
    Presets,
    /// List supported providers
    Providers,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            out,
            trace,
            manifest,
        } => {
            let mut config = RunConfig::load(config)?;
            if let Some(out) = out {
                config.output = out;
            }
            if trace.is_some() {
                config.trace = trace;
            }
            if manifest.is_some() {
                config.manifest = manifest;
            }
            let manifest = rating_harness::run(&config).await?;
            let summary = &manifest.summary;
            println!(
                "rated {}/{} stimuli; {} provider calls; ${:.4}; wrote {}",
                summary.successful,
                summary.stimuli,
                manifest.usage.calls,
                nanos_to_usd(manifest.usage.cost_nanodollars),
                manifest.output.display()
            );
        }
        Commands::Presets => {
            for preset in PRESETS {
                println!(
                    "{}\t{}\t{}",
                    preset.slug, preset.scale, preset.description
                );
            }
        }
        Commands::Providers => {
            for provider in Provider::ALL {
                println!(
                    "{}\t{}\t{}",
                    provider,
                    provider.default_base_url().unwrap_or("(base_url required)"),
                    provider.api_key_env()
                );
            }
        }
    }

    Ok(())
}
