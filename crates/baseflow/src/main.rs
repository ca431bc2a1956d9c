mod commands;
mod docker;

use baseflow_build::{BuildError, BuildOptions};
use baseflow_config::Settings;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "baseflow")]
#[command(about = "Build, track and publish Docker base images", long_about = None)]
struct Cli {
    /// Root of the base-images repository (default: current directory)
    #[arg(long, global = true, env = "BASEFLOW_ROOT")]
    root: Option<PathBuf>,

    /// Organization prefix for image repositories (overrides the settings file)
    #[arg(long, global = true, env = "BASEFLOW_ORG")]
    org: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build all base images, or a single one
    Build {
        /// Image directory name (all images when omitted)
        image: Option<String>,
        /// Stream build output to the console
        #[arg(short, long)]
        verbose: bool,
        /// Do not use the Docker build cache
        #[arg(long)]
        no_cache: bool,
        /// Commit hash for the tag suffix instead of the repository HEAD
        #[arg(long, value_name = "HASH")]
        commit: Option<String>,
    },
    /// Push built images that have not been published yet
    Publish {
        /// Full image tag to publish (all unpublished tags when omitted)
        tag: Option<String>,
        /// Stream push output to the console
        #[arg(short, long)]
        verbose: bool,
    },
    /// Show tracked images and whether they are published
    Status,
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!();
        match e.downcast_ref::<BuildError>() {
            Some(build_err) => {
                eprintln!("{} {}", "Error:".red().bold(), build_err.user_message())
            }
            None => eprintln!("{} {:#}", "Error:".red().bold(), e),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Build {
            image,
            verbose,
            no_cache,
            commit,
        } => {
            let settings = load_settings(cli.root, cli.org)?;
            commands::build::handle(&settings, image, BuildOptions { verbose, no_cache }, commit)
                .await?;
        }
        Commands::Publish { tag, verbose } => {
            let settings = load_settings(cli.root, cli.org)?;
            commands::publish::handle(&settings, tag, verbose).await?;
        }
        Commands::Status => {
            let settings = load_settings(cli.root, cli.org)?;
            commands::status::handle(&settings).await?;
        }
        Commands::Version => {
            println!("baseflow {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn load_settings(root: Option<PathBuf>, org: Option<String>) -> anyhow::Result<Settings> {
    let root = match root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    let mut settings = Settings::load(&root)?;
    if let Some(org) = org {
        settings = settings.with_organization(org)?;
    }
    if let Some(source) = &settings.source {
        tracing::debug!("Settings loaded from {}", source.display());
    }
    Ok(settings)
}
