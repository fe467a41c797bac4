//! `trailhead` command-line entry point.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use trailhead::App;
use trailhead_config::{ConfigLoader, TrailheadConfig, DEFAULT_ENV_PREFIX};
use trailhead_core::DeploymentMode;
use trailhead_server::ShutdownSignal;

#[derive(Parser)]
#[command(name = "trailhead")]
#[command(about = "Campsite booking API server", version, long_about = None)]
struct Cli {
    /// Preset to start from before the file and environment are applied.
    #[arg(short, long, global = true)]
    environment: Option<DeploymentMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// TOML or JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Insert the demo users before serving
        #[arg(long)]
        seed_demo_users: bool,

        /// JSON snapshot of bookings to serve
        #[arg(long)]
        bookings: Option<PathBuf>,
    },
    /// Validate configuration and print the effective values
    CheckConfig {
        /// TOML or JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load_config(environment: Option<DeploymentMode>, path: Option<&Path>) -> anyhow::Result<TrailheadConfig> {
    let mut loader = match environment {
        Some(mode) => ConfigLoader::new().with_mode(mode),
        None => ConfigLoader::new().with_defaults(),
    };
    if let Some(path) = path {
        loader = loader.with_file(path)?;
    }
    let config = loader
        .with_dotenv()?
        .with_env_prefix(DEFAULT_ENV_PREFIX)
        .load()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            seed_demo_users,
            bookings,
        } => {
            let config = load_config(cli.environment, config.as_deref())?;
            let app = App::new(config);
            let metrics = app.init_telemetry()?;

            if seed_demo_users {
                let inserted = app.seed_demo_users()?;
                tracing::info!(inserted, "seeded demo users");
            }
            if let Some(path) = bookings {
                let loaded = app.state().load_bookings_file(&path)?;
                tracing::info!(loaded, path = %path.display(), "loaded bookings");
            }

            tracing::info!(
                environment = %app.mode(),
                addr = %app.config().server.http_addr,
                "starting trailhead"
            );
            app.into_server()?
                .with_metrics(metrics)
                .run_with_shutdown(ShutdownSignal::with_os_signals())
                .await?;
        }
        Commands::CheckConfig { config } => {
            let config = load_config(cli.environment, config.as_deref())?;
            let rendered = toml::to_string_pretty(&config).context("failed to render configuration")?;
            println!("{rendered}");
        }
    }

    Ok(())
}
