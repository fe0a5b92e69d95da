use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use payment_monitor::config::Config;
use payment_monitor::generator;
use payment_monitor::server::McpServer;
use payment_monitor::store::DataStore;

#[derive(Parser, Debug)]
#[command(
    name = "payment-monitor",
    about = "Health scoring and anomaly detection server for payment monitoring data"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Directory containing the JSON data files (overrides config)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Validate config and data files, then exit
    #[arg(long)]
    check: bool,

    /// Print version and exit
    #[arg(short, long)]
    version: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate synthetic monitoring data sets
    Generate {
        /// Directory to write the data files into
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Number of days to cover
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
}

#[tokio::main(worker_threads = 2)]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("payment-monitor {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(dir) = cli.data_dir {
        config.agent.data_dir = dir;
    }

    init_logging(&config)?;

    if let Some(Command::Generate { output_dir, days }) = cli.command {
        generator::generate(&output_dir, days)?;
        return Ok(());
    }

    let store = DataStore::new(config.agent.data_dir.clone());

    if cli.check {
        store.verify()?;
        println!("Configuration and data files are valid.");
        return Ok(());
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %store.data_dir().display(),
        "Starting payment monitoring server"
    );

    let server = McpServer::new(&config, store);
    if let Err(e) = server.run().await {
        error!(error = %e, "Server terminated with error");
        return Err(e);
    }

    Ok(())
}

fn init_logging(config: &Config) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.agent.log_level));

    // Logs go to stderr; stdout carries the JSON-RPC stream.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    Ok(())
}
