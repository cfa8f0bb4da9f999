//! gridquery CLI
//!
//! Command-line interface for inspecting and running grid load requests:
//! - Compile a request into its aggregation pipelines
//! - Run a request against rows from a JSON file
//! - Generate a default config file

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use gridquery::config::{generate_default_config, Config, LoggingConfig};
use gridquery::query::{LoadSpec, QueryExecutor};
use gridquery::store::MemoryCollection;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gridquery")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile data-grid load requests into aggregation pipelines")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the standard locations)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Client timezone offset in minutes (UTC - local), overrides the config
    #[arg(long, global = true, allow_hyphen_values = true)]
    pub timezone_offset: Option<i32>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the pipelines a load request compiles to
    Compile {
        /// Path to the load request (JSON)
        spec: PathBuf,
    },

    /// Run a load request against rows read from a JSON array
    Run {
        /// Path to the load request (JSON)
        spec: PathBuf,
        /// Path to the rows (JSON array of objects)
        #[arg(short, long)]
        data: PathBuf,
        /// Collection name used in diagnostics
        #[arg(long, default_value = "rows")]
        collection: String,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("gridquery={}", logging.level)),
    );

    let (json, pretty) = if logging.format == "json" {
        (
            Some(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)),
            None,
        )
    } else {
        (
            None,
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty)
        .init();
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn read_spec(path: &Path) -> anyhow::Result<LoadSpec> {
    serde_json::from_value(read_json(path)?)
        .with_context(|| format!("Invalid load request in {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(offset) = cli.timezone_offset {
        config.query.timezone_offset = offset;
    }
    init_logging(&config.logging);

    match cli.command {
        Commands::Compile { spec } => {
            let spec = read_spec(&spec)?;
            let options = config.query.context_options();
            let plan = gridquery::query::QueryPlan::build(&spec, &options);
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }

        Commands::Run {
            spec,
            data,
            collection,
        } => {
            let spec = read_spec(&spec)?;
            let Value::Array(rows) = read_json(&data)? else {
                bail!("{} does not hold a JSON array", data.display());
            };

            let store = MemoryCollection::from_values(rows)?.with_name(collection);
            tracing::info!(rows = store.len(), "Loaded rows");

            let executor = QueryExecutor::with_options(Arc::new(store), config.query.context_options());
            let result = executor.load(&spec).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Config written to {}", path.display());
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(())
}
