//! sparsecube CLI - Dataset inspection
//!
//! Loads a JSON dataset document, validates it and runs one query or edit,
//! printing the result as JSON.

mod document;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use document::{DatasetDocument, DenseView, StructureView, parse_mask, parse_values};
use serde::Serialize;
use sparsecube_common::{Config, Error, parse_query};
use sparsecube_store::Selection;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "sparsecube-cli")]
#[command(about = "sparsecube dataset inspection CLI")]
#[command(version)]
struct Args {
    /// Dataset document (JSON)
    #[arg(short, long, env = "SPARSECUBE_INPUT")]
    input: PathBuf,

    /// Configuration file path (TOML)
    #[arg(short, long, env = "SPARSECUBE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level; overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Do not link new objects to the preceding metadata record
    #[arg(long)]
    no_auto_link: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print axes, objects and metadata
    Summary,
    /// Positional lookup, e.g. `0,-,2`
    Get {
        /// One position or `-` per axis
        query: String,
    },
    /// Value-based lookup, e.g. `77,-`
    Slice {
        /// One label per axis; unknown labels match the whole axis
        values: String,
    },
    /// Drop positions along one axis
    Remove {
        /// Axis number
        #[arg(short, long)]
        axis: usize,
        /// Keep mask, e.g. `1,0,1`
        #[arg(short, long)]
        keep: String,
    },
    /// Sum consecutive runs of objects
    Sum {
        /// Run length
        #[arg(short, long)]
        increment: usize,
        /// Average the linked metadata of each run into one record
        #[arg(long)]
        sum_metadata: bool,
    },
    /// Materialise the dense array
    Dense,
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::Configuration(format!("{}: {e}", path.display())))?;
    let config = toml::from_str(&raw)
        .map_err(|e| Error::Configuration(format!("{}: {e}", path.display())))?;
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Merge CLI args with config file (CLI takes precedence)
    let mut config = load_config(args.config.as_ref())?;
    if args.no_auto_link {
        config.store.add_meta_auto = false;
    }
    let log_level = args.log_level.unwrap_or(config.logging.level);

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Loading dataset from {}", args.input.display());
    debug!("Store config: {:?}", config.store);

    let raw = std::fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let document: DatasetDocument = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", args.input.display()))?;
    let mut ds = document.build(config.store)?;

    match args.command {
        Commands::Summary => print_json(&StructureView::new(&ds)?)?,
        Commands::Get { query } => {
            let query = parse_query(&query)?;
            match ds.get(&query)? {
                Selection::Block(block) => print_json(block)?,
                Selection::Reduced(reduced) => print_json(&StructureView::new(&reduced)?)?,
            }
        }
        Commands::Slice { values } => {
            let slice = ds.get_slice(&parse_values(&values))?;
            print_json(&StructureView::new(slice)?)?;
        }
        Commands::Remove { axis, keep } => {
            let copy = ds.remove_from_axis(axis, &parse_mask(&keep)?)?;
            print_json(&StructureView::new(&copy)?)?;
        }
        Commands::Sum {
            increment,
            sum_metadata,
        } => {
            ds.sum_in_order(increment, sum_metadata)?;
            print_json(&StructureView::new(&ds)?)?;
        }
        Commands::Dense => print_json(&DenseView::new(&ds)?)?,
    }

    Ok(())
}
