//! rremap
//!
//! Inspect weight files, remap fields and look up grid files.
//!
//! Usage:
//! - `rremap inspect MAP`
//! - `rremap apply --map MAP --input DATA --variable NAME --output OUT.json`
//! - `rremap grid NAME [--to DST --method METHOD]`

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use rremap_core::config::RemapConfig;
use rremap_core::dataset::Dataset;
use rremap_core::field::Field;
use rremap_core::grid::{Destination, DestinationGrid};
use rremap_core::remap::{apply_map, remap_along, RemapOutput};
use rremap_core::weights::SparseWeightMatrix;

#[derive(Parser, Debug)]
#[command(name = "rremap")]
#[command(about = "Remap gridded fields with precomputed sparse weights")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Summarise a weight file
    Inspect {
        /// Weight file (.nc, .json or .toml)
        map: PathBuf,
    },
    /// Remap one variable of a dataset
    Apply {
        /// Weight file
        #[arg(long)]
        map: PathBuf,
        /// Dataset holding the source field
        #[arg(long)]
        input: PathBuf,
        /// Variable to remap
        #[arg(long)]
        variable: String,
        /// Field (JSON) whose layout the result should take
        #[arg(long)]
        template: Option<PathBuf>,
        /// Remap each slice along this dimension (e.g. time)
        #[arg(long)]
        along: Option<String>,
        /// Average over this dimension before remapping
        #[arg(long)]
        mean_over: Option<String>,
        /// Output file (JSON)
        #[arg(long)]
        output: PathBuf,
    },
    /// Print the SCRIP file of a registered grid, or a mapping file name
    Grid {
        name: String,
        /// Destination grid of a mapping file
        #[arg(long)]
        to: Option<String>,
        /// Remapping method of a mapping file
        #[arg(long, default_value = "nco")]
        method: String,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<RemapConfig> {
    match path {
        Some(path) => RemapConfig::from_path(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(RemapConfig::default()),
    }
}

fn inspect(map: &Path) -> Result<()> {
    let ds = Dataset::open(map).with_context(|| format!("Failed to open {}", map.display()))?;
    let weights = SparseWeightMatrix::from_dataset(&ds)?;
    let (n_dst, n_src) = weights.shape();

    println!("map:          {}", map.display());
    println!("shape:        {} x {} (dst x src)", n_dst, n_src);
    println!("nnz:          {}", weights.nnz());

    let sums = weights.row_sums();
    if let (Some(min), Some(max)) = (
        sums.iter().copied().reduce(f64::min),
        sums.iter().copied().reduce(f64::max),
    ) {
        println!("row sums:     {:.6} .. {:.6}", min, max);
    }

    match DestinationGrid::from_dataset(&ds)? {
        Some(grid) => {
            let (ny, nx) = grid.shape();
            println!("destination:  {} x {} (lat x lon)", ny, nx);
            if !grid.is_rectilinear(rremap_core::remap::RECTILINEAR_TOLERANCE) {
                println!("              not rectilinear");
            }
        }
        None => println!("destination:  unstructured"),
    }
    Ok(())
}

fn apply(
    map: &Path,
    input: &Path,
    variable: &str,
    template: Option<&Path>,
    along: Option<&str>,
    mean_over: Option<&str>,
    output: &Path,
) -> Result<()> {
    let data = Dataset::open(input).with_context(|| format!("Failed to open {}", input.display()))?;
    let mut field = Field::from(data.variable(variable)?);
    if let Some(dim) = mean_over {
        field = field.mean_over(dim)?;
    }

    let template = match template {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read template {}", path.display()))?;
            Some(serde_json::from_str::<Field>(&text).context("Template is not a valid field")?)
        }
        None => None,
    };

    let out: RemapOutput = match along {
        Some(dim) => {
            if template.is_some() {
                bail!("--template cannot be combined with --along");
            }
            let ds = Dataset::open(map).with_context(|| format!("Failed to open {}", map.display()))?;
            let weights = SparseWeightMatrix::from_dataset(&ds)?;
            remap_along(&field, &weights, dim, &Destination::from_weights(&ds)?)?
        }
        None => apply_map(&field, map, template.as_ref())?,
    };

    info!(shape = ?out.field.shape(), output = %output.display(), "Writing remapped field");
    fs::write(output, serde_json::to_string_pretty(&out)?)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Ok(())
}

fn grid(config: &RemapConfig, name: &str, to: Option<&str>, method: &str) -> Result<()> {
    match to {
        Some(dst) => println!("{}", config.mapping_file(name, dst, method).display()),
        None => println!("{}", config.scrip_grid(name)?.display()),
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Inspect { map } => inspect(&map),
        Commands::Apply {
            map,
            input,
            variable,
            template,
            along,
            mean_over,
            output,
        } => apply(
            &map,
            &input,
            &variable,
            template.as_deref(),
            along.as_deref(),
            mean_over.as_deref(),
            &output,
        ),
        Commands::Grid { name, to, method } => grid(&config, &name, to.as_deref(), &method),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
