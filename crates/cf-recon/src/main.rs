//! `cf-recon`: reconstruct a textured mesh from a point-cloud scan.
//!
//! ```text
//! cf-recon scan.ply --output out --seed 42
//! cf-recon scan.csv --config recon.json --alpha 0.03 --no-diagnostics
//! ```
//!
//! Writes `<output>/<basename>.{obj,mtl,png}`, stores intermediate clouds
//! under `<diagnostics-dir>/<run id>/` unless `--no-diagnostics` is given,
//! and prints the model record as JSON on stdout.

use std::path::PathBuf;

use anyhow::{Context, Result};
use cf_recon::{FsPointCloudStore, ReconConfig, Reconstructor};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Scan-to-textured-mesh reconstruction
#[derive(Parser)]
#[command(name = "cf-recon")]
#[command(about = "Reconstruct a textured mesh from a point-cloud scan", long_about = None)]
#[command(version)]
struct Cli {
    /// Input point cloud (.ply, .xyz or .csv)
    #[arg(name = "INPUT")]
    input: PathBuf,

    /// Display name of the model (defaults to the input file stem)
    #[arg(long)]
    name: Option<String>,

    /// Directory for the exported OBJ, MTL and PNG
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// JSON configuration file; missing fields take their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fixed alpha for triangulation instead of the adaptive one
    #[arg(long)]
    alpha: Option<f64>,

    /// Seed for every random stage
    #[arg(long)]
    seed: Option<u64>,

    /// Directory for intermediate clouds
    #[arg(long, default_value = "diagnostics")]
    diagnostics_dir: PathBuf,

    /// Do not store intermediate clouds
    #[arg(long)]
    no_diagnostics: bool,

    /// Log at debug level (RUST_LOG still wins when set)
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => ReconConfig::from_json_file(path)?,
        None => ReconConfig::default(),
    };
    if cli.alpha.is_some() {
        config = config.with_alpha(cli.alpha);
    }
    if cli.seed.is_some() {
        config = config.with_seed(cli.seed);
    }

    let name = cli.name.clone().unwrap_or_else(|| {
        cli.input
            .file_stem()
            .map_or_else(|| "model".to_string(), |s| s.to_string_lossy().into_owned())
    });

    let store = FsPointCloudStore::new(&cli.diagnostics_dir);
    let mut reconstructor = Reconstructor::new(config);
    if !cli.no_diagnostics {
        reconstructor = reconstructor.with_store(&store);
    }

    let result = reconstructor
        .run_file(&cli.input, &name, &cli.output)
        .with_context(|| format!("reconstruction of {} failed", cli.input.display()))?;

    eprintln!("{result}");
    println!("{}", serde_json::to_string_pretty(&result.model)?);
    Ok(())
}
