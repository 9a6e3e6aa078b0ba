//! `geogrid` command-line tool.

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
#[cfg(not(feature = "tracing"))]
use log::LevelFilter;
use serde::Serialize;

use geogrid::spec::{GeometryReport, GridGeometrySpec, WarpFitRequest};

#[derive(Parser)]
#[command(name = "geogrid")]
#[command(version, about = "Grid geometry and polynomial warp utilities", long_about = None)]
struct Cli {
    /// Log debug messages to stderr (overrides GEOGRID_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write the JSON result to this file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive envelope, grid range, resolution and definedness of a grid geometry
    Envelope {
        /// JSON grid geometry description
        spec: PathBuf,
    },
    /// Fit a polynomial warp to point correspondences
    FitWarp {
        /// JSON file with `source`, `destination` and optional `params`
        points: PathBuf,
        /// Polynomial degree (1 to 7), overrides `params.degree`
        #[arg(short, long)]
        degree: Option<usize>,
    },
}

#[cfg(feature = "tracing")]
impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Envelope { .. } => "envelope",
            Commands::FitWarp { .. } => "fit-warp",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    init_logging(cli.verbose)?;
    #[cfg(feature = "tracing")]
    let _span = tracing::info_span!("geogrid", command = cli.command.name()).entered();

    match &cli.command {
        Commands::Envelope { spec } => {
            let spec: GridGeometrySpec = read_json(spec)?;
            let geometry = spec.build()?;
            log::info!("built {geometry}");
            emit(&GeometryReport::from_geometry(&geometry)?, cli.output.as_deref())
        }
        Commands::FitWarp { points, degree } => {
            let mut request: WarpFitRequest = read_json(points)?;
            if let Some(degree) = degree {
                request.params.degree = *degree;
            }
            let (_, report) = request.fit()?;
            log::info!(
                "degree {} warp from {} points, rms residual {:.3e}",
                report.parameters.degree,
                report.points,
                report.rms_residual
            );
            emit(&report, cli.output.as_deref())
        }
    }
}

fn init_logging(verbose: bool) -> Result<(), Box<dyn Error>> {
    #[cfg(feature = "tracing")]
    {
        let _ = verbose;
        geogrid::init_tracing(false);
        Ok(())
    }
    #[cfg(not(feature = "tracing"))]
    {
        if verbose {
            geogrid::core::init_with_level(LevelFilter::Debug)?;
        } else {
            geogrid::core::init_from_env(LevelFilter::Warn)?;
        }
        Ok(())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Box<dyn Error>> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let value =
        serde_json::from_str(&text).map_err(|e| format!("invalid JSON in {}: {e}", path.display()))?;
    Ok(value)
}

fn emit<T: Serialize>(value: &T, output: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            fs::write(path, json)?;
            log::info!("wrote {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
