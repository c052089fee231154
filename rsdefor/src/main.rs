//! rsdefor CLI - NDVI change detection for deforestation alerts

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use rsdefor::export::{preview_url, save_geojson};
use rsdefor::{
    BoundingBox, Deforestation, HttpProcessingService, PipelineConfig, ServiceContext, TimeWindows,
};

#[derive(Parser)]
#[command(name = "rsdefor")]
#[command(
    author,
    version,
    about = "NDVI change detection for deforestation alerts",
    long_about = None
)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Pipeline configuration (JSON); defaults apply to missing fields
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the before/after windows for the current instant
    Windows,
    /// Run change detection on the remote service and write GeoJSON
    Detect {
        /// Bounding box: min_lon min_lat max_lon max_lat
        #[arg(
            required = true,
            num_args = 4,
            value_names = ["MIN_LON", "MIN_LAT", "MAX_LON", "MAX_LAT"],
            allow_negative_numbers = true
        )]
        bbox: Vec<f64>,
        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output file name without extension
        #[arg(short, long, default_value = "deforestation")]
        name: String,
        /// Request timeout in seconds; no deadline when omitted
        #[arg(long)]
        timeout: Option<u64>,
        /// Print a geojson.io preview link
        #[arg(long)]
        preview: bool,
    },
}

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")
}

fn spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .context("invalid spinner template")?,
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Windows => {
            let windows = TimeWindows::from_config(Utc::now(), &config);
            println!("before: {}", windows.before);
            println!("after:  {}", windows.after);
        }

        Commands::Detect {
            bbox,
            output,
            name,
            timeout,
            preview,
        } => {
            let &[min_lon, min_lat, max_lon, max_lat] = bbox.as_slice() else {
                bail!("Expected 4 bounding box values, got {}", bbox.len());
            };
            let area = BoundingBox::try_new(min_lon, min_lat, max_lon, max_lat)
                .context("Invalid bounding box")?;

            let mut context =
                ServiceContext::from_env().context("Failed to read service credentials")?;
            if let Some(secs) = timeout {
                context = context.with_timeout(Duration::from_secs(secs));
            }
            let service =
                HttpProcessingService::new(context).context("Failed to create service client")?;
            let pipeline = Deforestation::new(config, service)?;

            let start = Instant::now();
            let pb = spinner("Waiting for the processing service...")?;
            let result = pipeline.detect(area, Utc::now());
            pb.finish_and_clear();
            let (windows, features) = result.context("Change detection failed")?;
            info!(before = %windows.before, after = %windows.after, "compared windows");

            let path = save_geojson(&features, output.as_deref(), Some(&name))?;
            println!("{} change region(s) saved to: {}", features.len(), path.display());
            println!("  Processing time: {:.2?}", start.elapsed());
            if preview {
                println!("  Preview: {}", preview_url(&features));
            }
        }
    }

    Ok(())
}
