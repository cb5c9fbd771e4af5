use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use clap::Parser;
use rayon::prelude::*;

use leaf_disease_segment_lib::accelerator;
use leaf_disease_segment_lib::classifier::ClassifierProfile;
use leaf_disease_segment_lib::contours::SeverityProfile;
use leaf_disease_segment_lib::config::Config;
use leaf_disease_segment_lib::errors::{Result, SegmentationError};
use leaf_disease_segment_lib::image_io::{get_image_files_in_dir, load_image};
use leaf_disease_segment_lib::output::{write_summary_csv, SummaryRow};
use leaf_disease_segment_lib::pipeline::{process_image, SegmentationEngine};

/// Command-line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about = "Leaf disease segmentation: rust, scab and healthy tissue")]
struct Args {
    /// Path to input file or directory
    #[clap(short, long)]
    input: Option<String>,

    /// Path to output directory
    #[clap(short, long)]
    output: Option<String>,

    /// Path to configuration file
    #[clap(short, long, default_value = "config.toml")]
    config: String,

    /// Run every stage on the pure backend
    #[clap(long)]
    no_accelerator: bool,

    /// Classifier profile (overwrites config)
    #[clap(short, long, value_enum)]
    profile: Option<ClassifierProfile>,

    /// Lesion severity thresholds (overwrites config)
    #[clap(short, long, value_enum)]
    severity: Option<SeverityProfile>,

    /// Enable debug mode (save masks and overlay, verbose logging)
    #[clap(short, long)]
    debug: bool,
}

fn load_config(args: &Args) -> Result<Config> {
    let path = PathBuf::from(&args.config);
    let mut config = if path.exists() {
        Config::from_file(&path)?
    } else {
        log::warn!("Config file {} not found; using defaults", path.display());
        Config::default()
    };

    if let Some(input) = args.input.clone() {
        config.input_path = input;
    }

    if let Some(output) = args.output.clone() {
        config.output_base_dir = output;
    }

    if let Some(profile) = args.profile {
        config.classifier_profile = profile;
    }

    if let Some(severity) = args.severity {
        config.severity_profile = severity;
    }

    Ok(config)
}

fn build_engine(config: Config, no_accelerator: bool) -> Result<SegmentationEngine> {
    let accelerator = if no_accelerator {
        log::info!("Accelerator disabled from the command line");
        None
    } else {
        let timeout = Duration::from_millis(config.accelerator_timeout_ms);
        accelerator::initialize_blocking(timeout)?.into_backend()
    };

    let engine = SegmentationEngine::new(config, accelerator);
    log::info!("Segmentation backend: {}", engine.backend_name());
    Ok(engine)
}

fn run_one(path: &Path, engine: &SegmentationEngine, debug: bool) -> Result<SummaryRow> {
    log::info!("Processing: {}", path.display());
    let input_image = load_image(path)?;
    process_image(input_image, engine, debug)
}

/// Main function
fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let config = load_config(&args)?;
    config.validate()?;
    config.prepare_paths()?;

    let start_time = Instant::now();
    let output_base = PathBuf::from(&config.output_base_dir);
    let input_path = PathBuf::from(&config.input_path);
    let use_parallel = config.use_parallel;

    let engine = build_engine(config, args.no_accelerator)?;

    let rows = if input_path.is_file() {
        vec![run_one(&input_path, &engine, args.debug)?]
    } else if input_path.is_dir() {
        let image_files = get_image_files_in_dir(&input_path)?;
        log::info!("Found {} image files in {}", image_files.len(), input_path.display());

        let results: Vec<(PathBuf, Result<SummaryRow>)> = if use_parallel {
            image_files
                .par_iter()
                .map(|path| (path.clone(), run_one(path, &engine, args.debug)))
                .collect()
        } else {
            image_files
                .iter()
                .map(|path| (path.clone(), run_one(path, &engine, args.debug)))
                .collect()
        };

        let mut rows = Vec::with_capacity(results.len());
        for (path, result) in results {
            match result {
                Ok(row) => rows.push(row),
                Err(e) => log::error!("Error processing {}: {}", path.display(), e),
            }
        }
        rows
    } else {
        return Err(SegmentationError::InvalidPath(input_path));
    };

    write_summary_csv(&rows, &output_base)?;

    let elapsed = start_time.elapsed();
    log::info!(
        "Processed {} images in {:.2} seconds",
        rows.len(),
        elapsed.as_secs_f64()
    );

    Ok(())
}
