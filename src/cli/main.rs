//! Background Removal CLI Tool
//!
//! Command-line interface that feeds files and directories through the
//! batch runner and writes `<stem>_bg_removed.<ext>` next to each input or
//! into an output directory.

use super::config::CliConfigBuilder;
use crate::{
    batch::{BatchItem, BatchJob, BatchRunner},
    config::OutputFormat,
    services::{
        BatchItemEvent, BatchProgressUpdate, ImageIOService, OutputFormatHandler, ProcessingStage,
        ProgressReporter, ProgressUpdate,
    },
    tracing_config::{init_cli_tracing, spans},
    types::{BatchResult, ProcessingTimings},
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use instant::Instant;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, Instrument};

/// Heuristic background removal CLI tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "heuristic-bgremove")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input image files or directories
    #[arg(value_name = "INPUT", required = true)]
    pub input: Vec<String>,

    /// Output file (single input) or directory (several inputs)
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = CliOutputFormat::Png)]
    pub format: CliOutputFormat,

    /// Removal tolerance (0-100); higher values remove less
    #[arg(short, long, default_value_t = crate::config::DEFAULT_TOLERANCE,
          value_parser = clap::value_parser!(u8).range(0..=100))]
    pub tolerance: u8,

    /// Keep hard mask edges instead of feathering them
    #[arg(long)]
    pub no_feather: bool,

    /// Keep dark bright-looking pixels that are not part of a uniform area
    #[arg(long)]
    pub preserve_shadows: bool,

    /// Accepted for compatibility; has no effect
    #[arg(long)]
    pub auto_enhance: bool,

    /// JPEG quality (1-100)
    #[arg(short, long, default_value_t = crate::config::DEFAULT_QUALITY)]
    pub quality: u8,

    /// Number of images processed concurrently (0 = one per CPU core)
    #[arg(short, long, default_value_t = 0)]
    pub workers: usize,

    /// Print the batch result as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Process directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Filename pattern for directory inputs (e.g., "*.jpg")
    #[arg(long)]
    pub pattern: Option<String>,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Png,
    #[value(alias = "jpeg")]
    Jpg,
    Webp,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let session_id = init_cli_tracing(cli.verbose, CliConfigBuilder::tracing_format(&cli))
        .context("Failed to initialize tracing")?;

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;
    let options = CliConfigBuilder::batch_options(&cli);

    let span = spans::session(
        &session_id,
        config.classification.tolerance,
        &config.encoding.output_format.to_string(),
    );

    async move {
        info!("Input(s): {}", cli.input.join(", "));
        debug!(?config, workers = options.effective_workers(), "Resolved configuration");

        let start_time = Instant::now();
        let batch = process_inputs(&cli, config, options).await?;

        info!(
            "Processed {} image(s) in {:.2}s",
            batch.total_files(),
            start_time.elapsed().as_secs_f64()
        );

        if cli.json {
            let summary = serde_json::to_string_pretty(&batch.summary())
                .context("Failed to serialize batch summary")?;
            println!("{summary}");
        }

        if !batch.success() {
            anyhow::bail!(
                "{} of {} image(s) failed",
                batch.failed_files(),
                batch.total_files()
            );
        }
        Ok(())
    }
    .instrument(span)
    .await
}

/// Progress reporter that drives an `indicatif` bar from batch events
struct ProgressBarReporter {
    bar: ProgressBar,
}

impl ProgressBarReporter {
    fn new(items_total: usize, hidden: bool) -> Self {
        let bar = ProgressBar::new(items_total as u64);
        if hidden {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar }
    }

    fn finish(&self, batch: &BatchResult) {
        self.bar.finish_with_message(format!(
            "Completed! Processed: {}, Failed: {}",
            batch.successful_files(),
            batch.failed_files()
        ));
    }
}

impl ProgressReporter for ProgressBarReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _timings: ProcessingTimings) {}

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        self.bar
            .println(format!("{} failed: {}", stage.description(), error));
    }

    fn report_batch_progress(&self, update: BatchProgressUpdate) {
        if let BatchItemEvent::Finished { .. } = update.event {
            self.bar.inc(1);
        }
        self.bar.set_message(update.message());
    }
}

/// Discover inputs, run the batch and write every successful output
async fn process_inputs(
    cli: &Cli,
    config: crate::config::RemovalConfig,
    options: crate::config::BatchOptions,
) -> Result<BatchResult> {
    let files = collect_input_files(cli)?;
    if files.is_empty() {
        warn!("No supported image files found in the provided inputs");
        return Ok(BatchResult::default());
    }
    info!("Found {} image file(s) to process", files.len());

    let output_dir = prepare_output_dir(cli.output.as_deref(), files.len())?;

    let mut job = BatchJob::new();
    for path in &files {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read input file: {}", path.display()))?;
        let mut item = BatchItem::new(bytes, config);
        if let Some(content_type) = ImageIOService::content_type_for_path(path) {
            item = item.with_content_type(content_type);
        }
        job.push(item);
    }

    let reporter = Arc::new(ProgressBarReporter::new(files.len(), cli.json || files.len() < 2));
    let batch = BatchRunner::new(options)
        .with_progress_reporter(reporter.clone())
        .run(job)
        .await
        .context("Batch rejected")?;
    reporter.finish(&batch);

    let format = config.encoding.output_format;
    for (path, outcome) in files.iter().zip(&batch.results) {
        match &outcome.result {
            Ok(result) => {
                let output_path =
                    resolve_output_path(path, cli.output.as_deref(), output_dir.as_deref(), format);
                write_output(&output_path, &result.encoded).await?;
                debug!(
                    input = %path.display(),
                    output = %output_path.display(),
                    timings = %result.timings.summary(),
                    "Image written"
                );
            },
            Err(e) => error!("Failed to process {}: {}", path.display(), e),
        }
    }

    if batch.total_files() > 1 {
        info!("Batch processing summary:");
        info!("  Files processed: {}", batch.successful_files());
        info!("  Files failed: {}", batch.failed_files());
    }

    Ok(batch)
}

/// Expand the CLI inputs into a sorted list of image files
fn collect_input_files(cli: &Cli) -> Result<Vec<PathBuf>> {
    let mut all_files = Vec::new();

    for input in &cli.input {
        let path = PathBuf::from(input);

        if path.is_file() {
            if ImageIOService::is_supported_format(&path) {
                all_files.push(path);
            } else {
                warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            all_files.extend(find_image_files(&path, cli.recursive, cli.pattern.as_deref())?);
        } else {
            anyhow::bail!(
                "Input path does not exist or is not accessible: {}",
                path.display()
            );
        }
    }

    all_files.sort();
    all_files.dedup();
    Ok(all_files)
}

/// With several inputs, `--output` names a directory that is created on demand
fn prepare_output_dir(output: Option<&str>, file_count: usize) -> Result<Option<PathBuf>> {
    let Some(output) = output else {
        return Ok(None);
    };
    let output_path = PathBuf::from(output);

    if file_count > 1 || output_path.is_dir() {
        if output_path.is_file() {
            anyhow::bail!(
                "Output path exists and is a file, not a directory: {}",
                output_path.display()
            );
        }
        if !output_path.exists() {
            std::fs::create_dir_all(&output_path).with_context(|| {
                format!(
                    "Failed to create output directory: {}",
                    output_path.display()
                )
            })?;
        }
        return Ok(Some(output_path));
    }
    Ok(None)
}

/// Output location for one input
fn resolve_output_path(
    input_path: &Path,
    output: Option<&str>,
    output_dir: Option<&Path>,
    format: OutputFormat,
) -> PathBuf {
    match (output_dir, output) {
        (Some(dir), _) => generate_output_path_with_dir(input_path, dir, format),
        (None, Some(file)) => PathBuf::from(file),
        (None, None) => generate_output_path(input_path, format),
    }
}

async fn write_output(path: &Path, data: &[u8]) -> Result<()> {
    let span = spans::file_output(path);
    async {
        tokio::fs::write(path, data)
            .await
            .with_context(|| format!("Failed to write output file: {}", path.display()))
    }
    .instrument(span)
    .await
}

/// Find image files in a directory
fn find_image_files(dir: &Path, recursive: bool, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if recursive {
        for entry in walkdir::WalkDir::new(dir) {
            let entry = entry?;
            if entry.file_type().is_file() {
                let path = entry.path();
                if ImageIOService::is_supported_format(path) && matches_pattern(path, pattern) {
                    files.push(path.to_path_buf());
                }
            }
        }
    } else {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let path = entry.path();
                if ImageIOService::is_supported_format(&path) && matches_pattern(&path, pattern) {
                    files.push(path);
                }
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Check if file matches the given pattern
fn matches_pattern(path: &Path, pattern: Option<&str>) -> bool {
    match pattern {
        Some(pat) => {
            if let Some(filename) = path.file_name().and_then(|n| n.to_str()) {
                glob::Pattern::new(pat)
                    .map(|p| p.matches(filename))
                    .unwrap_or(false)
            } else {
                false
            }
        },
        None => true,
    }
}

fn output_file_name(input_path: &Path, format: OutputFormat) -> String {
    let stem = input_path.file_stem().unwrap_or_default();
    format!(
        "{}_bg_removed.{}",
        stem.to_string_lossy(),
        OutputFormatHandler::get_extension(format)
    )
}

/// Generate output path next to the input with the format's extension
fn generate_output_path(input_path: &Path, format: OutputFormat) -> PathBuf {
    let dir = input_path.parent().unwrap_or(Path::new("."));
    dir.join(output_file_name(input_path, format))
}

/// Generate output path inside a custom output directory
fn generate_output_path_with_dir(
    input_path: &Path,
    output_dir: &Path,
    format: OutputFormat,
) -> PathBuf {
    output_dir.join(output_file_name(input_path, format))
}
