//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::{Cli, CliOutputFormat};
use crate::config::{BatchOptions, OutputFormat, RemovalConfig};
use crate::services::OutputFormatHandler;
use crate::tracing_config::TracingFormat;
use anyhow::{Context, Result};

impl From<CliOutputFormat> for OutputFormat {
    fn from(format: CliOutputFormat) -> Self {
        match format {
            CliOutputFormat::Png => Self::Png,
            CliOutputFormat::Jpg => Self::Jpeg,
            CliOutputFormat::Webp => Self::WebP,
        }
    }
}

/// Convert CLI arguments to library configuration
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the per-image `RemovalConfig` shared by every input
    pub(crate) fn from_cli(cli: &Cli) -> Result<RemovalConfig> {
        RemovalConfig::builder()
            .tolerance(cli.tolerance)
            .feather_edges(!cli.no_feather)
            .preserve_shadows(cli.preserve_shadows)
            .auto_enhance(cli.auto_enhance)
            .output_format(cli.format.into())
            .quality(cli.quality)
            .build()
            .context("Invalid removal parameters")
    }

    /// Worker pool settings for the batch runner
    pub(crate) fn batch_options(cli: &Cli) -> BatchOptions {
        BatchOptions {
            max_workers: cli.workers,
            // One image at a time: rows go to the rayon pool instead
            row_parallel: cli.workers == 1,
        }
    }

    /// `--json` keeps stderr free of color codes so stdout can be piped
    pub(crate) fn tracing_format(cli: &Cli) -> TracingFormat {
        if cli.json {
            TracingFormat::Compact
        } else {
            TracingFormat::Console
        }
    }

    /// Reject argument combinations clap cannot express
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if cli.tolerance > 100 {
            anyhow::bail!("Tolerance must be between 0 and 100, got {}", cli.tolerance);
        }
        if let Some((_, min, max)) = OutputFormatHandler::get_quality_range(OutputFormat::Jpeg) {
            if !(min..=max).contains(&cli.quality) {
                anyhow::bail!("Quality must be between {} and {}, got {}", min, max, cli.quality);
            }
        }
        if cli.output.as_deref() == Some("-") {
            anyhow::bail!("Writing to stdout is not supported; pass a file or directory");
        }
        if cli.auto_enhance {
            log::warn!("--auto-enhance is accepted but has no effect");
        }
        let format = OutputFormat::from(cli.format);
        if cli.quality != crate::config::DEFAULT_QUALITY
            && OutputFormatHandler::get_quality_range(format).is_none()
        {
            log::warn!("--quality only affects JPEG output; {} is encoded losslessly", format);
        }
        Ok(())
    }
}
