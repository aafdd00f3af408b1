//! Stage and item progress
//!
//! The processor reports pipeline stages for a single image, the batch runner
//! reports one event per item. Frontends pick a [`ProgressReporter`] to turn
//! either into log lines, a progress bar or a plain callback.

use crate::types::ProcessingTimings;
use instant::Instant;

/// Pipeline stage of a single image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    Decoding,
    /// Per-pixel background confidence
    Classification,
    /// Threshold plus optional feathering
    MaskGeneration,
    Compositing,
    Encoding,
    Completed,
}

impl ProcessingStage {
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            ProcessingStage::Decoding => "Decoding input image",
            ProcessingStage::Classification => "Classifying pixels",
            ProcessingStage::MaskGeneration => "Building segmentation mask",
            ProcessingStage::Compositing => "Applying mask",
            ProcessingStage::Encoding => "Encoding output",
            ProcessingStage::Completed => "Processing completed",
        }
    }

    /// Nominal share of the pipeline done once this stage is entered
    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        match self {
            ProcessingStage::Decoding => 10,
            ProcessingStage::Classification => 40,
            ProcessingStage::MaskGeneration => 70,
            ProcessingStage::Compositing => 85,
            ProcessingStage::Encoding => 95,
            ProcessingStage::Completed => 100,
        }
    }
}

/// Stage change of a single image
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub stage: ProcessingStage,
    /// 0-100
    pub progress: u8,
    pub description: String,
    /// Milliseconds since the image entered the pipeline
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    #[must_use]
    pub fn new(stage: ProcessingStage, start_time: Instant) -> Self {
        Self {
            progress: stage.progress_percentage(),
            description: stage.description().to_string(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
        }
    }
}

/// Lifecycle event of one batch item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchItemEvent {
    Started,
    Finished { success: bool },
}

/// Image-granularity progress for batch operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProgressUpdate {
    /// Zero-based position of the item in the job
    pub item_index: usize,
    /// Number of items in the job
    pub items_total: usize,
    /// Items finished so far, this one included when `event` is `Finished`
    pub items_finished: usize,
    pub event: BatchItemEvent,
}

impl BatchProgressUpdate {
    /// Percentage of items finished, 0-100
    #[must_use]
    pub fn percent(&self) -> u8 {
        if self.items_total == 0 {
            return 100;
        }
        ((self.items_finished.min(self.items_total) * 100) / self.items_total) as u8
    }

    /// `item k of n started` or `item k of n finished`, with `k` one-based
    ///
    /// A failed item still finishes; the message then ends in `with error`.
    #[must_use]
    pub fn message(&self) -> String {
        let event = match self.event {
            BatchItemEvent::Started => "started",
            BatchItemEvent::Finished { success: true } => "finished",
            BatchItemEvent::Finished { success: false } => "finished with error",
        };
        format!("item {} of {} {}", self.item_index + 1, self.items_total, event)
    }
}

/// Receiver of pipeline and batch progress
pub trait ProgressReporter: Send + Sync {
    fn report_progress(&self, update: ProgressUpdate);

    fn report_completion(&self, timings: ProcessingTimings);

    fn report_error(&self, stage: ProcessingStage, error: &str);

    /// Batch item started or finished; ignored unless overridden
    fn report_batch_progress(&self, update: BatchProgressUpdate) {
        drop(update);
    }
}

/// Discards everything
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _timings: ProcessingTimings) {}

    fn report_error(&self, _stage: ProcessingStage, _error: &str) {}
}

/// Writes progress through the `log` facade
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    /// `verbose` adds elapsed time and the per-stage timing breakdown
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if self.verbose {
            log::info!(
                "[{}%] {} ({}ms elapsed)",
                update.progress,
                update.description,
                update.elapsed_ms
            );
        } else {
            log::info!("[{}%] {}", update.progress, update.description);
        }
    }

    fn report_completion(&self, timings: ProcessingTimings) {
        log::info!("Background removal completed in {}ms", timings.total_ms);

        if self.verbose {
            log::info!("  {}", timings.summary());
        }
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        log::error!("Error during {}: {}", stage.description(), error);
    }

    fn report_batch_progress(&self, update: BatchProgressUpdate) {
        log::info!("[{}%] {}", update.percent(), update.message());
    }
}

/// Adapts a plain `(message, percent)` callback to [`ProgressReporter`]
///
/// Single-image stage updates forward the stage description and its
/// nominal percentage; batch updates forward `item k of n ...` and the
/// share of finished items.
///
/// # Examples
/// ```rust
/// use heuristic_bgremove::services::{CallbackProgressReporter, ProgressReporter};
///
/// let reporter = CallbackProgressReporter::new(|message: &str, percent: u8| {
///     println!("{percent:>3}% {message}");
/// });
/// # let _ = &reporter;
/// ```
pub struct CallbackProgressReporter<F>
where
    F: Fn(&str, u8) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackProgressReporter<F>
where
    F: Fn(&str, u8) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for CallbackProgressReporter<F>
where
    F: Fn(&str, u8) + Send + Sync,
{
    fn report_progress(&self, update: ProgressUpdate) {
        (self.callback)(&update.description, update.progress);
    }

    fn report_completion(&self, _timings: ProcessingTimings) {
        (self.callback)(ProcessingStage::Completed.description(), 100);
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        (self.callback)(
            &format!("Error during {}: {}", stage.description(), error),
            stage.progress_percentage(),
        );
    }

    fn report_batch_progress(&self, update: BatchProgressUpdate) {
        (self.callback)(&update.message(), update.percent());
    }
}

/// Forwards one image's stage changes to a reporter
///
/// Remembers the last stage so a failure is attributed to it.
pub struct ProgressTracker {
    reporter: Box<dyn ProgressReporter>,
    start_time: Instant,
    current_stage: Option<ProcessingStage>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(reporter: Box<dyn ProgressReporter>) -> Self {
        Self {
            reporter,
            start_time: Instant::now(),
            current_stage: None,
        }
    }

    pub fn report_stage(&mut self, stage: ProcessingStage) {
        self.current_stage = Some(stage);
        self.reporter
            .report_progress(ProgressUpdate::new(stage, self.start_time));
    }

    pub fn report_completion(&self, timings: ProcessingTimings) {
        self.reporter.report_completion(timings);
    }

    /// Errors raised before any stage count against decoding
    pub fn report_error(&self, error: &str) {
        let stage = self.current_stage.unwrap_or(ProcessingStage::Decoding);
        self.reporter.report_error(stage, error);
    }
}
