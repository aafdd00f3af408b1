//! Batch processing over independent images
//!
//! Each item runs the full single-image pipeline on tokio's blocking pool.
//! At most `BatchOptions::effective_workers()` items are in flight at once,
//! and every outcome lands in the slot matching its input index, so the
//! result order never depends on completion order.

use crate::{
    config::{BatchOptions, RemovalConfig},
    error::{BgRemovalError, Result},
    processor::BackgroundRemovalProcessor,
    services::{BatchItemEvent, BatchProgressUpdate, NoOpProgressReporter, ProgressReporter},
    types::{BatchResult, ItemOutcome, RemovalMetadata, RemovalResult},
};
use futures::{stream, StreamExt};
use instant::Instant;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

/// One image submitted to a batch
#[derive(Debug, Clone)]
pub struct BatchItem {
    /// Encoded input image
    pub bytes: Vec<u8>,
    /// Optional MIME type such as `image/png`
    pub content_type: Option<String>,
    /// Parameters for this item
    pub config: RemovalConfig,
}

impl BatchItem {
    #[must_use]
    pub fn new(bytes: Vec<u8>, config: RemovalConfig) -> Self {
        Self {
            bytes,
            content_type: None,
            config,
        }
    }

    /// Attach a content-type hint for the decoder
    #[must_use]
    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Ordered list of images to process
#[derive(Debug, Clone, Default)]
pub struct BatchJob {
    pub items: Vec<BatchItem>,
}

impl BatchJob {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item; its index is the current length
    pub fn push(&mut self, item: BatchItem) {
        self.items.push(item);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Validate every item's parameters
    ///
    /// # Errors
    /// - `InvalidParameter` naming the first offending item
    pub fn validate(&self) -> Result<()> {
        for (index, item) in self.items.iter().enumerate() {
            item.config.validate().map_err(|e| match e {
                BgRemovalError::InvalidParameter(msg) => {
                    BgRemovalError::invalid_parameter(format!("item {}: {}", index, msg))
                },
                other => other,
            })?;
        }
        Ok(())
    }
}

impl FromIterator<BatchItem> for BatchJob {
    fn from_iter<I: IntoIterator<Item = BatchItem>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

/// Drives the pipeline over a [`BatchJob`] with a bounded worker pool
///
/// Per-item decode and encode failures are captured in that item's
/// outcome and never abort the siblings. Progress is reported once when
/// an item starts and once when it finishes.
pub struct BatchRunner {
    options: BatchOptions,
    reporter: Arc<dyn ProgressReporter>,
    cancellation: Option<CancellationToken>,
}

impl BatchRunner {
    #[must_use]
    pub fn new(options: BatchOptions) -> Self {
        Self {
            options,
            reporter: Arc::new(NoOpProgressReporter),
            cancellation: None,
        }
    }

    /// Send item start/finish events to `reporter`
    #[must_use]
    pub fn with_progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Items not finished when `token` fires report `Cancelled`
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Process every item and return one outcome per input, in input order
    ///
    /// # Errors
    /// - `InvalidParameter` when any item's parameters are out of range;
    ///   nothing is processed in that case
    pub async fn run(&self, job: BatchJob) -> Result<BatchResult> {
        job.validate()?;

        let total = job.len();
        let workers = self.options.effective_workers().max(1);
        let span = tracing::info_span!("batch", items = total, workers);

        async move {
            let start = Instant::now();
            info!("Starting batch");

            let finished = Arc::new(AtomicUsize::new(0));
            let mut slots: Vec<Option<ItemOutcome>> = Vec::with_capacity(total);
            slots.resize_with(total, || None);

            let mut outcomes = stream::iter(job.items.into_iter().enumerate())
                .map(|(index, item)| self.run_item(index, total, item, Arc::clone(&finished)))
                .buffer_unordered(workers);

            while let Some(outcome) = outcomes.next().await {
                let index = outcome.index;
                if let Some(slot) = slots.get_mut(index) {
                    *slot = Some(outcome);
                }
            }

            let results: Vec<ItemOutcome> = slots
                .into_iter()
                .enumerate()
                .map(|(index, slot)| {
                    slot.unwrap_or_else(|| ItemOutcome {
                        index,
                        original_size: 0,
                        metadata: RemovalMetadata::from(&RemovalConfig::default()),
                        result: Err(BgRemovalError::internal("item produced no outcome")),
                    })
                })
                .collect();

            let batch = BatchResult { results };
            info!(
                successful = batch.successful_files(),
                failed = batch.failed_files(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Batch completed"
            );
            Ok(batch)
        }
        .instrument(span)
        .await
    }

    async fn run_item(
        &self,
        index: usize,
        total: usize,
        item: BatchItem,
        finished: Arc<AtomicUsize>,
    ) -> ItemOutcome {
        let original_size = item.bytes.len();
        let metadata = RemovalMetadata::from(&item.config);

        self.reporter.report_batch_progress(BatchProgressUpdate {
            item_index: index,
            items_total: total,
            items_finished: finished.load(Ordering::SeqCst),
            event: BatchItemEvent::Started,
        });

        let result = if self
            .cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            Err(BgRemovalError::Cancelled)
        } else {
            self.spawn_pipeline(item).await
        };

        match &result {
            Ok(output) => debug!(index, total_ms = output.timings.total_ms, "Item finished"),
            Err(e) => warn!(index, error = %e, "Item failed"),
        }

        let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
        self.reporter.report_batch_progress(BatchProgressUpdate {
            item_index: index,
            items_total: total,
            items_finished: done,
            event: BatchItemEvent::Finished {
                success: result.is_ok(),
            },
        });

        ItemOutcome {
            index,
            original_size,
            metadata,
            result,
        }
    }

    async fn spawn_pipeline(&self, item: BatchItem) -> Result<RemovalResult> {
        let row_parallel = self.options.row_parallel;
        let cancellation = self.cancellation.clone();

        let handle = tokio::task::spawn_blocking(move || {
            let mut processor =
                BackgroundRemovalProcessor::new(item.config)?.with_row_parallelism(row_parallel);
            if let Some(token) = cancellation {
                processor = processor.with_cancellation(token);
            }
            processor.process_bytes(&item.bytes, item.content_type.as_deref())
        });

        handle
            .await
            .map_err(|e| BgRemovalError::internal(format!("worker task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{services::OutputFormatHandler, types::RasterImage};

    fn png(color: [u8; 4]) -> Vec<u8> {
        OutputFormatHandler::encode(RasterImage::from_pixel(8, 8, color), &Default::default())
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_job() {
        let result = BatchRunner::new(BatchOptions::default())
            .run(BatchJob::new())
            .await
            .unwrap();
        assert_eq!(result.total_files(), 0);
        assert!(result.success());
    }

    #[tokio::test]
    async fn test_invalid_item_fails_whole_call() {
        let mut bad = RemovalConfig::default();
        bad.encoding.quality = 0;
        let job: BatchJob = vec![
            BatchItem::new(png([1, 2, 3, 255]), RemovalConfig::default()),
            BatchItem::new(png([1, 2, 3, 255]), bad),
        ]
        .into_iter()
        .collect();

        let err = BatchRunner::new(BatchOptions::default())
            .run(job)
            .await
            .unwrap_err();
        assert!(matches!(err, BgRemovalError::InvalidParameter(_)));
        assert!(err.to_string().contains("item 1"));
    }

    #[tokio::test]
    async fn test_cancelled_batch_reports_every_item() {
        let token = CancellationToken::new();
        token.cancel();
        let job: BatchJob = (0..3)
            .map(|_| BatchItem::new(png([9, 9, 9, 255]), RemovalConfig::default()))
            .collect();

        let result = BatchRunner::new(BatchOptions::default())
            .with_cancellation(token)
            .run(job)
            .await
            .unwrap();
        assert_eq!(result.total_files(), 3);
        assert!(result
            .results
            .iter()
            .all(|o| matches!(o.error(), Some(BgRemovalError::Cancelled))));
    }

    #[tokio::test]
    async fn test_content_type_hint_is_forwarded() {
        let job: BatchJob = std::iter::once(
            BatchItem::new(png([200, 30, 30, 255]), RemovalConfig::default())
                .with_content_type("image/png"),
        )
        .collect();
        let result = BatchRunner::new(BatchOptions {
            max_workers: 1,
            row_parallel: true,
        })
        .run(job)
        .await
        .unwrap();
        assert!(result.success());
        assert_eq!(result.results[0].index, 0);
    }
}
