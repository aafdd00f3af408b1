//! Batch runner integration tests: ordering, failure isolation and progress

use heuristic_bgremove::{
    remove_background_batch, BatchItem, BatchJob, BatchOptions, BatchRunner, BgRemovalError,
    CallbackProgressReporter, EncodingParams, OutputFormat, OutputFormatHandler, RasterImage,
    RemovalConfig,
};
use std::sync::{Arc, Mutex};

fn encoded(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    OutputFormatHandler::encode(
        RasterImage::from_pixel(width, height, color),
        &EncodingParams::default(),
    )
    .unwrap()
}

fn job_with_corrupt_item(len: usize, corrupt_at: usize) -> BatchJob {
    (0..len)
        .map(|i| {
            let bytes = if i == corrupt_at {
                b"definitely not an image".to_vec()
            } else {
                // Distinct sizes make each slot identifiable
                encoded(8 + i as u32, 6, [120, 90, 60, 255])
            };
            BatchItem::new(bytes, RemovalConfig::default())
        })
        .collect()
}

#[tokio::test]
async fn test_corrupt_item_is_isolated_and_order_preserved() {
    for corrupt_at in [0, 3, 6] {
        let job = job_with_corrupt_item(7, corrupt_at);
        let batch = BatchRunner::new(BatchOptions {
            max_workers: 3,
            row_parallel: false,
        })
        .run(job)
        .await
        .unwrap();

        assert_eq!(batch.total_files(), 7);
        assert_eq!(batch.successful_files(), 6);
        assert_eq!(batch.failed_files(), 1);
        assert!(!batch.success());

        for (i, outcome) in batch.results.iter().enumerate() {
            assert_eq!(outcome.index, i);
            if i == corrupt_at {
                assert!(matches!(outcome.error(), Some(BgRemovalError::Decode(_))));
            } else {
                let result = outcome.result.as_ref().unwrap();
                assert_eq!(result.dimensions.width, 8 + i as u32);
                assert_eq!(result.dimensions.height, 6);
            }
        }
    }
}

#[tokio::test]
async fn test_per_item_parameters_are_honoured() {
    let bytes = encoded(30, 30, [250, 250, 250, 255]);
    let strict = RemovalConfig::builder().tolerance(10).build().unwrap();
    let lenient = RemovalConfig::builder()
        .tolerance(90)
        .output_format(OutputFormat::Jpeg)
        .quality(55)
        .build()
        .unwrap();

    let job: BatchJob = vec![
        BatchItem::new(bytes.clone(), strict),
        BatchItem::new(bytes, lenient),
    ]
    .into_iter()
    .collect();
    let batch = remove_background_batch(job, None).await.unwrap();

    assert!(batch.success());
    let first = batch.results[0].result.as_ref().unwrap();
    let second = batch.results[1].result.as_ref().unwrap();
    assert_eq!(first.metadata.tolerance, 10);
    assert_eq!(first.mask_statistics.foreground_pixels, 0);
    assert_eq!(second.metadata.output_format, OutputFormat::Jpeg);
    assert_eq!(second.metadata.quality, 55);
    assert!(second.mask_statistics.foreground_pixels > 0);
}

#[tokio::test]
async fn test_progress_messages_per_item() {
    let messages: Arc<Mutex<Vec<(String, u8)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&messages);
    let reporter = Arc::new(CallbackProgressReporter::new(move |message: &str, percent: u8| {
        sink.lock().unwrap().push((message.to_string(), percent));
    }));

    let batch = BatchRunner::new(BatchOptions {
        max_workers: 1,
        row_parallel: false,
    })
    .with_progress_reporter(reporter)
    .run(job_with_corrupt_item(3, 1))
    .await
    .unwrap();
    assert_eq!(batch.failed_files(), 1);

    let messages = messages.lock().unwrap().clone();
    assert_eq!(
        messages,
        vec![
            ("item 1 of 3 started".to_string(), 0),
            ("item 1 of 3 finished".to_string(), 33),
            ("item 2 of 3 started".to_string(), 33),
            ("item 2 of 3 finished with error".to_string(), 66),
            ("item 3 of 3 started".to_string(), 66),
            ("item 3 of 3 finished".to_string(), 100),
        ]
    );
}

#[tokio::test]
async fn test_progress_counts_with_concurrency() {
    let messages: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&messages);
    let reporter = Arc::new(CallbackProgressReporter::new(move |message: &str, _: u8| {
        sink.lock().unwrap().push(message.to_string());
    }));

    // Index past the end: every item is valid
    let job = job_with_corrupt_item(10, usize::MAX);
    BatchRunner::new(BatchOptions {
        max_workers: 4,
        row_parallel: true,
    })
    .with_progress_reporter(reporter)
    .run(job)
    .await
    .unwrap();

    let messages = messages.lock().unwrap();
    assert_eq!(messages.len(), 20);
    for k in 1..=10 {
        assert!(messages.contains(&format!("item {} of 10 started", k)));
        assert!(messages.contains(&format!("item {} of 10 finished", k)));
    }
}

#[tokio::test]
async fn test_batch_of_one_wraps_single_result() {
    let job: BatchJob = std::iter::once(BatchItem::new(
        encoded(10, 10, [1, 2, 3, 255]),
        RemovalConfig::default(),
    ))
    .collect();
    let batch = remove_background_batch(job, None).await.unwrap();

    let summary = batch.summary();
    assert!(summary.success);
    assert_eq!(summary.total_files, 1);
    assert_eq!(summary.successful_files, 1);
    assert_eq!(summary.results.len(), 1);
}

async fn assert_encode_failure_isolated(job: BatchJob, failing: usize) {
    let total = job.len();
    let batch = BatchRunner::new(BatchOptions {
        max_workers: 2,
        row_parallel: false,
    })
    .run(job)
    .await
    .unwrap();

    assert_eq!(batch.total_files(), total);
    assert_eq!(batch.failed_files(), 1);
    for (i, outcome) in batch.results.iter().enumerate() {
        assert_eq!(outcome.index, i);
        if i == failing {
            assert!(
                matches!(outcome.error(), Some(BgRemovalError::Encode(_))),
                "item {} gave {:?}",
                i,
                outcome.error()
            );
        } else {
            assert!(outcome.is_success(), "item {} gave {:?}", i, outcome.error());
        }
    }
}

#[tokio::test]
async fn test_oversized_jpeg_encode_failure_is_isolated() {
    // JPEG frames cannot be wider than 65535 pixels; the PNG input decodes fine
    let jpeg = RemovalConfig::builder()
        .output_format(OutputFormat::Jpeg)
        .build()
        .unwrap();
    let job: BatchJob = vec![
        BatchItem::new(encoded(12, 12, [40, 90, 200, 255]), jpeg),
        BatchItem::new(encoded(65_536, 1, [40, 90, 200, 255]), jpeg),
        BatchItem::new(encoded(9, 7, [200, 40, 90, 255]), RemovalConfig::default()),
    ]
    .into_iter()
    .collect();

    assert_encode_failure_isolated(job, 1).await;
}

#[cfg(not(feature = "webp-support"))]
#[tokio::test]
async fn test_webp_without_codec_fails_only_that_item() {
    let webp = RemovalConfig::builder()
        .output_format(OutputFormat::WebP)
        .build()
        .unwrap();
    let job: BatchJob = vec![
        BatchItem::new(encoded(10, 10, [10, 160, 30, 255]), RemovalConfig::default()),
        BatchItem::new(encoded(10, 10, [10, 160, 30, 255]), RemovalConfig::default()),
        BatchItem::new(encoded(10, 10, [10, 160, 30, 255]), webp),
        BatchItem::new(encoded(10, 10, [10, 160, 30, 255]), RemovalConfig::default()),
    ]
    .into_iter()
    .collect();

    assert_encode_failure_isolated(job, 2).await;
}
