//! Serialized result shapes handed back to the hosting application

use base64::{engine::general_purpose, Engine as _};
use heuristic_bgremove::{
    remove_background_batch, remove_background_from_bytes, BatchItem, BatchJob, EncodingParams,
    OutputFormat, OutputFormatHandler, RasterImage, RemovalConfig,
};
use serde_json::{json, Value};

fn png(width: u32, height: u32) -> Vec<u8> {
    OutputFormatHandler::encode(
        RasterImage::from_pixel(width, height, [90, 140, 60, 255]),
        &EncodingParams::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_single_result_shape() {
    let bytes = png(14, 9);
    let config = RemovalConfig::from_json(r#"{"tolerance": 35, "featherEdges": false}"#).unwrap();
    let result = remove_background_from_bytes(&bytes, Some("image/png"), &config)
        .await
        .unwrap();

    let value = serde_json::to_value(result.summary()).unwrap();
    assert_eq!(value["success"], json!(true));
    assert_eq!(value["originalSize"], json!(bytes.len()));
    assert_eq!(value["finalSize"], json!(result.encoded.len()));
    assert_eq!(value["dimensions"], json!({"width": 14, "height": 9}));
    assert_eq!(
        value["metadata"],
        json!({
            "tolerance": 35,
            "featherEdges": false,
            "outputFormat": "png",
            "quality": 90
        })
    );
    assert!(value.get("error").is_none());

    let encoded = general_purpose::STANDARD
        .decode(value["encodedBytes"].as_str().unwrap())
        .unwrap();
    assert_eq!(encoded, result.encoded);
    assert!(encoded.starts_with(b"\x89PNG"));
}

#[tokio::test]
async fn test_batch_shape_with_failure() {
    let jpg = RemovalConfig::builder()
        .output_format(OutputFormat::Jpeg)
        .quality(70)
        .build()
        .unwrap();
    let job: BatchJob = vec![
        BatchItem::new(png(6, 6), RemovalConfig::default()).with_content_type("image/png"),
        BatchItem::new(vec![0u8; 16], jpg),
    ]
    .into_iter()
    .collect();

    let batch = remove_background_batch(job, None).await.unwrap();
    let value: Value = serde_json::to_value(batch.summary()).unwrap();

    assert_eq!(value["success"], json!(false));
    assert_eq!(value["totalFiles"], json!(2));
    assert_eq!(value["successfulFiles"], json!(1));

    let results = value["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["success"], json!(true));
    let encoded = general_purpose::STANDARD
        .decode(results[0]["encodedBytes"].as_str().unwrap())
        .unwrap();
    assert_eq!(json!(encoded.len()), results[0]["finalSize"]);

    let failed = &results[1];
    assert_eq!(failed["success"], json!(false));
    assert_eq!(failed["errorKind"], json!("decode_error"));
    assert_eq!(failed["originalSize"], json!(16));
    assert!(failed["error"].as_str().unwrap().starts_with("Decode error"));
    assert!(failed.get("finalSize").is_none());
    assert!(failed.get("dimensions").is_none());
    assert!(failed.get("encodedBytes").is_none());
    assert_eq!(failed["metadata"]["outputFormat"], json!("jpg"));
    assert_eq!(failed["metadata"]["quality"], json!(70));
}

#[test]
fn test_config_json_round_trip_uses_caller_names() {
    let config = RemovalConfig::from_json(
        r#"{"tolerance": 20, "featherEdges": true, "outputFormat": "webp",
            "quality": 80, "preserveShadows": true, "autoEnhance": true}"#,
    )
    .unwrap();
    assert_eq!(config.classification.tolerance, 20);
    assert!(config.classification.preserve_shadows);
    assert!(config.classification.auto_enhance);
    assert_eq!(config.encoding.output_format, OutputFormat::WebP);

    let value = serde_json::to_value(config).unwrap();
    for key in [
        "tolerance",
        "featherEdges",
        "outputFormat",
        "quality",
        "preserveShadows",
        "autoEnhance",
    ] {
        assert!(value.get(key).is_some(), "missing {}", key);
    }
}
