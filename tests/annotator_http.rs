//! HTTP annotators against a local axum server.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::json;

use rowfill::config::{CaptionConfig, ImageConfig, OcrConfig, SynthesisConfig};
use rowfill::models::Dataset;
use rowfill::services::annotation::{
    AnnotationError, AnnotationOutput, Annotator, CaptionAnnotator, HttpSynthesizer,
    ImageSynthesizer, OcrAnnotator, RequestPayload, WorkItem,
};
use rowfill::services::{EnrichConfig, EnrichmentDriver, RetryPolicy, RowRange};
use rowfill::store::MemoryStore;

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Answers by image name: `haunted_image_1.png` gets one caption,
/// `haunted_image_2.png` a server error, `haunted_image_3.png` no captions,
/// anything else a body that is not JSON.
async fn caption_handler(
    State(hits): State<Arc<AtomicUsize>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);
    if params.get("beam_size").map(String::as_str) != Some("5")
        || params.get("max_caption_length").map(String::as_str) != Some("20")
    {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let url = params.get("url").cloned().unwrap_or_default();
    if url.ends_with("/haunted_image_1.png") {
        Json(json!({"captions": [
            {"sentence": "ghost sighting", "confidence": 0.9}
        ]}))
        .into_response()
    } else if url.ends_with("/haunted_image_2.png") {
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    } else if url.ends_with("/haunted_image_3.png") {
        Json(json!({"captions": []})).into_response()
    } else {
        "not json".into_response()
    }
}

async fn caption_server() -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/caption", get(caption_handler))
        .with_state(hits.clone());
    (serve(app).await, hits)
}

fn caption_annotator(base: &str) -> CaptionAnnotator {
    let config = CaptionConfig {
        endpoint: format!("{}/caption", base),
        ..CaptionConfig::default()
    };
    CaptionAnnotator::new(config, ImageConfig::default(), Duration::from_secs(5)).unwrap()
}

fn reference(index: usize) -> WorkItem {
    WorkItem::new(
        index,
        RequestPayload::Reference(format!(
            "http://172.17.0.1:8000/images/haunted_image_{}.png",
            index
        )),
    )
}

#[tokio::test]
async fn test_caption_formats_candidates() {
    let (base, _) = caption_server().await;
    let annotator = caption_annotator(&base);

    assert_eq!(
        annotator.annotate(&reference(1)).await,
        Ok(AnnotationOutput::Data(
            "ghost sighting (confidence: 0.90000)".to_string()
        ))
    );
    assert_eq!(
        annotator.annotate(&reference(3)).await,
        Ok(AnnotationOutput::NoResult)
    );
}

#[tokio::test]
async fn test_caption_failure_kinds() {
    let (base, _) = caption_server().await;
    let annotator = caption_annotator(&base);

    assert!(matches!(
        annotator.annotate(&reference(2)).await,
        Err(AnnotationError::Transient(_))
    ));
    assert!(matches!(
        annotator.annotate(&reference(9)).await,
        Err(AnnotationError::Unusable(_))
    ));
}

#[tokio::test]
async fn test_unreachable_service_is_transient() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let annotator = caption_annotator(&format!("http://{}", addr));
    assert!(!annotator.is_available().await);
    assert!(matches!(
        annotator.annotate(&reference(1)).await,
        Err(AnnotationError::Transient(_))
    ));
}

#[tokio::test]
async fn test_caption_run_over_http() {
    let (base, hits) = caption_server().await;
    let annotator = caption_annotator(&base);

    let mut ds = Dataset::new(["idx", "ai_image_path", "detected_objects"]).unwrap();
    ds.push_row(vec![
        Some("0".to_string()),
        Some("images/haunted_image_0.png".to_string()),
        Some("already there".to_string()),
    ])
    .unwrap();
    ds.push_row(vec![
        Some("1".to_string()),
        Some("images/haunted_image_1.png".to_string()),
        None,
    ])
    .unwrap();
    ds.push_row(vec![
        Some("2".to_string()),
        Some("images/haunted_image_2.png".to_string()),
        None,
    ])
    .unwrap();

    let store = MemoryStore::new();
    let driver = EnrichmentDriver::new(EnrichConfig::default(), RetryPolicy::immediate(3));
    let summary = driver
        .run(
            &mut ds,
            annotator.default_column(),
            RowRange::all(),
            &annotator,
            &store,
        )
        .await
        .unwrap();

    assert_eq!(ds.get(0, "detected_objects"), Some("already there"));
    assert_eq!(
        ds.get(1, "detected_objects"),
        Some("ghost sighting (confidence: 0.90000)")
    );
    assert_eq!(ds.get(2, "detected_objects"), Some(""));
    assert_eq!(
        (summary.attempted, summary.succeeded, summary.failed),
        (2, 1, 1)
    );
    // One call for row 1, three for row 2.
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}

async fn ocr_handler(headers: HeaderMap, body: Bytes) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string()
    };
    if header("content-type") != "image/png"
        || header("accept") != "text/plain"
        || header("x-tika-ocrlanguage") != "eng"
    {
        return StatusCode::BAD_REQUEST.into_response();
    }
    match &body[..] {
        b"sign" => "  GHOST TOURS NIGHTLY\n".into_response(),
        b"blank" => "".into_response(),
        _ => "<!DOCTYPE html><html><body>error</body></html>".into_response(),
    }
}

fn ocr_annotator(base: &str, image_dir: PathBuf) -> OcrAnnotator {
    let config = OcrConfig {
        endpoint: format!("{}/tika", base),
        ..OcrConfig::default()
    };
    let timeout = Duration::from_secs(5);
    OcrAnnotator::new(config, &ImageConfig::default(), image_dir, timeout).unwrap()
}

#[tokio::test]
async fn test_ocr_uploads_image_with_headers() {
    let base = serve(Router::new().route("/tika", put(ocr_handler))).await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("haunted_image_0.png"), b"sign").unwrap();
    std::fs::write(dir.path().join("haunted_image_1.png"), b"blank").unwrap();
    std::fs::write(dir.path().join("haunted_image_2.png"), b"garbage").unwrap();
    let annotator = ocr_annotator(&base, dir.path().to_path_buf());

    let ds = Dataset::from_parts(
        vec!["ai_image_path".to_string()],
        (0..3)
            .map(|i| vec![Some(format!("images/haunted_image_{}.png", i))])
            .collect(),
    )
    .unwrap();
    let items: Vec<WorkItem> = (0..3)
        .map(|i| annotator.prepare(&ds.record(i).unwrap()).unwrap())
        .collect();

    assert_eq!(
        annotator.annotate(&items[0]).await,
        Ok(AnnotationOutput::Data("GHOST TOURS NIGHTLY".to_string()))
    );
    assert!(matches!(
        annotator.annotate(&items[1]).await,
        Err(AnnotationError::Unusable(_))
    ));
    assert!(matches!(
        annotator.annotate(&items[2]).await,
        Err(AnnotationError::Unusable(_))
    ));
}

async fn synth_handler(Json(request): Json<serde_json::Value>) -> Response {
    let prompt = request["prompt"].as_str().unwrap_or("");
    if !prompt.starts_with("Haunted scene in") || request["width"] != json!(384) {
        return StatusCode::BAD_REQUEST.into_response();
    }
    vec![0x89u8, b'P', b'N', b'G'].into_response()
}

#[tokio::test]
async fn test_http_synthesizer_returns_image_bytes() {
    let base = serve(Router::new().route("/generate", post(synth_handler))).await;
    let synthesizer = HttpSynthesizer::new(
        format!("{}/generate", base),
        SynthesisConfig::default(),
        Duration::from_secs(5),
    )
    .unwrap();

    let prompt = "Haunted scene in Ada, Michigan. Doors slam. Apparition: Shadow.";
    let bytes = synthesizer.synthesize(prompt, 4).await.unwrap();
    assert_eq!(bytes, vec![0x89u8, b'P', b'N', b'G']);

    assert!(matches!(
        synthesizer.synthesize("something else", 5).await,
        Err(AnnotationError::Transient(_))
    ));
}
