use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tower::ServiceExt; // for `oneshot`

use batchfossil::api::models::{FossilAcceptedResponse, FossilStatus};
use batchfossil::api::router;
use batchfossil::api::state::AppState;
use batchfossil::config::{Config, FossilizerConfig};
use batchfossil::evidence::FossilResult;
use batchfossil::fossilizer::Fossilizer;

/// App with a running fossilizer that seals every two leaves
struct TestApp {
    app: Router,
    _stop: oneshot::Sender<()>,
    _dir: TempDir,
}

async fn build_test_app() -> TestApp {
    let dir = TempDir::new().expect("Failed to create temp dir");

    let config = Config {
        fossilizer: FossilizerConfig {
            path: dir.path().to_path_buf(),
            max_leaves: 2,
            version: "9.9.9".to_string(),
            commit: "cafe".to_string(),
            ..FossilizerConfig::default()
        },
        ..Config::default()
    };

    let fossilizer = Fossilizer::new(config.fossilizer.clone()).expect("Failed to create fossilizer");
    let state = AppState::new(config, fossilizer.clone());

    let (stop, stop_rx) = oneshot::channel::<()>();
    tokio::spawn({
        let fossilizer = fossilizer.clone();
        async move {
            let _ = fossilizer
                .start(async move {
                    let _ = stop_rx.await;
                })
                .await;
        }
    });
    fossilizer.started().await;

    TestApp {
        app: router(state),
        _stop: stop,
        _dir: dir,
    }
}

fn post_fossil_request(payload: serde_json::Value) -> Request<Body> {
    Request::builder()
        .uri("/fossils")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(&payload).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("GET")
        .body(Body::empty())
        .unwrap()
}

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Poll `GET /results/{data}` until the batch holding `data` has sealed
async fn wait_for_result(app: &Router, data_hex: &str) -> FossilResult {
    for _ in 0..200 {
        let response = ServiceExt::<Request<Body>>::oneshot(
            app.clone(),
            get_request(&format!("/results/{data_hex}")),
        )
        .await
        .unwrap();
        if response.status() == StatusCode::OK {
            return body_json(response).await;
        }
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("no result for {data_hex}");
}

#[tokio::test]
async fn test_submit_fossil_accepted() {
    let test = build_test_app().await;

    let response = test
        .app
        .oneshot(post_fossil_request(json!({ "data": "ABCD", "meta": "first" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let accepted: FossilAcceptedResponse = body_json(response).await;
    assert_eq!(accepted.data, "abcd");
    assert_eq!(accepted.status, FossilStatus::Pending);
}

#[tokio::test]
async fn test_result_available_after_seal() {
    let test = build_test_app().await;

    for (data, meta) in [("aa", "one"), ("bb", "two")] {
        let response = ServiceExt::<Request<Body>>::oneshot(
            test.app.clone(),
            post_fossil_request(json!({ "data": data, "meta": meta })),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    let result = wait_for_result(&test.app, "bb").await;
    assert_eq!(result.data, vec![0xbb]);
    assert_eq!(result.meta, b"two".to_vec());
    assert_eq!(result.evidence.backend, "batch");
    assert!(result.evidence.verify(&result.data));

    let first = wait_for_result(&test.app, "aa").await;
    assert_eq!(first.evidence.proof.merkle_root, result.evidence.proof.merkle_root);
}

#[tokio::test]
async fn test_result_unknown_data_not_found() {
    let test = build_test_app().await;

    let response = test.app.oneshot(get_request("/results/0123")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_result_bad_hex_rejected() {
    let test = build_test_app().await;

    let response = test.app.oneshot(get_request("/results/nothex")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_submit_invalid_content_type() {
    let test = build_test_app().await;

    let request = Request::builder()
        .uri("/fossils")
        .method("POST")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(r#"{"data":"aa"}"#))
        .unwrap();

    let response = test.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_submit_missing_content_type() {
    let test = build_test_app().await;

    let request = Request::builder()
        .uri("/fossils")
        .method("POST")
        .body(Body::from(r#"{"data":"aa"}"#))
        .unwrap();

    let response = test.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_submit_invalid_payloads() {
    let test = build_test_app().await;

    for payload in [
        json!({ "data": "" }),
        json!({ "data": "zz" }),
        json!({ "meta": "no data" }),
        json!({ "data": "00".repeat(2048) }),
    ] {
        let response = ServiceExt::<Request<Body>>::oneshot(
            test.app.clone(),
            post_fossil_request(payload.clone()),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{payload}");
    }
}

#[tokio::test]
async fn test_info_endpoint() {
    let test = build_test_app().await;

    let response = test.app.oneshot(get_request("/info")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let info: serde_json::Value = body_json(response).await;
    assert_eq!(info["name"], "batch");
    assert_eq!(info["version"], "9.9.9");
    assert_eq!(info["commit"], "cafe");
    assert!(info["description"].as_str().is_some_and(|d| !d.is_empty()));
}

#[tokio::test]
async fn test_health_endpoint() {
    let test = build_test_app().await;

    let response = test.app.oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let health: serde_json::Value = body_json(response).await;
    assert_eq!(health.get("status").and_then(|v| v.as_str()), Some("healthy"));
    assert!(health.get("version").is_some());

    let components = health.get("components").unwrap().as_object().unwrap();
    assert!(components.contains_key("api"));
    assert!(components.contains_key("scheduler"));

    let metrics = health.get("metrics").unwrap();
    assert_eq!(metrics["leaves_accepted"], 0);
}
