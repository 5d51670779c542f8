//! Client tests against an in-process backend stub.
//!
//! Run with: cargo test --test client_test

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{TimeZone, Utc};
use serde_json::json;
use tokio_test::{assert_err, assert_ok};

use well_monitor::api::{DashboardClient, Endpoint, TimeRange};
use well_monitor::error::AppError;
use well_monitor::normalize::{
    Channel, EmptyDataPolicy, FLOW_SCALING, LEVEL_SCALING, PRESSURE_SCALING, UnknownChannelPolicy,
    normalize,
};

type Seen = Arc<Mutex<Vec<HashMap<String, String>>>>;

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn client(base_url: &str) -> DashboardClient {
    DashboardClient::with_base_url(base_url, Duration::from_secs(5)).unwrap()
}

fn september_range() -> TimeRange {
    TimeRange::new(
        Utc.with_ymd_and_hms(2024, 9, 1, 10, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 9, 1, 11, 0, 0).unwrap(),
    )
}

async fn record(State(seen): State<Seen>, Query(params): Query<HashMap<String, String>>) -> Json<serde_json::Value> {
    seen.lock().unwrap().push(params);
    Json(json!({
        "Time": {"0": 1_725_184_800_000_i64, "1": 1_725_184_810_000_i64, "2": 1_725_184_820_000_i64},
        "Flow": {"0": 388, "1": 776, "2": 0},
        "Pressure": {"0": 398, "1": 398, "2": 796},
        "Level": {"0": 635, "1": 1270, "2": 635}
    }))
}

fn recording_router(seen: Seen) -> Router {
    Router::new()
        .route("/api/web/data", get(record))
        .with_state(seen)
}

#[tokio::test]
async fn fetch_data_sends_naive_iso_range_and_decodes_channels() {
    let seen: Seen = Arc::default();
    let base = serve(recording_router(seen.clone())).await;

    let raw = client(&base)
        .fetch_data(&september_range(), EmptyDataPolicy::EmptyChannels)
        .await
        .unwrap();

    let params = seen.lock().unwrap()[0].clone();
    assert_eq!(params["start"], "2024-09-01T10:00:00.000");
    assert_eq!(params["stop"], "2024-09-01T11:00:00.000");

    let scaled = normalize(&raw, UnknownChannelPolicy::PassThrough).unwrap();
    assert_eq!(
        scaled.time.as_deref(),
        Some(&[1_725_184_800_000, 1_725_184_810_000, 1_725_184_820_000][..])
    );
    let flow = scaled.channel(Channel::Flow).unwrap();
    assert!((flow[1] - 776.0 * FLOW_SCALING).abs() < 1e-9);
    let pressure = scaled.channel(Channel::Pressure).unwrap();
    assert!((pressure[2] - 796.0 * PRESSURE_SCALING).abs() < 1e-9);
    let level = scaled.channel(Channel::Level).unwrap();
    assert!((level[0] - 635.0 * LEVEL_SCALING).abs() < 1e-9);
}

#[tokio::test]
async fn reversed_range_is_still_requested() {
    let seen: Seen = Arc::default();
    let base = serve(recording_router(seen.clone())).await;
    let forward = september_range();
    let reversed = TimeRange::new(forward.stop, forward.start);

    client(&base)
        .fetch_data(&reversed, EmptyDataPolicy::EmptyChannels)
        .await
        .unwrap();

    let params = seen.lock().unwrap()[0].clone();
    assert_eq!(params["start"], "2024-09-01T11:00:00.000");
    assert_eq!(params["stop"], "2024-09-01T10:00:00.000");
}

#[tokio::test]
async fn empty_data_follows_policy() {
    let base = serve(Router::new().route("/api/web/data", get(|| async { Json(json!({})) }))).await;
    let client = client(&base);

    let raw = client
        .fetch_data(&september_range(), EmptyDataPolicy::EmptyChannels)
        .await
        .unwrap();
    for channel in ["Time", "Flow", "Pressure", "Level"] {
        assert_eq!(raw.get(channel).map(<[f64]>::len), Some(0), "{channel}");
    }

    let err = client
        .fetch_data(&september_range(), EmptyDataPolicy::Reject)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::EmptyResult(_)));
}

#[tokio::test]
async fn misaligned_channels_are_rejected() {
    let base = serve(Router::new().route(
        "/api/web/data",
        get(|| async { Json(json!({"Time": {"0": 1, "1": 2}, "Flow": {"0": 5}})) }),
    ))
    .await;

    let err = client(&base)
        .fetch_data(&september_range(), EmptyDataPolicy::EmptyChannels)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Parse(_)));
}

#[tokio::test]
async fn channels_with_different_index_keys_are_rejected() {
    let base = serve(Router::new().route(
        "/api/web/data",
        get(|| async { Json(json!({"Time": {"0": 1, "1": 2}, "Flow": {"0": 5, "2": 6}})) }),
    ))
    .await;

    let err = assert_err!(
        client(&base)
            .fetch_data(&september_range(), EmptyDataPolicy::EmptyChannels)
            .await
    );
    assert!(matches!(err, AppError::Parse(_)));
}

#[tokio::test]
async fn server_error_page_becomes_message() {
    let base = serve(Router::new().route(
        "/api/web/data",
        get(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html("<!doctype html><title>500 Internal Server Error</title><h1>Internal Server Error</h1><p>Database unreachable.</p>"),
            )
        }),
    ))
    .await;

    let err = client(&base)
        .fetch_data(&september_range(), EmptyDataPolicy::EmptyChannels)
        .await
        .unwrap_err();
    match err {
        AppError::Server { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "[500 Internal Server Error] Database unreachable.");
        }
        other => panic!("expected server error, got {other:?}"),
    }
}

#[tokio::test]
async fn error_page_without_paragraph_degrades() {
    let base = serve(
        Router::new()
            .route(
                "/api/web/logs",
                get(|| async { (StatusCode::NOT_FOUND, Html("<title>404 Not Found</title><h1>Nope</h1>")) }),
            )
            .route(
                "/api/web/sync",
                get(|| async { (StatusCode::BAD_GATEWAY, "upstream reset").into_response() }),
            ),
    )
    .await;
    let client = client(&base);

    let err = assert_err!(client.fetch_logs(&september_range()).await);
    assert_eq!(err.display_message(), "[404 Not Found]");

    let err = assert_err!(client.fetch_sync().await);
    assert!(matches!(err, AppError::Server { status: 502, .. }));
    assert_eq!(err.display_message(), "Server responded with HTTP 502 Bad Gateway");
}

#[tokio::test]
async fn unreachable_backend_is_a_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{addr}"))
        .fetch(Endpoint::Sync, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Network(_)));
}

#[tokio::test]
async fn non_json_success_is_a_parse_error() {
    let base = serve(Router::new().route("/api/web/sync", get(|| async { "<html>ok</html>" }))).await;
    let err = client(&base).fetch_sync().await.unwrap_err();
    assert!(matches!(err, AppError::Parse(_)));
}

#[tokio::test]
async fn sync_timestamps_are_converted() {
    let base = serve(Router::new().route(
        "/api/web/sync",
        get(|| async { Json(json!({"last_sync": 1_725_192_300_000_i64, "last_data": 1_725_184_800_000_i64})) }),
    ))
    .await;

    let status = assert_ok!(client(&base).fetch_sync().await);
    assert_eq!(status.last_sync, Some(Utc.with_ymd_and_hms(2024, 9, 1, 12, 5, 0).unwrap()));
    assert_eq!(status.last_data, Some(Utc.with_ymd_and_hms(2024, 9, 1, 10, 0, 0).unwrap()));
}

#[tokio::test]
async fn logs_payload_and_empty_logs() {
    let base = serve(
        Router::new()
            .route(
                "/api/web/logs",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    if params.get("start").is_some_and(|s| s.starts_with("2024-09-01")) {
                        Json(json!({
                            "columns": ["Time", "Message"],
                            "data": [[1_725_184_800_000_i64, "Pump started"]]
                        }))
                    } else {
                        Json(json!({}))
                    }
                }),
            ),
    )
    .await;
    let client = client(&base);

    let logs = client.fetch_logs(&september_range()).await.unwrap();
    assert_eq!(logs.columns, vec!["Time", "Message"]);
    assert_eq!(logs.data.len(), 1);

    let earlier = TimeRange::new(
        Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap(),
    );
    let empty = client.fetch_logs(&earlier).await.unwrap();
    assert!(empty.columns.is_empty());
    assert!(empty.is_empty());
}
