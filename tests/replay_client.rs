use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value as JsonValue};

use chainhook_ingest::config::ReplayConfig;
use chainhook_ingest::tokens::AssetMatcher;
use chainhook_ingest::{classify, BlockSelector, ReplayClient, ReplayError};

const API_KEY: &str = "test-key";
const TOKEN: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM.fungible-token";

#[derive(Default)]
struct MockState {
    hits: AtomicU32,
}

fn block_payload(height: u64, hash: &str) -> JsonValue {
    json!({
        "apply": [{
            "block_identifier": { "index": height, "hash": hash },
            "timestamp": 1_700_000_000u64 + height,
            "transactions": [{
                "transaction_identifier": { "hash": format!("0xtx{}", height) },
                "metadata": { "success": true },
                "events": [{
                    "event_type": "ft_event",
                    "ft_event": {
                        "asset_identifier": format!("{}::token", TOKEN),
                        "action": "transfer",
                        "sender": "ST1SENDER",
                        "recipient": "ST2RECIPIENT",
                        "amount": height.to_string()
                    }
                }]
            }],
            "metadata": {}
        }],
        "rollback": []
    })
}

/// Behaviour is keyed on the stream id:
/// - `ok`: heights up to 1000 exist except 101 and 103; hashes always resolve
/// - `flaky`: two 503s, then a payload
/// - `down`: always 503
/// - `garbage`: 200 with a non-payload body
/// - `gone`: 400
async fn evaluate(
    State(state): State<Arc<MockState>>,
    Path(stream): Path<String>,
    headers: HeaderMap,
    Json(body): Json<JsonValue>,
) -> Response {
    let hit = state.hits.fetch_add(1, Ordering::SeqCst) + 1;

    if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some(API_KEY) {
        return (StatusCode::UNAUTHORIZED, "invalid api key").into_response();
    }

    match stream.as_str() {
        "ok" => {
            if let Some(hash) = body.get("index_block_hash").and_then(JsonValue::as_str) {
                return Json(block_payload(42, hash)).into_response();
            }
            match body.get("block_height").and_then(JsonValue::as_u64) {
                Some(101) | Some(103) => StatusCode::NOT_FOUND.into_response(),
                Some(h) if h <= 1000 => {
                    Json(block_payload(h, &format!("0xblock{}", h))).into_response()
                }
                Some(_) => StatusCode::NOT_FOUND.into_response(),
                None => StatusCode::BAD_REQUEST.into_response(),
            }
        }
        "flaky" if hit <= 2 => (StatusCode::SERVICE_UNAVAILABLE, "warming up").into_response(),
        "flaky" => Json(block_payload(7, "0xblock7")).into_response(),
        "down" => (StatusCode::SERVICE_UNAVAILABLE, "maintenance").into_response(),
        "garbage" => (StatusCode::OK, "{\"not\": \"a payload\"").into_response(),
        _ => (StatusCode::BAD_REQUEST, "unknown chainhook").into_response(),
    }
}

async fn spawn_mock() -> (String, Arc<MockState>) {
    let state = Arc::new(MockState::default());
    let app = Router::new()
        .route("/chainhooks/v1/me/{stream}/evaluate", post(evaluate))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), state)
}

fn client(base_url: &str, api_key: &str) -> ReplayClient {
    ReplayClient::new(&ReplayConfig {
        base_url: Some(base_url.to_string()),
        api_key: Some(api_key.to_string()),
        timeout_ms: 5_000,
        max_retries: 3,
        initial_backoff_ms: 10,
        max_backoff_ms: 40,
        concurrency: 3,
        ..ReplayConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn replays_block_by_height() {
    let (base, state) = spawn_mock().await;

    let payload = client(&base, API_KEY)
        .replay_block("ok", &BlockSelector::Height(100))
        .await
        .unwrap()
        .expect("block 100 exists");

    assert_eq!(payload.apply.len(), 1);
    assert_eq!(payload.apply[0].block_identifier.index, 100);
    assert_eq!(state.hits.load(Ordering::SeqCst), 1);

    let events = classify(&payload, &AssetMatcher::allow_list([TOKEN]));
    assert_eq!(events.transfers.len(), 1);
    assert_eq!(events.transfers[0].amount.to_string(), "100");
    assert_eq!(events.transfers[0].tx_id, "0xtx100");
}

#[tokio::test]
async fn replays_block_by_index_hash() {
    let (base, _) = spawn_mock().await;
    let hash = format!("0x{}", "ab".repeat(32));

    let payload = client(&base, API_KEY)
        .replay_block("ok", &BlockSelector::IndexBlockHash(hash.clone()))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(payload.apply[0].block_identifier.hash, hash);
}

#[tokio::test]
async fn missing_block_is_none_and_not_retried() {
    let (base, state) = spawn_mock().await;

    let payload = client(&base, API_KEY)
        .replay_block("ok", &BlockSelector::Height(5_000))
        .await
        .unwrap();

    assert!(payload.is_none());
    assert_eq!(state.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let (base, state) = spawn_mock().await;

    let payload = client(&base, API_KEY)
        .replay_block("flaky", &BlockSelector::Height(7))
        .await
        .unwrap();

    assert!(payload.is_some());
    assert_eq!(state.hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn gives_up_after_max_retries() {
    let (base, state) = spawn_mock().await;

    let err = client(&base, API_KEY)
        .replay_block("down", &BlockSelector::Height(7))
        .await
        .unwrap_err();

    assert!(matches!(err, ReplayError::Transport(_)), "got {:?}", err);
    // one initial attempt plus max_retries
    assert_eq!(state.hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn wrong_api_key_is_unauthorized_without_retry() {
    let (base, state) = spawn_mock().await;

    let err = client(&base, "wrong-key")
        .replay_block("ok", &BlockSelector::Height(100))
        .await
        .unwrap_err();

    assert!(matches!(err, ReplayError::Unauthorized { status: 401, .. }));
    assert_eq!(state.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn client_errors_are_rejected_without_retry() {
    let (base, state) = spawn_mock().await;

    let err = client(&base, API_KEY)
        .replay_block("gone", &BlockSelector::Height(1))
        .await
        .unwrap_err();

    match err {
        ReplayError::Rejected { status, body } => {
            assert_eq!(status, 400);
            assert_eq!(body, "unknown chainhook");
        }
        other => panic!("expected Rejected, got {:?}", other),
    }
    assert_eq!(state.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn undecodable_body_is_a_decode_error() {
    let (base, _) = spawn_mock().await;

    let err = client(&base, API_KEY)
        .replay_block("garbage", &BlockSelector::Height(1))
        .await
        .unwrap_err();

    assert!(matches!(err, ReplayError::Decode(_)));
}

#[tokio::test]
async fn invalid_hash_never_reaches_the_service() {
    let (base, state) = spawn_mock().await;

    let err = client(&base, API_KEY)
        .replay_block("ok", &BlockSelector::IndexBlockHash("0xabc".to_string()))
        .await
        .unwrap_err();

    assert!(matches!(err, ReplayError::InvalidRequest(_)));
    assert_eq!(state.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn range_replay_is_ordered_and_keeps_gaps() {
    let (base, state) = spawn_mock().await;

    let results = client(&base, API_KEY)
        .replay_range("ok", 99, 104)
        .await
        .unwrap();

    let heights: Vec<_> = results.iter().map(|(h, _)| *h).collect();
    assert_eq!(heights, vec![99, 100, 101, 102, 103, 104]);

    let present: Vec<_> = results
        .iter()
        .map(|(h, p)| match p {
            Some(p) => Some(p.apply[0].block_identifier.index),
            None => {
                assert!(*h == 101 || *h == 103);
                None
            }
        })
        .collect();
    assert_eq!(
        present,
        vec![Some(99), Some(100), None, Some(102), None, Some(104)]
    );
    assert_eq!(state.hits.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn replaying_twice_yields_identical_events() {
    let (base, _) = spawn_mock().await;
    let client = client(&base, API_KEY);
    let matcher = AssetMatcher::allow_list([TOKEN]);

    let first = client
        .replay_block("ok", &BlockSelector::Height(250))
        .await
        .unwrap()
        .unwrap();
    let second = client
        .replay_block("ok", &BlockSelector::Height(250))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(classify(&first, &matcher), classify(&second, &matcher));
}
