//! End-to-end tests for the relay: real listeners on ephemeral ports, a fake
//! upstream JSON store, and a reqwest client reading the API and the SSE
//! streams.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use buslive_core::{spawn_refresh_loops, BusRegistry, RelayState, UpstreamClient};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// In-memory stand-in for the key-addressed upstream store.
#[derive(Clone, Default)]
struct FakeUpstream {
    values: Arc<Mutex<HashMap<String, Value>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

impl FakeUpstream {
    fn set(&self, bus: &str, value: Value) {
        self.values.lock().unwrap().insert(bus.to_string(), value);
    }

    fn fail(&self, bus: &str) {
        self.failing.lock().unwrap().insert(bus.to_string());
    }

    fn hits(&self, bus: &str) -> usize {
        self.hits.lock().unwrap().get(bus).copied().unwrap_or(0)
    }

    fn total_hits(&self) -> usize {
        self.hits.lock().unwrap().values().sum()
    }

    /// Serve the store on an ephemeral port, returning its base URL.
    async fn spawn(&self) -> String {
        let app = Router::new()
            .route("/:key", get(serve_key))
            .with_state(self.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }
}

async fn serve_key(Path(key): Path<String>, State(up): State<FakeUpstream>) -> Response {
    let bus = key.strip_suffix(".json").unwrap_or(&key).to_string();
    *up.hits.lock().unwrap().entry(bus.clone()).or_insert(0) += 1;

    if up.failing.lock().unwrap().contains(&bus) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    match up.values.lock().unwrap().get(&bus) {
        Some(v) => Json(v.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Relay wired to a fake upstream, served on an ephemeral port.
struct TestRelay {
    base_url: String,
    state: Arc<RelayState>,
    shutdown: CancellationToken,
}

impl TestRelay {
    async fn spawn(upstream_url: &str, ttl: Duration) -> Self {
        let registry = BusRegistry::numbered(5);
        let fetcher = Arc::new(UpstreamClient::new(upstream_url).unwrap());
        let state = Arc::new(RelayState::with_ttl(registry, fetcher, ttl));

        let app = buslive::api::app_router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            shutdown: CancellationToken::new(),
        }
    }

    fn start_refresh_loops(&self) {
        spawn_refresh_loops(&self.state, &self.shutdown);
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Read the next `data:` frame from an open SSE response.
async fn next_event(resp: &mut reqwest::Response, buf: &mut String) -> Option<Value> {
    loop {
        if let Some(idx) = buf.find("\n\n") {
            let frame: String = buf.drain(..idx + 2).collect();
            let data: String = frame
                .lines()
                .filter_map(|l| l.strip_prefix("data: "))
                .collect();
            if !data.is_empty() {
                return serde_json::from_str(&data).ok();
            }
            continue;
        }
        let chunk = resp.chunk().await.ok()??;
        buf.push_str(std::str::from_utf8(&chunk).ok()?);
    }
}

const EVENT_WAIT: Duration = Duration::from_secs(3);
const QUIET_WAIT: Duration = Duration::from_millis(400);

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_bus_rejected_without_upstream_fetch() {
    let upstream = FakeUpstream::default();
    let upstream_url = upstream.spawn().await;
    let relay = TestRelay::spawn(&upstream_url, Duration::from_secs(2)).await;

    let resp = reqwest::get(relay.url("/api/Bus9")).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    let resp = reqwest::get(relay.url("/stream/Bus9")).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    assert_eq!(upstream.total_hits(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reads_within_ttl_coalesce_to_one_fetch() {
    let upstream = FakeUpstream::default();
    upstream.set("Bus1", json!({"lat": 1, "lon": 2}));
    let upstream_url = upstream.spawn().await;
    let relay = TestRelay::spawn(&upstream_url, Duration::from_secs(2)).await;

    for _ in 0..3 {
        let resp = reqwest::get(relay.url("/api/Bus1")).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({"lat": 1, "lon": 2}));
    }
    assert_eq!(upstream.hits("Bus1"), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_upstream_error_propagates_and_stays_isolated() {
    let upstream = FakeUpstream::default();
    upstream.set("Bus1", json!({"lat": 1}));
    upstream.fail("Bus2");
    let upstream_url = upstream.spawn().await;
    let relay = TestRelay::spawn(&upstream_url, Duration::from_secs(2)).await;

    let resp = reqwest::get(relay.url("/api/Bus2")).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);

    let resp = reqwest::get(relay.url("/api/Bus1")).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stream_delivers_only_changes() {
    let upstream = FakeUpstream::default();
    upstream.set("Bus1", json!({"lat": 1, "lon": 2}));
    let upstream_url = upstream.spawn().await;
    let relay = TestRelay::spawn(&upstream_url, Duration::from_millis(100)).await;
    relay.start_refresh_loops();

    // Let the first tick publish before the client connects; a subscriber
    // only sees values published after it joins
    tokio::time::sleep(Duration::from_millis(300)).await;

    let mut resp = reqwest::get(relay.url("/stream/Bus1")).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let mut buf = String::new();

    // Value unchanged, so nothing arrives
    assert!(timeout(QUIET_WAIT, next_event(&mut resp, &mut buf))
        .await
        .is_err());

    upstream.set("Bus1", json!({"lat": 1, "lon": 3}));
    let event = timeout(EVENT_WAIT, next_event(&mut resp, &mut buf))
        .await
        .expect("change should be broadcast within one TTL tick")
        .unwrap();
    assert_eq!(event, json!({"lat": 1, "lon": 3}));

    // And quiet again until the next change
    assert!(timeout(QUIET_WAIT, next_event(&mut resp, &mut buf))
        .await
        .is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_two_subscribers_see_identical_sequences() {
    let upstream = FakeUpstream::default();
    upstream.set("Bus3", json!({"seq": 0}));
    let upstream_url = upstream.spawn().await;
    let relay = TestRelay::spawn(&upstream_url, Duration::from_millis(100)).await;
    relay.start_refresh_loops();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let mut resp_a = reqwest::get(relay.url("/stream/Bus3")).await.unwrap();
    let mut resp_b = reqwest::get(relay.url("/stream/Bus3")).await.unwrap();
    let (mut buf_a, mut buf_b) = (String::new(), String::new());

    let mut seq_a = Vec::new();
    let mut seq_b = Vec::new();
    for n in 1..=3 {
        upstream.set("Bus3", json!({"seq": n}));
        seq_a.push(
            timeout(EVENT_WAIT, next_event(&mut resp_a, &mut buf_a))
                .await
                .expect("subscriber a should see the change")
                .unwrap(),
        );
        seq_b.push(
            timeout(EVENT_WAIT, next_event(&mut resp_b, &mut buf_b))
                .await
                .expect("subscriber b should see the change")
                .unwrap(),
        );
    }

    let expected: Vec<Value> = (1..=3).map(|n| json!({"seq": n})).collect();
    assert_eq!(seq_a, expected);
    assert_eq!(seq_b, expected);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_disconnected_subscriber_is_deregistered() {
    let upstream = FakeUpstream::default();
    upstream.set("Bus1", json!({"lat": 1}));
    let upstream_url = upstream.spawn().await;
    let relay = TestRelay::spawn(&upstream_url, Duration::from_millis(100)).await;

    let bus = relay.state.registry.resolve("Bus1").unwrap();
    {
        let resp = reqwest::get(relay.url("/stream/Bus1")).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        // Session is registered once the response headers are out
        assert_eq!(relay.state.subscriptions.subscriber_count(&bus), 1);
        drop(resp);
    }

    // Server notices the disconnect when it next touches the transport; the
    // refresh loop publishing is what drives that here
    relay.start_refresh_loops();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    loop {
        upstream.set("Bus1", json!({ "nonce": rand_nonce() }));
        tokio::time::sleep(Duration::from_millis(150)).await;
        if relay.state.subscriptions.subscriber_count(&bus) == 0 {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "dead subscriber channel was never pruned"
        );
    }
}

fn rand_nonce() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .subsec_nanos()
        .into()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_health_and_fleet_listing() {
    let upstream = FakeUpstream::default();
    let upstream_url = upstream.spawn().await;
    let relay = TestRelay::spawn(&upstream_url, Duration::from_secs(2)).await;

    let body: Value = reqwest::get(relay.url("/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "healthy");

    let buses: Vec<String> = reqwest::get(relay.url("/api/buses"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(buses, vec!["Bus1", "Bus2", "Bus3", "Bus4", "Bus5"]);

    let detailed: Value = reqwest::get(relay.url("/health/detailed"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detailed["buses"].as_array().unwrap().len(), 5);
    assert_eq!(detailed["buses"][0]["subscribers"], 0);
}
