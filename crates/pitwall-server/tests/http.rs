use async_trait::async_trait;
use ethereum_types::H256;
use futures::StreamExt;
use pitwall_core::{error::Result, ClassifiedEvent, Error, RiskTier, TransactionHash};
use pitwall_detector::{EventStore, Fanout};
use pitwall_relay::PrivateRelay;
use pitwall_server::api::{ProtectedTxResponse, HEALTH_TEXT};
use pitwall_server::{serve, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

struct StubRelay {
    fail: bool,
}

#[async_trait]
impl PrivateRelay for StubRelay {
    async fn send_private_transaction(&self, raw: &[u8]) -> Result<TransactionHash> {
        if self.fail {
            return Err(Error::RelayError("nonce too low".into()));
        }
        Ok(H256::repeat_byte(raw[0]))
    }
}

struct TestServer {
    addr: SocketAddr,
    fanout: Arc<Fanout>,
    shutdown: CancellationToken,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn start(relay_fails: bool) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let fanout = Arc::new(Fanout::new(Arc::new(EventStore::new(20))));
    let shutdown = CancellationToken::new();
    let state = AppState {
        fanout: fanout.clone(),
        relay: Arc::new(StubRelay { fail: relay_fails }),
        observer_buffer: 16,
        shutdown: shutdown.clone(),
    };
    tokio::spawn(serve(listener, state));
    TestServer { addr, fanout, shutdown }
}

fn event(i: u8) -> ClassifiedEvent {
    ClassifiedEvent::new(H256::repeat_byte(i), RiskTier::Medium, 0.001, 12.0)
}

async fn next_json(
    ws: &mut tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
) -> serde_json::Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn wait_for_observers(fanout: &Fanout, n: usize) {
    for _ in 0..100 {
        if fanout.observer_count() == n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("expected {} observers, found {}", n, fanout.observer_count());
}

#[tokio::test]
async fn health_text_on_root() {
    let server = start(false).await;
    let body = reqwest::get(format!("http://{}/", server.addr))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, HEALTH_TEXT);
}

#[tokio::test]
async fn protected_tx_returns_hash() {
    let server = start(false).await;
    let response = reqwest::Client::new()
        .post(format!("http://{}/api/send-protected-tx", server.addr))
        .json(&serde_json::json!({ "signedRawTransaction": "0x02f8" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: ProtectedTxResponse = response.json().await.unwrap();
    assert_eq!(body.hash, format!("{:?}", H256::repeat_byte(0x02)));
}

#[tokio::test]
async fn protected_tx_requires_field() {
    let server = start(false).await;
    let client = reqwest::Client::new();
    let url = format!("http://{}/api/send-protected-tx", server.addr);

    let missing = client.post(&url).json(&serde_json::json!({})).send().await.unwrap();
    assert_eq!(missing.status(), 400);
    assert_eq!(missing.text().await.unwrap(), "signedRawTransaction is required");

    let not_json = client.post(&url).body("hello").send().await.unwrap();
    assert_eq!(not_json.status(), 400);

    let bad_hex = client
        .post(&url)
        .json(&serde_json::json!({ "signedRawTransaction": "0xzz" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_hex.status(), 400);
}

#[tokio::test]
async fn relay_failure_is_surfaced() {
    let server = start(true).await;
    let response = reqwest::Client::new()
        .post(format!("http://{}/api/send-protected-tx", server.addr))
        .json(&serde_json::json!({ "signedRawTransaction": "0x02f8" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
    assert_eq!(response.text().await.unwrap(), "nonce too low");
}

#[tokio::test]
async fn cross_origin_dashboard_can_post() {
    let server = start(false).await;
    let client = reqwest::Client::new();
    let url = format!("http://{}/api/send-protected-tx", server.addr);

    let preflight = client
        .request(reqwest::Method::OPTIONS, &url)
        .header("Origin", "http://localhost:5173")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .send()
        .await
        .unwrap();
    assert!(preflight.status().is_success(), "{}", preflight.status());
    assert_eq!(preflight.headers()["access-control-allow-origin"], "*");
    assert!(preflight.headers().contains_key("access-control-allow-methods"));

    let response = client
        .post(&url)
        .header("Origin", "http://localhost:5173")
        .json(&serde_json::json!({ "signedRawTransaction": "0x02f8" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn observer_gets_empty_snapshot_then_live_events() {
    let server = start(false).await;
    let (mut ws, _) = connect_async(format!("ws://{}/", server.addr)).await.unwrap();

    assert_eq!(next_json(&mut ws).await, serde_json::json!([]));
    wait_for_observers(&server.fanout, 1).await;

    server.fanout.commit(event(7));
    let live = next_json(&mut ws).await;
    assert!(live.is_object());
    assert_eq!(live["id"], format!("{:?}", H256::repeat_byte(7)));
    assert_eq!(live["type"], "Medium");
    assert_eq!(live["gas"], 12.0);
}

#[tokio::test]
async fn late_observer_gets_history_on_ws_path() {
    let server = start(false).await;
    for i in 1..=3u8 {
        server.fanout.commit(event(i));
    }

    let (mut ws, _) = connect_async(format!("ws://{}/ws", server.addr)).await.unwrap();
    let snapshot = next_json(&mut ws).await;
    let ids: Vec<_> = snapshot
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap().to_string())
        .collect();
    let expected: Vec<_> = [3u8, 2, 1]
        .iter()
        .map(|i| format!("{:?}", H256::repeat_byte(*i)))
        .collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn closed_socket_is_detached() {
    let server = start(false).await;
    let (mut ws, _) = connect_async(format!("ws://{}/", server.addr)).await.unwrap();
    let _ = next_json(&mut ws).await;
    wait_for_observers(&server.fanout, 1).await;

    ws.close(None).await.unwrap();
    drop(ws);
    wait_for_observers(&server.fanout, 0).await;
}
