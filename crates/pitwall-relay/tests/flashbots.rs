use async_trait::async_trait;
use ethereum_types::H256;
use ethers::signers::LocalWallet;
use pitwall_core::{error::Result, traits::BlockNumberProvider, utils::keccak256, Error};
use pitwall_relay::{FlashbotsRelay, PrivateRelay, FLASHBOTS_SIGNATURE_HEADER};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header_exists, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

struct FixedBlock(u64);

#[async_trait]
impl BlockNumberProvider for FixedBlock {
    async fn block_number(&self) -> Result<u64> {
        Ok(self.0)
    }
}

fn relay(uri: String) -> FlashbotsRelay {
    let wallet = LocalWallet::from_str(KEY).unwrap();
    FlashbotsRelay::new(uri, wallet, Arc::new(FixedBlock(100)), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn sends_signed_private_transaction() {
    let server = MockServer::start().await;
    let raw = vec![0x02, 0xf8, 0x70, 0x01];
    let expected = H256::from(keccak256(&raw));
    Mock::given(method("POST"))
        .and(header_exists(FLASHBOTS_SIGNATURE_HEADER))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": format!("{:?}", expected),
        })))
        .expect(1)
        .mount(&server)
        .await;

    let hash = relay(server.uri()).send_private_transaction(&raw).await.unwrap();
    assert_eq!(hash, expected);

    let requests = server.received_requests().await.unwrap();
    let request = &requests[0];
    let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(body["method"], "eth_sendPrivateTransaction");
    assert_eq!(body["params"][0]["tx"], "0x02f87001");
    assert_eq!(body["params"][0]["maxBlockNumber"], "0x65");
}

#[tokio::test]
async fn relay_error_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32000, "message": "insufficient funds for gas * price + value" },
        })))
        .mount(&server)
        .await;

    let err = relay(server.uri()).send_private_transaction(&[0x01]).await.unwrap_err();
    assert!(matches!(err, Error::RelayError(_)));
    assert_eq!(err.to_string(), "insufficient funds for gas * price + value");
}

#[tokio::test]
async fn non_json_failure_is_relay_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = relay(server.uri()).send_private_transaction(&[0x01]).await.unwrap_err();
    assert!(matches!(err, Error::RelayError(_)));
}

#[tokio::test]
async fn empty_transaction_is_rejected_locally() {
    let server = MockServer::start().await;
    let err = relay(server.uri()).send_private_transaction(&[]).await.unwrap_err();
    assert!(matches!(err, Error::ValidationError(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}
