/*!
 * Pitwall Relay
 *
 * Envio de transações assinadas a um relay privado, fora da mempool pública.
 */

use async_trait::async_trait;
use ethereum_types::H256;
use ethers::signers::{LocalWallet, Signer};
use pitwall_core::{
    error::Result, traits::BlockNumberProvider, utils::keccak256, Error, TransactionHash,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Header de autenticação do relay
pub const FLASHBOTS_SIGNATURE_HEADER: &str = "X-Flashbots-Signature";

/// Canal privado de envio de transações
#[async_trait]
pub trait PrivateRelay: Send + Sync {
    /// Envia a transação assinada e devolve seu hash
    async fn send_private_transaction(&self, raw: &[u8]) -> Result<TransactionHash>;
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: [PrivateTxParams<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrivateTxParams<'a> {
    tx: &'a str,
    max_block_number: String,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    message: String,
}

/// Cliente `eth_sendPrivateTransaction` autenticado por assinatura
pub struct FlashbotsRelay {
    endpoint: String,
    client: Client,
    signer: LocalWallet,
    blocks: Arc<dyn BlockNumberProvider>,
}

impl FlashbotsRelay {
    pub fn new(
        endpoint: impl Into<String>,
        signer: LocalWallet,
        blocks: Arc<dyn BlockNumberProvider>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::ConfigError(format!("cliente HTTP do relay: {}", e)))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
            signer,
            blocks,
        })
    }

    /// Assina o corpo no formato `endereço:assinatura`
    async fn sign_body(&self, body: &[u8]) -> Result<String> {
        let digest = format!("0x{}", hex::encode(keccak256(body)));
        let signature = self
            .signer
            .sign_message(digest)
            .await
            .map_err(|e| Error::RelayError(format!("falha ao assinar requisição: {}", e)))?;
        Ok(format!("{:?}:0x{}", self.signer.address(), signature))
    }
}

#[async_trait]
impl PrivateRelay for FlashbotsRelay {
    async fn send_private_transaction(&self, raw: &[u8]) -> Result<TransactionHash> {
        if raw.is_empty() {
            return Err(Error::ValidationError("transação assinada vazia".to_string()));
        }
        let hash = H256::from(keccak256(raw));
        let block = self.blocks.block_number().await?;

        let tx_hex = format!("0x{}", hex::encode(raw));
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "eth_sendPrivateTransaction",
            params: [PrivateTxParams {
                tx: &tx_hex,
                max_block_number: format!("0x{:x}", block + 1),
            }],
        };
        let body = serde_json::to_vec(&request)
            .map_err(|e| Error::EncodeError(format!("requisição do relay: {}", e)))?;
        let signature = self.sign_body(&body).await?;

        debug!(tx = ?hash, max_block = block + 1, "enviando ao relay privado");
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(FLASHBOTS_SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::RelayError(e.to_string()))?;

        let status = response.status();
        let payload: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| Error::RelayError(format!("resposta inválida do relay ({}): {}", status, e)))?;

        if let Some(error) = payload.error {
            return Err(Error::RelayError(error.message));
        }
        if !status.is_success() {
            return Err(Error::RelayError(format!("relay respondeu {}", status)));
        }

        match payload.result.as_ref().and_then(|v| v.as_str()) {
            Some(reported) if !reported.eq_ignore_ascii_case(&format!("{:?}", hash)) => {
                warn!(tx = ?hash, reported, "relay devolveu hash diferente do calculado");
            }
            _ => {}
        }
        Ok(hash)
    }
}
