/*!
 * Pitwall RPC
 *
 * Cliente RPC para interação com nodes Ethereum
 */

pub mod feed;
pub mod signer;

pub use feed::{spawn_pending_feed, FeedMode, FEED_CHANNEL_CAPACITY};
pub use signer::SigningClient;

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider, Ws};
use pitwall_core::{
    error::Result,
    traits::{BlockNumberProvider, TransactionFetcher},
    Error, PendingTransaction, TransactionHash,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Configuração do cliente RPC
#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub endpoint: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:8546".to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 1,
            retry_delay: Duration::from_millis(200),
        }
    }
}

/// Enum para diferentes tipos de transporte
#[derive(Clone)]
pub enum TransportType {
    Http(Arc<Provider<Http>>),
    WebSocket(Arc<Provider<Ws>>),
}

/// Cliente RPC para Ethereum
#[derive(Clone)]
pub struct PitwallRpcClient {
    transport: TransportType,
    config: RpcConfig,
}

impl PitwallRpcClient {
    /// Cria um novo cliente RPC HTTP
    pub async fn new_http(config: RpcConfig) -> Result<Self> {
        let provider = Provider::<Http>::try_from(config.endpoint.as_str())
            .map_err(|e| Error::RpcError(format!("Falha ao conectar via HTTP: {}", e)))?;

        let client = Self {
            transport: TransportType::Http(Arc::new(provider)),
            config,
        };
        client.verify().await?;
        Ok(client)
    }

    /// Cria um novo cliente RPC WebSocket
    pub async fn new_websocket(config: RpcConfig) -> Result<Self> {
        let ws = Ws::connect(config.endpoint.as_str())
            .await
            .map_err(|e| Error::RpcError(format!("Falha ao conectar via WebSocket: {}", e)))?;

        let client = Self {
            transport: TransportType::WebSocket(Arc::new(Provider::new(ws))),
            config,
        };
        client.verify().await?;
        Ok(client)
    }

    /// Cria um novo cliente baseado na URL
    pub async fn new(config: RpcConfig) -> Result<Self> {
        if config.endpoint.starts_with("ws") {
            Self::new_websocket(config).await
        } else {
            Self::new_http(config).await
        }
    }

    /// Verifica a conexão consultando o bloco atual
    async fn verify(&self) -> Result<()> {
        let block = self.get_block_number().await.map_err(|e| {
            Error::RpcError(format!("Falha ao conectar ao node Ethereum: {}", e))
        })?;
        debug!(endpoint = %self.config.endpoint, block, "conectado ao node");
        Ok(())
    }

    /// Provider WebSocket, necessário para inscrições
    pub fn ws_provider(&self) -> Result<Arc<Provider<Ws>>> {
        match &self.transport {
            TransportType::WebSocket(provider) => Ok(provider.clone()),
            TransportType::Http(_) => Err(Error::ConfigError(
                "inscrições na mempool exigem um endpoint WebSocket".to_string(),
            )),
        }
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    /// Aplica o timeout configurado a uma chamada ao node
    async fn with_timeout<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.config.timeout, fut)
            .await
            .map_err(|_| Error::TimeoutError(format!("{} excedeu {:?}", what, self.config.timeout)))?
    }

    /// Obtém o número do bloco atual
    pub async fn get_block_number(&self) -> Result<u64> {
        let block_number = self
            .with_timeout("eth_blockNumber", async {
                match &self.transport {
                    TransportType::Http(provider) => provider.get_block_number().await,
                    TransportType::WebSocket(provider) => provider.get_block_number().await,
                }
                .map_err(|e| Error::RpcError(format!("Falha ao obter número do bloco: {}", e)))
            })
            .await?;

        Ok(block_number.as_u64())
    }

    /// Obtém o chain id da rede conectada
    pub async fn get_chain_id(&self) -> Result<u64> {
        let chain_id = self
            .with_timeout("eth_chainId", async {
                match &self.transport {
                    TransportType::Http(provider) => provider.get_chainid().await,
                    TransportType::WebSocket(provider) => provider.get_chainid().await,
                }
                .map_err(|e| Error::RpcError(format!("Falha ao obter chain id: {}", e)))
            })
            .await?;

        Ok(chain_id.as_u64())
    }

    /// Busca uma transação pelo hash, repetindo em caso de erro de RPC
    pub async fn get_transaction(&self, tx_hash: TransactionHash) -> Result<Option<PendingTransaction>> {
        let mut attempt = 0;
        loop {
            let result = self
                .with_timeout("eth_getTransactionByHash", async {
                    match &self.transport {
                        TransportType::Http(provider) => provider.get_transaction(tx_hash).await,
                        TransportType::WebSocket(provider) => provider.get_transaction(tx_hash).await,
                    }
                    .map_err(|e| Error::RpcError(format!("Falha ao obter transação: {}", e)))
                })
                .await;

            match result {
                Ok(tx) => return Ok(tx.map(PendingTransaction::from)),
                Err(Error::RpcError(_)) if attempt < self.config.max_retries => {
                    attempt += 1;
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl TransactionFetcher for PitwallRpcClient {
    async fn get_transaction(&self, tx_hash: TransactionHash) -> Result<Option<PendingTransaction>> {
        self.get_transaction(tx_hash).await
    }
}

#[async_trait]
impl BlockNumberProvider for PitwallRpcClient {
    async fn block_number(&self) -> Result<u64> {
        self.get_block_number().await
    }
}
