/*!
 * Cliente assinante
 *
 * Assina transações com a chave local e envia pelo mesmo provider do feed.
 */

use async_trait::async_trait;
use ethereum_types::Address;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Middleware, Provider, Ws};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use pitwall_core::{error::Result, traits::TransactionSubmitter, Error, TransactionHash};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Envia transações assinadas pela carteira configurada
pub struct SigningClient {
    inner: SignerMiddleware<Provider<Ws>, LocalWallet>,
    timeout: Duration,
}

impl SigningClient {
    /// Cria o cliente consultando o chain id do node
    pub async fn new(provider: Arc<Provider<Ws>>, private_key: &str, timeout: Duration) -> Result<Self> {
        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| Error::RpcError(format!("Falha ao obter chain id: {}", e)))?;
        let wallet = parse_wallet(private_key)?.with_chain_id(chain_id.as_u64());
        debug!(address = ?wallet.address(), chain_id = %chain_id, "carteira carregada");

        Ok(Self {
            inner: SignerMiddleware::new(Provider::clone(&provider), wallet),
            timeout,
        })
    }
}

/// Interpreta uma chave privada hexadecimal, com ou sem `0x`
pub fn parse_wallet(private_key: &str) -> Result<LocalWallet> {
    private_key
        .trim()
        .parse::<LocalWallet>()
        .map_err(|_| Error::ConfigError("WALLET_PRIVATE_KEY inválida".to_string()))
}

#[async_trait]
impl TransactionSubmitter for SigningClient {
    fn address(&self) -> Address {
        self.inner.address()
    }

    async fn submit(&self, tx: TypedTransaction) -> Result<TransactionHash> {
        let pending = tokio::time::timeout(self.timeout, self.inner.send_transaction(tx, None))
            .await
            .map_err(|_| Error::TimeoutError(format!("envio excedeu {:?}", self.timeout)))?
            .map_err(|e| Error::SubmissionError(e.to_string()))?;
        Ok(pending.tx_hash())
    }
}
