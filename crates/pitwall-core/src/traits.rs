/*!
 * Pitwall Traits
 *
 * Traits comuns usados em toda a workspace Pitwall
 */

use async_trait::async_trait;
use crate::error::Result;
use crate::types::{PendingTransaction, TelemetryMessage, TransactionHash};
use ethereum_types::Address;
use ethers::types::transaction::eip2718::TypedTransaction;

/// Busca transações pelo hash
#[async_trait]
pub trait TransactionFetcher: Send + Sync {
    /// Retorna `None` quando o node não conhece mais a transação
    async fn get_transaction(&self, tx_hash: TransactionHash) -> Result<Option<PendingTransaction>>;
}

/// Assina e envia transações para a rede
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    /// Endereço da conta que assina
    fn address(&self) -> Address;

    /// Envia a transação e devolve o hash aceito pelo node
    async fn submit(&self, tx: TypedTransaction) -> Result<TransactionHash>;
}

/// Trait para provedores do número de bloco atual
#[async_trait]
pub trait BlockNumberProvider: Send + Sync {
    async fn block_number(&self) -> Result<u64>;
}

/// Canal de saída para um observador conectado.
///
/// `deliver` não pode bloquear; um erro significa que o observador deve ser removido.
pub trait EventSink: Send + Sync {
    fn deliver(&self, message: &TelemetryMessage) -> Result<()>;
}
