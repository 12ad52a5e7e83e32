/*!
 * Pitwall Types
 *
 * Tipos comuns usados em toda a workspace Pitwall
 */

use chrono::{DateTime, Utc};
use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Alias para hash de transação
pub type TransactionHash = H256;

/// Transação pendente observada na mempool.
///
/// Vive apenas durante o processamento de uma notificação.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    pub hash: TransactionHash,
    pub from: Address,
    pub to: Option<Address>,
    pub input: Vec<u8>,
    pub value: U256,
    /// `gasPrice` legado ou, para transações tipadas, `maxFeePerGas`
    pub gas_price: Option<U256>,
}

impl From<ethers::types::Transaction> for PendingTransaction {
    fn from(tx: ethers::types::Transaction) -> Self {
        Self {
            hash: tx.hash,
            from: tx.from,
            to: tx.to,
            input: tx.input.to_vec(),
            value: tx.value,
            gas_price: tx.gas_price.or(tx.max_fee_per_gas),
        }
    }
}

/// Item entregue pelo feed de transações pendentes
#[derive(Debug, Clone)]
pub enum FeedItem {
    /// Apenas o hash; o watcher precisa buscar a transação
    Hash(TransactionHash),
    /// Transação completa entregue pelo provedor
    Full(PendingTransaction),
}

impl FeedItem {
    pub fn hash(&self) -> TransactionHash {
        match self {
            FeedItem::Hash(hash) => *hash,
            FeedItem::Full(tx) => tx.hash,
        }
    }
}

/// Parâmetros de um `swapExactETHForTokens` decodificado
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedSwap {
    pub amount_out_min: U256,
    pub path: Vec<Address>,
    pub recipient: Address,
    pub deadline: U256,
}

impl DecodedSwap {
    /// Verifica se a rota termina no token informado
    pub fn ends_at(&self, token: Address) -> bool {
        self.path.last() == Some(&token)
    }
}

/// Nível de risco derivado do preço de gás
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskTier::Low => write!(f, "Low"),
            RiskTier::Medium => write!(f, "Medium"),
            RiskTier::High => write!(f, "High"),
        }
    }
}

/// Evento classificado, unidade visível para os observadores.
///
/// Formato no fio: `{ id, type, message, timestamp, value, gas }`, com `type` em
/// `"Low" | "Medium" | "High"`, `timestamp` em milissegundos Unix, `value` em ETH e
/// `gas` em gwei.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedEvent {
    pub id: TransactionHash,
    #[serde(rename = "type")]
    pub risk_tier: RiskTier,
    pub message: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "value")]
    pub value_amount: f64,
    #[serde(rename = "gas")]
    pub gas_price_gwei: f64,
}

impl ClassifiedEvent {
    /// Cria um evento com a mensagem padrão
    pub fn new(id: TransactionHash, risk_tier: RiskTier, value_amount: f64, gas_price_gwei: f64) -> Self {
        Self {
            id,
            risk_tier,
            message: format!(
                "{} ETH swap at {:.2} gwei ({} risk)",
                value_amount, gas_price_gwei, risk_tier
            ),
            timestamp: Utc::now(),
            value_amount,
            gas_price_gwei,
        }
    }
}

/// Mensagem enviada pelo canal de telemetria.
///
/// O histórico vai como array JSON e cada evento novo como objeto JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelemetryMessage {
    Snapshot(Vec<ClassifiedEvent>),
    Event(ClassifiedEvent),
}

impl TelemetryMessage {
    /// Serializa a mensagem para texto JSON
    pub fn to_json(&self) -> crate::error::Result<String> {
        serde_json::to_string(self)
            .map_err(|e| crate::Error::EncodeError(format!("Falha ao serializar telemetria: {}", e)))
    }
}

/// Identificador de inscrição de observador
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub String);
