/*!
 * Feed de transações pendentes
 *
 * Inscreve no node via WebSocket e encaminha cada notificação para um canal limitado.
 */

use ethereum_types::Address;
use ethers::providers::{Middleware, Provider, Ws};
use ethers::types::{Transaction, TxHash};
use futures::{pin_mut, Stream, StreamExt};
use pitwall_core::{error::Result, Error, FeedItem, PendingTransaction};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Capacidade padrão do canal entre feed e watcher
pub const FEED_CHANNEL_CAPACITY: usize = 1024;

/// Forma de inscrição na mempool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    /// `newPendingTransactions`, apenas hashes
    Hashes,
    /// `newPendingTransactions` com objetos completos
    Full,
    /// `alchemy_pendingTransactions` filtrado pelo router
    Alchemy,
}

impl FromStr for FeedMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hashes" | "hash" => Ok(FeedMode::Hashes),
            "full" => Ok(FeedMode::Full),
            "alchemy" => Ok(FeedMode::Alchemy),
            other => Err(Error::ConfigError(format!("FEED_MODE desconhecido: {}", other))),
        }
    }
}

/// Inicia o feed em uma task própria.
///
/// A task termina com `Ok` quando o token é cancelado ou o receptor é descartado, e com
/// `SubscriptionError` quando o node encerra a inscrição.
pub fn spawn_pending_feed(
    provider: Arc<Provider<Ws>>,
    mode: FeedMode,
    router: Address,
    capacity: usize,
    shutdown: CancellationToken,
) -> (mpsc::Receiver<FeedItem>, JoinHandle<Result<()>>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let handle = tokio::spawn(async move { run_feed(provider, mode, router, tx, shutdown).await });
    (rx, handle)
}

async fn run_feed(
    provider: Arc<Provider<Ws>>,
    mode: FeedMode,
    router: Address,
    tx: mpsc::Sender<FeedItem>,
    shutdown: CancellationToken,
) -> Result<()> {
    match mode {
        FeedMode::Hashes => {
            let stream = provider
                .subscribe_pending_txs()
                .await
                .map_err(|e| Error::SubscriptionError(format!("newPendingTransactions: {}", e)))?;
            info!(?mode, "inscrito em transações pendentes");
            forward(stream, |hash: TxHash| FeedItem::Hash(hash), &tx, &shutdown).await
        }
        FeedMode::Full => {
            let stream = provider
                .subscribe_full_pending_txs()
                .await
                .map_err(|e| Error::SubscriptionError(format!("newPendingTransactions: {}", e)))?;
            info!(?mode, "inscrito em transações pendentes");
            forward(stream, full_item, &tx, &shutdown).await
        }
        FeedMode::Alchemy => {
            let params = ("alchemy_pendingTransactions", json!({ "toAddress": router }));
            let stream = provider
                .subscribe::<_, Transaction>(params)
                .await
                .map_err(|e| {
                    Error::SubscriptionError(format!("alchemy_pendingTransactions: {}", e))
                })?;
            info!(?mode, router = ?router, "inscrito em transações pendentes");
            forward(stream, full_item, &tx, &shutdown).await
        }
    }
}

fn full_item(tx: Transaction) -> FeedItem {
    FeedItem::Full(PendingTransaction::from(tx))
}

async fn forward<S, T, F>(
    stream: S,
    map: F,
    tx: &mpsc::Sender<FeedItem>,
    shutdown: &CancellationToken,
) -> Result<()>
where
    S: Stream<Item = T>,
    F: Fn(T) -> FeedItem,
{
    pin_mut!(stream);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("feed encerrado por cancelamento");
                return Ok(());
            }
            next = stream.next() => match next {
                Some(item) => {
                    if tx.send(map(item)).await.is_err() {
                        debug!("receptor do feed descartado");
                        return Ok(());
                    }
                }
                None => {
                    return Err(Error::SubscriptionError(
                        "stream de transações pendentes encerrado pelo node".to_string(),
                    ));
                }
            }
        }
    }
}
