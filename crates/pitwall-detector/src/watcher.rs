use crate::classifier::RiskClassifier;
use crate::decoder::{DecodeOutcome, SwapDecoder};
use crate::fanout::Fanout;
use crate::responder::FrontRunResponder;
use dashmap::DashMap;
use ethereum_types::Address;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use pitwall_core::{
    error::Result,
    traits::TransactionFetcher,
    utils::{wei_to_ether, wei_to_gwei},
    ClassifiedEvent, Error, FeedItem, PendingTransaction, RiskTier, TransactionHash,
};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Intervalo, em notificações recebidas, entre logs de estatísticas
const STATS_LOG_INTERVAL: u64 = 100;

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub router: Address,
    pub target_token: Address,
    /// Só reage abaixo deste gas price
    pub reaction_max_gwei: f64,
    pub fetch_timeout: Duration,
    pub dedup_cache_size: usize,
    /// Candidatos processados ao mesmo tempo; ao atingir o limite o feed deixa de ser lido
    pub max_in_flight: usize,
}

impl WatcherConfig {
    pub fn new(router: Address, target_token: Address) -> Self {
        Self {
            router,
            target_token,
            reaction_max_gwei: 15.0,
            fetch_timeout: Duration::from_secs(10),
            dedup_cache_size: 10_000,
            max_in_flight: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Idle,
    Subscribed,
    Stopped,
}

/// Motivo do descarte de um candidato
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscardReason {
    Duplicate,
    NotFound,
    FetchFailed,
    NotRouter,
    NoMatch,
    Malformed,
    WrongToken,
    MissingGasPrice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionOutcome {
    /// Gas price no limite ou acima dele, ou transação da própria conta
    Skipped,
    /// Modo reativo desligado
    Disabled,
    Sent(TransactionHash),
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOutcome {
    Discarded(DiscardReason),
    Recorded { tier: RiskTier, reaction: ReactionOutcome },
}

#[derive(Debug, Default)]
struct WatcherStats {
    received: AtomicU64,
    recorded: AtomicU64,
    reactions_sent: AtomicU64,
    reactions_failed: AtomicU64,
    discarded: DashMap<DiscardReason, u64>,
}

/// Cópia das estatísticas de processamento
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatcherStatsSnapshot {
    pub received: u64,
    pub recorded: u64,
    pub reactions_sent: u64,
    pub reactions_failed: u64,
    pub discarded: Vec<(DiscardReason, u64)>,
}

impl WatcherStatsSnapshot {
    pub fn discarded_for(&self, reason: DiscardReason) -> u64 {
        self.discarded
            .iter()
            .find(|(r, _)| *r == reason)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

/// Orquestra o pipeline por candidato: busca, filtro, decodificação, classificação,
/// gravação com difusão e reação opcional.
pub struct MempoolWatcher {
    config: WatcherConfig,
    decoder: SwapDecoder,
    classifier: RiskClassifier,
    fanout: Arc<Fanout>,
    fetcher: Arc<dyn TransactionFetcher>,
    responder: Option<Arc<FrontRunResponder>>,
    seen: Mutex<LruCache<TransactionHash, ()>>,
    stats: WatcherStats,
    state: RwLock<WatcherState>,
}

impl MempoolWatcher {
    pub fn new(
        config: WatcherConfig,
        decoder: SwapDecoder,
        classifier: RiskClassifier,
        fanout: Arc<Fanout>,
        fetcher: Arc<dyn TransactionFetcher>,
    ) -> Self {
        let cache_size = NonZeroUsize::new(config.dedup_cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            decoder,
            classifier,
            fanout,
            fetcher,
            responder: None,
            seen: Mutex::new(LruCache::new(cache_size)),
            stats: WatcherStats::default(),
            state: RwLock::new(WatcherState::Idle),
        }
    }

    /// Liga o modo reativo
    pub fn with_responder(mut self, responder: Arc<FrontRunResponder>) -> Self {
        self.responder = Some(responder);
        self
    }

    pub fn state(&self) -> WatcherState {
        *self.state.read()
    }

    pub fn fanout(&self) -> &Arc<Fanout> {
        &self.fanout
    }

    /// Consome o feed até o cancelamento ou até o feed fechar.
    ///
    /// Cada candidato roda em sua própria task, com no máximo `max_in_flight` ao mesmo
    /// tempo. Feed fechado retorna `SubscriptionError` e deixa o watcher em `Idle`, pronto
    /// para uma nova inscrição; cancelamento leva a `Stopped`.
    pub async fn run(
        self: Arc<Self>,
        mut feed: mpsc::Receiver<FeedItem>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        *self.state.write() = WatcherState::Subscribed;
        info!(router = ?self.config.router, token = ?self.config.target_token, "watcher inscrito");

        let limiter = Arc::new(Semaphore::new(self.config.max_in_flight.max(1)));
        let mut tasks = JoinSet::new();
        let result = loop {
            // sem permissão livre o canal do feed enche e a task do feed espera
            let permit = tokio::select! {
                _ = shutdown.cancelled() => break Ok(()),
                permit = limiter.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break Err(Error::Other("limitador de candidatos fechado".to_string())),
                },
            };

            tokio::select! {
                _ = shutdown.cancelled() => break Ok(()),
                item = feed.recv() => match item {
                    Some(item) => {
                        let received = self.stats.received.fetch_add(1, Ordering::Relaxed) + 1;
                        let watcher = self.clone();
                        tasks.spawn(async move {
                            let _permit = permit;
                            watcher.process(item).await
                        });
                        if received % STATS_LOG_INTERVAL == 0 {
                            self.log_stats();
                        }
                    }
                    None => {
                        break Err(Error::SubscriptionError(
                            "feed de transações pendentes encerrado".to_string(),
                        ))
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "task de candidato falhou");
                    }
                }
            }
        };

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "task de candidato falhou");
            }
        }

        *self.state.write() = match result {
            Ok(()) => WatcherState::Stopped,
            Err(_) => WatcherState::Idle,
        };
        self.log_stats();
        result
    }

    /// Processa uma notificação do feed
    pub async fn process(&self, item: FeedItem) -> CandidateOutcome {
        let hash = item.hash();
        if !self.mark_seen(hash) {
            return self.discard(hash, DiscardReason::Duplicate);
        }

        let tx = match item {
            FeedItem::Full(tx) => tx,
            FeedItem::Hash(hash) => match self.fetch(hash).await {
                Ok(tx) => tx,
                Err(Error::NotFound(_)) => return self.discard(hash, DiscardReason::NotFound),
                Err(e) => {
                    warn!(tx = ?hash, error = %e, "falha ao buscar transação");
                    // um novo anúncio do mesmo hash deve tentar a busca outra vez
                    self.seen.lock().pop(&hash);
                    return self.discard(hash, DiscardReason::FetchFailed);
                }
            },
        };

        if tx.to != Some(self.config.router) {
            return self.discard(hash, DiscardReason::NotRouter);
        }

        let swap = match self.decoder.decode(&tx.input) {
            Ok(DecodeOutcome::Swap(swap)) => swap,
            Ok(DecodeOutcome::NoMatch) => return self.discard(hash, DiscardReason::NoMatch),
            Err(e) => {
                warn!(tx = ?hash, error = %e, "calldata malformada");
                return self.discard(hash, DiscardReason::Malformed);
            }
        };

        if !swap.ends_at(self.config.target_token) {
            return self.discard(hash, DiscardReason::WrongToken);
        }

        let gas_gwei = match tx.gas_price.map(wei_to_gwei) {
            Some(gwei) if gwei.is_finite() && gwei >= 0.0 => gwei,
            _ => return self.discard(hash, DiscardReason::MissingGasPrice),
        };

        let tier = self.classifier.classify(gas_gwei);
        let event = ClassifiedEvent::new(hash, tier, wei_to_ether(tx.value), gas_gwei);
        info!(tx = ?hash, tier = %tier, gas_gwei, value_eth = event.value_amount, "swap classificado");
        self.fanout.commit(event);
        self.stats.recorded.fetch_add(1, Ordering::Relaxed);

        let reaction = self.react(&tx, gas_gwei).await;
        CandidateOutcome::Recorded { tier, reaction }
    }

    /// Busca a transação anunciada; `NotFound` quando o node já não a conhece
    async fn fetch(&self, hash: TransactionHash) -> Result<PendingTransaction> {
        tokio::time::timeout(self.config.fetch_timeout, self.fetcher.get_transaction(hash))
            .await
            .map_err(|_| {
                Error::TimeoutError(format!("busca excedeu {:?}", self.config.fetch_timeout))
            })??
            .ok_or_else(|| Error::NotFound(format!("transação {:?}", hash)))
    }

    async fn react(&self, tx: &PendingTransaction, gas_gwei: f64) -> ReactionOutcome {
        let Some(responder) = &self.responder else {
            return ReactionOutcome::Disabled;
        };
        if gas_gwei >= self.config.reaction_max_gwei {
            debug!(tx = ?tx.hash, gas_gwei, "gas alto demais para reagir");
            return ReactionOutcome::Skipped;
        }
        if tx.from == responder.address() {
            debug!(tx = ?tx.hash, "transação da própria conta");
            return ReactionOutcome::Skipped;
        }

        match responder.react(tx).await {
            Ok(hash) => {
                self.stats.reactions_sent.fetch_add(1, Ordering::Relaxed);
                ReactionOutcome::Sent(hash)
            }
            Err(e) => {
                warn!(tx = ?tx.hash, error = %e, "falha ao enviar transação concorrente");
                self.stats.reactions_failed.fetch_add(1, Ordering::Relaxed);
                ReactionOutcome::Failed
            }
        }
    }

    /// `false` se o hash já foi visto
    fn mark_seen(&self, hash: TransactionHash) -> bool {
        self.seen.lock().put(hash, ()).is_none()
    }

    fn discard(&self, hash: TransactionHash, reason: DiscardReason) -> CandidateOutcome {
        *self.stats.discarded.entry(reason).or_insert(0) += 1;
        debug!(tx = ?hash, ?reason, "candidato descartado");
        CandidateOutcome::Discarded(reason)
    }

    pub fn stats(&self) -> WatcherStatsSnapshot {
        let mut discarded: Vec<_> = self
            .stats
            .discarded
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        discarded.sort_by_key(|(_, n)| std::cmp::Reverse(*n));
        WatcherStatsSnapshot {
            received: self.stats.received.load(Ordering::Relaxed),
            recorded: self.stats.recorded.load(Ordering::Relaxed),
            reactions_sent: self.stats.reactions_sent.load(Ordering::Relaxed),
            reactions_failed: self.stats.reactions_failed.load(Ordering::Relaxed),
            discarded,
        }
    }

    fn log_stats(&self) {
        let stats = self.stats();
        info!(
            received = stats.received,
            recorded = stats.recorded,
            reactions_sent = stats.reactions_sent,
            reactions_failed = stats.reactions_failed,
            discarded = ?stats.discarded,
            observers = self.fanout.observer_count(),
            "estatísticas do watcher"
        );
    }
}
