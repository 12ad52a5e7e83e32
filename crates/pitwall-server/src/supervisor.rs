//! Supervisão do watcher: conecta ao node, monta o pipeline e reconecta com backoff
//! linear quando a inscrição cai.

use crate::config::ServerConfig;
use anyhow::{bail, Context, Result};
use pitwall_core::Error;
use pitwall_detector::{
    Fanout, FrontRunResponder, MempoolWatcher, ResponderConfig, RiskClassifier, SwapDecoder,
    WatcherConfig,
};
use pitwall_rpc::{spawn_pending_feed, PitwallRpcClient, RpcConfig, SigningClient, FEED_CHANNEL_CAPACITY};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Teto do multiplicador de backoff
const MAX_BACKOFF_STEPS: u32 = 6;

/// Espera antes da tentativa `attempt` (a partir de 1)
pub fn reconnect_delay(base: Duration, attempt: u32) -> Duration {
    base * attempt.clamp(1, MAX_BACKOFF_STEPS)
}

/// Roda o watcher até o cancelamento; retorna erro quando as reconexões se esgotam
pub async fn supervise(
    config: ServerConfig,
    fanout: Arc<Fanout>,
    shutdown: CancellationToken,
) -> Result<()> {
    let decoder = SwapDecoder::swap_exact_eth_for_tokens()?;
    let classifier = RiskClassifier::new(config.risk_medium_gwei, config.risk_high_gwei)?;
    let mut attempt: u32 = 0;

    loop {
        if shutdown.is_cancelled() {
            return Ok(());
        }

        match run_once(&config, &decoder, classifier, fanout.clone(), &shutdown).await {
            Ok(()) => {
                info!("watcher encerrado");
                return Ok(());
            }
            Err(RunError::Connect(e)) => {
                warn!(error = %e, attempt = attempt + 1, "falha ao conectar ao node");
            }
            Err(RunError::Subscription(e)) => {
                warn!(error = %e, "inscrição na mempool caiu");
                // a conexão chegou a funcionar
                attempt = 0;
            }
            Err(RunError::Fatal(e)) => return Err(e),
        }

        attempt += 1;
        if attempt > config.max_reconnect_attempts {
            error!(attempts = attempt - 1, "reconexões esgotadas");
            bail!("reconexões ao node esgotadas após {} tentativas", attempt - 1);
        }

        let delay = reconnect_delay(config.reconnect_delay, attempt);
        info!(attempt, delay_secs = delay.as_secs(), "reconectando");
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

enum RunError {
    /// Conexão ou inscrição não estabelecida
    Connect(Error),
    /// Inscrição ativa que terminou
    Subscription(Error),
    Fatal(anyhow::Error),
}

impl RunError {
    /// Falha ao montar o pipeline: erros de configuração não melhoram com nova tentativa
    fn setup(e: Error) -> Self {
        if e.is_transient() {
            RunError::Connect(e)
        } else {
            RunError::Fatal(e.into())
        }
    }
}

async fn run_once(
    config: &ServerConfig,
    decoder: &SwapDecoder,
    classifier: RiskClassifier,
    fanout: Arc<Fanout>,
    shutdown: &CancellationToken,
) -> std::result::Result<(), RunError> {
    let client = PitwallRpcClient::new(RpcConfig {
        endpoint: config.wss_url.clone(),
        timeout: config.fetch_timeout,
        ..Default::default()
    })
    .await
    .map_err(RunError::setup)?;
    let provider = client.ws_provider().map_err(RunError::setup)?;

    let mut watcher_config = WatcherConfig::new(config.router, config.target_token);
    watcher_config.reaction_max_gwei = config.reaction_max_gwei;
    watcher_config.fetch_timeout = config.fetch_timeout;
    watcher_config.dedup_cache_size = config.dedup_cache_size;
    watcher_config.max_in_flight = config.max_in_flight;

    let mut watcher = MempoolWatcher::new(
        watcher_config,
        decoder.clone(),
        classifier,
        fanout,
        Arc::new(client),
    );

    if config.reactive_mode {
        let signer = SigningClient::new(provider.clone(), &config.private_key, config.submit_timeout)
            .await
            .map_err(RunError::setup)?;
        let responder = FrontRunResponder::new(
            Arc::new(signer),
            config.router,
            decoder.clone(),
            ResponderConfig {
                gas_increment_gwei: config.reaction_gas_increment_gwei,
                gas_limit: config.reaction_gas_limit,
                deadline_secs: config.reaction_deadline_secs,
                submit_timeout: config.submit_timeout,
            },
        );
        info!(address = ?responder.address(), max_gwei = config.reaction_max_gwei, "modo reativo ativo");
        watcher = watcher.with_responder(Arc::new(responder));
    }

    let feed_token = shutdown.child_token();
    let (feed, feed_handle) = spawn_pending_feed(
        provider,
        config.feed_mode,
        config.router,
        FEED_CHANNEL_CAPACITY,
        feed_token.clone(),
    );

    let watcher = Arc::new(watcher);
    let result = watcher.clone().run(feed, shutdown.clone()).await;
    feed_token.cancel();
    let received = watcher.stats().received;

    let feed_result = feed_handle
        .await
        .context("task do feed falhou")
        .map_err(RunError::Fatal)?;

    match (result, feed_result) {
        (Ok(()), _) => Ok(()),
        // inscrição recusada antes da primeira notificação
        (Err(_), Err(e)) if received == 0 => Err(RunError::Connect(e)),
        // o feed conhece a causa real do fechamento
        (Err(_), Err(e)) => Err(RunError::Subscription(e)),
        (Err(e), Ok(())) => Err(RunError::Subscription(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_errors_split_between_retry_and_fatal() {
        assert!(matches!(
            RunError::setup(Error::RpcError("connection refused".into())),
            RunError::Connect(_)
        ));
        assert!(matches!(
            RunError::setup(Error::TimeoutError("eth_blockNumber".into())),
            RunError::Connect(_)
        ));
        assert!(matches!(
            RunError::setup(Error::ConfigError("WALLET_PRIVATE_KEY inválida".into())),
            RunError::Fatal(_)
        ));
    }

    #[test]
    fn backoff_is_linear_and_capped() {
        let base = Duration::from_secs(3);
        assert_eq!(reconnect_delay(base, 1), Duration::from_secs(3));
        assert_eq!(reconnect_delay(base, 2), Duration::from_secs(6));
        assert_eq!(reconnect_delay(base, 6), Duration::from_secs(18));
        assert_eq!(reconnect_delay(base, 50), Duration::from_secs(18));
        assert_eq!(reconnect_delay(base, 0), Duration::from_secs(3));
    }
}
