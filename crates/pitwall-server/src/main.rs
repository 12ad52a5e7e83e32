//! Pitwall: vigia swaps contra o token alvo na mempool, classifica o risco de
//! front-running e transmite os eventos aos painéis conectados.

use anyhow::{Context, Result};
use pitwall_detector::{EventStore, Fanout};
use pitwall_relay::FlashbotsRelay;
use pitwall_rpc::{signer::parse_wallet, PitwallRpcClient, RpcConfig};
use pitwall_server::{api, init_tracing, supervisor, AppState, ServerConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from_env().context("configuração inválida")?;
    init_tracing(config.log_format)?;

    info!(
        router = ?config.router,
        token = ?config.target_token,
        feed = ?config.feed_mode,
        reactive = config.reactive_mode,
        listen = %config.listen_addr,
        "pitwall iniciando"
    );

    let shutdown = CancellationToken::new();
    let fanout = Arc::new(Fanout::new(Arc::new(EventStore::new(config.event_history))));

    let block_source = PitwallRpcClient::new(RpcConfig {
        endpoint: config.rpc_url.clone().unwrap_or_else(|| config.wss_url.clone()),
        timeout: config.relay_timeout,
        ..Default::default()
    })
    .await
    .context("falha ao conectar ao node para o relay")?;
    let relay = FlashbotsRelay::new(
        config.relay_url.clone(),
        parse_wallet(&config.private_key)?,
        Arc::new(block_source),
        config.relay_timeout,
    )?;

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("falha ao escutar em {}", config.listen_addr))?;
    let state = AppState {
        fanout: fanout.clone(),
        relay: Arc::new(relay),
        observer_buffer: config.observer_buffer,
        shutdown: shutdown.clone(),
    };
    let mut server = tokio::spawn(api::serve(listener, state));
    let mut watcher = tokio::spawn(supervisor::supervise(config, fanout, shutdown.clone()));

    info!("pitwall em execução, Ctrl+C para encerrar");

    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("falha ao escutar Ctrl+C")?;
            info!("sinal de desligamento recebido");
            shutdown.cancel();
            let (server, watcher) = tokio::join!(&mut server, &mut watcher);
            server.context("task HTTP falhou")??;
            watcher.context("task do watcher falhou")?
        }
        joined = &mut watcher => {
            shutdown.cancel();
            let _ = (&mut server).await;
            joined.context("task do watcher falhou")?
        }
        joined = &mut server => {
            shutdown.cancel();
            let _ = (&mut watcher).await;
            joined.context("task HTTP falhou")?
        }
    };

    if let Err(e) = &outcome {
        error!(error = %e, "pitwall encerrado com erro");
    } else {
        info!("pitwall encerrado");
    }
    outcome
}
