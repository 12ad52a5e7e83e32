//! Superfície HTTP do servidor.
//!
//!   GET  /                       → texto de saúde, ou observador WebSocket se for upgrade
//!   GET  /ws                     → idem
//!   POST /api/send-protected-tx  → encaminha transação assinada ao relay privado

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use futures::{SinkExt, StreamExt};
use pitwall_core::utils::{format_h256, hex_to_bytes};
use pitwall_detector::{ChannelSink, Fanout};
use pitwall_relay::PrivateRelay;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

/// Resposta de saúde para requisições sem upgrade
pub const HEALTH_TEXT: &str = "pitwall backend online";

/// Estado compartilhado pelas rotas
#[derive(Clone)]
pub struct AppState {
    pub fanout: Arc<Fanout>,
    pub relay: Arc<dyn PrivateRelay>,
    /// Mensagens pendentes por observador antes da desconexão
    pub observer_buffer: usize,
    pub shutdown: CancellationToken,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectedTxRequest {
    pub signed_raw_transaction: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProtectedTxResponse {
    pub hash: String,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/ws", get(root))
        .route("/api/send-protected-tx", post(send_protected_tx))
        // o painel roda em outra origem
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve até o token de desligamento ser cancelado
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    let shutdown = state.shutdown.clone();
    let app = build_router(state);
    info!(addr = ?listener.local_addr().ok(), "servidor HTTP escutando");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

async fn root(State(state): State<AppState>, ws: Option<WebSocketUpgrade>) -> Response {
    match ws {
        Some(ws) => ws.on_upgrade(move |socket| observe(socket, state)),
        None => HEALTH_TEXT.into_response(),
    }
}

/// Conecta o socket ao fan-out até o cliente sair, o buffer estourar ou o servidor parar
async fn observe(socket: WebSocket, state: AppState) {
    let (sink, mut events) = ChannelSink::channel(state.observer_buffer);
    let handle = match state.fanout.attach(Box::new(sink)) {
        Ok(handle) => handle,
        Err(e) => {
            warn!(error = %e, "falha ao registrar observador");
            return;
        }
    };
    let (mut outgoing, mut incoming) = socket.split();

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                let _ = outgoing.send(Message::Close(None)).await;
                break;
            }
            message = events.recv() => {
                let Some(message) = message else {
                    debug!(subscription = %handle.id().0, "observador removido pelo fan-out");
                    break;
                };
                let text = match message.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "falha ao serializar telemetria");
                        continue;
                    }
                };
                if let Err(e) = outgoing.send(Message::Text(text)).await {
                    debug!(subscription = %handle.id().0, error = %e, "envio ao observador falhou");
                    break;
                }
            }
            frame = incoming.next() => match frame {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    }

    state.fanout.detach(&handle);
}

async fn send_protected_tx(
    State(state): State<AppState>,
    body: Result<Json<ProtectedTxRequest>, JsonRejection>,
) -> Response {
    let raw = body
        .ok()
        .and_then(|Json(request)| request.signed_raw_transaction)
        .filter(|raw| !raw.trim().is_empty());
    let Some(raw) = raw else {
        return (StatusCode::BAD_REQUEST, "signedRawTransaction is required").into_response();
    };
    let Some(bytes) = hex_to_bytes(&raw).filter(|bytes| !bytes.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "signedRawTransaction must be hex-encoded").into_response();
    };

    match state.relay.send_private_transaction(&bytes).await {
        Ok(hash) => {
            let hash = format_h256(&hash);
            info!(tx = %hash, "transação enviada ao relay privado");
            Json(ProtectedTxResponse { hash }).into_response()
        }
        Err(e) => {
            warn!(error = %e, "relay recusou a transação");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
