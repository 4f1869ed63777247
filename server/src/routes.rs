//! HTTP-Handler des Servers
//!
//! - `POST {prefix}/webrtc/openai/ephemeral` – Realtime-Credential ausstellen
//! - `GET /ws` – WebSocket fuer den Session-Hub
//! - Fallback – 404 im Fehler-Envelope

use adda_core::{EphemeralSession, SessionConfig};
use adda_signaling::ClientConnection;
use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Json, Response},
};
use futures_util::{future, SinkExt, StreamExt};
use serde::Serialize;
use serde_json::json;

use crate::error::ApiError;
use crate::AppState;

// ---------------------------------------------------------------------------
// Realtime
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct EphemeralAntwort {
    pub success: bool,
    pub session: EphemeralSession,
}

/// `POST {prefix}/webrtc/openai/ephemeral`
///
/// Ein leerer Body gilt als `{}`; alle Felder sind optional.
pub async fn ephemeral_ausstellen(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<EphemeralAntwort>, ApiError> {
    let config = session_config_lesen(&body)?;

    match state.issuer.ausstellen(&config).await {
        Ok(session) => {
            state.metriken.credentials_total.inc();
            Ok(Json(EphemeralAntwort {
                success: true,
                session,
            }))
        }
        Err(e) => {
            if let Some(status) = e.upstream_status() {
                state.metriken.upstream_fehler(Some(status));
            } else if matches!(e, adda_core::ArcadeError::Transport(_)) {
                state.metriken.upstream_fehler(None);
            }
            Err(e.into())
        }
    }
}

fn session_config_lesen(body: &[u8]) -> Result<SessionConfig, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(SessionConfig::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::validierung(e.to_string()))
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

/// `GET /ws` – Upgrade auf den Session-Hub
pub async fn ws_verbinden(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| ws_verarbeiten(socket, state))
}

async fn ws_verarbeiten(socket: WebSocket, state: AppState) {
    state.metriken.ws_connections.inc();
    state.metriken.ws_connections_total.inc();

    let (sender, receiver) = socket.split();

    // Nur Text-Frames; Close oder Lesefehler beenden den Strom
    let eingang = Box::pin(
        receiver
            .take_while(|nachricht| {
                future::ready(matches!(nachricht, Ok(m) if !matches!(m, Message::Close(_))))
            })
            .filter_map(|nachricht| {
                future::ready(match nachricht {
                    Ok(Message::Text(text)) => Some(text),
                    _ => None,
                })
            }),
    );
    let ausgang = Box::pin(
        sender.with(|text: String| future::ready(Ok::<_, axum::Error>(Message::Text(text)))),
    );

    ClientConnection::neu(state.hub.clone())
        .verarbeiten(eingang, ausgang, state.shutdown.clone())
        .await;

    state.metriken.ws_connections.dec();
    tracing::debug!(
        clients = state.hub.client_anzahl(),
        aktive_sessions = state.hub.aktive_sessions(),
        "WebSocket geschlossen"
    );
}

// ---------------------------------------------------------------------------
// Fallback
// ---------------------------------------------------------------------------

/// Unbekannte Route
pub async fn nicht_gefunden(uri: Uri) -> impl IntoResponse {
    let pfad = uri
        .path_and_query()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "message": "Route not found",
            "path": pfad
        })),
    )
}
