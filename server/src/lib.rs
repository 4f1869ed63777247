//! adda-server – Bibliotheks-Root
//!
//! Baut den geteilten Anwendungszustand und den axum-Router und stellt den
//! Einstiegspunkt fuer Tests bereit.

pub mod config;
pub mod error;
pub mod routes;

use adda_observability::{
    health_router, metrics_router, request_timing_layer, timing_middleware, ArcadeMetrics,
    HealthState,
};
use adda_realtime::{http::client_bauen, CredentialIssuer};
use adda_signaling::SessionHub;
use anyhow::Result;
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use config::ServerConfig;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;

// ---------------------------------------------------------------------------
// Anwendungszustand
// ---------------------------------------------------------------------------

/// Prozessweit geteilte Dienste, einmal beim Start gebaut
#[derive(Clone)]
pub struct AppState {
    pub issuer: CredentialIssuer,
    pub hub: SessionHub,
    pub metriken: ArcadeMetrics,
    /// Wird beim Herunterfahren auf `true` gesetzt
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    pub fn aus_config(config: &ServerConfig, shutdown: watch::Receiver<bool>) -> Result<Self> {
        let issuer = CredentialIssuer::neu(
            client_bauen()?,
            config.realtime.api_key.clone(),
            config.realtime.provider_url.clone(),
        );
        if !issuer.ist_konfiguriert() {
            tracing::warn!("OPENAI_API_KEY ist nicht gesetzt, Credential-Anfragen schlagen fehl");
        }

        Ok(Self {
            issuer,
            hub: SessionHub::neu(),
            metriken: ArcadeMetrics::neu()?,
            shutdown,
        })
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Baut den vollstaendigen Router mit allen Layern
pub fn app_bauen(config: &ServerConfig, state: AppState) -> Router {
    let api = Router::new().route(
        "/webrtc/openai/ephemeral",
        post(routes::ephemeral_ausstellen),
    );

    let metriken = state.metriken.clone();
    let mut app = Router::new()
        .nest(&config.api_prefix(), api)
        .route("/ws", get(routes::ws_verbinden))
        .fallback(routes::nicht_gefunden)
        .with_state(state)
        .merge(health_router(HealthState::neu(
            config.server.umgebung.clone(),
            env!("CARGO_PKG_VERSION"),
        )));

    if config.observability.metriken_aktiviert {
        app = app.merge(metrics_router(metriken.clone()));
    }

    app.layer(axum::middleware::from_fn_with_state(
        metriken,
        timing_middleware,
    ))
    .layer(request_timing_layer())
    .layer(cors_layer(&config.api.cors_origins))
}

/// CORS: `*` oder leer erlaubt alle Origins, sonst nur die genannten mit Credentials
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(wert) => Some(wert),
            Err(_) => {
                tracing::warn!(origin = %o, "Ungueltiger CORS-Origin ignoriert");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
        ])
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet den HTTP-Server und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Geteilte Dienste bauen (HTTP-Client, Issuer, Hub, Metriken)
    /// 2. Router aufsetzen und Listener binden
    /// 3. Auf Ctrl-C / SIGTERM warten, dann WebSockets schliessen
    pub async fn starten(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = AppState::aus_config(&self.config, shutdown_rx)?;
        let app = app_bauen(&self.config, state);

        let adresse = self.config.bind_adresse();
        let listener = tokio::net::TcpListener::bind(&adresse).await?;
        tracing::info!(
            adresse = %adresse,
            umgebung = %self.config.server.umgebung,
            api = %self.config.api_prefix(),
            "Adda Arcade Server gestartet"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                let _ = shutdown_tx.send(true);
            })
            .await?;

        tracing::info!("Server beendet");
        Ok(())
    }
}

/// Wartet auf Ctrl-C oder SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(fehler = %e, "Ctrl-C-Handler nicht installierbar");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(fehler = %e, "SIGTERM-Handler nicht installierbar");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!(signal = "SIGINT", "Shutdown-Signal empfangen"),
        _ = sigterm => tracing::info!(signal = "SIGTERM", "Shutdown-Signal empfangen"),
    }
}

#[cfg(test)]
mod tests;
