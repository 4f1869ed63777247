//! Prometheus-kompatible Metriken fuer Adda Arcade
//!
//! Registrierte Metriken:
//! - `adda_realtime_credentials_total` – Counter: Ausgestellte Realtime-Credentials
//! - `adda_realtime_upstream_errors_total` – Counter: Provider-Fehler (status)
//! - `adda_ws_connections` – Gauge: Offene WebSocket-Verbindungen
//! - `adda_ws_connections_total` – Counter: Geoeffnete WebSocket-Verbindungen
//! - `adda_http_requests_total` – Counter: HTTP-Anfragen (method, path, status)
//! - `adda_http_request_duration_seconds` – Histogram: HTTP-Antwortzeit

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Alle Prometheus-Metriken des Servers
#[derive(Clone)]
pub struct ArcadeMetrics {
    pub registry: Arc<Registry>,

    // Realtime
    pub credentials_total: IntCounter,
    pub upstream_errors_total: IntCounterVec,

    // Session-Hub
    pub ws_connections: IntGauge,
    pub ws_connections_total: IntCounter,

    // HTTP
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
}

impl ArcadeMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        // --- Realtime ---
        let credentials_total = IntCounter::with_opts(Opts::new(
            "adda_realtime_credentials_total",
            "Anzahl ausgestellter Realtime-Credentials",
        ))?;
        registry.register(Box::new(credentials_total.clone()))?;

        let upstream_errors_total = IntCounterVec::new(
            Opts::new(
                "adda_realtime_upstream_errors_total",
                "Fehlgeschlagene Aufrufe beim Realtime-Provider",
            ),
            &["status"],
        )?;
        registry.register(Box::new(upstream_errors_total.clone()))?;

        // --- Session-Hub ---
        let ws_connections = IntGauge::with_opts(Opts::new(
            "adda_ws_connections",
            "Anzahl offener WebSocket-Verbindungen",
        ))?;
        registry.register(Box::new(ws_connections.clone()))?;

        let ws_connections_total = IntCounter::with_opts(Opts::new(
            "adda_ws_connections_total",
            "Gesamtanzahl geoeffneter WebSocket-Verbindungen",
        ))?;
        registry.register(Box::new(ws_connections_total.clone()))?;

        // --- HTTP ---
        let http_requests_total = IntCounterVec::new(
            Opts::new("adda_http_requests_total", "Gesamtanzahl HTTP-Anfragen"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "adda_http_request_duration_seconds",
                "HTTP-Antwortzeit in Sekunden",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            credentials_total,
            upstream_errors_total,
            ws_connections,
            ws_connections_total,
            http_requests_total,
            http_request_duration_seconds,
        })
    }

    /// Zaehlt einen Provider-Fehler; `None` fuer Transportfehler ohne Status
    pub fn upstream_fehler(&self, status: Option<u16>) {
        let label = status.map(|s| s.to_string());
        self.upstream_errors_total
            .with_label_values(&[label.as_deref().unwrap_or("transport")])
            .inc();
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: ArcadeMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<ArcadeMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[test]
    fn metriken_erstellen_erfolgreich() {
        let metriken = ArcadeMetrics::neu().unwrap();
        assert!(!metriken.registry.gather().is_empty());
    }

    #[test]
    fn upstream_fehler_mit_und_ohne_status() {
        let metriken = ArcadeMetrics::neu().unwrap();
        metriken.upstream_fehler(Some(401));
        metriken.upstream_fehler(Some(401));
        metriken.upstream_fehler(None);

        assert_eq!(
            metriken.upstream_errors_total.with_label_values(&["401"]).get(),
            2
        );
        assert_eq!(
            metriken
                .upstream_errors_total
                .with_label_values(&["transport"])
                .get(),
            1
        );
    }

    #[test]
    fn ws_gauge_hoch_und_runter() {
        let metriken = ArcadeMetrics::neu().unwrap();
        metriken.ws_connections.inc();
        metriken.ws_connections.inc();
        metriken.ws_connections.dec();
        assert_eq!(metriken.ws_connections.get(), 1);
    }

    #[test]
    fn metriken_export_prometheus_format() {
        let metriken = ArcadeMetrics::neu().unwrap();
        metriken.credentials_total.inc();

        let output = metriken.exportieren().unwrap();
        assert!(output.contains("adda_realtime_credentials_total 1"));
        assert!(output.contains("adda_ws_connections"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn alle_metriken_in_registry_registriert() {
        let metriken = ArcadeMetrics::neu().unwrap();

        // Vec-Metriken erscheinen in gather() erst nach dem ersten Label-Zugriff
        metriken.upstream_fehler(Some(500));
        metriken
            .http_requests_total
            .with_label_values(&["GET", "/test", "200"])
            .inc();
        metriken
            .http_request_duration_seconds
            .with_label_values(&["GET", "/test"])
            .observe(0.01);

        let families = metriken.registry.gather();
        let namen: Vec<&str> = families.iter().map(|f| f.get_name()).collect();

        for name in [
            "adda_realtime_credentials_total",
            "adda_realtime_upstream_errors_total",
            "adda_ws_connections",
            "adda_ws_connections_total",
            "adda_http_requests_total",
            "adda_http_request_duration_seconds",
        ] {
            assert!(namen.contains(&name), "{name} fehlt");
        }
    }

    #[tokio::test]
    async fn metrics_endpunkt_liefert_text() {
        let metriken = ArcadeMetrics::neu().unwrap();
        metriken.ws_connections_total.inc();

        let response = metrics_router(metriken)
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[axum::http::header::CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("adda_ws_connections_total 1"));
    }
}
