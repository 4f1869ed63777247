//! Health-Check-Endpunkt
//!
//! Endpoint: `GET /health`
//! Response: `{status: "OK", timestamp, uptime, environment, version}`

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    /// ISO-8601 in UTC
    pub timestamp: String,
    /// Laufzeit des Prozesses in Sekunden
    pub uptime: f64,
    pub environment: String,
    pub version: String,
}

/// Geteilter Zustand fuer den Health-Check-Handler
#[derive(Clone)]
pub struct HealthState {
    pub start_time: Arc<Instant>,
    pub environment: Arc<str>,
    pub version: Arc<str>,
}

impl HealthState {
    pub fn neu(environment: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            start_time: Arc::new(Instant::now()),
            environment: Arc::from(environment.into()),
            version: Arc::from(version.into()),
        }
    }

    pub fn uptime_sekunden(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    pub fn antwort(&self) -> HealthResponse {
        HealthResponse {
            status: "OK".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            uptime: self.uptime_sekunden(),
            environment: self.environment.to_string(),
            version: self.version.to_string(),
        }
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// `GET /health` – gibt den Serverstatus zurueck
async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.antwort()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[test]
    fn health_state_uptime_frisch() {
        let state = HealthState::neu("test", "0.1.0");
        assert!(state.uptime_sekunden() < 5.0);
    }

    #[test]
    fn health_response_serialisierung() {
        let antwort = HealthState::neu("production", "1.2.3").antwort();
        let json = serde_json::to_value(&antwort).unwrap();

        assert_eq!(json["status"], "OK");
        assert_eq!(json["environment"], "production");
        assert_eq!(json["version"], "1.2.3");
        assert!(json["uptime"].is_f64());
        assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn health_endpunkt_liefert_ok() {
        let app = health_router(HealthState::neu("test", "0.1.0"));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let antwort: HealthResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(antwort.status, "OK");
        assert_eq!(antwort.environment, "test");
    }
}
