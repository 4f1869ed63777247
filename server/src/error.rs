//! HTTP-Fehlerantworten der REST-API
//!
//! Jede Fehlerantwort hat die Form `{success: false, message, ...}`.

use adda_core::ArcadeError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};
use thiserror::Error;

/// Fehler, die ein Handler an den Client meldet
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request-Body passt nicht zum Schema
    #[error("Validation error")]
    Validierung { errors: Value },

    /// Fehler aus der Realtime-Einrichtung
    #[error(transparent)]
    Arcade(#[from] ArcadeError),
}

impl ApiError {
    pub fn validierung(meldung: impl Into<String>) -> Self {
        Self::Validierung {
            errors: json!({ "body": [meldung.into()] }),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validierung { .. } => StatusCode::BAD_REQUEST,
            Self::Arcade(e) => match e {
                ArcadeError::Konfiguration(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ArcadeError::Upstream { .. } | ArcadeError::Transport(_) => StatusCode::BAD_GATEWAY,
                ArcadeError::Handshake(_) => StatusCode::BAD_GATEWAY,
                ArcadeError::MedienZugriffVerweigert(_) | ArcadeError::Intern(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

/// Fehlerantwort im einheitlichen Envelope
pub fn fehler_antwort(status: StatusCode, nachricht: &str) -> Response {
    (
        status,
        Json(json!({
            "success": false,
            "message": nachricht
        })),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::error!(status = status.as_u16(), error = %self, "Anfrage fehlgeschlagen");

        match self {
            Self::Validierung { errors } => (
                status,
                Json(json!({
                    "success": false,
                    "message": "Validation error",
                    "errors": errors
                })),
            )
                .into_response(),
            Self::Arcade(e) => fehler_antwort(status, &e.to_string()),
        }
    }
}
