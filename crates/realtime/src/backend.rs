//! Credential-Quelle des Clients
//!
//! Der Client haelt kein Provider-Geheimnis. Er holt sich das ephemere
//! Credential beim eigenen Backend ab:
//! `POST {api_prefix}/webrtc/openai/ephemeral` -> `{success, session: {client_secret: {value}}}`

use async_trait::async_trait;
use adda_core::{ArcadeError, AufgeloesteConfig, EphemeralCredential, Result};
use serde_json::Value;

use crate::http::{basis_normalisieren, erfolg_pruefen, transportfehler};

/// Liefert ein ephemeres Credential fuer genau einen Handshake
#[async_trait]
pub trait CredentialQuelle: Send + Sync {
    async fn credential_anfordern(&self, config: &AufgeloesteConfig) -> Result<EphemeralCredential>;
}

/// Holt Credentials ueber die HTTP-API des Backends
#[derive(Debug, Clone)]
pub struct BackendCredentialQuelle {
    client: reqwest::Client,
    /// API-Basis inklusive Prefix, z.B. `http://localhost:5000/api/v1`
    api_basis: String,
}

impl BackendCredentialQuelle {
    pub fn neu(client: reqwest::Client, api_basis: impl Into<String>) -> Self {
        Self {
            client,
            api_basis: basis_normalisieren(api_basis),
        }
    }

    pub fn endpunkt(&self) -> String {
        format!("{}/webrtc/openai/ephemeral", self.api_basis)
    }
}

#[async_trait]
impl CredentialQuelle for BackendCredentialQuelle {
    async fn credential_anfordern(&self, config: &AufgeloesteConfig) -> Result<EphemeralCredential> {
        let antwort = self
            .client
            .post(self.endpunkt())
            .json(config)
            .send()
            .await
            .map_err(transportfehler)?;
        let antwort = erfolg_pruefen(antwort).await?;

        let json: Value = antwort
            .json()
            .await
            .map_err(|e| ArcadeError::handshake(format!("Backend-Antwort nicht lesbar: {e}")))?;
        credential_aus_antwort(&json)
    }
}

/// Extrahiert `session.client_secret` aus dem Backend-Envelope
fn credential_aus_antwort(json: &Value) -> Result<EphemeralCredential> {
    let wert = json
        .pointer("/session/client_secret/value")
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ArcadeError::handshake("client_secret fehlt in der Session-Antwort"))?;
    let expires_at = json
        .pointer("/session/client_secret/expires_at")
        .and_then(Value::as_i64);
    Ok(EphemeralCredential::neu(wert, expires_at))
}
