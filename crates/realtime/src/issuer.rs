//! Ephemeral Credential Issuer
//!
//! Tauscht eine `SessionConfig` mit dem serverseitigen Geheimnis gegen ein
//! kurzlebiges Client-Credential beim Provider ein. Genau ein Versuch, kein
//! Retry; das Geheimnis verlaesst den Prozess nur im Authorization-Header.

use async_trait::async_trait;
use serde::Serialize;
use adda_core::{
    ArcadeError, AufgeloesteConfig, EphemeralCredential, EphemeralSession, Result, SessionConfig,
};

use crate::backend::CredentialQuelle;
use crate::http::{basis_normalisieren, erfolg_pruefen, transportfehler};

/// Body fuer `POST /realtime/sessions`
///
/// Nur Modell und Stimme; `modalities` wird angenommen, aber nicht an den
/// Provider weitergegeben.
#[derive(Debug, Serialize)]
struct ProviderAnfrage<'a> {
    model: &'a str,
    voice: &'a str,
}

impl<'a> From<&'a AufgeloesteConfig> for ProviderAnfrage<'a> {
    fn from(config: &'a AufgeloesteConfig) -> Self {
        Self {
            model: &config.model,
            voice: &config.voice,
        }
    }
}

/// Stellt ephemere Realtime-Sessions beim Provider aus
#[derive(Clone)]
pub struct CredentialIssuer {
    client: reqwest::Client,
    api_key: Option<String>,
    basis_url: String,
}

impl CredentialIssuer {
    /// Erstellt einen neuen Issuer
    ///
    /// Ein leerer `api_key` gilt als nicht gesetzt.
    pub fn neu(
        client: reqwest::Client,
        api_key: Option<String>,
        basis_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            basis_url: basis_normalisieren(basis_url),
        }
    }

    /// Gibt true zurueck wenn das Server-Geheimnis konfiguriert ist
    pub fn ist_konfiguriert(&self) -> bool {
        self.api_key.is_some()
    }

    /// Fordert eine neue ephemere Session beim Provider an
    pub async fn ausstellen(&self, config: &SessionConfig) -> Result<EphemeralSession> {
        self.aufgeloest_ausstellen(&config.aufloesen()).await
    }

    async fn aufgeloest_ausstellen(&self, config: &AufgeloesteConfig) -> Result<EphemeralSession> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ArcadeError::Konfiguration("OPENAI_API_KEY ist nicht gesetzt".into())
        })?;

        let url = format!("{}/realtime/sessions", self.basis_url);
        tracing::debug!(model = %config.model, voice = %config.voice, %url, "Fordere ephemere Session an");

        let antwort = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&ProviderAnfrage::from(config))
            .send()
            .await
            .map_err(transportfehler)?;

        let antwort = match erfolg_pruefen(antwort).await {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!(error = %e, "Provider hat Session-Anfrage abgelehnt");
                return Err(e);
            }
        };

        let session: EphemeralSession = antwort.json().await.map_err(|e| {
            ArcadeError::handshake(format!("Session-Antwort nicht lesbar: {e}"))
        })?;

        if session.client_secret.ist_leer() {
            return Err(ArcadeError::handshake("client_secret in der Session-Antwort ist leer"));
        }

        tracing::info!(
            model = session.modell().unwrap_or(config.model.as_str()),
            expires_at = ?session.client_secret.expires_at(),
            "Ephemere Session ausgestellt"
        );
        Ok(session)
    }
}

/// In-Process-Variante: ein Client mit eigenem Geheimnis braucht kein Backend
#[async_trait]
impl CredentialQuelle for CredentialIssuer {
    async fn credential_anfordern(&self, config: &AufgeloesteConfig) -> Result<EphemeralCredential> {
        Ok(self.aufgeloest_ausstellen(config).await?.into_credential())
    }
}

impl std::fmt::Debug for CredentialIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialIssuer")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("basis_url", &self.basis_url)
            .finish()
    }
}
