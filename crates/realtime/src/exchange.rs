//! SDP-Austausch mit dem Signaling-Endpunkt des Providers
//!
//! `POST {basis}/realtime?model=<model>` mit dem ephemeren Credential als
//! Bearer-Token, `Content-Type: application/sdp`, Body = Offer. Die Antwort
//! ist die rohe SDP-Answer.

use async_trait::async_trait;
use adda_core::{EphemeralCredential, Result};

use crate::http::{basis_normalisieren, erfolg_pruefen, transportfehler};

const SDP_CONTENT_TYPE: &str = "application/sdp";

/// Reicht ein Offer ein und liefert die Answer
///
/// Das Credential wird per Wert konsumiert und ist danach verbraucht.
#[async_trait]
pub trait SdpAustausch: Send + Sync {
    async fn offer_senden(
        &self,
        model: &str,
        credential: EphemeralCredential,
        offer: String,
    ) -> Result<String>;
}

/// SDP-Austausch ueber HTTPS
#[derive(Debug, Clone)]
pub struct HttpSdpAustausch {
    client: reqwest::Client,
    basis_url: String,
}

impl HttpSdpAustausch {
    pub fn neu(client: reqwest::Client, basis_url: impl Into<String>) -> Self {
        Self {
            client,
            basis_url: basis_normalisieren(basis_url),
        }
    }
}

#[async_trait]
impl SdpAustausch for HttpSdpAustausch {
    async fn offer_senden(
        &self,
        model: &str,
        credential: EphemeralCredential,
        offer: String,
    ) -> Result<String> {
        let url = format!("{}/realtime", self.basis_url);
        tracing::debug!(%model, offer_bytes = offer.len(), "Sende SDP-Offer an Provider");

        let antwort = self
            .client
            .post(&url)
            .query(&[("model", model)])
            .bearer_auth(credential.wert())
            .header(reqwest::header::CONTENT_TYPE, SDP_CONTENT_TYPE)
            .body(offer)
            .send()
            .await
            .map_err(transportfehler)?;
        drop(credential);

        let antwort = erfolg_pruefen(antwort).await?;
        antwort.text().await.map_err(transportfehler)
    }
}
