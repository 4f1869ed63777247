//! Gemeinsame HTTP-Hilfen fuer Provider- und Backend-Aufrufe

use std::time::Duration;

use adda_core::{ArcadeError, Result};

/// Verbindungsaufbau-Zeitlimit fuer ausgehende Anfragen
const VERBINDUNGS_TIMEOUT: Duration = Duration::from_secs(10);

/// Baut den prozessweit geteilten HTTP-Client
pub fn client_bauen() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("adda-arcade/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(VERBINDUNGS_TIMEOUT)
        .build()
        .map_err(|e| ArcadeError::Konfiguration(format!("HTTP-Client nicht erstellbar: {e}")))
}

/// Wandelt einen reqwest-Fehler ohne Antwort in einen Transportfehler
pub(crate) fn transportfehler(e: reqwest::Error) -> ArcadeError {
    ArcadeError::Transport(e.to_string())
}

/// Gibt die Antwort bei Erfolg zurueck, sonst `Upstream` mit Status und Body
pub(crate) async fn erfolg_pruefen(antwort: reqwest::Response) -> Result<reqwest::Response> {
    let status = antwort.status();
    if status.is_success() {
        return Ok(antwort);
    }
    let body = antwort.text().await.unwrap_or_default();
    Err(ArcadeError::Upstream {
        status: status.as_u16(),
        body,
    })
}

/// Entfernt einen abschliessenden Slash, damit Pfade sauber angehaengt werden
pub(crate) fn basis_normalisieren(url: impl Into<String>) -> String {
    url.into().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basis_ohne_slash() {
        assert_eq!(
            basis_normalisieren("https://api.openai.com/v1/"),
            "https://api.openai.com/v1"
        );
        assert_eq!(basis_normalisieren("http://localhost:5000"), "http://localhost:5000");
    }

    #[test]
    fn client_laesst_sich_bauen() {
        assert!(client_bauen().is_ok());
    }
}
