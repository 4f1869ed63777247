//! Fehlertypen fuer den Session-Hub

use thiserror::Error;

/// Fehlertyp fuer den Session-Hub
#[derive(Debug, Error)]
pub enum SignalingError {
    /// Frame ist kein gueltiges Ereignis
    #[error("Ungueltige Nachricht: {0}")]
    UngueltigeNachricht(#[from] serde_json::Error),

    /// Chat-Nachricht ohne Inhalt
    #[error("Nachricht darf nicht leer sein")]
    LeereNachricht,

    /// Verbindung wurde getrennt
    #[error("Verbindung getrennt")]
    VerbindungGetrennt,
}

impl SignalingError {
    /// Fehler, die als `chat-error` statt als `error` gemeldet werden
    pub fn ist_chat_fehler(&self) -> bool {
        matches!(self, Self::LeereNachricht)
    }
}

/// Result-Typ fuer den Session-Hub
pub type SignalingResult<T> = Result<T, SignalingError>;
