//! Fehlertypen fuer Adda Arcade
//!
//! Zentraler Fehler-Enum fuer die Realtime-Session-Einrichtung. Backend
//! (Credential-Ausgabe) und Client (Signaling-Bootstrapper) teilen sich
//! dieselbe Taxonomie, damit Fehler unveraendert zum Aufrufer gelangen.

use thiserror::Error;

/// Globaler Result-Alias fuer Adda Arcade
pub type Result<T> = std::result::Result<T, ArcadeError>;

/// Alle moeglichen Fehler beim Aufbau einer Realtime-Session
#[derive(Debug, Error)]
pub enum ArcadeError {
    // --- Konfiguration ---
    /// Server-seitiges Geheimnis fehlt; der Aufrufer kann nicht fortfahren
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Gegenstelle ---
    /// Nicht erfolgreiche HTTP-Antwort einer Gegenstelle (Provider oder Backend)
    #[error("Upstream-Fehler {status}: {body}")]
    Upstream { status: u16, body: String },

    /// Anfrage hat die Gegenstelle nie erreicht (DNS, TLS, Verbindung)
    #[error("Transportfehler: {0}")]
    Transport(String),

    // --- Medien & Handshake ---
    /// Lokales Mikrofon nicht verfuegbar oder verweigert (nicht fatal)
    #[error("Medienzugriff verweigert: {0}")]
    MedienZugriffVerweigert(String),

    /// SDP-Answer fehlerhaft oder abgelehnt, Credential-Antwort unvollstaendig
    #[error("Handshake fehlgeschlagen: {0}")]
    Handshake(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl ArcadeError {
    /// Erstellt einen Handshake-Fehler
    pub fn handshake(msg: impl Into<String>) -> Self {
        Self::Handshake(msg.into())
    }

    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// HTTP-Status der Gegenstelle, falls der Fehler einen traegt
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Gibt true zurueck wenn der Ablauf trotz des Fehlers weiterlaufen darf
    ///
    /// Nur verweigerter Medienzugriff ist nicht fatal (Empfangsmodus).
    pub fn ist_nicht_fatal(&self) -> bool {
        matches!(self, Self::MedienZugriffVerweigert(_))
    }
}
