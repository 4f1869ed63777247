//! adda-core – Gemeinsame Typen und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die Backend (Credential-Ausgabe,
//! Session-Hub) und Client (Signaling-Bootstrapper) gemeinsam nutzen.

pub mod error;
pub mod session;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{ArcadeError, Result};
pub use session::{
    AufgeloesteConfig, EphemeralCredential, EphemeralSession, SessionConfig, STANDARD_MODELL,
    STANDARD_STIMME,
};
pub use types::{ConnectionId, SessionId, UserId};
