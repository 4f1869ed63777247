//! adda-realtime – Realtime-Sprach-Sessions beim Provider
//!
//! Zwei Seiten desselben Ablaufs:
//!
//! ```text
//! Backend                               Client
//! -------                               ------
//! CredentialIssuer                      SignalingBootstrapper
//!   POST /v1/realtime/sessions            Init            -> CredentialQuelle
//!   (Server-Geheimnis)                    MedienErfassung -> MedienQuelle (best effort)
//!        |                                OfferErstellung -> PeerFabrik / PeerVerbindung
//!        v                                OfferUebermittlung -> SdpAustausch
//!   EphemeralSession  ---------------->   AnswerAnwendung
//!                                         Live            -> RealtimeSessionHandle
//! ```
//!
//! Peer-Verbindung, Mikrofon und Audio-Ausgabe sind Traits. Mit dem Feature
//! `webrtc` liefert [`nativ`] die Peer-Verbindung ueber webrtc-rs und
//! [`geraete`] Mikrofon und Lautsprecher ueber cpal und Opus.

pub mod backend;
pub mod bootstrap;
pub mod events;
pub mod exchange;
pub mod handle;
pub mod http;
pub mod issuer;
pub mod peer;
pub mod sdp;

#[cfg(feature = "webrtc")]
pub mod geraete;
#[cfg(feature = "webrtc")]
pub mod nativ;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use adda_core::{ArcadeError, EphemeralCredential, EphemeralSession, Result, SessionConfig};
pub use backend::{BackendCredentialQuelle, CredentialQuelle};
pub use bootstrap::{BootstrapZustand, SignalingBootstrapper};
pub use events::ClientEreignis;
pub use exchange::{HttpSdpAustausch, SdpAustausch};
pub use handle::{MedienModus, RealtimeSessionHandle};
pub use issuer::CredentialIssuer;
pub use peer::{
    AudioSenke, DatenKanal, DatenKanalZustand, KeineMedien, LokalerTrack, MedienQuelle,
    MedienPaket, PeerFabrik, PeerVerbindung, RemoteTrack, TrackArt, VerbindungsZustand,
};

/// Label des Datenkanals fuer Steuer-Ereignisse
pub const DATENKANAL_LABEL: &str = "oai-events";

/// Basis-URL der Provider-API
pub const PROVIDER_BASIS_URL: &str = "https://api.openai.com/v1";
