//! adda-signaling – Session-Hub fuer Zuschauer, Chat und Performance-Daten
//!
//! ## Architektur
//!
//! ```text
//! WebSocket (axum, im Server)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task)
//!     |  join-session / leave-session / chat-message / performance-metrics
//!     v
//! SessionHub
//!     +-- Send-Queue pro Verbindung (64, nie blockierend)
//!     +-- Raeume pro Session
//!     +-- ViewerZaehler
//! ```

pub mod broadcast;
pub mod connection;
pub mod error;
pub mod events;
pub mod presence;

// Bequeme Re-Exporte
pub use broadcast::SessionHub;
pub use connection::ClientConnection;
pub use error::{SignalingError, SignalingResult};
pub use events::{AusgehendesEreignis, EingehendesEreignis};
pub use presence::ViewerZaehler;
