//! Schnittstellen zur Peer-Verbindung und zu den lokalen Medien
//!
//! Der Bootstrapper kennt nur diese Traits. Die konkrete Implementierung
//! (webrtc-rs, Browser-Bruecke, Test-Doubles) wird von aussen eingesetzt.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use adda_core::{ArcadeError, Result};

// ---------------------------------------------------------------------------
// Zustaende
// ---------------------------------------------------------------------------

/// Zustand der Peer-Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbindungsZustand {
    Neu,
    Verbindend,
    Verbunden,
    Getrennt,
    Fehlgeschlagen,
    Geschlossen,
}

/// Zustand des Datenkanals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatenKanalZustand {
    Verbindend,
    Offen,
    Schliessend,
    Geschlossen,
}

// ---------------------------------------------------------------------------
// Medien
// ---------------------------------------------------------------------------

/// Lokal erzeugter Medien-Track (z.B. Mikrofon)
pub trait LokalerTrack: Send + Sync {
    fn id(&self) -> &str;

    /// Beendet die Aufnahme. Mehrfaches Aufrufen ist erlaubt.
    fn stoppen(&self);

    fn ist_aktiv(&self) -> bool;

    /// Zugriff auf den konkreten Typ fuer die Peer-Implementierung
    fn as_any(&self) -> &dyn Any;
}

/// Zugriff auf lokale Aufnahmegeraete
#[async_trait]
pub trait MedienQuelle: Send + Sync {
    /// Fordert das Mikrofon an
    ///
    /// Kann auf eine Benutzerentscheidung warten; kein Zeitlimit. Ablehnung
    /// wird als `ArcadeError::MedienZugriffVerweigert` gemeldet.
    async fn mikrofon_anfordern(&self) -> Result<Vec<Arc<dyn LokalerTrack>>>;
}

/// Medienquelle ohne Geraete, fuer reine Empfangs-Clients
#[derive(Debug, Clone, Copy, Default)]
pub struct KeineMedien;

#[async_trait]
impl MedienQuelle for KeineMedien {
    async fn mikrofon_anfordern(&self) -> Result<Vec<Arc<dyn LokalerTrack>>> {
        Err(ArcadeError::MedienZugriffVerweigert(
            "keine Aufnahmegeraete konfiguriert".into(),
        ))
    }
}

/// Art eines entfernten Tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackArt {
    Audio,
    Video,
}

/// Beschreibung eines vom Provider eintreffenden Tracks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub id: String,
    pub stream_id: String,
    pub art: TrackArt,
    /// MIME-Typ des ausgehandelten Codecs, z.B. `audio/opus`
    pub codec: String,
}

/// Ein empfangenes RTP-Paket eines entfernten Tracks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MedienPaket {
    pub sequenz: u16,
    pub zeitstempel: u32,
    /// Kodierte Nutzlast, bei Opus genau ein Frame
    pub nutzlast: Vec<u8>,
}

/// Ausgabe fuer eintreffende Tracks (z.B. Lautsprecher)
///
/// Pro Track kommt zuerst `track_empfangen`, dann seine Pakete in
/// Empfangsreihenfolge, zuletzt `track_beendet`. Die Methoden werden aus
/// dem Empfangs-Task aufgerufen und duerfen nicht blockieren.
pub trait AudioSenke: Send + Sync {
    fn track_empfangen(&self, track: RemoteTrack);

    fn paket_empfangen(&self, track_id: &str, paket: MedienPaket);

    fn track_beendet(&self, _track_id: &str) {}
}

// ---------------------------------------------------------------------------
// Peer-Verbindung
// ---------------------------------------------------------------------------

/// Bidirektionaler Nachrichtenkanal neben den Medien
#[async_trait]
pub trait DatenKanal: Send + Sync {
    fn label(&self) -> &str;

    fn zustand(&self) -> DatenKanalZustand;

    async fn text_senden(&self, text: String) -> Result<()>;
}

/// Eine Peer-Verbindung zum Provider
#[async_trait]
pub trait PeerVerbindung: Send + Sync {
    /// Richtet genau einen Audio-Abschnitt ein: ohne lokale Tracks nur
    /// Empfang, sonst Senden und Empfangen. Kein Video.
    async fn audio_einrichten(&self, lokale: &[Arc<dyn LokalerTrack>]) -> Result<()>;

    async fn datenkanal_erstellen(&self, label: &str) -> Result<Arc<dyn DatenKanal>>;

    /// Leitet alle kuenftig eintreffenden Tracks an die Senke weiter
    fn remote_tracks_an(&self, senke: Arc<dyn AudioSenke>);

    /// Erstellt das Offer, setzt es als lokale Beschreibung und gibt das SDP zurueck
    async fn offer_erstellen(&self) -> Result<String>;

    async fn answer_anwenden(&self, sdp: &str) -> Result<()>;

    fn verbindungs_zustand(&self) -> VerbindungsZustand;

    /// Schliesst die Verbindung. Mehrfaches Aufrufen ist erlaubt.
    async fn schliessen(&self);
}

/// Erzeugt neue Peer-Verbindungen
#[async_trait]
pub trait PeerFabrik: Send + Sync {
    async fn erstellen(&self) -> Result<Arc<dyn PeerVerbindung>>;
}
