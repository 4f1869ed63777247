//! Signaling-Bootstrapper – baut eine Realtime-Session beim Provider auf
//!
//! ## State Machine
//! ```text
//! Init -> MedienErfassung -> OfferErstellung -> OfferUebermittlung -> AnswerAnwendung -> Live
//!   |                              |                    |                    |
//!   +------------------------------+--------------------+--------------------+--> Fehlgeschlagen
//! ```
//!
//! Nur Vorwaertsuebergaenge. Ab `OfferErstellung` existiert eine
//! Peer-Verbindung; jeder Fehler danach stoppt die lokalen Tracks und
//! schliesst die Verbindung, bevor der Fehler an den Aufrufer geht.

use std::sync::Arc;

use adda_core::{ArcadeError, EphemeralCredential, Result, SessionConfig};
use tokio::sync::mpsc;

use crate::backend::CredentialQuelle;
use crate::exchange::SdpAustausch;
use crate::handle::RealtimeSessionHandle;
use crate::peer::{AudioSenke, DatenKanal, LokalerTrack, MedienQuelle, PeerFabrik, PeerVerbindung};
use crate::sdp;
use crate::DATENKANAL_LABEL;

// ---------------------------------------------------------------------------
// Zustaende
// ---------------------------------------------------------------------------

/// Phase des Verbindungsaufbaus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapZustand {
    Init,
    MedienErfassung,
    OfferErstellung,
    OfferUebermittlung,
    AnswerAnwendung,
    Live,
    Fehlgeschlagen,
}

impl BootstrapZustand {
    /// Folgezustand bei Erfolg, `None` in den Endzustaenden
    pub fn naechster(self) -> Option<Self> {
        match self {
            Self::Init => Some(Self::MedienErfassung),
            Self::MedienErfassung => Some(Self::OfferErstellung),
            Self::OfferErstellung => Some(Self::OfferUebermittlung),
            Self::OfferUebermittlung => Some(Self::AnswerAnwendung),
            Self::AnswerAnwendung => Some(Self::Live),
            Self::Live | Self::Fehlgeschlagen => None,
        }
    }

    pub fn ist_terminal(self) -> bool {
        matches!(self, Self::Live | Self::Fehlgeschlagen)
    }
}

/// Verfolgt den Zustand eines einzelnen Aufbaus
struct Ablauf {
    zustand: BootstrapZustand,
    beobachter: Option<mpsc::UnboundedSender<BootstrapZustand>>,
}

impl Ablauf {
    fn neu(beobachter: Option<mpsc::UnboundedSender<BootstrapZustand>>) -> Self {
        let ablauf = Self {
            zustand: BootstrapZustand::Init,
            beobachter,
        };
        ablauf.melden();
        ablauf
    }

    fn weiter(&mut self) {
        if let Some(naechster) = self.zustand.naechster() {
            tracing::debug!(von = ?self.zustand, nach = ?naechster, "Bootstrap-Uebergang");
            self.zustand = naechster;
            self.melden();
        }
    }

    fn fehlgeschlagen(&mut self, fehler: ArcadeError) -> ArcadeError {
        tracing::warn!(phase = ?self.zustand, error = %fehler, "Bootstrap fehlgeschlagen");
        self.zustand = BootstrapZustand::Fehlgeschlagen;
        self.melden();
        fehler
    }

    fn melden(&self) {
        if let Some(tx) = &self.beobachter {
            let _ = tx.send(self.zustand);
        }
    }
}

// ---------------------------------------------------------------------------
// SignalingBootstrapper
// ---------------------------------------------------------------------------

/// Baut Realtime-Sessions auf
///
/// Haelt nur geteilte, unveraenderliche Kollaborateure; mehrere Aufbauten
/// duerfen parallel laufen.
#[derive(Clone)]
pub struct SignalingBootstrapper {
    credentials: Arc<dyn CredentialQuelle>,
    medien: Arc<dyn MedienQuelle>,
    peers: Arc<dyn PeerFabrik>,
    sdp: Arc<dyn SdpAustausch>,
    senke: Option<Arc<dyn AudioSenke>>,
    beobachter: Option<mpsc::UnboundedSender<BootstrapZustand>>,
}

impl SignalingBootstrapper {
    pub fn neu(
        credentials: Arc<dyn CredentialQuelle>,
        medien: Arc<dyn MedienQuelle>,
        peers: Arc<dyn PeerFabrik>,
        sdp: Arc<dyn SdpAustausch>,
    ) -> Self {
        Self {
            credentials,
            medien,
            peers,
            sdp,
            senke: None,
            beobachter: None,
        }
    }

    /// Ausgabe fuer eintreffende Tracks des Providers
    pub fn mit_senke(mut self, senke: Arc<dyn AudioSenke>) -> Self {
        self.senke = Some(senke);
        self
    }

    /// Meldet jeden Zustandswechsel an den Empfaenger
    pub fn mit_beobachter(mut self, tx: mpsc::UnboundedSender<BootstrapZustand>) -> Self {
        self.beobachter = Some(tx);
        self
    }

    /// Fuehrt den kompletten Aufbau durch
    ///
    /// Entweder ist das Ergebnis ein Handle im Zustand `Live`, oder ein
    /// Fehler; eine halb aufgebaute Verbindung erreicht den Aufrufer nie.
    pub async fn verbinden(&self, config: &SessionConfig) -> Result<RealtimeSessionHandle> {
        let mut ablauf = Ablauf::neu(self.beobachter.clone());
        let config = config.aufloesen();

        // Init: Credential holen, noch keine Ressourcen
        let credential = match self.credentials.credential_anfordern(&config).await {
            Ok(c) => c,
            Err(e) => return Err(ablauf.fehlgeschlagen(e)),
        };
        ablauf.weiter();

        // MedienErfassung: best effort
        let lokale = self.mikrofon_erfassen().await;
        ablauf.weiter();

        // OfferErstellung
        let peer = match self.peers.erstellen().await {
            Ok(p) => p,
            Err(e) => {
                tracks_stoppen(&lokale);
                return Err(ablauf.fehlgeschlagen(e));
            }
        };

        match self
            .aushandeln(&mut ablauf, &peer, &lokale, &config.model, credential)
            .await
        {
            Ok(datenkanal) => {
                ablauf.weiter();
                tracing::info!(
                    model = %config.model,
                    voice = %config.voice,
                    lokale_tracks = lokale.len(),
                    "Realtime-Session live"
                );
                Ok(RealtimeSessionHandle::neu(peer, datenkanal, lokale, config.model))
            }
            Err(e) => {
                tracks_stoppen(&lokale);
                peer.schliessen().await;
                Err(ablauf.fehlgeschlagen(e))
            }
        }
    }

    async fn mikrofon_erfassen(&self) -> Vec<Arc<dyn LokalerTrack>> {
        match self.medien.mikrofon_anfordern().await {
            Ok(tracks) => {
                tracing::debug!(anzahl = tracks.len(), "Mikrofon erfasst");
                tracks
            }
            Err(e) if e.ist_nicht_fatal() => {
                tracing::info!(error = %e, "Kein Mikrofon, weiter im Empfangsmodus");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Mikrofon unerwartet fehlgeschlagen, weiter im Empfangsmodus");
                Vec::new()
            }
        }
    }

    /// OfferErstellung bis AnswerAnwendung
    async fn aushandeln(
        &self,
        ablauf: &mut Ablauf,
        peer: &Arc<dyn PeerVerbindung>,
        lokale: &[Arc<dyn LokalerTrack>],
        model: &str,
        credential: EphemeralCredential,
    ) -> Result<Arc<dyn DatenKanal>> {
        if let Some(senke) = &self.senke {
            peer.remote_tracks_an(Arc::clone(senke));
        }
        peer.audio_einrichten(lokale).await?;
        // Datenkanal vor dem Offer, damit er im SDP steht
        let datenkanal = peer.datenkanal_erstellen(DATENKANAL_LABEL).await?;
        let offer = peer.offer_erstellen().await?;
        ablauf.weiter();

        let answer = self.sdp.offer_senden(model, credential, offer).await?;
        ablauf.weiter();

        if !sdp::analysieren(&answer)?.hat_datenkanal() {
            tracing::warn!("Answer enthaelt keinen Datenkanal-Abschnitt");
        }
        peer.answer_anwenden(&answer).await?;
        Ok(datenkanal)
    }
}

fn tracks_stoppen(tracks: &[Arc<dyn LokalerTrack>]) {
    for track in tracks {
        track.stoppen();
    }
}
