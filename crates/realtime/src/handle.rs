//! Handle auf eine laufende Realtime-Session
//!
//! Existiert nur nach erfolgreich angewendeter Answer. Der Aufrufer besitzt
//! das Handle exklusiv und muss `stoppen()` aufrufen; Drop gibt die
//! Transportressourcen nicht frei.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::events::ClientEreignis;
use crate::peer::{DatenKanal, DatenKanalZustand, LokalerTrack, PeerVerbindung, VerbindungsZustand};

/// Ob lokales Audio gesendet wird
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MedienModus {
    /// Mikrofon angehaengt
    Duplex,
    /// Kein lokales Audio, nur Empfang
    NurEmpfang,
}

/// Laufende Sprach-/Daten-Session
pub struct RealtimeSessionHandle {
    peer: Arc<dyn PeerVerbindung>,
    datenkanal: Arc<dyn DatenKanal>,
    lokale_tracks: Vec<Arc<dyn LokalerTrack>>,
    modell: String,
    gestoppt: AtomicBool,
}

impl RealtimeSessionHandle {
    pub(crate) fn neu(
        peer: Arc<dyn PeerVerbindung>,
        datenkanal: Arc<dyn DatenKanal>,
        lokale_tracks: Vec<Arc<dyn LokalerTrack>>,
        modell: String,
    ) -> Self {
        Self {
            peer,
            datenkanal,
            lokale_tracks,
            modell,
            gestoppt: AtomicBool::new(false),
        }
    }

    pub fn verbindungs_zustand(&self) -> VerbindungsZustand {
        self.peer.verbindungs_zustand()
    }

    pub fn datenkanal_zustand(&self) -> DatenKanalZustand {
        self.datenkanal.zustand()
    }

    pub fn modus(&self) -> MedienModus {
        if self.lokale_tracks.is_empty() {
            MedienModus::NurEmpfang
        } else {
            MedienModus::Duplex
        }
    }

    pub fn modell(&self) -> &str {
        &self.modell
    }

    pub fn ist_gestoppt(&self) -> bool {
        self.gestoppt.load(Ordering::Acquire)
    }

    /// Anzahl noch laufender lokaler Tracks
    pub fn aktive_lokale_tracks(&self) -> usize {
        self.lokale_tracks.iter().filter(|t| t.ist_aktiv()).count()
    }

    /// Sendet eine Text-Anweisung als `response.create`
    ///
    /// Ist der Datenkanal nicht offen, passiert nichts: keine Warteschlange,
    /// kein Fehler. Sendefehler werden nur protokolliert.
    pub async fn senden(&self, text: &str) {
        if self.ist_gestoppt() || self.datenkanal.zustand() != DatenKanalZustand::Offen {
            tracing::trace!("Datenkanal nicht offen, Text verworfen");
            return;
        }

        let json = match ClientEreignis::text_antwort(text).als_json() {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!(error = %e, "Ereignis nicht serialisierbar");
                return;
            }
        };

        if let Err(e) = self.datenkanal.text_senden(json).await {
            tracing::warn!(error = %e, kanal = self.datenkanal.label(), "Senden auf Datenkanal fehlgeschlagen");
        }
    }

    /// Beendet die Session: erst lokale Tracks stoppen, dann Peer schliessen
    ///
    /// Idempotent; weitere Aufrufe tun nichts.
    pub async fn stoppen(&self) {
        if self.gestoppt.swap(true, Ordering::AcqRel) {
            return;
        }
        for track in &self.lokale_tracks {
            track.stoppen();
        }
        self.peer.schliessen().await;
        tracing::info!(model = %self.modell, "Realtime-Session beendet");
    }
}

impl Drop for RealtimeSessionHandle {
    fn drop(&mut self) {
        if !self.gestoppt.load(Ordering::Acquire) {
            tracing::warn!(
                model = %self.modell,
                "RealtimeSessionHandle ohne stoppen() verworfen – Peer-Verbindung bleibt offen"
            );
        }
    }
}

impl std::fmt::Debug for RealtimeSessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeSessionHandle")
            .field("modell", &self.modell)
            .field("modus", &self.modus())
            .field("verbindung", &self.verbindungs_zustand())
            .field("datenkanal", &self.datenkanal_zustand())
            .field("gestoppt", &self.ist_gestoppt())
            .finish()
    }
}
