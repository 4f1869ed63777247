//! Session-Hub – Verteilt Ereignisse an die Zuschauer einer Session
//!
//! Der Hub verwaltet die Send-Queues aller verbundenen WebSocket-Clients
//! und die Zugehoerigkeit zu Sessions (Raeume `session-{id}`).
//!
//! ## Selektives Broadcasting
//! - An eine Verbindung: `an_verbindung_senden`
//! - An eine Session: `an_session_senden`
//! - An eine Session ausser dem Ausloeser: `an_session_ausser_senden`

use adda_core::{ConnectionId, SessionId};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::events::AusgehendesEreignis;
use crate::presence::ViewerZaehler;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Groesse der Send-Queue pro Verbindung
pub const SEND_QUEUE_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue einer Verbindung
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub connection_id: ConnectionId,
    pub tx: mpsc::Sender<AusgehendesEreignis>,
}

impl ClientSender {
    /// Sendet ein Ereignis nicht-blockierend
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, ereignis: AusgehendesEreignis) -> bool {
        match self.tx.try_send(ereignis) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(connection = %self.connection_id, "Send-Queue voll – Ereignis verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(connection = %self.connection_id, "Send-Queue geschlossen (Client getrennt)");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SessionHub
// ---------------------------------------------------------------------------

/// Zentraler Hub fuer alle WebSocket-Verbindungen
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct SessionHub {
    inner: Arc<SessionHubInner>,
}

struct SessionHubInner {
    /// Client-Sender, indiziert nach ConnectionId
    clients: DashMap<ConnectionId, ClientSender>,
    /// Session-Mitgliedschaft: session_id -> Vec<ConnectionId>
    session_members: DashMap<SessionId, Vec<ConnectionId>>,
    viewer: ViewerZaehler,
}

impl SessionHub {
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(SessionHubInner {
                clients: DashMap::new(),
                session_members: DashMap::new(),
                viewer: ViewerZaehler::neu(),
            }),
        }
    }

    /// Registriert eine Verbindung und gibt ihre Empfangs-Queue zurueck
    pub fn registrieren(&self, connection_id: ConnectionId) -> mpsc::Receiver<AusgehendesEreignis> {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_GROESSE);
        self.inner
            .clients
            .insert(connection_id, ClientSender { connection_id, tx });
        tracing::debug!(connection = %connection_id, "Verbindung im Hub registriert");
        rx
    }

    /// Entfernt eine Verbindung aus dem Hub und allen Sessions
    ///
    /// Gibt die Sessions zurueck, aus denen die Verbindung ausgetreten ist.
    pub fn entfernen(&self, connection_id: &ConnectionId) -> Vec<SessionId> {
        self.inner.clients.remove(connection_id);

        let mut verlassen = Vec::new();
        self.inner.session_members.iter_mut().for_each(|mut entry| {
            let vorher = entry.value().len();
            entry.value_mut().retain(|cid| cid != connection_id);
            if entry.value().len() != vorher {
                verlassen.push(entry.key().clone());
            }
        });
        self.inner.session_members.retain(|_, members| !members.is_empty());

        for session_id in &verlassen {
            self.inner.viewer.verringern(session_id);
        }
        tracing::debug!(
            connection = %connection_id,
            sessions = verlassen.len(),
            "Verbindung aus Hub entfernt"
        );
        verlassen
    }

    /// Tritt einer Session bei und gibt die Zuschauerzahl zurueck
    ///
    /// Wiederholter Beitritt derselben Verbindung zaehlt nicht doppelt.
    pub fn beitreten(&self, connection_id: ConnectionId, session_id: &SessionId) -> u64 {
        let neu = {
            let mut members = self
                .inner
                .session_members
                .entry(session_id.clone())
                .or_default();
            if members.contains(&connection_id) {
                false
            } else {
                members.push(connection_id);
                true
            }
        };

        if neu {
            self.inner.viewer.erhoehen(session_id)
        } else {
            self.inner.viewer.anzahl(session_id)
        }
    }

    /// Verlaesst eine Session und gibt die verbleibende Zuschauerzahl zurueck
    pub fn verlassen(&self, connection_id: &ConnectionId, session_id: &SessionId) -> u64 {
        let war_mitglied = match self.inner.session_members.get_mut(session_id) {
            Some(mut members) => {
                let vorher = members.len();
                members.retain(|cid| cid != connection_id);
                members.len() != vorher
            }
            None => false,
        };
        self.inner
            .session_members
            .remove_if(session_id, |_, members| members.is_empty());

        if war_mitglied {
            self.inner.viewer.verringern(session_id)
        } else {
            self.inner.viewer.anzahl(session_id)
        }
    }

    /// Sendet ein Ereignis an eine einzelne Verbindung
    pub fn an_verbindung_senden(
        &self,
        connection_id: &ConnectionId,
        ereignis: AusgehendesEreignis,
    ) -> bool {
        match self.inner.clients.get(connection_id) {
            Some(sender) => sender.senden(ereignis),
            None => {
                tracing::debug!(connection = %connection_id, "Senden an unbekannte Verbindung");
                false
            }
        }
    }

    /// Sendet ein Ereignis an alle Verbindungen einer Session
    ///
    /// Gibt die Anzahl der erfolgreichen Sendungen zurueck.
    pub fn an_session_senden(&self, session_id: &SessionId, ereignis: AusgehendesEreignis) -> usize {
        self.an_session_verteilen(session_id, None, ereignis)
    }

    /// Sendet ein Ereignis an alle Verbindungen einer Session ausser einer
    pub fn an_session_ausser_senden(
        &self,
        session_id: &SessionId,
        ausgeschlossen: &ConnectionId,
        ereignis: AusgehendesEreignis,
    ) -> usize {
        self.an_session_verteilen(session_id, Some(ausgeschlossen), ereignis)
    }

    fn an_session_verteilen(
        &self,
        session_id: &SessionId,
        ausgeschlossen: Option<&ConnectionId>,
        ereignis: AusgehendesEreignis,
    ) -> usize {
        // Kopie der Mitglieder, damit kein Shard-Lock waehrend des Sendens gehalten wird
        let members = match self.inner.session_members.get(session_id) {
            Some(ids) => ids.clone(),
            None => return 0,
        };

        let mut gesendet = 0;
        for cid in members.iter().filter(|cid| Some(*cid) != ausgeschlossen) {
            if let Some(sender) = self.inner.clients.get(cid) {
                if sender.senden(ereignis.clone()) {
                    gesendet += 1;
                }
            }
        }
        gesendet
    }

    #[cfg(test)]
    pub fn ist_registriert(&self, connection_id: &ConnectionId) -> bool {
        self.inner.clients.contains_key(connection_id)
    }

    pub fn client_anzahl(&self) -> usize {
        self.inner.clients.len()
    }

    /// Anzahl der Sessions mit mindestens einem Zuschauer
    pub fn aktive_sessions(&self) -> usize {
        self.inner.viewer.aktive_sessions()
    }

    #[cfg(test)]
    pub fn viewer_anzahl(&self, session_id: &SessionId) -> u64 {
        self.inner.viewer.anzahl(session_id)
    }

    #[cfg(test)]
    pub fn verbindungen_in_session(&self, session_id: &SessionId) -> Vec<ConnectionId> {
        self.inner
            .session_members
            .get(session_id)
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
