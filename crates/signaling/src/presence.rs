//! Zuschauerzahlen pro Session
//!
//! Zaehlt beigetretene Verbindungen je Session. Verlassen und Trennen
//! verringern den Zaehler, er faellt nie unter null. Sessions ohne
//! Zuschauer verschwinden aus der Tabelle.

use adda_core::SessionId;
use dashmap::DashMap;
use std::sync::Arc;

/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct ViewerZaehler {
    inner: Arc<DashMap<SessionId, u64>>,
}

impl ViewerZaehler {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Erhoeht den Zaehler und gibt den neuen Stand zurueck
    pub fn erhoehen(&self, session_id: &SessionId) -> u64 {
        let mut eintrag = self.inner.entry(session_id.clone()).or_insert(0);
        *eintrag += 1;
        *eintrag
    }

    /// Verringert den Zaehler und gibt den neuen Stand zurueck
    pub fn verringern(&self, session_id: &SessionId) -> u64 {
        let neu = match self.inner.get_mut(session_id) {
            Some(mut eintrag) => {
                *eintrag = eintrag.saturating_sub(1);
                *eintrag
            }
            None => {
                tracing::debug!(session = %session_id, "Verringern ohne Zuschauer ignoriert");
                return 0;
            }
        };
        if neu == 0 {
            self.inner.remove_if(session_id, |_, anzahl| *anzahl == 0);
        }
        neu
    }

    pub fn anzahl(&self, session_id: &SessionId) -> u64 {
        self.inner.get(session_id).map(|e| *e).unwrap_or(0)
    }

    /// Anzahl der Sessions mit mindestens einem Zuschauer
    pub fn aktive_sessions(&self) -> usize {
        self.inner.len()
    }
}
