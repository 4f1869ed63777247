//! Client-Connection – Verarbeitet eine einzelne WebSocket-Verbindung
//!
//! Jede Verbindung laeuft in einem eigenen tokio-Task. Der Transport ist
//! abstrahiert: eingehend ein `Stream` von Text-Frames, ausgehend ein
//! `Sink` fuer Text-Frames. Der Server bindet beides an axum-WebSockets.
//!
//! ## Ablauf
//! ```text
//! registrieren -> (Frame lesen | Queue leeren | Shutdown)* -> entfernen
//! ```
//! Ungueltige Frames beenden die Verbindung nicht, der Client bekommt ein
//! `error`-Ereignis.

use std::fmt::Display;

use adda_core::ConnectionId;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::watch;

use crate::broadcast::SessionHub;
use crate::error::{SignalingError, SignalingResult};
use crate::events::{
    AusgehendesEreignis, ChatEingang, ChatNachricht, EingehendesEreignis, PerformanceEingang,
    PerformanceUpdate, SessionBeigetreten, SessionBezug, SessionVerlassen,
};

// ---------------------------------------------------------------------------
// ClientConnection
// ---------------------------------------------------------------------------

/// Zustand einer einzelnen Verbindung im Hub
pub struct ClientConnection {
    hub: SessionHub,
    connection_id: ConnectionId,
}

impl ClientConnection {
    pub fn neu(hub: SessionHub) -> Self {
        Self {
            hub,
            connection_id: ConnectionId::new(),
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Startet die Verarbeitungsschleife
    ///
    /// Laeuft bis der Client trennt, das Senden scheitert oder das
    /// Shutdown-Signal eingeht. Meldet die Verbindung danach vom Hub ab.
    pub async fn verarbeiten<S, K, E>(
        self,
        mut eingang: S,
        mut ausgang: K,
        mut shutdown_rx: watch::Receiver<bool>,
    ) where
        S: Stream<Item = String> + Unpin,
        K: Sink<String, Error = E> + Unpin,
        E: Display,
    {
        let cid = self.connection_id;
        let mut sende_rx = self.hub.registrieren(cid);
        tracing::info!(connection = %cid, "WebSocket-Verbindung geoeffnet");

        loop {
            tokio::select! {
                // Eingehendes Frame vom Client
                frame = eingang.next() => {
                    match frame {
                        Some(text) => self.frame_verarbeiten(&text),
                        None => {
                            tracing::info!(connection = %cid, "Verbindung vom Client getrennt");
                            break;
                        }
                    }
                }

                // Ausgehendes Ereignis aus dem Hub
                Some(ereignis) = sende_rx.recv() => {
                    let frame = match ereignis.als_frame() {
                        Ok(f) => f,
                        Err(e) => {
                            tracing::error!(connection = %cid, fehler = %e, "Ereignis nicht serialisierbar");
                            continue;
                        }
                    };
                    if let Err(e) = ausgang.send(frame).await {
                        tracing::warn!(connection = %cid, fehler = %e, "Senden fehlgeschlagen");
                        break;
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(connection = %cid, "Shutdown-Signal – Verbindung wird getrennt");
                        let _ = ausgang.close().await;
                        break;
                    }
                }
            }
        }

        let sessions = self.hub.entfernen(&cid);
        tracing::info!(
            connection = %cid,
            sessions = sessions.len(),
            "Verbindungs-Task beendet"
        );
    }

    /// Verarbeitet ein Text-Frame; Fehler gehen als Ereignis an den Client
    pub fn frame_verarbeiten(&self, text: &str) {
        let ergebnis = EingehendesEreignis::parsen(text).and_then(|ereignis| {
            tracing::trace!(connection = %self.connection_id, event = ereignis.name(), "Ereignis empfangen");
            self.ereignis_verarbeiten(ereignis)
        });

        if let Err(e) = ergebnis {
            tracing::debug!(connection = %self.connection_id, fehler = %e, "Ereignis abgelehnt");
            let antwort = if e.ist_chat_fehler() {
                AusgehendesEreignis::chat_fehler(e.to_string())
            } else {
                AusgehendesEreignis::fehler(e.to_string())
            };
            self.hub.an_verbindung_senden(&self.connection_id, antwort);
        }
    }

    fn ereignis_verarbeiten(&self, ereignis: EingehendesEreignis) -> SignalingResult<()> {
        match ereignis {
            EingehendesEreignis::JoinSession(bezug) => self.beitreten(bezug),
            EingehendesEreignis::LeaveSession(bezug) => self.verlassen(bezug),
            EingehendesEreignis::ChatMessage(chat) => self.chat(chat),
            EingehendesEreignis::PerformanceMetrics(perf) => self.performance(perf),
        }
    }

    fn beitreten(&self, bezug: SessionBezug) -> SignalingResult<()> {
        let viewers = self.hub.beitreten(self.connection_id, &bezug.session_id);
        tracing::info!(
            connection = %self.connection_id,
            session = %bezug.session_id,
            viewers,
            "Session beigetreten"
        );
        self.antworten(AusgehendesEreignis::SessionJoined(SessionBeigetreten {
            session_id: bezug.session_id,
            success: true,
            viewers,
        }))
    }

    fn verlassen(&self, bezug: SessionBezug) -> SignalingResult<()> {
        let viewers = self.hub.verlassen(&self.connection_id, &bezug.session_id);
        tracing::info!(
            connection = %self.connection_id,
            session = %bezug.session_id,
            viewers,
            "Session verlassen"
        );
        self.antworten(AusgehendesEreignis::SessionLeft(SessionVerlassen {
            session_id: bezug.session_id,
            success: true,
        }))
    }

    fn chat(&self, chat: ChatEingang) -> SignalingResult<()> {
        let message = chat.message.trim();
        if message.is_empty() {
            return Err(SignalingError::LeereNachricht);
        }

        let nachricht = ChatNachricht::text(chat.session_id.clone(), chat.user_id, message.to_string());
        let empfaenger = self
            .hub
            .an_session_senden(&chat.session_id, AusgehendesEreignis::ChatMessage(nachricht));
        tracing::debug!(session = %chat.session_id, empfaenger, "Chat-Nachricht verteilt");
        Ok(())
    }

    fn performance(&self, perf: PerformanceEingang) -> SignalingResult<()> {
        let empfaenger = self.hub.an_session_ausser_senden(
            &perf.session_id,
            &self.connection_id,
            AusgehendesEreignis::PerformanceUpdate(PerformanceUpdate {
                user_id: perf.user_id,
                metrics: perf.metrics,
            }),
        );
        tracing::trace!(
            session = %perf.session_id,
            game_id = perf.game_id.as_deref().unwrap_or("-"),
            empfaenger,
            "Performance-Update verteilt"
        );
        Ok(())
    }

    fn antworten(&self, ereignis: AusgehendesEreignis) -> SignalingResult<()> {
        if self.hub.an_verbindung_senden(&self.connection_id, ereignis) {
            Ok(())
        } else {
            Err(SignalingError::VerbindungGetrennt)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use adda_core::SessionId;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn verbunden(hub: &SessionHub) -> (ClientConnection, mpsc::Receiver<AusgehendesEreignis>) {
        let conn = ClientConnection::neu(hub.clone());
        let rx = hub.registrieren(conn.connection_id());
        (conn, rx)
    }

    fn als_json(ereignis: AusgehendesEreignis) -> Value {
        serde_json::to_value(ereignis).unwrap()
    }

    fn join(session: &str) -> String {
        json!({"event": "join-session", "data": {"sessionId": session, "userId": "u"}}).to_string()
    }

    #[tokio::test]
    async fn join_antwortet_mit_zuschauerzahl() {
        let hub = SessionHub::neu();
        let (a, mut rx_a) = verbunden(&hub);
        let (b, mut rx_b) = verbunden(&hub);

        a.frame_verarbeiten(&join("s1"));
        b.frame_verarbeiten(&join("s1"));

        let antwort = als_json(rx_a.try_recv().unwrap());
        assert_eq!(
            antwort,
            json!({"event": "session-joined", "data": {"sessionId": "s1", "success": true, "viewers": 1}})
        );
        assert_eq!(als_json(rx_b.try_recv().unwrap())["data"]["viewers"], 2);
    }

    #[tokio::test]
    async fn leave_antwortet_und_zaehlt_herunter() {
        let hub = SessionHub::neu();
        let (a, mut rx) = verbunden(&hub);
        a.frame_verarbeiten(&join("s1"));
        let _ = rx.try_recv();

        a.frame_verarbeiten(
            &json!({"event": "leave-session", "data": {"sessionId": "s1"}}).to_string(),
        );
        assert_eq!(
            als_json(rx.try_recv().unwrap()),
            json!({"event": "session-left", "data": {"sessionId": "s1", "success": true}})
        );
        assert_eq!(hub.viewer_anzahl(&SessionId::neu("s1")), 0);
    }

    #[tokio::test]
    async fn chat_geht_an_ganze_session_inklusive_absender() {
        let hub = SessionHub::neu();
        let (a, mut rx_a) = verbunden(&hub);
        let (b, mut rx_b) = verbunden(&hub);
        let (c, mut rx_c) = verbunden(&hub);
        a.frame_verarbeiten(&join("s1"));
        b.frame_verarbeiten(&join("s1"));
        c.frame_verarbeiten(&join("s2"));
        let _ = (rx_a.try_recv(), rx_b.try_recv(), rx_c.try_recv());

        a.frame_verarbeiten(
            &json!({"event": "chat-message", "data": {"sessionId": "s1", "userId": "u1", "message": " gg wp "}})
                .to_string(),
        );

        for rx in [&mut rx_a, &mut rx_b] {
            let wert = als_json(rx.try_recv().unwrap());
            assert_eq!(wert["event"], "chat-message");
            assert_eq!(wert["data"]["message"], "gg wp");
            assert_eq!(wert["data"]["userId"], "u1");
            assert_eq!(wert["data"]["messageType"], "TEXT");
        }
        assert!(rx_c.try_recv().is_err(), "Andere Session bekommt nichts");
    }

    #[tokio::test]
    async fn leere_chat_nachricht_ist_chat_error() {
        let hub = SessionHub::neu();
        let (a, mut rx) = verbunden(&hub);
        a.frame_verarbeiten(&join("s1"));
        let _ = rx.try_recv();

        a.frame_verarbeiten(
            &json!({"event": "chat-message", "data": {"sessionId": "s1", "userId": "u1", "message": "   "}})
                .to_string(),
        );
        let wert = als_json(rx.try_recv().unwrap());
        assert_eq!(wert["event"], "chat-error");
        assert!(rx.try_recv().is_err(), "Nichts wurde verteilt");
    }

    #[tokio::test]
    async fn chat_ohne_beitritt_geht_trotzdem_an_die_session() {
        let hub = SessionHub::neu();
        let (mitglied, mut rx_mitglied) = verbunden(&hub);
        let (gast, mut rx_gast) = verbunden(&hub);
        mitglied.frame_verarbeiten(&join("s1"));
        let _ = rx_mitglied.try_recv();

        gast.frame_verarbeiten(
            &json!({"event": "chat-message", "data": {"sessionId": "s1", "userId": "gast", "message": "hi"}})
                .to_string(),
        );

        let wert = als_json(rx_mitglied.try_recv().unwrap());
        assert_eq!(wert["event"], "chat-message");
        assert_eq!(wert["data"]["userId"], "gast");
        assert!(rx_gast.try_recv().is_err(), "Gast ist kein Empfaenger und bekommt keinen Fehler");
    }

    #[tokio::test]
    async fn performance_update_nicht_an_absender() {
        let hub = SessionHub::neu();
        let (spieler, mut rx_spieler) = verbunden(&hub);
        let (host, mut rx_host) = verbunden(&hub);
        spieler.frame_verarbeiten(&join("s1"));
        host.frame_verarbeiten(&join("s1"));
        let _ = (rx_spieler.try_recv(), rx_host.try_recv());

        spieler.frame_verarbeiten(
            &json!({
                "event": "performance-metrics",
                "data": {"sessionId": "s1", "userId": "u1", "gameId": "g1", "metrics": {"fps": 60, "latency": 18}}
            })
            .to_string(),
        );

        assert_eq!(
            als_json(rx_host.try_recv().unwrap()),
            json!({"event": "performance-update", "data": {"userId": "u1", "metrics": {"fps": 60, "latency": 18}}})
        );
        assert!(rx_spieler.try_recv().is_err());
    }

    #[tokio::test]
    async fn ungueltiges_frame_ist_error_ereignis() {
        let hub = SessionHub::neu();
        let (a, mut rx) = verbunden(&hub);

        a.frame_verarbeiten("{nicht json");
        assert_eq!(als_json(rx.try_recv().unwrap())["event"], "error");

        // Verbindung bleibt nutzbar
        a.frame_verarbeiten(&join("s1"));
        assert_eq!(als_json(rx.try_recv().unwrap())["event"], "session-joined");
    }

    #[tokio::test]
    async fn schleife_leitet_weiter_und_meldet_ab() {
        let hub = SessionHub::neu();
        let conn = ClientConnection::neu(hub.clone());
        let cid = conn.connection_id();

        let (ein_tx, ein_rx) = mpsc::unbounded_channel::<String>();
        let (aus_tx, mut aus_rx) = mpsc::unbounded_channel::<String>();
        let eingang = Box::pin(futures_util::stream::unfold(ein_rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        }));
        let ausgang = Box::pin(futures_util::sink::unfold(aus_tx, |tx, frame: String| async move {
            tx.send(frame).map_err(|e| e.to_string())?;
            Ok::<_, String>(tx)
        }));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(conn.verarbeiten(eingang, ausgang, shutdown_rx));

        ein_tx.send(join("s1")).unwrap();
        let frame = tokio::time::timeout(Duration::from_secs(2), aus_rx.recv())
            .await
            .unwrap()
            .unwrap();
        let wert: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(wert["event"], "session-joined");
        assert!(hub.ist_registriert(&cid));

        // Client trennt: Hub raeumt auf
        drop(ein_tx);
        tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert!(!hub.ist_registriert(&cid));
        assert_eq!(hub.viewer_anzahl(&SessionId::neu("s1")), 0);
    }

    #[tokio::test]
    async fn shutdown_beendet_schleife() {
        let hub = SessionHub::neu();
        let conn = ClientConnection::neu(hub.clone());

        let (_ein_tx, ein_rx) = mpsc::unbounded_channel::<String>();
        let eingang = Box::pin(futures_util::stream::unfold(ein_rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        }));
        let ausgang = Box::pin(futures_util::sink::drain::<String>());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(conn.verarbeiten(eingang, ausgang, shutdown_rx));
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert_eq!(hub.client_anzahl(), 0);
    }
}
