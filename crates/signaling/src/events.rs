//! Ereignisse des Session-Hubs
//!
//! Jedes Frame ist ein JSON-Objekt `{"event": <name>, "data": <payload>}`.
//! Ereignisnamen in kebab-case, Felder in camelCase.

use adda_core::{SessionId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::SignalingResult;

// ---------------------------------------------------------------------------
// Eingehend
// ---------------------------------------------------------------------------

/// Ereignis vom Client an den Hub
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum EingehendesEreignis {
    JoinSession(SessionBezug),
    LeaveSession(SessionBezug),
    ChatMessage(ChatEingang),
    PerformanceMetrics(PerformanceEingang),
}

impl EingehendesEreignis {
    /// Parst ein Text-Frame
    pub fn parsen(text: &str) -> SignalingResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinSession(_) => "join-session",
            Self::LeaveSession(_) => "leave-session",
            Self::ChatMessage(_) => "chat-message",
            Self::PerformanceMetrics(_) => "performance-metrics",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionBezug {
    pub session_id: SessionId,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEingang {
    pub session_id: SessionId,
    pub user_id: UserId,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceEingang {
    pub session_id: SessionId,
    pub user_id: UserId,
    #[serde(default)]
    pub game_id: Option<String>,
    /// Frei strukturierte Messwerte (fps, latency, packetLoss, ...)
    #[serde(default)]
    pub metrics: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Ausgehend
// ---------------------------------------------------------------------------

/// Ereignis vom Hub an einen Client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum AusgehendesEreignis {
    SessionJoined(SessionBeigetreten),
    SessionLeft(SessionVerlassen),
    ChatMessage(ChatNachricht),
    PerformanceUpdate(PerformanceUpdate),
    ChatError(FehlerMeldung),
    Error(FehlerMeldung),
}

impl AusgehendesEreignis {
    pub fn chat_fehler(text: impl Into<String>) -> Self {
        Self::ChatError(FehlerMeldung { error: text.into() })
    }

    pub fn fehler(text: impl Into<String>) -> Self {
        Self::Error(FehlerMeldung { error: text.into() })
    }

    /// Serialisiert das Ereignis als Text-Frame
    pub fn als_frame(&self) -> SignalingResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionBeigetreten {
    pub session_id: SessionId,
    pub success: bool,
    pub viewers: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionVerlassen {
    pub session_id: SessionId,
    pub success: bool,
}

/// Weitergeleitete Chat-Nachricht
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatNachricht {
    pub id: String,
    pub session_id: SessionId,
    pub user_id: UserId,
    pub message: String,
    pub message_type: &'static str,
    pub created_at: String,
}

impl ChatNachricht {
    /// Erstellt eine Text-Nachricht mit frischer ID und Zeitstempel
    pub fn text(session_id: SessionId, user_id: UserId, message: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id,
            user_id,
            message,
            message_type: "TEXT",
            created_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceUpdate {
    pub user_id: UserId,
    pub metrics: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FehlerMeldung {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn join_session_parsen() {
        let ereignis = EingehendesEreignis::parsen(
            r#"{"event":"join-session","data":{"sessionId":"s1","userId":"u1"}}"#,
        )
        .unwrap();
        assert_eq!(
            ereignis,
            EingehendesEreignis::JoinSession(SessionBezug {
                session_id: SessionId::neu("s1"),
                user_id: Some(UserId::neu("u1")),
            })
        );
        assert_eq!(ereignis.name(), "join-session");
    }

    #[test]
    fn performance_metrics_ohne_game_id() {
        let ereignis = EingehendesEreignis::parsen(
            r#"{"event":"performance-metrics","data":{"sessionId":"s1","userId":"u1","metrics":{"fps":60}}}"#,
        )
        .unwrap();
        match ereignis {
            EingehendesEreignis::PerformanceMetrics(p) => {
                assert!(p.game_id.is_none());
                assert_eq!(p.metrics["fps"], 60);
            }
            andere => panic!("Unerwartet: {andere:?}"),
        }
    }

    #[test]
    fn unbekanntes_ereignis_ist_fehler() {
        assert!(EingehendesEreignis::parsen(r#"{"event":"kick-user","data":{}}"#).is_err());
        assert!(EingehendesEreignis::parsen("kein json").is_err());
        assert!(EingehendesEreignis::parsen(r#"{"event":"join-session","data":{}}"#).is_err());
    }

    #[test]
    fn session_joined_frame() {
        let frame = AusgehendesEreignis::SessionJoined(SessionBeigetreten {
            session_id: SessionId::neu("s1"),
            success: true,
            viewers: 3,
        })
        .als_frame()
        .unwrap();
        let wert: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(
            wert,
            json!({"event": "session-joined", "data": {"sessionId": "s1", "success": true, "viewers": 3}})
        );
    }

    #[test]
    fn chat_nachricht_felder() {
        let nachricht = ChatNachricht::text(SessionId::neu("s1"), UserId::neu("u1"), "gg".into());
        let wert = serde_json::to_value(AusgehendesEreignis::ChatMessage(nachricht)).unwrap();
        assert_eq!(wert["event"], "chat-message");
        assert_eq!(wert["data"]["messageType"], "TEXT");
        assert_eq!(wert["data"]["sessionId"], "s1");
        assert!(wert["data"]["createdAt"].as_str().unwrap().ends_with('Z'));
        assert_eq!(wert["data"]["id"].as_str().unwrap().len(), 36);
    }

    #[test]
    fn fehler_frames() {
        let wert = serde_json::to_value(AusgehendesEreignis::chat_fehler("leer")).unwrap();
        assert_eq!(wert, json!({"event": "chat-error", "data": {"error": "leer"}}));
        let wert = serde_json::to_value(AusgehendesEreignis::fehler("kaputt")).unwrap();
        assert_eq!(wert["event"], "error");
    }
}
