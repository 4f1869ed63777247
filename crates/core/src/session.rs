//! Session-Konfiguration und ephemere Zugangsdaten
//!
//! `SessionConfig` kommt vom Aufrufer, alle Felder sind optional. Erst
//! `aufloesen()` setzt die Standardwerte ein; das Ergebnis ist
//! unveraenderlich und wird so an den Provider weitergereicht.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Realtime-Modell des Providers, falls der Aufrufer keines angibt
pub const STANDARD_MODELL: &str = "gpt-4o-realtime-preview-2024-12-17";

/// Stimme, falls der Aufrufer keine angibt
pub const STANDARD_STIMME: &str = "verse";

/// Vom Aufrufer gelieferte Session-Konfiguration
///
/// Felder duerfen fehlen, aber nicht explizit `null` sein.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default, deserialize_with = "ohne_null", skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "ohne_null", skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(default, deserialize_with = "ohne_null", skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,
}

/// Nur fuer vorhandene Felder aufgerufen; `null` scheitert am inneren Typ
fn ohne_null<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl SessionConfig {
    /// Setzt fuer fehlende oder leere Felder die Standardwerte ein
    pub fn aufloesen(&self) -> AufgeloesteConfig {
        AufgeloesteConfig {
            model: nicht_leer(self.model.as_deref())
                .unwrap_or(STANDARD_MODELL)
                .to_string(),
            voice: nicht_leer(self.voice.as_deref())
                .unwrap_or(STANDARD_STIMME)
                .to_string(),
            modalities: self.modalities.clone(),
        }
    }
}

fn nicht_leer(wert: Option<&str>) -> Option<&str> {
    wert.filter(|s| !s.is_empty())
}

/// Konfiguration mit eingesetzten Standardwerten
///
/// Serialisiert in den Body fuer das eigene Backend. Der Provider bekommt
/// davon nur `model` und `voice`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AufgeloesteConfig {
    pub model: String,
    pub voice: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,
}

/// Kurzlebiges Bearer-Token fuer genau einen SDP-Austausch
///
/// Absichtlich nicht `Clone`: der SDP-Austausch konsumiert es per Wert.
#[derive(Serialize, Deserialize)]
pub struct EphemeralCredential {
    value: String,
    /// Ablaufzeitpunkt (Unix-Sekunden), sofern der Provider ihn liefert
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<i64>,
}

impl EphemeralCredential {
    pub fn neu(value: impl Into<String>, expires_at: Option<i64>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    pub fn wert(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> Option<i64> {
        self.expires_at
    }

    pub fn ist_leer(&self) -> bool {
        self.value.trim().is_empty()
    }
}

impl std::fmt::Debug for EphemeralCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralCredential")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Vollstaendiges Session-Objekt des Providers
///
/// Alle Felder ausser `client_secret` werden unveraendert durchgereicht.
#[derive(Debug, Serialize, Deserialize)]
pub struct EphemeralSession {
    pub client_secret: EphemeralCredential,
    #[serde(flatten)]
    pub weitere: Map<String, Value>,
}

impl EphemeralSession {
    /// Modell laut Provider-Antwort, falls vorhanden
    pub fn modell(&self) -> Option<&str> {
        self.weitere.get("model").and_then(Value::as_str)
    }

    pub fn into_credential(self) -> EphemeralCredential {
        self.client_secret
    }
}
