//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist. Umgebungsvariablen ueberschreiben Dateiwerte.

use adda_observability::logging::{log_filter_gueltig, log_format_gueltig};
use adda_realtime::PROVIDER_BASIS_URL;
use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// REST-API-Einstellungen
    pub api: ApiEinstellungen,
    /// Realtime-Provider-Einstellungen
    pub realtime: RealtimeEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    pub bind_adresse: String,
    pub port: u16,
    /// Laufzeitumgebung ("development", "production", ...)
    pub umgebung: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 5000,
            umgebung: "development".into(),
        }
    }
}

/// REST-API-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiEinstellungen {
    /// Versionssegment im Pfad-Praefix `/api/{version}`
    pub version: String,
    /// CORS-Origins; `*` erlaubt alle (ohne Credentials)
    pub cors_origins: Vec<String>,
}

impl Default for ApiEinstellungen {
    fn default() -> Self {
        Self {
            version: "v1".into(),
            cors_origins: vec!["http://localhost:3000".into()],
        }
    }
}

/// Realtime-Provider-Einstellungen
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeEinstellungen {
    pub provider_url: String,
    /// Server-Geheimnis; gehoert in die Umgebung (`OPENAI_API_KEY`), nicht in die Datei
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for RealtimeEinstellungen {
    fn default() -> Self {
        Self {
            provider_url: PROVIDER_BASIS_URL.into(),
            api_key: None,
        }
    }
}

impl std::fmt::Debug for RealtimeEinstellungen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeEinstellungen")
            .field("provider_url", &self.provider_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Stellt `/metrics` bereit
    pub metriken_aktiviert: bool,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            metriken_aktiviert: true,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei und wendet die
    /// Umgebungsvariablen an.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let mut config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };
        config.umgebung_anwenden(|name| std::env::var(name).ok())?;
        config.validieren()?;
        Ok(config)
    }

    /// Ueberschreibt Werte aus der Umgebung
    ///
    /// `lesen` liefert den Wert einer Variable; leere Werte zaehlen als nicht gesetzt.
    pub fn umgebung_anwenden<F>(&mut self, lesen: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lesen = |name: &str| lesen(name).filter(|w| !w.trim().is_empty());

        if let Some(port) = lesen("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("PORT '{port}' ist keine gueltige Portnummer: {e}"))?;
        }
        if let Some(umgebung) = lesen("ADDA_ENV") {
            self.server.umgebung = umgebung;
        }
        if let Some(version) = lesen("API_VERSION") {
            self.api.version = version;
        }
        if let Some(origins) = lesen("CORS_ORIGIN") {
            self.api.cors_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(key) = lesen("OPENAI_API_KEY") {
            self.realtime.api_key = Some(key);
        }
        Ok(())
    }

    /// Prueft die Werte auf offensichtliche Fehler
    pub fn validieren(&self) -> anyhow::Result<()> {
        let version = self.api.version.trim();
        if version.is_empty() || version.contains('/') {
            anyhow::bail!("API-Version '{}' ist ungueltig", self.api.version);
        }
        if !log_format_gueltig(&self.logging.format) {
            anyhow::bail!("Log-Format '{}' ist ungueltig (text/json)", self.logging.format);
        }
        if !log_filter_gueltig(&self.logging.level) {
            anyhow::bail!(
                "Log-Level '{}' ist ungueltig (trace/debug/info/warn/error/off oder ziel=level)",
                self.logging.level
            );
        }
        Ok(())
    }

    /// Gibt die vollstaendige Bind-Adresse zurueck
    pub fn bind_adresse(&self) -> String {
        format!("{}:{}", self.server.bind_adresse, self.server.port)
    }

    /// Pfad-Praefix der REST-API, z.B. `/api/v1`
    pub fn api_prefix(&self) -> String {
        format!("/api/{}", self.api.version.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn umgebung(paare: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let werte: HashMap<String, String> = paare
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| werte.get(name).cloned()
    }

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.server.port, 5000);
        assert_eq!(cfg.api.version, "v1");
        assert_eq!(cfg.api.cors_origins, vec!["http://localhost:3000".to_string()]);
        assert_eq!(cfg.realtime.provider_url, "https://api.openai.com/v1");
        assert!(cfg.realtime.api_key.is_none());
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.validieren().is_ok());
    }

    #[test]
    fn bind_adresse_und_prefix() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_adresse(), "0.0.0.0:5000");
        assert_eq!(cfg.api_prefix(), "/api/v1");
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [server]
            port = 8080

            [api]
            version = "v2"
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.api_prefix(), "/api/v2");
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.server.bind_adresse, "0.0.0.0");
        assert_eq!(cfg.server.umgebung, "development");
    }

    #[test]
    fn umgebung_ueberschreibt_datei() {
        let mut cfg = ServerConfig::default();
        cfg.umgebung_anwenden(umgebung(&[
            ("PORT", "7000"),
            ("API_VERSION", "v3"),
            ("CORS_ORIGIN", "https://adda.gg, https://admin.adda.gg"),
            ("ADDA_ENV", "production"),
            ("OPENAI_API_KEY", "sk-test"),
        ]))
        .unwrap();

        assert_eq!(cfg.server.port, 7000);
        assert_eq!(cfg.api_prefix(), "/api/v3");
        assert_eq!(
            cfg.api.cors_origins,
            vec!["https://adda.gg".to_string(), "https://admin.adda.gg".to_string()]
        );
        assert_eq!(cfg.server.umgebung, "production");
        assert_eq!(cfg.realtime.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn leere_umgebungswerte_werden_ignoriert() {
        let mut cfg = ServerConfig::default();
        cfg.umgebung_anwenden(umgebung(&[("OPENAI_API_KEY", ""), ("API_VERSION", " ")]))
            .unwrap();
        assert!(cfg.realtime.api_key.is_none());
        assert_eq!(cfg.api.version, "v1");
    }

    #[test]
    fn ungueltiger_port_ist_fehler() {
        let mut cfg = ServerConfig::default();
        assert!(cfg.umgebung_anwenden(umgebung(&[("PORT", "abc")])).is_err());
    }

    #[test]
    fn ungueltige_werte_werden_abgelehnt() {
        let mut cfg = ServerConfig::default();
        cfg.api.version = "v1/extra".into();
        assert!(cfg.validieren().is_err());

        let mut cfg = ServerConfig::default();
        cfg.logging.format = "xml".into();
        assert!(cfg.validieren().is_err());
    }

    #[test]
    fn log_level_wird_geprueft() {
        let mut cfg = ServerConfig::default();
        cfg.logging.level = "verbose".into();
        let fehler = cfg.validieren().unwrap_err();
        assert!(fehler.to_string().contains("verbose"));

        cfg.logging.level = "adda_server=debug,info".into();
        assert!(cfg.validieren().is_ok());
    }

    #[test]
    fn api_key_nicht_in_debug_und_toml() {
        let mut cfg = ServerConfig::default();
        cfg.realtime.api_key = Some("sk-geheim".into());

        assert!(!format!("{cfg:?}").contains("sk-geheim"));
        assert!(!toml::to_string(&cfg).unwrap().contains("sk-geheim"));
    }

    #[test]
    fn fehlende_datei_liefert_standardwerte() {
        let cfg = ServerConfig::laden("/nicht/vorhanden/adda.toml").unwrap();
        assert!(!cfg.api.version.is_empty());
    }
}
