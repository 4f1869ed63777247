//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable:
//! - `ADDA_LOG_LEVEL`: Log-Level oder Filter-Direktive, Standard aus der Config
//! - `ADDA_LOG_FORMAT`: Format (text/json), Standard aus der Config

use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_LEVEL_VAR: &str = "ADDA_LOG_LEVEL";
pub const LOG_FORMAT_VAR: &str = "ADDA_LOG_FORMAT";

/// Initialisiert das Logging-System.
///
/// Umgebungsvariablen haben Vorrang vor den uebergebenen Werten.
/// Faellt auf `info` zurueck falls der Filter nicht lesbar ist.
pub fn logging_initialisieren(level: &str, format: &str) {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_VAR)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = log_format_aus_env().unwrap_or_else(|| format.to_string());

    match format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_current_span(true)
                .init();
        }
        _ => {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    }
}

/// Log-Format aus der Umgebung, falls gesetzt
pub fn log_format_aus_env() -> Option<String> {
    std::env::var(LOG_FORMAT_VAR).ok().filter(|f| !f.is_empty())
}

const LEVEL: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

fn level_gueltig(level: &str) -> bool {
    LEVEL.iter().any(|l| l.eq_ignore_ascii_case(level.trim()))
}

/// Validiert einen Log-Level oder eine Filter-Direktive.
///
/// Erlaubt sind ein nackter Level (`debug`) und kommagetrennte Direktiven
/// der Form `ziel=level` (`adda_server=debug,info`). Ein nacktes Wort ohne
/// Level gilt als Tippfehler, obwohl `EnvFilter` es als Ziel annehmen wuerde.
pub fn log_filter_gueltig(filter: &str) -> bool {
    if filter.trim().is_empty() {
        return false;
    }
    filter.split(',').all(|direktive| match direktive.split_once('=') {
        Some((ziel, level)) => !ziel.trim().is_empty() && level_gueltig(level),
        None => level_gueltig(direktive),
    })
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}
