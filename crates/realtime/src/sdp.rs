//! Minimale SDP-Pruefung
//!
//! Es wird nicht vollstaendig geparst, nur so weit, dass eine kaputte oder
//! leere Answer erkannt wird, bevor sie auf die Peer-Verbindung trifft.
//! Ausserdem liefert `analysieren` die Medienabschnitte eines Offers.

use adda_core::{ArcadeError, Result};

/// Richtungsattribut eines Medienabschnitts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Richtung {
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
}

impl Richtung {
    fn aus_attribut(attr: &str) -> Option<Self> {
        match attr {
            "sendrecv" => Some(Self::SendRecv),
            "sendonly" => Some(Self::SendOnly),
            "recvonly" => Some(Self::RecvOnly),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

/// Ein `m=`-Abschnitt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MedienAbschnitt {
    /// `audio`, `video` oder `application`
    pub art: String,
    pub richtung: Option<Richtung>,
}

/// Ergebnis der Analyse
#[derive(Debug, Clone, Default)]
pub struct SdpUebersicht {
    pub medien: Vec<MedienAbschnitt>,
}

impl SdpUebersicht {
    pub fn abschnitte(&self, art: &str) -> impl Iterator<Item = &MedienAbschnitt> {
        let art = art.to_string();
        self.medien.iter().filter(move |m| m.art == art)
    }

    /// Datenkanaele laufen ueber einen `m=application`-Abschnitt
    pub fn hat_datenkanal(&self) -> bool {
        self.abschnitte("application").next().is_some()
    }
}

/// Prueft die Grundstruktur und listet die Medienabschnitte
pub fn analysieren(sdp: &str) -> Result<SdpUebersicht> {
    let mut zeilen = sdp.lines().map(str::trim).filter(|z| !z.is_empty());

    match zeilen.next() {
        Some("v=0") => {}
        Some(andere) => {
            return Err(ArcadeError::handshake(format!(
                "SDP beginnt nicht mit v=0: {andere:.40}"
            )))
        }
        None => return Err(ArcadeError::handshake("SDP ist leer")),
    }

    let mut hat_origin = false;
    let mut uebersicht = SdpUebersicht::default();

    for zeile in zeilen {
        let Some((typ, wert)) = zeile.split_once('=') else {
            return Err(ArcadeError::handshake(format!("Ungueltige SDP-Zeile: {zeile:.40}")));
        };
        match typ {
            "o" => hat_origin = true,
            "m" => {
                let art = wert.split_whitespace().next().unwrap_or_default();
                uebersicht.medien.push(MedienAbschnitt {
                    art: art.to_string(),
                    richtung: None,
                });
            }
            "a" => {
                if let (Some(richtung), Some(aktuell)) =
                    (Richtung::aus_attribut(wert), uebersicht.medien.last_mut())
                {
                    aktuell.richtung = Some(richtung);
                }
            }
            _ => {}
        }
    }

    if !hat_origin {
        return Err(ArcadeError::handshake("SDP ohne o=-Zeile"));
    }
    if uebersicht.medien.is_empty() {
        return Err(ArcadeError::handshake("SDP ohne Medienabschnitt"));
    }
    Ok(uebersicht)
}
