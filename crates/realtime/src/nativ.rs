//! Peer-Verbindung ueber webrtc-rs
//!
//! Aktiv mit dem Feature `webrtc`. Die Medien-Engine registriert die
//! Standard-Codecs (Opus fuer Audio). Lokale Tracks kommen aus
//! [`crate::geraete::MikrofonQuelle`]; eintreffende Tracks werden pro Track
//! in einem eigenen Task gelesen und paketweise an die Senke gereicht.

use std::sync::Arc;

use async_trait::async_trait;
use adda_core::{ArcadeError, Result};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::track::track_remote::TrackRemote;

use crate::geraete::MikrofonTrack;
use crate::peer::{
    AudioSenke, DatenKanal, DatenKanalZustand, LokalerTrack, MedienPaket, PeerFabrik,
    PeerVerbindung, RemoteTrack, TrackArt, VerbindungsZustand,
};

const STANDARD_STUN: &str = "stun:stun.l.google.com:19302";

fn handshake(kontext: &str, e: webrtc::Error) -> ArcadeError {
    ArcadeError::handshake(format!("{kontext}: {e}"))
}

// ---------------------------------------------------------------------------
// Fabrik
// ---------------------------------------------------------------------------

/// Erzeugt Peer-Verbindungen mit gemeinsamer Medien-Engine
pub struct WebRtcPeerFabrik {
    api: API,
    ice_server: Vec<String>,
}

impl WebRtcPeerFabrik {
    pub fn neu() -> Result<Self> {
        Self::mit_ice_servern(vec![STANDARD_STUN.to_string()])
    }

    pub fn mit_ice_servern(ice_server: Vec<String>) -> Result<Self> {
        let mut medien = MediaEngine::default();
        medien
            .register_default_codecs()
            .map_err(|e| ArcadeError::intern(format!("Codecs nicht registrierbar: {e}")))?;
        let registry = register_default_interceptors(Registry::new(), &mut medien)
            .map_err(|e| ArcadeError::intern(format!("Interceptors nicht registrierbar: {e}")))?;
        let api = APIBuilder::new()
            .with_media_engine(medien)
            .with_interceptor_registry(registry)
            .build();
        Ok(Self { api, ice_server })
    }
}

#[async_trait]
impl PeerFabrik for WebRtcPeerFabrik {
    async fn erstellen(&self) -> Result<Arc<dyn PeerVerbindung>> {
        let config = RTCConfiguration {
            ice_servers: vec![RTCIceServer {
                urls: self.ice_server.clone(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let pc = self
            .api
            .new_peer_connection(config)
            .await
            .map_err(|e| handshake("Peer-Verbindung nicht erstellbar", e))?;
        Ok(Arc::new(WebRtcPeer { pc: Arc::new(pc) }))
    }
}

// ---------------------------------------------------------------------------
// Peer
// ---------------------------------------------------------------------------

pub struct WebRtcPeer {
    pc: Arc<RTCPeerConnection>,
}

#[async_trait]
impl PeerVerbindung for WebRtcPeer {
    async fn audio_einrichten(&self, lokale: &[Arc<dyn LokalerTrack>]) -> Result<()> {
        if lokale.is_empty() {
            self.pc
                .add_transceiver_from_kind(
                    RTPCodecType::Audio,
                    Some(RTCRtpTransceiverInit {
                        direction: RTCRtpTransceiverDirection::Recvonly,
                        send_encodings: vec![],
                    }),
                )
                .await
                .map_err(|e| handshake("Audio-Transceiver nicht erstellbar", e))?;
            return Ok(());
        }

        for track in lokale {
            let mikrofon = track
                .as_any()
                .downcast_ref::<MikrofonTrack>()
                .ok_or_else(|| ArcadeError::intern("Lokaler Track ist kein MikrofonTrack"))?;
            self.pc
                .add_track(mikrofon.rtp_track())
                .await
                .map_err(|e| handshake("Mikrofon-Track nicht anhaengbar", e))?;
        }
        Ok(())
    }

    async fn datenkanal_erstellen(&self, label: &str) -> Result<Arc<dyn DatenKanal>> {
        let kanal = self
            .pc
            .create_data_channel(label, None)
            .await
            .map_err(|e| handshake("Datenkanal nicht erstellbar", e))?;
        Ok(Arc::new(WebRtcDatenKanal {
            label: label.to_string(),
            kanal,
        }))
    }

    fn remote_tracks_an(&self, senke: Arc<dyn AudioSenke>) {
        self.pc.on_track(Box::new(move |track, _empfaenger, _transceiver| {
            tokio::spawn(track_lesen(track, Arc::clone(&senke)));
            Box::pin(async {})
        }));
    }

    async fn offer_erstellen(&self) -> Result<String> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| handshake("Offer nicht erstellbar", e))?;

        // Kein Trickle-ICE beim Provider: auf vollstaendige Kandidaten warten
        let mut gesammelt = self.pc.gathering_complete_promise().await;
        self.pc
            .set_local_description(offer)
            .await
            .map_err(|e| handshake("Lokale Beschreibung abgelehnt", e))?;
        let _ = gesammelt.recv().await;

        self.pc
            .local_description()
            .await
            .map(|beschreibung| beschreibung.sdp)
            .ok_or_else(|| ArcadeError::handshake("Keine lokale Beschreibung nach dem Offer"))
    }

    async fn answer_anwenden(&self, sdp: &str) -> Result<()> {
        let answer = RTCSessionDescription::answer(sdp.to_string())
            .map_err(|e| handshake("Answer nicht lesbar", e))?;
        self.pc
            .set_remote_description(answer)
            .await
            .map_err(|e| handshake("Answer abgelehnt", e))
    }

    fn verbindungs_zustand(&self) -> VerbindungsZustand {
        match self.pc.connection_state() {
            RTCPeerConnectionState::New | RTCPeerConnectionState::Unspecified => {
                VerbindungsZustand::Neu
            }
            RTCPeerConnectionState::Connecting => VerbindungsZustand::Verbindend,
            RTCPeerConnectionState::Connected => VerbindungsZustand::Verbunden,
            RTCPeerConnectionState::Disconnected => VerbindungsZustand::Getrennt,
            RTCPeerConnectionState::Failed => VerbindungsZustand::Fehlgeschlagen,
            RTCPeerConnectionState::Closed => VerbindungsZustand::Geschlossen,
        }
    }

    async fn schliessen(&self) {
        if let Err(e) = self.pc.close().await {
            tracing::debug!(error = %e, "Peer-Verbindung liess sich nicht sauber schliessen");
        }
    }
}

// ---------------------------------------------------------------------------
// Datenkanal
// ---------------------------------------------------------------------------

pub struct WebRtcDatenKanal {
    label: String,
    kanal: Arc<RTCDataChannel>,
}

#[async_trait]
impl DatenKanal for WebRtcDatenKanal {
    fn label(&self) -> &str {
        &self.label
    }

    fn zustand(&self) -> DatenKanalZustand {
        match self.kanal.ready_state() {
            RTCDataChannelState::Open => DatenKanalZustand::Offen,
            RTCDataChannelState::Closing => DatenKanalZustand::Schliessend,
            RTCDataChannelState::Closed => DatenKanalZustand::Geschlossen,
            _ => DatenKanalZustand::Verbindend,
        }
    }

    async fn text_senden(&self, text: String) -> Result<()> {
        self.kanal
            .send_text(text)
            .await
            .map(|_| ())
            .map_err(|e| ArcadeError::Transport(format!("Datenkanal: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Empfang
// ---------------------------------------------------------------------------

/// Liest RTP-Pakete eines entfernten Tracks, bis die Verbindung endet
async fn track_lesen(track: Arc<TrackRemote>, senke: Arc<dyn AudioSenke>) {
    let id = track.id();
    let art = match track.kind() {
        RTPCodecType::Video => TrackArt::Video,
        _ => TrackArt::Audio,
    };
    let codec = track.codec().capability.mime_type;
    tracing::info!(track = %id, codec = %codec, "Entfernter Track eingetroffen");

    senke.track_empfangen(RemoteTrack {
        id: id.clone(),
        stream_id: track.stream_id(),
        art,
        codec,
    });

    let mut pakete = 0u64;
    loop {
        match track.read_rtp().await {
            Ok((paket, _)) => {
                pakete += 1;
                senke.paket_empfangen(
                    &id,
                    MedienPaket {
                        sequenz: paket.header.sequence_number,
                        zeitstempel: paket.header.timestamp,
                        nutzlast: paket.payload.to_vec(),
                    },
                );
            }
            Err(e) => {
                tracing::debug!(track = %id, pakete, error = %e, "Entfernter Track beendet");
                break;
            }
        }
    }
    senke.track_beendet(&id);
}
