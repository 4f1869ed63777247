//! Mikrofon und Lautsprecher ueber cpal, Opus ueber audiopus
//!
//! cpal-Streams sind nicht `Send`. Jeder Stream lebt deshalb in einem
//! eigenen Thread, der ihn bis zum Stopp haelt; Encoder und Decoder werden
//! im selben Thread erzeugt. Intern wird mit 48 kHz Mono gearbeitet, das
//! Geraeteformat wird an den Raendern umgerechnet.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use adda_core::{ArcadeError, Result};
use audiopus::coder::{Decoder, Encoder};
use audiopus::{Application, Channels, SampleRate};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapRb};
use tokio::sync::{mpsc, oneshot};
use webrtc::api::media_engine::MIME_TYPE_OPUS;
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

use crate::peer::{AudioSenke, LokalerTrack, MedienPaket, MedienQuelle, RemoteTrack, TrackArt};

/// Opus-Taktrate und interne Abtastrate
pub const ABTASTRATE: u32 = 48_000;

/// 20 ms bei 48 kHz Mono
pub const FRAME_SAMPLES: usize = 960;

const FRAME_DAUER: Duration = Duration::from_millis(20);

/// Groesster Opus-Frame (120 ms)
const MAX_FRAME_SAMPLES: usize = 5_760;

/// Maximale Groesse eines kodierten Frames
const MAX_PAKET_BYTES: usize = 4_000;

/// Wiedergabepuffer: 2 Sekunden
const PUFFER_SAMPLES: usize = 48_000 * 2;

const BEFEHL_QUEUE: usize = 256;
const FRAME_QUEUE: usize = 50;

fn verweigert(meldung: impl Into<String>) -> ArcadeError {
    ArcadeError::MedienZugriffVerweigert(meldung.into())
}

// ---------------------------------------------------------------------------
// PCM-Helfer
// ---------------------------------------------------------------------------

/// Mittelt verschachtelte Mehrkanal-Samples auf einen Kanal
pub fn auf_mono(daten: &[f32], kanaele: u16) -> Vec<f32> {
    let kanaele = usize::from(kanaele.max(1));
    if kanaele == 1 {
        return daten.to_vec();
    }
    daten
        .chunks(kanaele)
        .map(|rahmen| rahmen.iter().sum::<f32>() / rahmen.len() as f32)
        .collect()
}

/// Verteilt Mono-Samples auf `kanaele` verschachtelte Kanaele
pub fn auf_kanaele(mono: &[f32], kanaele: u16) -> Vec<f32> {
    let kanaele = usize::from(kanaele.max(1));
    mono.iter()
        .flat_map(|&s| std::iter::repeat(s).take(kanaele))
        .collect()
}

/// Lineare Umtastung eines Blocks von `von` nach `nach` Hz
pub fn umtasten(eingang: &[f32], von: u32, nach: u32) -> Vec<f32> {
    if von == nach || eingang.is_empty() || von == 0 {
        return eingang.to_vec();
    }
    let laenge = (eingang.len() as u64 * u64::from(nach) / u64::from(von)) as usize;
    let schritt = f64::from(von) / f64::from(nach);
    (0..laenge)
        .map(|i| {
            let pos = i as f64 * schritt;
            let index = pos as usize;
            let anteil = (pos - index as f64) as f32;
            let a = eingang[index.min(eingang.len() - 1)];
            let b = eingang[(index + 1).min(eingang.len() - 1)];
            a + (b - a) * anteil
        })
        .collect()
}

/// Sammelt Samples bis zu vollstaendigen Opus-Frames
#[derive(Debug, Default)]
pub struct FrameSammler {
    puffer: Vec<f32>,
}

impl FrameSammler {
    /// Nimmt Samples auf und gibt alle vollstaendigen Frames zurueck
    pub fn hinzufuegen(&mut self, samples: &[f32]) -> Vec<Vec<f32>> {
        self.puffer.extend_from_slice(samples);
        let voll = self.puffer.len() / FRAME_SAMPLES * FRAME_SAMPLES;
        let frames = self.puffer[..voll]
            .chunks(FRAME_SAMPLES)
            .map(<[f32]>::to_vec)
            .collect();
        self.puffer.drain(..voll);
        frames
    }

    pub fn rest(&self) -> usize {
        self.puffer.len()
    }
}

// ---------------------------------------------------------------------------
// Mikrofon
// ---------------------------------------------------------------------------

/// Opus-Track, gespeist vom Standard-Eingabegeraet
///
/// `stoppen` beendet den Aufnahme-Thread; der cpal-Stream wird dort
/// verworfen und es werden keine Samples mehr geschrieben.
pub struct MikrofonTrack {
    id: String,
    track: Arc<TrackLocalStaticSample>,
    aktiv: Arc<AtomicBool>,
}

impl MikrofonTrack {
    pub(crate) fn rtp_track(&self) -> Arc<dyn TrackLocal + Send + Sync> {
        Arc::clone(&self.track) as Arc<dyn TrackLocal + Send + Sync>
    }
}

impl LokalerTrack for MikrofonTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn stoppen(&self) {
        if self.aktiv.swap(false, Ordering::AcqRel) {
            tracing::debug!(track = %self.id, "Mikrofon gestoppt");
        }
    }

    fn ist_aktiv(&self) -> bool {
        self.aktiv.load(Ordering::Acquire)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Medienquelle ueber das Standard-Eingabegeraet
///
/// Fehlendes Geraet, verweigerter Zugriff oder ein nicht nutzbares Format
/// werden als `MedienZugriffVerweigert` gemeldet.
#[derive(Debug, Clone, Default)]
pub struct MikrofonQuelle;

#[async_trait]
impl MedienQuelle for MikrofonQuelle {
    async fn mikrofon_anfordern(&self) -> Result<Vec<Arc<dyn LokalerTrack>>> {
        let id = "mikrofon".to_string();
        let aktiv = Arc::new(AtomicBool::new(true));
        let (frame_tx, frame_rx) = mpsc::channel::<Vec<u8>>(FRAME_QUEUE);
        let (bereit_tx, bereit_rx) = oneshot::channel::<Result<()>>();

        let thread_aktiv = Arc::clone(&aktiv);
        std::thread::Builder::new()
            .name("adda-mikrofon".into())
            .spawn(move || aufnahme_thread(thread_aktiv, frame_tx, bereit_tx))
            .map_err(|e| verweigert(format!("Aufnahme-Thread nicht startbar: {e}")))?;

        bereit_rx
            .await
            .map_err(|_| verweigert("Aufnahme-Thread vorzeitig beendet"))??;

        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: ABTASTRATE,
                channels: 2,
                ..Default::default()
            },
            id.clone(),
            "adda-mikrofon".to_owned(),
        ));
        tokio::spawn(frames_schreiben(
            Arc::clone(&track),
            Arc::clone(&aktiv),
            frame_rx,
        ));

        tracing::info!(track = %id, "Mikrofon geoeffnet");
        Ok(vec![Arc::new(MikrofonTrack { id, track, aktiv }) as Arc<dyn LokalerTrack>])
    }
}

/// Schreibt kodierte Frames in den RTP-Track, bis der Track gestoppt ist
async fn frames_schreiben(
    track: Arc<TrackLocalStaticSample>,
    aktiv: Arc<AtomicBool>,
    mut frames: mpsc::Receiver<Vec<u8>>,
) {
    while let Some(frame) = frames.recv().await {
        if !aktiv.load(Ordering::Acquire) {
            break;
        }
        let sample = Sample {
            data: frame.into(),
            duration: FRAME_DAUER,
            ..Default::default()
        };
        if let Err(e) = track.write_sample(&sample).await {
            tracing::debug!(error = %e, "Mikrofon-Frame nicht geschrieben");
        }
    }
}

/// Haelt Stream und Encoder; laeuft bis `aktiv` false wird
fn aufnahme_thread(
    aktiv: Arc<AtomicBool>,
    frame_tx: mpsc::Sender<Vec<u8>>,
    bereit: oneshot::Sender<Result<()>>,
) {
    let (pcm_tx, pcm_rx) = crossbeam_channel::bounded::<Vec<f32>>(64);

    let aufbau = aufnahme_oeffnen(pcm_tx).and_then(|(stream, rate, kanaele)| {
        let encoder = Encoder::new(SampleRate::Hz48000, Channels::Mono, Application::Voip)
            .map_err(|e| verweigert(format!("Opus-Encoder nicht erstellbar: {e}")))?;
        Ok((stream, rate, kanaele, encoder))
    });
    let (_stream, rate, kanaele, mut encoder) = match aufbau {
        Ok(teile) => {
            let _ = bereit.send(Ok(()));
            teile
        }
        Err(e) => {
            let _ = bereit.send(Err(e));
            return;
        }
    };

    let mut sammler = FrameSammler::default();
    let mut ausgabe = vec![0u8; MAX_PAKET_BYTES];

    while aktiv.load(Ordering::Acquire) {
        let block = match pcm_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(block) => block,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let mono = umtasten(&auf_mono(&block, kanaele), rate, ABTASTRATE);
        for frame in sammler.hinzufuegen(&mono) {
            match encoder.encode_float(&frame, &mut ausgabe) {
                Ok(laenge) => match frame_tx.try_send(ausgabe[..laenge].to_vec()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::trace!("Frame-Queue voll, Mikrofon-Frame verworfen");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => return,
                },
                Err(e) => tracing::warn!(error = %e, "Opus-Kodierung fehlgeschlagen"),
            }
        }
    }
    tracing::debug!("Aufnahme-Thread beendet");
}

/// Oeffnet das Standard-Eingabegeraet; Samples gehen als f32-Bloecke an `pcm_tx`
fn aufnahme_oeffnen(pcm_tx: Sender<Vec<f32>>) -> Result<(Stream, u32, u16)> {
    let host = cpal::default_host();
    let geraet = host
        .default_input_device()
        .ok_or_else(|| verweigert("kein Eingabegeraet vorhanden"))?;
    let standard = geraet
        .default_input_config()
        .map_err(|e| verweigert(format!("Eingabegeraet nicht nutzbar: {e}")))?;

    let rate = standard.sample_rate().0;
    let kanaele = standard.channels();
    let format = standard.sample_format();
    let config = standard.config();
    let fehler = |e: cpal::StreamError| tracing::error!(error = %e, "Mikrofon-Stream-Fehler");

    let stream = match format {
        SampleFormat::F32 => geraet.build_input_stream(
            &config,
            move |daten: &[f32], _| block_senden(&pcm_tx, daten.to_vec()),
            fehler,
            None,
        ),
        SampleFormat::I16 => geraet.build_input_stream(
            &config,
            move |daten: &[i16], _| {
                let block = daten.iter().map(|&s| s as f32 / i16::MAX as f32).collect();
                block_senden(&pcm_tx, block);
            },
            fehler,
            None,
        ),
        SampleFormat::U16 => geraet.build_input_stream(
            &config,
            move |daten: &[u16], _| {
                let block = daten.iter().map(|&s| (s as f32 - 32_768.0) / 32_768.0).collect();
                block_senden(&pcm_tx, block);
            },
            fehler,
            None,
        ),
        andere => {
            return Err(verweigert(format!(
                "Sample-Format {andere:?} des Mikrofons nicht unterstuetzt"
            )))
        }
    }
    .map_err(|e| verweigert(format!("Mikrofon nicht oeffenbar: {e}")))?;

    stream
        .play()
        .map_err(|e| verweigert(format!("Mikrofon nicht startbar: {e}")))?;

    tracing::debug!(rate, kanaele, "Capture-Stream geoeffnet");
    Ok((stream, rate, kanaele))
}

fn block_senden(pcm_tx: &Sender<Vec<f32>>, block: Vec<f32>) {
    // Voll: Verarbeitung haengt hinterher, Block verwerfen
    let _ = pcm_tx.try_send(block);
}

// ---------------------------------------------------------------------------
// Lautsprecher
// ---------------------------------------------------------------------------

enum Wiedergabe {
    Track(String),
    Paket(String, Vec<u8>),
    Ende(String),
}

/// Spielt eintreffende Opus-Tracks ueber das Standard-Ausgabegeraet ab
///
/// Der Wiedergabe-Thread endet, wenn die Senke verworfen wird.
pub struct LautsprecherSenke {
    befehle: Sender<Wiedergabe>,
}

impl LautsprecherSenke {
    pub fn oeffnen() -> Result<Self> {
        let (befehl_tx, befehl_rx) = crossbeam_channel::bounded(BEFEHL_QUEUE);
        let (bereit_tx, bereit_rx) = crossbeam_channel::bounded::<Result<()>>(1);

        std::thread::Builder::new()
            .name("adda-lautsprecher".into())
            .spawn(move || wiedergabe_thread(befehl_rx, bereit_tx))
            .map_err(|e| ArcadeError::intern(format!("Wiedergabe-Thread nicht startbar: {e}")))?;

        bereit_rx
            .recv()
            .map_err(|_| ArcadeError::intern("Wiedergabe-Thread vorzeitig beendet"))??;
        Ok(Self { befehle: befehl_tx })
    }

    fn senden(&self, befehl: Wiedergabe) {
        if self.befehle.try_send(befehl).is_err() {
            tracing::trace!("Wiedergabe-Queue voll, Befehl verworfen");
        }
    }
}

impl AudioSenke for LautsprecherSenke {
    fn track_empfangen(&self, track: RemoteTrack) {
        if track.art != TrackArt::Audio || !track.codec.eq_ignore_ascii_case(MIME_TYPE_OPUS) {
            tracing::debug!(track = %track.id, codec = %track.codec, "Track wird nicht abgespielt");
            return;
        }
        self.senden(Wiedergabe::Track(track.id));
    }

    fn paket_empfangen(&self, track_id: &str, paket: MedienPaket) {
        self.senden(Wiedergabe::Paket(track_id.to_string(), paket.nutzlast));
    }

    fn track_beendet(&self, track_id: &str) {
        self.senden(Wiedergabe::Ende(track_id.to_string()));
    }
}

fn wiedergabe_thread(befehle: Receiver<Wiedergabe>, bereit: Sender<Result<()>>) {
    let (mut produzent, konsument) = HeapRb::<f32>::new(PUFFER_SAMPLES).split();

    let (_stream, rate, kanaele) = match ausgabe_oeffnen(konsument) {
        Ok(teile) => {
            let _ = bereit.send(Ok(()));
            teile
        }
        Err(e) => {
            let _ = bereit.send(Err(e));
            return;
        }
    };

    let mut decoder: HashMap<String, Decoder> = HashMap::new();
    let mut pcm = vec![0.0f32; MAX_FRAME_SAMPLES];

    while let Ok(befehl) = befehle.recv() {
        match befehl {
            Wiedergabe::Track(id) => match Decoder::new(SampleRate::Hz48000, Channels::Mono) {
                Ok(d) => {
                    decoder.insert(id, d);
                }
                Err(e) => tracing::warn!(track = %id, error = %e, "Opus-Decoder nicht erstellbar"),
            },
            Wiedergabe::Paket(id, nutzlast) => {
                let Some(d) = decoder.get_mut(&id) else {
                    continue;
                };
                match d.decode_float(Some(nutzlast.as_slice()), &mut pcm, false) {
                    Ok(anzahl) => {
                        let samples = auf_kanaele(&umtasten(&pcm[..anzahl], ABTASTRATE, rate), kanaele);
                        if produzent.push_slice(&samples) < samples.len() {
                            tracing::trace!("Wiedergabepuffer voll");
                        }
                    }
                    Err(e) => tracing::debug!(track = %id, error = %e, "Opus-Frame nicht dekodierbar"),
                }
            }
            Wiedergabe::Ende(id) => {
                decoder.remove(&id);
            }
        }
    }
    tracing::debug!("Wiedergabe-Thread beendet");
}

/// Oeffnet das Standard-Ausgabegeraet; der Callback liest aus `konsument`
fn ausgabe_oeffnen(mut konsument: HeapCons<f32>) -> Result<(Stream, u32, u16)> {
    let ausgabefehler = |e: String| ArcadeError::intern(format!("Lautsprecher: {e}"));

    let host = cpal::default_host();
    let geraet = host
        .default_output_device()
        .ok_or_else(|| ausgabefehler("kein Ausgabegeraet vorhanden".into()))?;
    let standard = geraet
        .default_output_config()
        .map_err(|e| ausgabefehler(e.to_string()))?;

    let rate = standard.sample_rate().0;
    let kanaele = standard.channels();
    let format = standard.sample_format();
    let config = standard.config();
    let fehler = |e: cpal::StreamError| tracing::error!(error = %e, "Wiedergabe-Stream-Fehler");

    let stream = match format {
        SampleFormat::F32 => geraet.build_output_stream(
            &config,
            move |daten: &mut [f32], _| {
                let gelesen = konsument.pop_slice(daten);
                daten[gelesen..].fill(0.0);
            },
            fehler,
            None,
        ),
        SampleFormat::I16 => geraet.build_output_stream(
            &config,
            move |daten: &mut [i16], _| {
                let mut puffer = vec![0.0f32; daten.len()];
                konsument.pop_slice(&mut puffer);
                for (aus, s) in daten.iter_mut().zip(puffer.iter()) {
                    *aus = (*s * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
                }
            },
            fehler,
            None,
        ),
        andere => {
            return Err(ausgabefehler(format!(
                "Sample-Format {andere:?} nicht unterstuetzt"
            )))
        }
    }
    .map_err(|e| ausgabefehler(e.to_string()))?;

    stream.play().map_err(|e| ausgabefehler(e.to_string()))?;

    tracing::debug!(rate, kanaele, "Playback-Stream geoeffnet");
    Ok((stream, rate, kanaele))
}
