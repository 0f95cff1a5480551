//! Audio capture from microphone
//!
//! A recording is a channel of byte chunks fed by an [`AudioSource`]. The
//! [`AudioCapture`] state machine (idle → recording → idle) accumulates the
//! chunks and finalizes them into one [`AudioBlob`] on stop.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use tokio::sync::mpsc;

use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Encoded audio ready to be sent to STT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBlob {
    /// Encoded bytes
    pub bytes: Vec<u8>,
    /// Container mime type, `None` when the recorder could not tell
    pub mime_type: Option<String>,
}

impl AudioBlob {
    /// Create a blob with an optional mime type
    #[must_use]
    pub const fn new(bytes: Vec<u8>, mime_type: Option<String>) -> Self {
        Self { bytes, mime_type }
    }

    /// Create a WAV blob
    #[must_use]
    pub fn wav(bytes: Vec<u8>) -> Self {
        Self::new(bytes, Some("audio/wav".to_string()))
    }

    /// Create a blob from an audio file's bytes, typed by its extension
    #[must_use]
    pub fn from_file(bytes: Vec<u8>, path: &std::path::Path) -> Self {
        let mime_type = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_ascii_lowercase().as_str() {
                "wav" => Some("audio/wav"),
                "webm" => Some("audio/webm"),
                "ogg" | "opus" => Some("audio/ogg"),
                "mp3" => Some("audio/mpeg"),
                "m4a" | "mp4" => Some("audio/mp4"),
                "flac" => Some("audio/flac"),
                _ => None,
            });
        Self::new(bytes, mime_type.map(ToString::to_string))
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// How the chunks of a recording are encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkEncoding {
    /// Raw little-endian 16-bit PCM, wrapped into WAV on finalize
    Pcm16 { sample_rate: u32, channels: u16 },
    /// Fragments of an already encoded container, concatenated on finalize
    Container { mime_type: Option<String> },
}

/// Handle on the hardware tracks of an open microphone
pub trait InputTracks {
    /// Stop every underlying track
    fn stop(&mut self);
}

/// An opened microphone: chunk channel plus the tracks feeding it
pub struct OpenInput {
    pub chunks: mpsc::UnboundedReceiver<Vec<u8>>,
    pub tracks: Box<dyn InputTracks>,
    pub encoding: ChunkEncoding,
}

/// Something that can open a microphone
pub trait AudioSource {
    /// Request microphone access and start delivering chunks
    ///
    /// # Errors
    ///
    /// Returns error if access is refused or no device is available
    fn open(&mut self) -> Result<OpenInput>;
}

/// Transient state of one recording
struct RecordingSession {
    chunks: Vec<Vec<u8>>,
    receiver: mpsc::UnboundedReceiver<Vec<u8>>,
    tracks: Option<Box<dyn InputTracks>>,
    encoding: ChunkEncoding,
}

impl RecordingSession {
    fn collect_available(&mut self) {
        while let Ok(chunk) = self.receiver.try_recv() {
            if !chunk.is_empty() {
                self.chunks.push(chunk);
            }
        }
    }

    /// Stop the hardware tracks; only the first call does anything
    fn release(&mut self) {
        if let Some(mut tracks) = self.tracks.take() {
            tracks.stop();
            tracing::debug!("microphone released");
        }
    }

    fn finalize(&self) -> Result<AudioBlob> {
        match &self.encoding {
            ChunkEncoding::Pcm16 {
                sample_rate,
                channels,
            } => {
                let pcm: Vec<i16> = self
                    .chunks
                    .iter()
                    .flat_map(|c| c.chunks_exact(2))
                    .map(|b| i16::from_le_bytes([b[0], b[1]]))
                    .collect();
                pcm16_to_wav(&pcm, *sample_rate, *channels).map(AudioBlob::wav)
            }
            ChunkEncoding::Container { mime_type } => {
                Ok(AudioBlob::new(self.chunks.concat(), mime_type.clone()))
            }
        }
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        self.release();
    }
}

/// Records from an [`AudioSource`] between `start` and `stop`
///
/// Dropping the capture while recording releases the microphone.
pub struct AudioCapture<S> {
    source: S,
    session: Option<RecordingSession>,
}

impl<S: AudioSource> AudioCapture<S> {
    /// Create an idle capture over a source
    pub const fn new(source: S) -> Self {
        Self {
            source,
            session: None,
        }
    }

    /// Start recording
    ///
    /// Does nothing if already recording.
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` if the microphone cannot be opened
    pub fn start(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }

        let input = self.source.open().map_err(|e| match e {
            Error::PermissionDenied(_) => e,
            other => Error::PermissionDenied(other.to_string()),
        })?;

        self.session = Some(RecordingSession {
            chunks: Vec::new(),
            receiver: input.chunks,
            tracks: Some(input.tracks),
            encoding: input.encoding,
        });

        tracing::debug!("recording started");
        Ok(())
    }

    /// Stop recording and return the finalized blob
    ///
    /// Returns `Ok(None)` when idle. The microphone is released whether or
    /// not finalization succeeds.
    ///
    /// # Errors
    ///
    /// Returns error if the chunks cannot be encoded
    pub fn stop(&mut self) -> Result<Option<AudioBlob>> {
        let Some(mut session) = self.session.take() else {
            return Ok(None);
        };

        session.release();
        session.collect_available();
        let blob = session.finalize()?;

        tracing::debug!(
            chunks = session.chunks.len(),
            bytes = blob.bytes.len(),
            mime_type = ?blob.mime_type,
            "recording stopped"
        );
        Ok(Some(blob))
    }

    /// Move chunks that have arrived so far into the session
    ///
    /// Returns the number of bytes recorded so far.
    pub fn poll_chunks(&mut self) -> usize {
        self.session.as_mut().map_or(0, |session| {
            session.collect_available();
            session.chunks.iter().map(Vec::len).sum()
        })
    }

    /// Check if currently recording
    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.session.is_some()
    }
}

/// Default input device via `cpal`
#[derive(Debug, Default)]
pub struct CpalSource;

impl AudioSource for CpalSource {
    fn open(&mut self) -> Result<OpenInput> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::PermissionDenied("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::PermissionDenied(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no suitable audio config found".to_string()))?;

        let config: StreamConfig = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            channels = config.channels,
            "audio capture initialized"
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let chunk: Vec<u8> = data
                        .iter()
                        .flat_map(|&s| f32_to_i16(s).to_le_bytes())
                        .collect();
                    // Receiver is gone once the session is finalized
                    let _ = tx.send(chunk);
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::PermissionDenied(e.to_string()))?;

        stream
            .play()
            .map_err(|e| Error::PermissionDenied(e.to_string()))?;

        Ok(OpenInput {
            chunks: rx,
            tracks: Box::new(CpalTracks {
                stream: Some(stream),
            }),
            encoding: ChunkEncoding::Pcm16 {
                sample_rate: SAMPLE_RATE,
                channels: config.channels,
            },
        })
    }
}

struct CpalTracks {
    stream: Option<Stream>,
}

impl InputTracks for CpalTracks {
    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                tracing::warn!(error = %e, "failed to pause input stream");
            }
            drop(stream);
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn f32_to_i16(sample: f32) -> i16 {
    // Convert f32 [-1.0, 1.0] to i16
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

/// Convert f32 samples to mono WAV bytes
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let pcm: Vec<i16> = samples.iter().map(|&s| f32_to_i16(s)).collect();
    pcm16_to_wav(&pcm, sample_rate, 1)
}

/// Wrap 16-bit PCM samples in a WAV container
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn pcm16_to_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
