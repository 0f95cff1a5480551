//! Audio playback to speakers

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use crate::{Error, Result, Stage};

/// Plays a buffer of encoded audio
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Play `audio` to completion
    ///
    /// # Errors
    ///
    /// Returns error if the audio cannot be decoded or played
    async fn play(&self, audio: Vec<u8>) -> Result<()>;
}

/// Decoded mono audio
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Plays audio to the default output device
#[derive(Debug, Default)]
pub struct CpalPlayback;

impl CpalPlayback {
    /// Create a playback instance, checking that an output device exists
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            "audio playback initialized"
        );

        Ok(Self)
    }
}

#[async_trait]
impl AudioSink for CpalPlayback {
    async fn play(&self, audio: Vec<u8>) -> Result<()> {
        let decoded = decode_audio(&audio)?;
        tokio::task::spawn_blocking(move || play_samples_blocking(&decoded))
            .await
            .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
    }
}

/// Discards audio; used when playback is disabled
#[derive(Debug, Default)]
pub struct SilentPlayback;

#[async_trait]
impl AudioSink for SilentPlayback {
    async fn play(&self, audio: Vec<u8>) -> Result<()> {
        tracing::debug!(bytes = audio.len(), "playback disabled, dropping audio");
        Ok(())
    }
}

/// Decode WAV (or MP3 as a fallback) into mono f32 samples
///
/// # Errors
///
/// Returns a playback `Decode` error if the bytes are neither
pub fn decode_audio(data: &[u8]) -> Result<DecodedAudio> {
    if data.starts_with(b"RIFF") {
        decode_wav(data)
    } else {
        decode_mp3(data)
    }
}

fn decode_error(message: String) -> Error {
    Error::Decode {
        stage: Stage::Playback,
        message,
    }
}

/// Decode WAV bytes to mono f32 samples
#[allow(clippy::cast_precision_loss)]
fn decode_wav(data: &[u8]) -> Result<DecodedAudio> {
    let mut reader =
        hound::WavReader::new(Cursor::new(data)).map_err(|e| decode_error(e.to_string()))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| decode_error(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| decode_error(e.to_string()))?
        }
    };

    let samples = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Decode MP3 bytes to f32 samples
#[allow(clippy::cast_sign_loss)]
fn decode_mp3(mp3_data: &[u8]) -> Result<DecodedAudio> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 0;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = frame.sample_rate as u32;
                // Convert i16 samples to f32 and handle stereo to mono
                if frame.channels == 2 {
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(decode_error(format!("MP3 decode error: {e}"))),
        }
    }

    if sample_rate == 0 {
        return Err(decode_error("unrecognized audio format".to_string()));
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

/// Pick an output config running at `sample_rate`, mono preferred
fn output_config(device: &cpal::Device, sample_rate: u32) -> Result<StreamConfig> {
    let rate = SampleRate(sample_rate);
    let find = |channels: u16| {
        device.supported_output_configs().ok()?.find(|c| {
            c.channels() == channels && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
        })
    };

    find(1)
        .or_else(|| find(2))
        .map(|c| c.with_sample_rate(rate).config())
        .ok_or_else(|| Error::Audio(format!("no output config supports {sample_rate} Hz")))
}

/// Play samples in a blocking manner
fn play_samples_blocking(audio: &DecodedAudio) -> Result<()> {
    if audio.samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device".to_string()))?;

    let config = output_config(&device, audio.sample_rate)?;
    let channels = config.channels as usize;

    let samples = Arc::new(audio.samples.clone());
    let position = Arc::new(Mutex::new(0usize));
    let finished = Arc::new(Mutex::new(false));

    let samples_clone = Arc::clone(&samples);
    let position_clone = Arc::clone(&position);
    let finished_clone = Arc::clone(&finished);

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let Ok(mut pos) = position_clone.lock() else {
                    return;
                };

                for frame in data.chunks_mut(channels) {
                    let sample = samples_clone.get(*pos).copied().unwrap_or_else(|| {
                        if let Ok(mut done) = finished_clone.lock() {
                            *done = true;
                        }
                        0.0
                    });

                    for out in frame.iter_mut() {
                        *out = sample;
                    }

                    if *pos < samples_clone.len() {
                        *pos += 1;
                    }
                }
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    // Wait for playback to finish
    let duration_ms = (samples.len() as u64 * 1000) / u64::from(audio.sample_rate);

    // Poll for completion with timeout
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_millis(duration_ms + 500);

    while !finished.lock().map(|done| *done).unwrap_or(true) {
        if start.elapsed() > timeout {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(50));
    }

    // Small delay to ensure audio finishes
    std::thread::sleep(std::time::Duration::from_millis(100));

    drop(stream);
    tracing::debug!(samples = samples.len(), "playback complete");

    Ok(())
}
