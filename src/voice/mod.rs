//! Voice processing module
//!
//! Handles audio capture and playback, and the STT/TTS endpoints.

mod capture;
mod playback;
mod stt;
mod tts;

pub use capture::{
    AudioBlob, AudioCapture, AudioSource, ChunkEncoding, CpalSource, InputTracks, OpenInput,
    SAMPLE_RATE, pcm16_to_wav, samples_to_wav,
};
pub use playback::{AudioSink, CpalPlayback, DecodedAudio, SilentPlayback, decode_audio};
pub use stt::{HttpSpeechToText, SpeechToText, UPLOAD_FILE_NAME};
pub use tts::{HttpTextToSpeech, TextToSpeech};
