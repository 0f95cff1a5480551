//! Speech-to-text (STT) client

use async_trait::async_trait;

use super::AudioBlob;
use crate::http::{expect_success, read_body};
use crate::{Error, Result, Stage};

/// File name the STT backend receives the recording under
pub const UPLOAD_FILE_NAME: &str = "audio.webm";

/// Response from the STT endpoint; a missing or `null` text means nothing was heard
#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: Option<String>,
}

/// Transcribes recorded audio to text
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe an audio blob
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response is malformed
    async fn transcribe(&self, audio: &AudioBlob) -> Result<String>;
}

/// STT over HTTP: multipart upload, JSON `{ "text" }` back
pub struct HttpSpeechToText {
    client: reqwest::Client,
    url: String,
}

impl HttpSpeechToText {
    /// Create a client posting to `url`
    #[must_use]
    pub const fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl SpeechToText for HttpSpeechToText {
    async fn transcribe(&self, audio: &AudioBlob) -> Result<String> {
        tracing::debug!(
            audio_bytes = audio.bytes.len(),
            mime_type = ?audio.mime_type,
            "starting transcription"
        );

        let mut part =
            reqwest::multipart::Part::bytes(audio.bytes.clone()).file_name(UPLOAD_FILE_NAME);
        if let Some(mime) = &audio.mime_type {
            part = part.mime_str(mime).map_err(|e| Error::Decode {
                stage: Stage::Stt,
                message: format!("invalid audio mime type {mime}: {e}"),
            })?;
        }
        let form = reqwest::multipart::Form::new().part("file", part);

        let sent = self.client.post(&self.url).multipart(form).send().await;
        let response = expect_success(Stage::Stt, sent).await?;
        let body = read_body(Stage::Stt, response).await?;

        let result: TranscriptionResponse =
            serde_json::from_slice(&body).map_err(|e| {
                tracing::error!(error = %e, "failed to parse transcription response");
                Error::Decode {
                    stage: Stage::Stt,
                    message: e.to_string(),
                }
            })?;

        let transcript = result.text.unwrap_or_default();
        tracing::info!(%transcript, "transcription complete");
        Ok(transcript)
    }
}
