//! Text-to-speech (TTS) client

use async_trait::async_trait;

use crate::http::{expect_success, read_body};
use crate::{Error, Result, Stage};

/// Synthesizes speech from text
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Synthesize text to audio bytes
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// TTS over HTTP: JSON `{ "text" }` in, raw WAV bytes out
pub struct HttpTextToSpeech {
    client: reqwest::Client,
    url: String,
    preset_url: String,
}

impl HttpTextToSpeech {
    /// Create a client for the synthesis and preset-phrase endpoints
    #[must_use]
    pub const fn new(client: reqwest::Client, url: String, preset_url: String) -> Self {
        Self {
            client,
            url,
            preset_url,
        }
    }

    /// Fetch the backend's fixed TTS phrase
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response is not `{ "text" }`
    pub async fn preset_text(&self) -> Result<String> {
        #[derive(serde::Deserialize)]
        struct PresetResponse {
            text: String,
        }

        let sent = self.client.get(&self.preset_url).send().await;
        let response = expect_success(Stage::Tts, sent).await?;
        let body = read_body(Stage::Tts, response).await?;

        let preset: PresetResponse = serde_json::from_slice(&body).map_err(|e| Error::Decode {
            stage: Stage::Tts,
            message: e.to_string(),
        })?;

        Ok(preset.text)
    }
}

#[async_trait]
impl TextToSpeech for HttpTextToSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            text: &'a str,
        }

        tracing::debug!(chars = text.len(), "starting synthesis");

        let sent = self
            .client
            .post(&self.url)
            .json(&TtsRequest { text })
            .send()
            .await;
        let response = expect_success(Stage::Tts, sent).await?;
        let audio = read_body(Stage::Tts, response).await?;

        if audio.is_empty() {
            return Err(Error::Decode {
                stage: Stage::Tts,
                message: "empty audio response".to_string(),
            });
        }

        tracing::debug!(audio_bytes = audio.len(), "synthesis complete");
        Ok(audio)
    }
}
