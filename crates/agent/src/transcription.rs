//! Voice notes to text: fetch the audio, park it in a scoped temp file, send it to the
//! speech-to-text service. The temp file is removed on every path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use outreach_core::config::TranscriptionConfig;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("voice download failed: {0}")]
    Download(String),
    #[error("temporary audio file error: {0}")]
    TempFile(#[from] std::io::Error),
    #[error("transcription service unreachable: {0}")]
    Unreachable(String),
    #[error("transcription service rejected the audio ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("transcription not configured: {0}")]
    NotConfigured(String),
}

/// Remote audio as delivered by the chat platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioRef {
    pub file_id: String,
    pub mime_type: Option<String>,
}

#[async_trait]
pub trait AudioFetcher: Send + Sync {
    async fn fetch(&self, audio: &AudioRef) -> Result<Vec<u8>, TranscriptionError>;
}

#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe_file(&self, path: &Path, language: &str)
        -> Result<String, TranscriptionError>;
}

/// Entry point used by the bot for voice replies.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &AudioRef) -> Result<String, TranscriptionError>;
}

pub struct TranscriptionBridge {
    fetcher: Arc<dyn AudioFetcher>,
    speech: Arc<dyn SpeechToText>,
    language: String,
    temp_dir: Option<PathBuf>,
}

impl TranscriptionBridge {
    pub fn new(
        fetcher: Arc<dyn AudioFetcher>,
        speech: Arc<dyn SpeechToText>,
        language: impl Into<String>,
    ) -> Self {
        Self { fetcher, speech, language: language.into(), temp_dir: None }
    }

    /// Directory for downloaded audio; the system temp dir when unset.
    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(temp_dir.into());
        self
    }
}

#[async_trait]
impl Transcriber for TranscriptionBridge {
    async fn transcribe(&self, audio: &AudioRef) -> Result<String, TranscriptionError> {
        let bytes = self.fetcher.fetch(audio).await?;

        let mut builder = tempfile::Builder::new();
        builder.prefix("voice_").suffix(".ogg");
        let file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        tokio::fs::write(file.path(), &bytes).await?;
        debug!(file_id = %audio.file_id, bytes = bytes.len(), "voice note staged for transcription");

        let result = self.speech.transcribe_file(file.path(), &self.language).await;
        file.close()?;

        let text = result?;
        info!(
            event_name = "voice.transcription.completed",
            file_id = %audio.file_id,
            chars = text.chars().count(),
            "voice note transcribed"
        );
        Ok(text)
    }
}

#[derive(Clone, Debug)]
pub struct WhisperTranscriber {
    client: reqwest::Client,
    url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl WhisperTranscriber {
    pub fn new(config: &TranscriptionConfig) -> Result<Self, TranscriptionError> {
        let api_key = config
            .api_key
            .as_ref()
            .map(|key| key.expose_secret().to_owned())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                TranscriptionError::NotConfigured("transcription.api_key is required".to_owned())
            })?;

        let mut headers = HeaderMap::new();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|error| {
            TranscriptionError::NotConfigured(format!("invalid API key header value: {error}"))
        })?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| TranscriptionError::NotConfigured(error.to_string()))?;

        Ok(Self {
            client,
            url: format!("{}/v1/audio/transcriptions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl SpeechToText for WhisperTranscriber {
    async fn transcribe_file(
        &self,
        path: &Path,
        language: &str,
    ) -> Result<String, TranscriptionError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("voice.ogg")
            .to_owned();
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/ogg")
            .map_err(|error| TranscriptionError::Unreachable(error.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("language", language.to_owned());

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|error| TranscriptionError::Unreachable(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TranscriptionError::Rejected { status: status.as_u16(), message });
        }

        let body: TranscriptionResponse = response
            .json()
            .await
            .map_err(|error| TranscriptionError::Unreachable(error.to_string()))?;
        Ok(body.text.trim().to_owned())
    }
}
