use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub mod ffmpeg;
pub mod language;
pub mod openai;
pub mod youtube;

use crate::config::Config;
use crate::error::PipelineError;

/// Transcription output with the language the backend detected or used.
#[derive(Debug, Clone)]
pub struct Transcription {
    pub text: String,
    pub language: Option<String>,
}

/// Local audio/video transforms (ffmpeg).
#[async_trait]
pub trait AudioTranscoder: Send + Sync {
    /// Strip the video track, writing an audio file to `output`.
    async fn extract_audio(&self, input: &Path, output: &Path) -> Result<(), PipelineError>;

    /// Re-render audio at `factor` times the original tempo.
    async fn change_tempo(
        &self,
        input: &Path,
        output: &Path,
        factor: f64,
    ) -> Result<(), PipelineError>;
}

/// Speech-to-text capability.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe an audio file, optionally forcing the language.
    async fn transcribe(
        &self,
        audio: &Path,
        language: Option<&str>,
    ) -> Result<Transcription, PipelineError>;
}

/// Minimal-context summarization capability.
///
/// `force_english` selects the output language deterministically: false
/// keeps the source language, true forces English regardless of source.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str, force_english: bool) -> Result<String, PipelineError>;
}

/// Text-to-speech capability. Returns encoded audio bytes (mp3).
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, lang: &str) -> Result<Vec<u8>, PipelineError>;
}

/// Remote media retrieval (yt-dlp).
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Download the best audio rendition of `url` to exactly `dest`.
    async fn fetch_audio(&self, url: &str, dest: &Path) -> Result<(), PipelineError>;
}

/// Process-wide capability handle.
///
/// Built once at startup and injected into stage functions; adapters are
/// stateless and individually substitutable in tests.
#[derive(Clone)]
pub struct Backends {
    pub transcoder: Arc<dyn AudioTranscoder>,
    pub transcriber: Arc<dyn Transcriber>,
    pub summarizer: Arc<dyn Summarizer>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub fetcher: Arc<dyn MediaFetcher>,
    /// Language used when detection fails or is inconclusive.
    pub fallback_language: String,
}

impl Backends {
    /// Wire the default adapters from configuration. A missing API key
    /// does not prevent startup; the affected capabilities report
    /// themselves unavailable at call time.
    pub fn from_config(config: &Config) -> Self {
        let api_key = config.api_key();
        if api_key.is_none() {
            tracing::warn!(
                "{} not set; transcription, summarization, and synthesis will be unavailable",
                crate::config::API_KEY_ENV
            );
        }

        let backend = Arc::new(openai::OpenAiBackend::new(
            config.backend.clone(),
            api_key,
        ));

        Self {
            transcoder: Arc::new(ffmpeg::FfmpegTranscoder::new(&config.tools.ffmpeg_path)),
            transcriber: backend.clone(),
            summarizer: backend.clone(),
            synthesizer: backend,
            fetcher: Arc::new(youtube::YoutubeFetcher::new(&config.tools.yt_dlp_path)),
            fallback_language: config.backend.fallback_language.clone(),
        }
    }
}
