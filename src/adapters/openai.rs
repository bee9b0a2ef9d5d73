use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;

use super::{SpeechSynthesizer, Summarizer, Transcriber, Transcription};
use crate::config::BackendConfig;
use crate::error::PipelineError;

const NATIVE_SUMMARY_PROMPT: &str = "Summarize the user's text in the same language. \
    Keep it extremely concise while preserving the full context and meaning. \
    Use the minimal number of words needed.";

const ENGLISH_SUMMARY_PROMPT: &str = "Summarize the user's text in English. \
    Keep it extremely concise while preserving the full meaning and context. \
    Use the fewest words possible.";

/// OpenAI-compatible backend for speech-to-text, summarization, and
/// text-to-speech.
///
/// Constructed without an API key the backend still exists, but every
/// call reports its capability as unavailable — the server boots either
/// way and the gap surfaces per request.
pub struct OpenAiBackend {
    client: reqwest::Client,
    config: BackendConfig,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
    language: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl OpenAiBackend {
    pub fn new(config: BackendConfig, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            api_key,
        }
    }

    fn key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl Transcriber for OpenAiBackend {
    async fn transcribe(
        &self,
        audio: &Path,
        language: Option<&str>,
    ) -> Result<Transcription, PipelineError> {
        let key = self
            .key()
            .ok_or_else(|| PipelineError::TranscriptionUnavailable("no API key configured".into()))?;

        let bytes = fs_err::read(audio)
            .map_err(|e| PipelineError::TranscriptionUnavailable(e.to_string()))?;
        let filename = audio
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.mp3".to_string());

        let mut form = reqwest::multipart::Form::new()
            .text("model", self.config.transcription_model.clone())
            // verbose_json carries the detected language back
            .text("response_format", "verbose_json")
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(filename),
            );

        if let Some(lang) = language {
            form = form.text("language", lang.to_string());
        }

        let response = self
            .client
            .post(self.endpoint("audio/transcriptions"))
            .bearer_auth(key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PipelineError::TranscriptionUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::TranscriptionUnavailable(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::TranscriptionUnavailable(e.to_string()))?;

        Ok(Transcription {
            text: parsed.text,
            language: language.map(str::to_string).or(parsed.language),
        })
    }
}

#[async_trait]
impl Summarizer for OpenAiBackend {
    async fn summarize(&self, text: &str, force_english: bool) -> Result<String, PipelineError> {
        let key = self.key().ok_or_else(|| {
            PipelineError::SummarizationUnavailable("no API key configured".into())
        })?;

        let system = if force_english {
            ENGLISH_SUMMARY_PROMPT
        } else {
            NATIVE_SUMMARY_PROMPT
        };

        let body = json!({
            "model": self.config.summary_model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": text },
            ],
        });

        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::SummarizationUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::SummarizationUnavailable(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::SummarizationUnavailable(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                PipelineError::SummarizationUnavailable("backend returned no choices".into())
            })
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiBackend {
    async fn synthesize(&self, text: &str, lang: &str) -> Result<Vec<u8>, PipelineError> {
        let key = self
            .key()
            .ok_or_else(|| PipelineError::SynthesisUnavailable("no API key configured".into()))?;

        // The speech model voices are multilingual; the resolved language
        // travels on the artifact metadata rather than the request.
        tracing::debug!(%lang, "synthesizing speech");

        let body = json!({
            "model": self.config.speech_model,
            "input": text,
            "voice": self.config.speech_voice,
            "response_format": "mp3",
        });

        let response = self
            .client
            .post(self.endpoint("audio/speech"))
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::SynthesisUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::SynthesisUnavailable(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::SynthesisUnavailable(e.to_string()))?;

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn unconfigured() -> OpenAiBackend {
        OpenAiBackend::new(Config::default().backend, None)
    }

    #[tokio::test]
    async fn missing_key_makes_capabilities_unavailable() {
        let backend = unconfigured();

        let err = backend.summarize("hello", false).await.unwrap_err();
        assert!(matches!(err, PipelineError::SummarizationUnavailable(_)));

        let err = backend.synthesize("hello", "en").await.unwrap_err();
        assert!(matches!(err, PipelineError::SynthesisUnavailable(_)));

        let err = backend
            .transcribe(Path::new("missing.mp3"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::TranscriptionUnavailable(_)));
    }

    #[test]
    fn endpoint_handles_trailing_slash() {
        let mut config = Config::default().backend;
        config.api_base = "https://api.example.com/v1/".to_string();
        let backend = OpenAiBackend::new(config, Some("k".into()));
        assert_eq!(
            backend.endpoint("chat/completions"),
            "https://api.example.com/v1/chat/completions"
        );
    }
}
