//! Pipeline stage functions.
//!
//! Each stage resolves its input from the artifact store, invokes exactly
//! one adapter, persists the result as a new artifact, and returns the
//! reference. Stages never call each other; clients compose the pipeline
//! by chaining references across calls, which keeps every stage
//! independently retryable.

use serde::{Deserialize, Serialize};

use crate::adapters::{language, youtube, Backends};
use crate::error::PipelineError;
use crate::store::{Artifact, ArtifactKind, ArtifactStore, MediaClass, Namespace};

/// Stage-parameter language selector: keep the detected source language
/// or force English output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LanguageMode {
    Native,
    English,
}

impl LanguageMode {
    pub fn forces_english(&self) -> bool {
        matches!(self, LanguageMode::English)
    }
}

fn expect_class(
    artifact: &Artifact,
    class: MediaClass,
    what: &str,
) -> Result<(), PipelineError> {
    if artifact.kind.media_class() != class {
        return Err(PipelineError::InvalidInput(format!(
            "{} expects a {:?} artifact, got {}",
            what,
            class,
            artifact.reference()
        )));
    }
    Ok(())
}

/// Base case: store uploaded media bytes as a fresh artifact. No adapter
/// is involved.
pub fn upload_media(
    store: &ArtifactStore,
    kind: ArtifactKind,
    ext: &str,
    bytes: &[u8],
) -> Result<Artifact, PipelineError> {
    store.create(Namespace::Uploads, kind, ext, bytes)
}

/// Base case: store an uploaded text file or pasted inline text.
pub fn upload_text(
    store: &ArtifactStore,
    file_bytes: Option<Vec<u8>>,
    inline_text: Option<String>,
) -> Result<Artifact, PipelineError> {
    match (file_bytes, inline_text) {
        (Some(bytes), _) => store.create(Namespace::Uploads, ArtifactKind::RawText, "txt", &bytes),
        (None, Some(text)) => store.create_text(Namespace::Uploads, ArtifactKind::RawText, &text),
        (None, None) => Err(PipelineError::InvalidInput(
            "either a file or text must be provided".into(),
        )),
    }
}

/// Fetch a YouTube video's audio and transcribe it in one stage.
///
/// The fetched audio is transient: it is deleted once transcription has
/// run, whether transcription succeeded or not. Only the transcript
/// artifact survives.
pub async fn fetch_youtube_transcript(
    store: &ArtifactStore,
    backends: &Backends,
    url: &str,
) -> Result<(Artifact, String), PipelineError> {
    let video_id = youtube::extract_video_id(url)
        .ok_or_else(|| PipelineError::InvalidSourceUrl(url.to_string()))?;

    tracing::info!(%video_id, "fetching YouTube audio");

    let staged = store.allocate(Namespace::Uploads, "mp3");
    let staged_path = staged.path.clone();
    if let Err(e) = backends.fetcher.fetch_audio(url, &staged.path).await {
        // A failed download may leave a partial file behind.
        let _ = fs_err::remove_file(&staged_path);
        return Err(e);
    }
    let audio = store.seal(staged, ArtifactKind::RawAudio, "yt-dlp")?;

    // Cleanup is unconditional: capture the outcome, remove the fetched
    // audio, then propagate.
    let outcome = backends
        .transcriber
        .transcribe(&store.absolute_path(&audio), None)
        .await;
    store.delete(&audio);
    let transcription = outcome?;

    let mut artifact =
        store.create_text(Namespace::Outputs, ArtifactKind::Transcript, &transcription.text)?;
    if let Some(lang) = transcription.language.clone() {
        artifact = artifact.with_language(lang);
    }

    Ok((artifact, transcription.text))
}

/// Strip the audio track out of an uploaded video.
pub async fn extract_audio(
    store: &ArtifactStore,
    backends: &Backends,
    video_ref: &str,
) -> Result<Artifact, PipelineError> {
    let video = store.resolve(video_ref)?;
    expect_class(&video, MediaClass::Video, "extract-audio")?;

    let staged = store.allocate(Namespace::Outputs, "mp3");
    backends
        .transcoder
        .extract_audio(&store.absolute_path(&video), &staged.path)
        .await?;

    store.seal(staged, ArtifactKind::RawAudio, "ffmpeg")
}

/// Transcribe an audio artifact. Native mode lets the backend detect the
/// language; English mode forces it.
pub async fn transcribe(
    store: &ArtifactStore,
    backends: &Backends,
    audio_ref: &str,
    mode: LanguageMode,
) -> Result<(Artifact, String), PipelineError> {
    let audio = store.resolve(audio_ref)?;
    expect_class(&audio, MediaClass::Audio, "transcribe")?;

    let forced = mode.forces_english().then_some("en");
    let transcription = backends
        .transcriber
        .transcribe(&store.absolute_path(&audio), forced)
        .await?;

    let mut artifact =
        store.create_text(Namespace::Outputs, ArtifactKind::Transcript, &transcription.text)?;
    if let Some(lang) = transcription.language.clone() {
        artifact = artifact.with_language(lang);
    }

    Ok((artifact, transcription.text))
}

/// Summarize a text artifact, preserving full meaning in as few words as
/// possible. Empty input yields an empty summary without touching the
/// backend.
pub async fn summarize(
    store: &ArtifactStore,
    backends: &Backends,
    text_ref: &str,
    mode: LanguageMode,
) -> Result<(Artifact, String), PipelineError> {
    let source = store.resolve(text_ref)?;
    expect_class(&source, MediaClass::Text, "summarize")?;

    let text = store.read_text(&source)?;
    let summary = if text.trim().is_empty() {
        String::new()
    } else {
        backends
            .summarizer
            .summarize(&text, mode.forces_english())
            .await?
    };

    let mut artifact = store.create_text(Namespace::Outputs, ArtifactKind::Summary, &summary)?;
    if mode.forces_english() {
        artifact = artifact.with_language("en");
    }

    Ok((artifact, summary))
}

/// Render a text artifact as synthesized speech.
///
/// Language precedence is exact and three-tiered: an explicit forced
/// language, then detection over the input text, then the configured
/// fallback. Detection failure is absorbed into the fallback rather than
/// surfaced.
pub async fn synthesize(
    store: &ArtifactStore,
    backends: &Backends,
    text_ref: &str,
    forced_language: Option<&str>,
) -> Result<Artifact, PipelineError> {
    let source = store.resolve(text_ref)?;
    expect_class(&source, MediaClass::Text, "synthesize")?;

    let text = store.read_text(&source)?;
    if text.trim().is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let lang = forced_language
        .map(str::to_string)
        .or_else(|| language::detect_language(&text))
        .unwrap_or_else(|| backends.fallback_language.clone());

    let bytes = backends.synthesizer.synthesize(&text, &lang).await?;
    let artifact = store.create(Namespace::Outputs, ArtifactKind::SynthesizedAudio, "mp3", &bytes)?;

    Ok(artifact.with_language(lang))
}

/// Re-render an audio artifact at a faster tempo. The native/English
/// route variants are the identical transform.
pub async fn change_tempo(
    store: &ArtifactStore,
    backends: &Backends,
    audio_ref: &str,
    factor: f64,
) -> Result<Artifact, PipelineError> {
    let audio = store.resolve(audio_ref)?;
    expect_class(&audio, MediaClass::Audio, "change-tempo")?;

    let staged = store.allocate(Namespace::Outputs, "mp3");
    backends
        .transcoder
        .change_tempo(&store.absolute_path(&audio), &staged.path, factor)
        .await?;

    store.seal(staged, ArtifactKind::TempoAudio, "ffmpeg")
}
