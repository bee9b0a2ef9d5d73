//! HTTP surface: the stage router.
//!
//! Each operation maps to exactly one pipeline stage; responses carry
//! artifact references, never inline derived bytes — clients fetch bytes
//! through `/files/{reference}`.

pub mod gate;

use axum::extract::{DefaultBodyLimit, Multipart, Path as UrlPath, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::adapters::Backends;
use crate::error::PipelineError;
use crate::pipeline::{self, LanguageMode};
use crate::store::{sanitize_extension, ArtifactKind, ArtifactStore, MediaClass};

/// Media uploads dwarf axum's default body limit.
const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ArtifactStore>,
    pub backends: Backends,
    pub tempo_factor: f64,
}

/// Declarative stage table: operation name, expected input media class
/// (None for the base-case uploads), produced artifact kind, and whether
/// the operation accepts raw uploaded bytes instead of a reference.
pub struct StageSpec {
    pub operation: &'static str,
    pub input: Option<MediaClass>,
    pub output: ArtifactKind,
    pub accepts_upload: bool,
}

pub const STAGES: &[StageSpec] = &[
    StageSpec { operation: "upload-video", input: None, output: ArtifactKind::RawVideo, accepts_upload: true },
    StageSpec { operation: "upload-audio", input: None, output: ArtifactKind::RawAudio, accepts_upload: true },
    StageSpec { operation: "upload-text", input: None, output: ArtifactKind::RawText, accepts_upload: true },
    StageSpec { operation: "youtube-subtitles", input: None, output: ArtifactKind::Transcript, accepts_upload: false },
    StageSpec { operation: "extract-audio", input: Some(MediaClass::Video), output: ArtifactKind::RawAudio, accepts_upload: false },
    StageSpec { operation: "transcribe-native", input: Some(MediaClass::Audio), output: ArtifactKind::Transcript, accepts_upload: false },
    StageSpec { operation: "transcribe-english", input: Some(MediaClass::Audio), output: ArtifactKind::Transcript, accepts_upload: false },
    StageSpec { operation: "summarize-native", input: Some(MediaClass::Text), output: ArtifactKind::Summary, accepts_upload: false },
    StageSpec { operation: "summarize-english", input: Some(MediaClass::Text), output: ArtifactKind::Summary, accepts_upload: false },
    StageSpec { operation: "tts-native", input: Some(MediaClass::Text), output: ArtifactKind::SynthesizedAudio, accepts_upload: false },
    StageSpec { operation: "tts-english", input: Some(MediaClass::Text), output: ArtifactKind::SynthesizedAudio, accepts_upload: false },
    StageSpec { operation: "fast-native", input: Some(MediaClass::Audio), output: ArtifactKind::TempoAudio, accepts_upload: false },
    StageSpec { operation: "fast-english", input: Some(MediaClass::Audio), output: ArtifactKind::TempoAudio, accepts_upload: false },
];

#[derive(Deserialize)]
struct YouTubeRequest {
    url: String,
}

#[derive(Deserialize)]
struct VideoFileRequest {
    video_file: String,
}

#[derive(Deserialize)]
struct AudioFileRequest {
    audio_file: String,
}

#[derive(Deserialize)]
struct TextFileRequest {
    text_file: String,
}

#[derive(Deserialize)]
struct SummaryFileRequest {
    summary_file: String,
}

#[derive(Serialize)]
struct UploadResponse {
    filename: String,
}

#[derive(Serialize)]
struct TextFileResponse {
    text_file: String,
}

#[derive(Serialize)]
struct TranscriptionResponse {
    text_file: String,
    transcription: String,
}

#[derive(Serialize)]
struct SummaryResponse {
    summary_file: String,
    summary: String,
}

#[derive(Serialize)]
struct AudioFileResponse {
    audio_file: String,
}

#[derive(Serialize)]
struct FastAudioResponse {
    fast_audio_file: String,
}

/// Build the full router: stage routes behind the gate, CORS outermost.
pub fn build_router(state: AppState, gate: gate::GateState, cors_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    // Credentials rule out wildcard methods/headers; mirroring the
    // request grants everything asked for, including the secret header.
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    Router::new()
        .route("/", get(health))
        .route("/upload-video", post(upload_video))
        .route("/upload-audio", post(upload_audio))
        .route("/upload-text", post(upload_text))
        .route("/youtube-subtitles", post(youtube_subtitles))
        .route("/extract-audio", post(extract_audio))
        .route("/transcribe-native", post(transcribe_native))
        .route("/transcribe-english", post(transcribe_english))
        .route("/summarize-native", post(summarize_native))
        .route("/summarize-english", post(summarize_english))
        .route("/tts-native", post(tts_native))
        .route("/tts-english", post(tts_english))
        .route("/fast-native", post(fast_native))
        .route("/fast-english", post(fast_english))
        .route("/files/{*reference}", get(get_file))
        .layer(middleware::from_fn_with_state(gate, gate::gate_middleware))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    let operations: Vec<&str> = STAGES.iter().map(|s| s.operation).collect();
    Json(json!({ "status": "ok", "operations": operations }))
}

/// Pull the `file` field out of a multipart upload. The client filename
/// is only ever used to pick an extension.
async fn read_file_field(
    multipart: &mut Multipart,
) -> Result<Option<(Option<String>, Vec<u8>)>, PipelineError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PipelineError::InvalidInput(e.to_string()))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| PipelineError::InvalidInput(e.to_string()))?;
            return Ok(Some((filename, bytes.to_vec())));
        }
    }
    Ok(None)
}

async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, PipelineError> {
    let (filename, bytes) = read_file_field(&mut multipart)
        .await?
        .ok_or_else(|| PipelineError::InvalidInput("missing file field".into()))?;

    let ext = sanitize_extension(filename.as_deref().unwrap_or(""), "mp4");
    let artifact = pipeline::upload_media(&state.store, ArtifactKind::RawVideo, &ext, &bytes)?;

    Ok(Json(UploadResponse {
        filename: artifact.reference().to_string(),
    }))
}

async fn upload_audio(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, PipelineError> {
    let (filename, bytes) = read_file_field(&mut multipart)
        .await?
        .ok_or_else(|| PipelineError::InvalidInput("missing file field".into()))?;

    let ext = sanitize_extension(filename.as_deref().unwrap_or(""), "mp3");
    let artifact = pipeline::upload_media(&state.store, ArtifactKind::RawAudio, &ext, &bytes)?;

    Ok(Json(UploadResponse {
        filename: artifact.reference().to_string(),
    }))
}

async fn upload_text(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<TextFileResponse>, PipelineError> {
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut inline_text: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PipelineError::InvalidInput(e.to_string()))?
    {
        match field.name() {
            Some("file") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| PipelineError::InvalidInput(e.to_string()))?;
                file_bytes = Some(bytes.to_vec());
            }
            Some("text") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| PipelineError::InvalidInput(e.to_string()))?;
                inline_text = Some(text);
            }
            _ => {}
        }
    }

    let artifact = pipeline::upload_text(&state.store, file_bytes, inline_text)?;

    Ok(Json(TextFileResponse {
        text_file: artifact.reference().to_string(),
    }))
}

async fn youtube_subtitles(
    State(state): State<AppState>,
    Json(request): Json<YouTubeRequest>,
) -> Result<Json<TextFileResponse>, PipelineError> {
    let (artifact, _text) =
        pipeline::fetch_youtube_transcript(&state.store, &state.backends, &request.url).await?;

    Ok(Json(TextFileResponse {
        text_file: artifact.reference().to_string(),
    }))
}

async fn extract_audio(
    State(state): State<AppState>,
    Json(request): Json<VideoFileRequest>,
) -> Result<Json<AudioFileResponse>, PipelineError> {
    let artifact =
        pipeline::extract_audio(&state.store, &state.backends, &request.video_file).await?;

    Ok(Json(AudioFileResponse {
        audio_file: artifact.reference().to_string(),
    }))
}

async fn run_transcribe(
    state: &AppState,
    audio_ref: &str,
    mode: LanguageMode,
) -> Result<Json<TranscriptionResponse>, PipelineError> {
    let (artifact, transcription) =
        pipeline::transcribe(&state.store, &state.backends, audio_ref, mode).await?;

    Ok(Json(TranscriptionResponse {
        text_file: artifact.reference().to_string(),
        transcription,
    }))
}

async fn transcribe_native(
    State(state): State<AppState>,
    Json(request): Json<AudioFileRequest>,
) -> Result<Json<TranscriptionResponse>, PipelineError> {
    run_transcribe(&state, &request.audio_file, LanguageMode::Native).await
}

async fn transcribe_english(
    State(state): State<AppState>,
    Json(request): Json<AudioFileRequest>,
) -> Result<Json<TranscriptionResponse>, PipelineError> {
    run_transcribe(&state, &request.audio_file, LanguageMode::English).await
}

async fn run_summarize(
    state: &AppState,
    text_ref: &str,
    mode: LanguageMode,
) -> Result<Json<SummaryResponse>, PipelineError> {
    let (artifact, summary) =
        pipeline::summarize(&state.store, &state.backends, text_ref, mode).await?;

    Ok(Json(SummaryResponse {
        summary_file: artifact.reference().to_string(),
        summary,
    }))
}

async fn summarize_native(
    State(state): State<AppState>,
    Json(request): Json<TextFileRequest>,
) -> Result<Json<SummaryResponse>, PipelineError> {
    run_summarize(&state, &request.text_file, LanguageMode::Native).await
}

async fn summarize_english(
    State(state): State<AppState>,
    Json(request): Json<TextFileRequest>,
) -> Result<Json<SummaryResponse>, PipelineError> {
    run_summarize(&state, &request.text_file, LanguageMode::English).await
}

async fn run_synthesize(
    state: &AppState,
    text_ref: &str,
    mode: LanguageMode,
) -> Result<Json<AudioFileResponse>, PipelineError> {
    let forced = mode.forces_english().then_some("en");
    let artifact = pipeline::synthesize(&state.store, &state.backends, text_ref, forced).await?;

    Ok(Json(AudioFileResponse {
        audio_file: artifact.reference().to_string(),
    }))
}

async fn tts_native(
    State(state): State<AppState>,
    Json(request): Json<SummaryFileRequest>,
) -> Result<Json<AudioFileResponse>, PipelineError> {
    run_synthesize(&state, &request.summary_file, LanguageMode::Native).await
}

async fn tts_english(
    State(state): State<AppState>,
    Json(request): Json<SummaryFileRequest>,
) -> Result<Json<AudioFileResponse>, PipelineError> {
    run_synthesize(&state, &request.summary_file, LanguageMode::English).await
}

async fn run_fast(
    state: &AppState,
    audio_ref: &str,
) -> Result<Json<FastAudioResponse>, PipelineError> {
    let artifact =
        pipeline::change_tempo(&state.store, &state.backends, audio_ref, state.tempo_factor)
            .await?;

    Ok(Json(FastAudioResponse {
        fast_audio_file: artifact.reference().to_string(),
    }))
}

async fn fast_native(
    State(state): State<AppState>,
    Json(request): Json<AudioFileRequest>,
) -> Result<Json<FastAudioResponse>, PipelineError> {
    run_fast(&state, &request.audio_file).await
}

async fn fast_english(
    State(state): State<AppState>,
    Json(request): Json<AudioFileRequest>,
) -> Result<Json<FastAudioResponse>, PipelineError> {
    run_fast(&state, &request.audio_file).await
}

async fn get_file(
    State(state): State<AppState>,
    UrlPath(reference): UrlPath<String>,
) -> Result<Response, PipelineError> {
    let artifact = state.store.resolve(&reference)?;
    let bytes = state.store.read(&artifact)?;

    let content_type = match reference.rsplit('.').next() {
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        Some("wav") => "audio/wav",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    };

    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const SECRET: &str = "s3cret";

    fn app() -> (TempDir, Router) {
        let dir = TempDir::new().unwrap();
        let config = Config::default();
        let state = AppState {
            store: Arc::new(ArtifactStore::new(dir.path()).unwrap()),
            backends: Backends::from_config(&config),
            tempo_factor: config.tools.tempo_factor,
        };
        let gate = gate::GateState::new(Some(SECRET.to_string()));
        let router = build_router(state, gate, &config.server.cors_origins);
        (dir, router)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_requires_the_shared_secret() {
        let (_dir, router) = app();

        let response = router
            .clone()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router
            .oneshot(
                Request::get("/")
                    .header(gate::SECRET_HEADER, SECRET)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let payload = body_json(response).await;
        assert_eq!(payload["status"], "ok");
    }

    #[tokio::test]
    async fn wrong_secret_is_unauthorized() {
        let (_dir, router) = app();
        let response = router
            .oneshot(
                Request::get("/")
                    .header(gate::SECRET_HEADER, "nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_secret_configuration_fails_closed() {
        let dir = TempDir::new().unwrap();
        let config = Config::default();
        let state = AppState {
            store: Arc::new(ArtifactStore::new(dir.path()).unwrap()),
            backends: Backends::from_config(&config),
            tempo_factor: config.tools.tempo_factor,
        };
        let router = build_router(
            state,
            gate::GateState::new(None),
            &config.server.cors_origins,
        );

        let response = router
            .oneshot(
                Request::get("/")
                    .header(gate::SECRET_HEADER, "anything")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn cors_preflight_passes_without_a_credential() {
        let (_dir, router) = app();

        let response = router
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/transcribe-native")
                    .header("origin", "http://localhost:5173")
                    .header("access-control-request-method", "POST")
                    .header("access-control-request-headers", gate::SECRET_HEADER)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.status().is_success());
        let allowed = response
            .headers()
            .get("access-control-allow-headers")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(allowed.contains(gate::SECRET_HEADER));
    }

    #[tokio::test]
    async fn uploaded_text_round_trips_through_retrieval() {
        let (_dir, router) = app();

        let boundary = "test-boundary";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"text\"\r\n\r\n\
             contenido de prueba\r\n\
             --{boundary}--\r\n"
        );

        let response = router
            .clone()
            .oneshot(
                Request::post("/upload-text")
                    .header(gate::SECRET_HEADER, SECRET)
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let payload = body_json(response).await;
        let reference = payload["text_file"].as_str().unwrap().to_string();
        assert!(reference.starts_with("uploads/"));

        let response = router
            .oneshot(
                Request::get(format!("/files/{reference}"))
                    .header(gate::SECRET_HEADER, SECRET)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"contenido de prueba");
    }

    #[tokio::test]
    async fn upload_text_with_neither_field_is_invalid() {
        let (_dir, router) = app();

        let boundary = "test-boundary";
        let body = format!("--{boundary}--\r\n");

        let response = router
            .oneshot(
                Request::post("/upload-text")
                    .header(gate::SECRET_HEADER, SECRET)
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_youtube_url_is_a_client_error() {
        let (_dir, router) = app();

        let response = router
            .oneshot(
                Request::post("/youtube-subtitles")
                    .header(gate::SECRET_HEADER, SECRET)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"url":"https://youtu.be/abc"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let payload = body_json(response).await;
        assert!(payload["error"].as_str().unwrap().contains("identifier"));
    }

    #[tokio::test]
    async fn unknown_file_reference_is_not_found() {
        let (_dir, router) = app();

        for uri in [
            "/files/secrets/x.txt",
            "/files/uploads/no-such-file.txt",
            "/files/outputs/00000000-0000-0000-0000-000000000000.mp3",
        ] {
            let response = router
                .clone()
                .oneshot(
                    Request::get(uri)
                        .header(gate::SECRET_HEADER, SECRET)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "uri: {uri}");
        }
    }

    #[test]
    fn stage_table_covers_every_operation_route() {
        // Upload operations are the base case; everything else consumes
        // an artifact reference.
        assert_eq!(STAGES.len(), 13);
        assert_eq!(STAGES.iter().filter(|s| s.accepts_upload).count(), 3);
        for stage in STAGES {
            if stage.accepts_upload {
                assert!(stage.input.is_none(), "{}", stage.operation);
            }
        }
    }
}
