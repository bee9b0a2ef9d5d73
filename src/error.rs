use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Error taxonomy for the pipeline service.
///
/// Client-fixable problems map to 4xx, gate failures to 401/500, and
/// backend/tool failures to 5xx with the underlying cause preserved for
/// diagnosis. No layer retries; callers re-run the whole stage call.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no video identifier found in URL: {0}")]
    InvalidSourceUrl(String),

    #[error("input text is empty")]
    EmptyInput,

    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("invalid or missing API key")]
    Unauthorized,

    #[error("server misconfigured: {0}")]
    MisconfiguredServer(String),

    #[error("failed to write artifact: {0}")]
    StorageWrite(#[from] std::io::Error),

    #[error("{tool} failed: {detail}")]
    TransformFailed { tool: String, detail: String },

    #[error("transcription backend unavailable: {0}")]
    TranscriptionUnavailable(String),

    #[error("summarization backend unavailable: {0}")]
    SummarizationUnavailable(String),

    #[error("speech synthesis backend unavailable: {0}")]
    SynthesisUnavailable(String),

    #[error("media fetch failed: {0}")]
    FetchFailed(String),
}

impl PipelineError {
    pub fn transform(tool: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::TransformFailed {
            tool: tool.into(),
            detail: detail.into(),
        }
    }

    /// HTTP status the error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) | Self::InvalidSourceUrl(_) | Self::EmptyInput => {
                StatusCode::BAD_REQUEST
            }
            Self::ArtifactNotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::MisconfiguredServer(_) | Self::StorageWrite(_) | Self::TransformFailed { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::TranscriptionUnavailable(_)
            | Self::SummarizationUnavailable(_)
            | Self::SynthesisUnavailable(_)
            | Self::FetchFailed(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = %status, "request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
