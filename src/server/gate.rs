//! Request gate: shared-secret authorization over every operation.

use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::error::PipelineError;

/// Header carrying the shared secret.
pub const SECRET_HEADER: &str = "x-api-key";

/// Configured gate state, derived once at startup.
#[derive(Clone)]
pub struct GateState {
    secret: Option<String>,
}

impl GateState {
    pub fn new(secret: Option<String>) -> Self {
        Self { secret }
    }
}

/// The authorization predicate.
///
/// Preflight (OPTIONS) passes unconditionally so browser cross-origin
/// negotiation works without a credential. Everything else requires an
/// exact (constant-time) match against the configured secret, and a
/// server with no secret configured fails closed.
pub fn authorize(
    method: &Method,
    presented: Option<&str>,
    configured: Option<&str>,
) -> Result<(), PipelineError> {
    if method == Method::OPTIONS {
        return Ok(());
    }

    let secret = configured.ok_or_else(|| {
        PipelineError::MisconfiguredServer("no shared secret configured".into())
    })?;

    match presented {
        Some(presented) if bool::from(presented.as_bytes().ct_eq(secret.as_bytes())) => Ok(()),
        _ => Err(PipelineError::Unauthorized),
    }
}

/// Axum middleware wrapper around [`authorize`].
pub async fn gate_middleware(
    State(gate): State<GateState>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok());

    match authorize(request.method(), presented, gate.secret.as_deref()) {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}
