//! API key and trace context middleware.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};
use tracing::Instrument;
use uuid::Uuid;

/// Header carrying the shared API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header carrying a client-supplied trace id.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Maximum length for trace IDs.
/// Longer trace IDs are truncated to prevent log bloat and potential log injection.
const MAX_TRACE_ID_LEN: usize = 128;

/// Trace ID for request correlation.
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generate a new random trace ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a trace ID from a client-provided value, keeping at most
    /// [`MAX_TRACE_ID_LEN`] printable ASCII characters.
    pub fn from_client(value: &str) -> Self {
        let sanitized: String = value
            .chars()
            .take(MAX_TRACE_ID_LEN)
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .collect();

        if sanitized.is_empty() {
            Self::new()
        } else {
            Self(sanitized)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn extract_or_generate_trace_id(req: &Request) -> TraceId {
    req.headers()
        .get(TRACE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(TraceId::from_client)
        .unwrap_or_else(TraceId::new)
}

/// Hex-encoded SHA-256 digest of an API key.
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
}

/// Attach a trace id to the request, run it inside a span carrying the id
/// and echo the id back in the `X-Trace-Id` response header.
pub async fn trace_middleware(mut req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(&req);
    let trace_id_str = trace_id.0.clone();
    req.extensions_mut().insert(trace_id);

    let mut response = next
        .run(req)
        .instrument(tracing::info_span!("request", trace_id = %trace_id_str))
        .await;

    if let Ok(value) = HeaderValue::from_str(&trace_id_str) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    response
}

/// Reject requests whose `X-Api-Key` does not match the configured digest.
pub async fn api_key_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(value) = req.headers().get(API_KEY_HEADER) else {
        return Err(ApiError::Unauthorized("missing API key".to_string()));
    };

    let presented = value
        .to_str()
        .map(hash_api_key)
        .map_err(|_| ApiError::Unauthorized("invalid API key".to_string()))?;
    let expected = state.config.auth.api_key_hash.trim();

    if !presented.eq_ignore_ascii_case(expected) {
        tracing::warn!("Rejected request with invalid API key");
        return Err(ApiError::Unauthorized("invalid API key".to_string()));
    }

    Ok(next.run(req).await)
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }
}
