use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use super::types::{GraphErrorEnvelope, HierarchyLevel};

/// Graph API error code for an invalid or expired OAuth token
const GRAPH_INVALID_TOKEN_CODE: i64 = 190;

#[derive(Debug, Clone, PartialEq)]
pub enum SyncError {
    /// Missing or invalid configuration
    Config(String),
    /// The access token was rejected
    Credential(String),
    /// Any other failure talking to the Graph API
    Request {
        level: Option<HierarchyLevel>,
        entity: Option<String>,
        status: Option<u16>,
        message: String,
    },
    /// Storage failure while persisting one level
    Persist {
        level: HierarchyLevel,
        message: String,
    },
    InvalidRequest(String),
}

impl SyncError {
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Config(_) => "config",
            SyncError::Credential(_) => "credential",
            SyncError::Request { .. } => "request",
            SyncError::Persist { .. } => "persist",
            SyncError::InvalidRequest(_) => "invalid_request",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            SyncError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SyncError::Credential(_) => StatusCode::UNAUTHORIZED,
            SyncError::Request { .. } => StatusCode::BAD_GATEWAY,
            SyncError::Persist { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            SyncError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub(crate) fn transport(
        level: Option<HierarchyLevel>,
        entity: Option<&str>,
        err: reqwest::Error,
    ) -> Self {
        SyncError::Request {
            level,
            entity: entity.map(str::to_string),
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Config(msg) => write!(f, "Configuration error: {}", msg),
            SyncError::Credential(msg) => write!(f, "{}", msg),
            SyncError::Request {
                level,
                entity,
                status,
                message,
            } => {
                write!(f, "Graph API request failed")?;
                if let Some(level) = level {
                    write!(f, " at {} level", level)?;
                }
                if let Some(entity) = entity {
                    write!(f, " for {}", entity)?;
                }
                if let Some(status) = status {
                    write!(f, " (HTTP {})", status)?;
                }
                write!(f, ": {}", message)
            }
            SyncError::Persist { level, message } => {
                write!(f, "Failed to persist {} records: {}", level, message)
            }
            SyncError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
        }
    }
}

impl std::error::Error for SyncError {}

impl SyncError {
    /// JSON error body shared by every HTTP response carrying a `SyncError`
    ///
    /// Configuration details never leave the server.
    pub fn response_body(&self) -> Value {
        let message = match self {
            SyncError::Config(_) => "Server is misconfigured".to_string(),
            _ => self.to_string(),
        };

        json!({
            "success": false,
            "error": message,
            "kind": self.kind(),
        })
    }
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.response_body())).into_response()
    }
}

/// Map a non-2xx Graph API response into a `SyncError`
///
/// HTTP 401 and Graph error code 190 both mean the token is unusable.
pub fn classify_error(
    status: u16,
    body: &str,
    level: Option<HierarchyLevel>,
    entity: Option<&str>,
) -> SyncError {
    let envelope = serde_json::from_str::<GraphErrorEnvelope>(body).ok();
    let code = envelope.as_ref().and_then(|e| e.error.code);

    if status == 401 || code == Some(GRAPH_INVALID_TOKEN_CODE) {
        return SyncError::Credential("Facebook token unauthorized or expired".to_string());
    }

    let message = envelope
        .and_then(|e| e.error.message)
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("HTTP {}", status)
            } else {
                trimmed.chars().take(500).collect()
            }
        });

    SyncError::Request {
        level,
        entity: entity.map(str::to_string),
        status: Some(status),
        message,
    }
}
