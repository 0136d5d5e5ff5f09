// ⚠️ Error taxonomy
//
// FormatError lives in the FieldErrorMap, ShapeError is recovered inside the
// normalizer. What remains are the collaborator failures below.

use thiserror::Error;

/// Failures talking to the backend REST API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 401/403 from the backend
    #[error("not authorized (HTTP {status})")]
    Auth { status: u16, message: Option<String> },

    /// Any other non-success status
    #[error("backend returned HTTP {status}")]
    Status { status: u16, message: Option<String> },

    /// Connection failure, timeout, TLS, ...
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Body could not be read as JSON
    #[error("invalid response body: {0}")]
    Decode(String),

    /// Login answered without a token
    #[error("login rejected: {0}")]
    LoginRejected(String),

    #[error("invalid API URL: {0}")]
    Url(String),

    #[error(transparent)]
    Session(#[from] StoreError),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Auth { status, .. } | ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Auth { .. })
    }

    /// Message sent by the backend in the error body, if any.
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            ApiError::Auth { message, .. } | ApiError::Status { message, .. } => {
                message.as_deref()
            }
            _ => None,
        }
    }
}

/// Failures of the postal-code lookup.
#[derive(Debug, Error)]
pub enum CepError {
    #[error("postal code must have 8 digits")]
    InvalidCode,

    #[error("postal code not found")]
    NotFound,

    #[error("postal lookup failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("postal lookup returned HTTP {0}")]
    Status(u16),
}

/// Failures of the session key/value store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("session serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("session store lock poisoned")]
    Poisoned,
}
