use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    RateLimited,
    Unavailable,
    Internal,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            422 => Self::Validation,
            429 => Self::RateLimited,
            502..=504 => Self::Unavailable,
            400..=499 => Self::BadRequest,
            _ => Self::Internal,
        }
    }
}

/// Error body returned by the riddle service: `{"detail": ...}`.
///
/// `detail` is a plain string for handled errors and a list of
/// `{loc, msg, type}` items when request validation fails.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ApiErrorBody {
    pub fn message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
            Value::Array(items) => {
                let messages: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(Value::as_str))
                    .collect();
                (!messages.is_empty()).then(|| messages.join("; "))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{code:?} ({status}): {}", .detail.as_deref().unwrap_or("no detail"))]
pub struct ApiError {
    pub status: u16,
    pub code: ErrorCode,
    pub detail: Option<String>,
}

impl ApiError {
    pub fn new(status: u16, detail: Option<String>) -> Self {
        Self {
            status,
            code: ErrorCode::from_status(status),
            detail,
        }
    }
}
