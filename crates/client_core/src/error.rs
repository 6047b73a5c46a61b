use shared::error::{ApiError, ErrorCode};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Auth,
    Remote,
    Transport,
}

/// Failure of a controller operation. Never fatal to the controller.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("{0}")]
    Validation(String),
    #[error("login required")]
    NotAuthenticated,
    #[error("session rejected by server: {}", .0.detail.as_deref().unwrap_or("unauthorized"))]
    Unauthorized(ApiError),
    #[error("server error: {0}")]
    Remote(ApiError),
    #[error("network error: {0}")]
    Transport(String),
    #[error("unexpected server response: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn from_status(status: u16, detail: Option<String>) -> Self {
        let error = ApiError::new(status, detail);
        if error.code == ErrorCode::Unauthorized {
            Self::Unauthorized(error)
        } else {
            Self::Remote(error)
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::NotAuthenticated | Self::Unauthorized(_) => ErrorCategory::Auth,
            Self::Remote(_) | Self::Decode(_) => ErrorCategory::Remote,
            Self::Transport(_) => ErrorCategory::Transport,
        }
    }

    pub fn requires_reauth(&self) -> bool {
        self.category() == ErrorCategory::Auth
    }

    /// Message for display: the server's detail when it sent one, otherwise `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::NotAuthenticated => "Please log in to continue.".to_string(),
            Self::Unauthorized(error) | Self::Remote(error) => {
                error.detail.clone().unwrap_or_else(|| fallback.to_string())
            }
            Self::Transport(_) | Self::Decode(_) => fallback.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Decode(err.to_string());
        }
        if let Some(status) = err.status() {
            return Self::from_status(status.as_u16(), None);
        }
        Self::Transport(err.to_string())
    }
}
