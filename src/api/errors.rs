use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("not authenticated or session expired")]
    Unauthorized,
    #[error("access denied")]
    Forbidden,
    #[error("request rejected with status {status}: {message}")]
    Validation { status: u16, message: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("server error with status {status}")]
    Server { status: u16 },
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ApiError {
    /// Maps a non-success status and its (possibly empty) JSON body.
    pub(crate) fn from_status(status: u16, body: Option<&Value>) -> Self {
        let message = body.and_then(extract_error_message);
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound(message.unwrap_or_else(|| "resource not found".to_string())),
            status if status >= 500 => Self::Server { status },
            _ => Self::Validation {
                status,
                message: message.unwrap_or_default(),
            },
        }
    }

    /// Log the underlying decode problem with context and return a `Decode` variant.
    pub(crate) fn decode(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Decode(context.to_string())
    }

    /// Network trouble and 5xx responses may succeed on a later attempt.
    pub(crate) fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Server { .. })
    }

    /// The one-line message shown to the person at the keyboard.
    pub(crate) fn notification(&self) -> String {
        match self {
            Self::Unauthorized => "Session expired. Please log in again.".to_string(),
            Self::Forbidden => "Access denied. Insufficient permissions.".to_string(),
            Self::Server { .. } => "Server error. Please try again later.".to_string(),
            Self::Validation { message, .. } if !message.is_empty() => message.clone(),
            Self::NotFound(message) => message.clone(),
            Self::InvalidInput(message) => message.clone(),
            Self::Transport(_) | Self::Decode(_) | Self::Validation { .. } => {
                "An error occurred. Please try again.".to_string()
            }
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        // Struct-level checks are reported under `__all__` with their own message.
        let mut messages = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, items)| {
                items.iter().map(move |item| match &item.message {
                    Some(message) => message.to_string(),
                    None => format!("{field} is invalid"),
                })
            })
            .collect::<Vec<_>>();

        messages.sort();
        messages.dedup();
        Self::InvalidInput(messages.join("; "))
    }
}

fn extract_error_message(payload: &Value) -> Option<String> {
    payload
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| payload.get("error").and_then(Value::as_str))
        .or_else(|| payload.get("detail").and_then(Value::as_str))
        .map(str::to_string)
        .filter(|message| !message.trim().is_empty())
}
