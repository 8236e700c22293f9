use serde_json::Value;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// Failures of the persistent key/value storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage file is not valid toml: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to encode storage file: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("storage lock poisoned")]
    Poisoned,
}

// Body of a failed response, kept so callers can pick a message out of it.
#[derive(Clone, Debug, PartialEq)]
pub enum ErrorBody {
    Empty,
    // Plain text, or a JSON document that is a bare string.
    Text(String),
    Json(Value),
}

impl ErrorBody {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return ErrorBody::Empty;
        }

        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::String(text)) => ErrorBody::Text(text),
            Ok(value) => ErrorBody::Json(value),
            Err(_) => ErrorBody::Text(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

// Errors surfaced by the HTTP pipeline.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
    #[error("backend responded with status {status}")]
    Status { status: u16, body: ErrorBody },
    #[error("failed to decode response: {0}")]
    Decode(#[source] BoxError),
    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    // Raw string body first, then a structured `message` field.
    pub fn backend_message(&self) -> Option<String> {
        let ApiError::Status { body, .. } = self else {
            return None;
        };

        match body {
            ErrorBody::Text(text) if !text.is_empty() => Some(text.clone()),
            ErrorBody::Json(value) => value
                .get("message")
                .and_then(Value::as_str)
                .filter(|message| !message.is_empty())
                .map(str::to_string),
            _ => None,
        }
    }

    // First message of the first field in an `errors` map, e.g.
    // {"errors": {"Password": ["too short", ...]}}.
    pub fn first_validation_message(&self) -> Option<String> {
        let ApiError::Status {
            body: ErrorBody::Json(value),
            ..
        } = self
        else {
            return None;
        };

        let first = value.get("errors")?.as_object()?.values().next()?;
        match first {
            Value::Array(messages) => messages.first()?.as_str().map(str::to_string),
            Value::String(message) => Some(message.clone()),
            _ => None,
        }
    }
}

// A write rejected by the backend, normalized to one displayable message.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct Rejection {
    pub message: String,
    #[source]
    pub source: ApiError,
}

impl Rejection {
    pub fn from_api(source: ApiError, fallback: impl Into<String>) -> Self {
        let message = source
            .backend_message()
            .unwrap_or_else(|| fallback.into());
        Self { message, source }
    }
}
