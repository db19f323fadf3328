use thiserror::Error;

/// Endpoint resolution failures. Raised instead of building a URL with a
/// placeholder port.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("unknown service '{service}' in {registry} registry")]
    UnknownService { registry: String, service: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Timeout,
    Connect,
    Other,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Timeout => "timeout",
            TransportKind::Connect => "connect",
            TransportKind::Other => "other",
        }
    }
}

/// Outcome classification for a single dispatched request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("transport error ({}): {message}", .kind.as_str())]
    Transport { kind: TransportKind, message: String },
    #[error("http error {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Http { status: u16, message: Option<String> },
    #[error("decode error: {message}")]
    Decode { message: String },
    #[error("invalid image '{uri}': {message}")]
    InvalidImage { uri: String, message: String },
}

impl RequestError {
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Transport { kind: TransportKind::Timeout, message: message.into() }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode { message: message.into() }
    }

    /// Stable label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RequestError::Configuration(_) => "configuration",
            RequestError::Transport { .. } => "transport",
            RequestError::Http { .. } => "http",
            RequestError::Decode { .. } => "decode",
            RequestError::InvalidImage { .. } => "invalid_image",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RequestError::Transport { kind: TransportKind::Timeout, .. })
    }

    /// Message suitable for a single user-facing notification.
    pub fn user_message(&self) -> String {
        match self {
            RequestError::Http { message: Some(m), .. } => m.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return RequestError::timeout(e.to_string());
        }
        if e.is_decode() {
            return RequestError::decode(e.to_string());
        }
        let kind = if e.is_connect() { TransportKind::Connect } else { TransportKind::Other };
        RequestError::Transport { kind, message: e.to_string() }
    }
}

/// Local persistence failures (session file).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_names_service() {
        let e = ConfigurationError::UnknownService {
            registry: "content".into(),
            service: "outline_Multi_Grain".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("outline_Multi_Grain"));
        assert!(msg.contains("content"));
        assert!(!msg.contains("undefined"));
    }

    #[test]
    fn http_error_user_message_is_server_text() {
        let e = RequestError::Http { status: 422, message: Some("Image too blurry".into()) };
        assert_eq!(e.user_message(), "Image too blurry");
        assert_eq!(e.kind(), "http");
        assert!(e.to_string().contains("422"));

        let bare = RequestError::Http { status: 500, message: None };
        assert_eq!(bare.user_message(), "http error 500: no message");
    }

    #[test]
    fn timeout_classification() {
        let e = RequestError::timeout("deadline elapsed");
        assert!(e.is_timeout());
        assert_eq!(e.kind(), "transport");
        assert!(e.to_string().contains("timeout"));
    }
}
