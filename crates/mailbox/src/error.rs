//! Error taxonomy for the mailbox engine
//!
//! Library operations return [`Result<T>`]. Application glue (config
//! loading, session bootstrap) uses `anyhow` on top of this.

use std::fmt;

/// Result alias used throughout the engine
pub type Result<T> = std::result::Result<T, MailboxError>;

/// Structured error codes carried in the `error` field of a failed response,
/// plus the client-side preconditions that are reported the same way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    /// `service.INVALID_REQUEST` / `mail.INVALID_REQUEST` (usually a rejected attachment)
    InvalidRequest,
    /// `mail.MESSAGE_TOO_BIG`
    MessageTooBig,
    /// `mail.QUOTA_EXCEEDED`
    QuotaExceeded,
    /// Local file is larger than the configured upload limit
    AttachmentTooLarge { size: u64, limit: u64 },
    /// Creating a folder would exceed the server's maximum depth
    FolderDepthExceeded { max: u32 },
    /// Recipients, subject or body of a sent message were edited
    MessageAlreadySent,
    /// Any other code the server reported
    Other(String),
}

impl ErrorCode {
    /// Map a server code string to a known variant
    pub fn from_code(code: &str) -> Self {
        match code {
            "service.INVALID_REQUEST" | "mail.INVALID_REQUEST" => ErrorCode::InvalidRequest,
            "mail.MESSAGE_TOO_BIG" => ErrorCode::MessageTooBig,
            "mail.QUOTA_EXCEEDED" => ErrorCode::QuotaExceeded,
            other => ErrorCode::Other(other.to_string()),
        }
    }

    /// Whether this code describes a rejected input rather than a failure of the service
    pub fn is_validation(&self) -> bool {
        !matches!(self, ErrorCode::Other(_))
    }

    /// Extract the code from a response body.
    ///
    /// The server puts either `{"error": "{\"code\":\"...\"}"}` (a JSON
    /// document encoded as a string), `{"error": {"code": "..."}}`, or a
    /// bare `{"code": "..."}` in the body.
    pub fn from_body(body: &serde_json::Value) -> Option<Self> {
        let error = body.get("error").unwrap_or(body);
        let code = match error {
            serde_json::Value::String(raw) => match serde_json::from_str::<serde_json::Value>(raw) {
                Ok(parsed) => parsed.get("code").and_then(|c| c.as_str()).map(str::to_string),
                Err(_) => Some(raw.clone()),
            },
            other => other.get("code").and_then(|c| c.as_str()).map(str::to_string),
        }?;
        Some(Self::from_code(&code))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::InvalidRequest => write!(f, "invalid request"),
            ErrorCode::MessageTooBig => write!(f, "message too big"),
            ErrorCode::QuotaExceeded => write!(f, "quota exceeded"),
            ErrorCode::AttachmentTooLarge { size, limit } => {
                write!(f, "attachment of {} bytes exceeds limit of {} bytes", size, limit)
            }
            ErrorCode::FolderDepthExceeded { max } => {
                write!(f, "folder depth limit of {} reached", max)
            }
            ErrorCode::MessageAlreadySent => write!(f, "message was already sent"),
            ErrorCode::Other(code) => write!(f, "{}", code),
        }
    }
}

/// Errors raised by the mailbox engine
#[derive(Debug, Clone, thiserror::Error)]
pub enum MailboxError {
    /// Network failure or an HTTP error status without a validation code
    #[error("Transport error: {message}")]
    Transport { status: Option<u16>, message: String },

    /// The server (or a local precondition) rejected the input
    #[error("Validation error: {code}")]
    Validation { code: ErrorCode },

    /// A completion arrived after a newer operation superseded it
    #[error("Stale completion discarded")]
    Stale,

    /// The operation needs a server identity the message doesn't have yet
    #[error("Message has no identity")]
    MissingIdentity,

    /// A folder path or id that isn't part of the tree
    #[error("Unknown folder: {path}")]
    UnknownFolder { path: String },

    /// Sending while uploads are still running
    #[error("{pending} attachment(s) still uploading")]
    AttachmentsPending { pending: usize },

    /// The response body didn't have the expected shape
    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    /// Reading a local attachment source failed
    #[error("I/O error: {message}")]
    Io { message: String },
}

impl MailboxError {
    pub fn transport(message: impl Into<String>) -> Self {
        MailboxError::Transport {
            status: None,
            message: message.into(),
        }
    }

    pub fn validation(code: ErrorCode) -> Self {
        MailboxError::Validation { code }
    }

    /// Classify a failed HTTP response
    pub fn from_status(status: u16, body: &serde_json::Value) -> Self {
        match ErrorCode::from_body(body) {
            Some(code) if code.is_validation() => MailboxError::Validation { code },
            Some(code) => MailboxError::Transport {
                status: Some(status),
                message: code.to_string(),
            },
            None => MailboxError::Transport {
                status: Some(status),
                message: format!("HTTP {}", status),
            },
        }
    }

    /// Whether this error is a discarded stale completion
    pub fn is_stale(&self) -> bool {
        matches!(self, MailboxError::Stale)
    }
}

impl From<serde_json::Error> for MailboxError {
    fn from(e: serde_json::Error) -> Self {
        MailboxError::Decode {
            message: e.to_string(),
        }
    }
}

impl From<std::io::Error> for MailboxError {
    fn from(e: std::io::Error) -> Self {
        MailboxError::Io {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_code_encoded_as_string() {
        let body = json!({ "error": "{\"code\":\"mail.QUOTA_EXCEEDED\"}" });
        assert_eq!(ErrorCode::from_body(&body), Some(ErrorCode::QuotaExceeded));
    }

    #[test]
    fn test_code_as_object() {
        let body = json!({ "error": { "code": "mail.MESSAGE_TOO_BIG" } });
        assert_eq!(ErrorCode::from_body(&body), Some(ErrorCode::MessageTooBig));
    }

    #[test]
    fn test_both_invalid_request_spellings() {
        assert_eq!(ErrorCode::from_code("service.INVALID_REQUEST"), ErrorCode::InvalidRequest);
        assert_eq!(ErrorCode::from_code("mail.INVALID_REQUEST"), ErrorCode::InvalidRequest);
    }

    #[test]
    fn test_status_classification() {
        let quota = MailboxError::from_status(400, &json!({ "error": "{\"code\":\"mail.QUOTA_EXCEEDED\"}" }));
        assert!(matches!(quota, MailboxError::Validation { code: ErrorCode::QuotaExceeded }));

        let failure = MailboxError::from_status(500, &json!({ "error": "{\"code\":\"service.FAILURE\"}" }));
        assert!(matches!(failure, MailboxError::Transport { status: Some(500), .. }));

        let bare = MailboxError::from_status(502, &serde_json::Value::Null);
        assert!(matches!(bare, MailboxError::Transport { status: Some(502), .. }));
    }
}
