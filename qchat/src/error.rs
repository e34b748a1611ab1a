//! Chat-layer errors and the machine-readable code vocabulary.
//!
//! ```rust
//! use qchat::{ChatError, ErrorCode};
//!
//! let err = ChatError::api_key_required("add an API key in settings");
//! assert_eq!(err.code, ErrorCode::ApiKeyRequired);
//! assert_eq!(err.code.as_str(), "API_KEY_REQUIRED");
//! ```

use std::error::Error;
use std::fmt::{Display, Formatter};

use serde::Serialize;

use qprovider::{ProviderError, ProviderErrorKind};

/// Wire-facing error codes; the API layer forwards these verbatim so chat
/// clients can act on them without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ApiKeyRequired,
    ModelsNotChecked,
    InvalidPreset,
    SafetyBlocked,
    AllServicesFailed,
    EmptyResponse,
    UserAborted,
    UnknownProvider,
    UnsupportedOperation,
    PipelineCritical,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ApiKeyRequired => "API_KEY_REQUIRED",
            Self::ModelsNotChecked => "MODELS_NOT_CHECKED",
            Self::InvalidPreset => "INVALID_PRESET",
            Self::SafetyBlocked => "SAFETY_BLOCKED",
            Self::AllServicesFailed => "ALL_SERVICES_FAILED",
            Self::EmptyResponse => "EMPTY_RESPONSE",
            Self::UserAborted => "USER_ABORTED",
            Self::UnknownProvider => "UNKNOWN_PROVIDER",
            Self::UnsupportedOperation => "UNSUPPORTED_OPERATION",
            Self::PipelineCritical => "PIPELINE_CRITICAL",
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatError {
    pub code: ErrorCode,
    pub message: String,
}

impl ChatError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn api_key_required(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiKeyRequired, message)
    }

    pub fn models_not_checked(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ModelsNotChecked, message)
    }

    pub fn invalid_preset(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidPreset, message)
    }

    pub fn empty_response(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::EmptyResponse, message)
    }

    pub fn user_aborted(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UserAborted, message)
    }

    pub fn pipeline_critical(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PipelineCritical, message)
    }
}

impl Display for ChatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl Error for ChatError {}

impl From<ProviderError> for ChatError {
    fn from(value: ProviderError) -> Self {
        let code = match value.kind {
            ProviderErrorKind::SafetyBlocked => ErrorCode::SafetyBlocked,
            ProviderErrorKind::CoolingDown | ProviderErrorKind::Exhausted => {
                ErrorCode::AllServicesFailed
            }
            ProviderErrorKind::NoCredentials => ErrorCode::ApiKeyRequired,
            ProviderErrorKind::UnknownProvider => ErrorCode::UnknownProvider,
            ProviderErrorKind::Unsupported => ErrorCode::UnsupportedOperation,
            _ => ErrorCode::PipelineCritical,
        };

        ChatError::new(code, value.message)
    }
}
