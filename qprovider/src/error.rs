//! Provider error kinds and error value helpers.
//!
//! Retryability is per-candidate: a retryable error burns one
//! (model, credential) pair and the caller moves to the next one, while a
//! non-retryable error terminates the whole request.
//!
//! ```rust
//! use qprovider::ProviderError;
//!
//! let quota = ProviderError::rate_limited("quota exceeded");
//! assert!(quota.retryable);
//!
//! let blocked = ProviderError::safety_blocked("prompt rejected");
//! assert!(!blocked.retryable);
//! ```

use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Authentication,
    RateLimited,
    InvalidRequest,
    Timeout,
    Transport,
    Unavailable,
    /// The backend rejected the content itself; no other credential or
    /// model can fix that.
    SafetyBlocked,
    /// The pool holds no credentials at all.
    NoCredentials,
    /// Every configured credential is inside its cooldown window.
    CoolingDown,
    /// Every (model, credential) candidate was tried and failed.
    Exhausted,
    /// The backend does not support the requested call mode.
    Unsupported,
    /// No provider is registered under the requested name.
    UnknownProvider,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Authentication, message, true)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::RateLimited, message, true)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::InvalidRequest, message, false)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message, true)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Transport, message, true)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unavailable, message, true)
    }

    pub fn safety_blocked(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::SafetyBlocked, message, false)
    }

    pub fn no_credentials(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::NoCredentials, message, false)
    }

    pub fn cooling_down(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::CoolingDown, message, false)
    }

    pub fn exhausted(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Exhausted, message, false)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unsupported, message, false)
    }

    pub fn unknown_provider(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::UnknownProvider, message, false)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Other, message, false)
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for ProviderError {}
