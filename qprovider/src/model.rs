//! Provider-agnostic conversation and request model types.
//!
//! ```rust
//! use qprovider::{BackendRequest, ChatMessage, ProviderErrorKind, Role};
//!
//! let ok = BackendRequest::new(
//!     vec!["models/gemini-1.5-pro-latest".to_string()],
//!     "You are a storyteller.",
//!     vec![ChatMessage::new(Role::User, "Begin the tale")],
//! );
//! assert!(ok.validate().is_ok());
//!
//! let err = BackendRequest::new(Vec::new(), "prompt", Vec::new())
//!     .validate()
//!     .expect_err("empty model pool should fail");
//! assert_eq!(err.kind, ProviderErrorKind::InvalidRequest);
//! ```

use qcommon::SamplingOptions;

use crate::ProviderError;

/// Conversation roles as the hosted backend names them on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A backend model as reported by discovery, with enough detail for the
/// caller to rank and display it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub input_token_limit: u32,
    pub output_token_limit: u32,
    pub methods: Vec<String>,
}

/// Capability required of a model before it enters the verified cache.
pub const GENERATE_METHOD: &str = "generateContent";

impl ModelInfo {
    pub fn supports_generation(&self) -> bool {
        self.methods.iter().any(|method| method == GENERATE_METHOD)
    }
}

/// A function the model may call, described to the backend in its own
/// schema dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the function parameters, as a JSON string.
    pub parameters_schema: String,
}

/// One generation call as handed to a provider: the candidate models to
/// try (most-preferred first), the assembled system prompt, the already
/// truncated transcript, and sampling settings.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendRequest {
    pub model_pool: Vec<String>,
    pub system_prompt: String,
    pub history: Vec<ChatMessage>,
    pub sampling: SamplingOptions,
    pub tools: Vec<ToolDefinition>,
    pub stream: bool,
}

impl BackendRequest {
    pub fn new(
        model_pool: Vec<String>,
        system_prompt: impl Into<String>,
        history: Vec<ChatMessage>,
    ) -> Self {
        Self {
            model_pool,
            system_prompt: system_prompt.into(),
            history,
            sampling: SamplingOptions::default(),
            tools: Vec::new(),
            stream: false,
        }
    }

    pub fn with_sampling(mut self, sampling: SamplingOptions) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn enable_streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.model_pool.is_empty() {
            return Err(ProviderError::invalid_request(
                "model pool must not be empty",
            ));
        }

        if self.model_pool.iter().any(|model| model.trim().is_empty()) {
            return Err(ProviderError::invalid_request(
                "model identifiers must not be blank",
            ));
        }

        if let Some(temperature) = self.sampling.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ProviderError::invalid_request(
                    "temperature must be in the inclusive range 0.0..=2.0",
                ));
            }
        }

        if let Some(top_p) = self.sampling.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return Err(ProviderError::invalid_request(
                    "top_p must be in the inclusive range 0.0..=1.0",
                ));
            }
        }

        if let Some(max_output_tokens) = self.sampling.max_output_tokens {
            if max_output_tokens == 0 {
                return Err(ProviderError::invalid_request(
                    "max_output_tokens must be greater than zero",
                ));
            }
        }

        Ok(())
    }
}
