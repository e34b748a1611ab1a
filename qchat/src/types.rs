//! Normalized stream events and the per-turn request envelope.

use std::pin::Pin;
use std::sync::Arc;

use futures_core::Stream;
use serde::Serialize;

use qcommon::{CancelSignal, UserId};
use qprovider::{ChatMessage, CredentialPool, TokenUsage};

use crate::{ChatError, ErrorCode, PromptContext, UserLlmConfig};

/// Token accounting as emitted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsagePayload {
    pub prompt_token_count: u32,
    pub candidates_token_count: u32,
    pub total_token_count: u32,
}

impl From<TokenUsage> for UsagePayload {
    fn from(value: TokenUsage) -> Self {
        Self {
            prompt_token_count: value.prompt_tokens,
            candidates_token_count: value.completion_tokens,
            total_token_count: value.total_tokens,
        }
    }
}

/// One normalized generation event. Every request produces any number of
/// `chunk` events followed by exactly one terminal `full` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatEvent {
    Chunk {
        text: String,
    },
    Full {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        token_usage: Option<UsagePayload>,
        #[serde(skip_serializing_if = "Option::is_none")]
        model: Option<String>,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
}

impl ChatEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Full { .. } | Self::Error { .. })
    }
}

impl From<ChatError> for ChatEvent {
    fn from(value: ChatError) -> Self {
        Self::Error {
            code: value.code,
            message: value.message,
        }
    }
}

pub type ChatEventStream<'a> = Pin<Box<dyn Stream<Item = ChatEvent> + Send + 'a>>;

/// Everything one conversation turn needs: the caller's resolved
/// configuration (read-only for the duration of the call), the rendering
/// context from the data layer, the transcript, the caller's credential
/// pool, and the cooperative cancellation signal.
pub struct TurnRequest {
    pub user_id: UserId,
    pub config: UserLlmConfig,
    pub context: PromptContext,
    pub history: Vec<ChatMessage>,
    pub pool: Arc<CredentialPool>,
    pub model_override: Option<String>,
    pub cancel: CancelSignal,
}

impl TurnRequest {
    pub fn new(user_id: impl Into<UserId>, config: UserLlmConfig, pool: Arc<CredentialPool>) -> Self {
        Self {
            user_id: user_id.into(),
            config,
            context: PromptContext::new(),
            history: Vec::new(),
            pool,
            model_override: None,
            cancel: CancelSignal::new(),
        }
    }

    pub fn with_context(mut self, context: PromptContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn with_model_override(mut self, model: impl Into<String>) -> Self {
        self.model_override = Some(model.into());
        self
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }
}
