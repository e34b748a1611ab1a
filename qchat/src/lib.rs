//! Conversation-side core of the quill LLM relay: prompt assembly, history
//! truncation, generation orchestration, and the normalized event stream.

mod config;
mod error;
mod orchestrator;
mod prompt;
mod sse;
mod truncate;
mod types;

pub mod prelude {
    pub use crate::{
        ChatError, ChatEvent, ChatEventStream, ErrorCode, GenerationOrchestrator, ModuleKind,
        Preset, PromptContext, PromptModule, TurnRequest, UsagePayload, UserLlmConfig, assemble,
        encode_frame, truncate_history,
    };
    pub use qcommon::{CancelSignal, SamplingOptions, UserId};
}

pub use config::{
    DEFAULT_HORDE_MODEL, DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_TEMPERATURE, DEFAULT_TOP_P, Preset,
    UserLlmConfig,
};
pub use error::{ChatError, ErrorCode};
pub use orchestrator::{DEFAULT_FALLBACK_MODEL, GenerationOrchestrator};
pub use prompt::{
    HISTORY_MARKER, ModuleKind, PromptContext, PromptModule, TIME_KEY, assemble, render_template,
};
pub use sse::encode_frame;
pub use truncate::{CONTEXT_TOKEN_BUDGET, estimate_tokens, truncate_history};
pub use types::{ChatEvent, ChatEventStream, TurnRequest, UsagePayload};
