//! Gemini adapter types and provider-agnostic conversion logic.

use qcommon::SamplingOptions;

use crate::{BackendRequest, ChatMessage, ProviderDelta, TokenUsage, ToolDefinition};

/// One generation exchange against a single (model, credential) candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct GeminiRequest {
    pub model: String,
    pub system_instruction: String,
    pub contents: Vec<ChatMessage>,
    pub sampling: SamplingOptions,
    pub tools: Vec<ToolDefinition>,
    pub stream: bool,
}

impl GeminiRequest {
    pub(crate) fn for_candidate(request: &BackendRequest, model: &str) -> Self {
        Self {
            model: model.to_string(),
            system_instruction: request.system_prompt.clone(),
            contents: request.history.clone(),
            sampling: request.sampling,
            tools: request.tools.clone(),
            stream: request.stream,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiResponse {
    pub model: String,
    pub text: String,
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeminiStreamChunk {
    TextDelta(String),
    UsageReport(TokenUsage),
}

impl From<GeminiStreamChunk> for ProviderDelta {
    fn from(value: GeminiStreamChunk) -> Self {
        match value {
            GeminiStreamChunk::TextDelta(delta) => ProviderDelta::Text(delta),
            GeminiStreamChunk::UsageReport(usage) => ProviderDelta::Usage(usage),
        }
    }
}
