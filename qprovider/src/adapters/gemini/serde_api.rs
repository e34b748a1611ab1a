//! Gemini HTTP payload serde models and conversion helpers.

use serde::{Deserialize, Serialize};

use crate::{ModelInfo, ProviderError, TokenUsage};

use super::types::{GeminiRequest, GeminiResponse};

/// The four harm categories, all left unblocked; the relay surfaces the
/// backend's own safety verdicts instead of pre-filtering.
const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

const SAFETY_FINISH_REASON: &str = "SAFETY";

pub(crate) fn build_api_request(
    request: &GeminiRequest,
) -> Result<GeminiApiRequest, ProviderError> {
    let system_instruction = if request.system_instruction.trim().is_empty() {
        None
    } else {
        Some(GeminiApiContent {
            role: None,
            parts: vec![GeminiApiPart {
                text: request.system_instruction.clone(),
            }],
        })
    };

    let contents = request
        .contents
        .iter()
        .map(|message| GeminiApiContent {
            role: Some(message.role.as_str().to_string()),
            parts: vec![GeminiApiPart {
                text: message.content.clone(),
            }],
        })
        .collect();

    let tools = if request.tools.is_empty() {
        None
    } else {
        let declarations = request
            .tools
            .iter()
            .map(|tool| {
                let parameters = serde_json::from_str::<serde_json::Value>(
                    &tool.parameters_schema,
                )
                .map_err(|_| {
                    ProviderError::invalid_request(format!(
                        "tool '{}' parameter schema must be valid JSON",
                        tool.name,
                    ))
                })?;

                Ok(GeminiApiFunctionDeclaration {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters,
                })
            })
            .collect::<Result<Vec<_>, ProviderError>>()?;

        Some(vec![GeminiApiTool {
            function_declarations: declarations,
        }])
    };

    Ok(GeminiApiRequest {
        system_instruction,
        contents,
        tools,
        generation_config: GeminiApiGenerationConfig {
            temperature: request.sampling.temperature,
            top_p: request.sampling.top_p,
            max_output_tokens: request.sampling.max_output_tokens,
        },
        safety_settings: SAFETY_CATEGORIES
            .iter()
            .map(|category| GeminiApiSafetySetting {
                category: category.to_string(),
                threshold: "BLOCK_NONE".to_string(),
            })
            .collect(),
    })
}

pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<GeminiApiErrorEnvelope>(body).ok()?;
    Some(parsed.error.message)
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeminiApiErrorEnvelope {
    pub error: GeminiApiError,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeminiApiError {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiApiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiApiContent>,
    pub contents: Vec<GeminiApiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<GeminiApiTool>>,
    pub generation_config: GeminiApiGenerationConfig,
    pub safety_settings: Vec<GeminiApiSafetySetting>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiApiTool {
    pub function_declarations: Vec<GeminiApiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GeminiApiFunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct GeminiApiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiApiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct GeminiApiPart {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiApiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GeminiApiSafetySetting {
    pub category: String,
    pub threshold: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiApiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiApiCandidate>,
    pub prompt_feedback: Option<GeminiApiPromptFeedback>,
    pub usage_metadata: Option<GeminiApiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiApiCandidate {
    pub content: Option<GeminiApiContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiApiPromptFeedback {
    pub block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiApiUsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
    #[serde(default)]
    pub total_token_count: u32,
}

impl GeminiApiUsageMetadata {
    pub(crate) fn into_usage(self) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_token_count,
            completion_tokens: self.candidates_token_count,
            total_tokens: self.total_token_count,
        }
    }
}

impl GeminiApiResponse {
    /// Rejects safety verdicts before any text is extracted; a blocked
    /// prompt must never look like an empty completion.
    pub(crate) fn reject_if_blocked(&self) -> Result<(), ProviderError> {
        if let Some(feedback) = &self.prompt_feedback {
            if let Some(reason) = &feedback.block_reason {
                return Err(ProviderError::safety_blocked(format!(
                    "prompt blocked by safety policy: {reason}",
                )));
            }
        }

        for candidate in &self.candidates {
            if candidate.finish_reason.as_deref() == Some(SAFETY_FINISH_REASON) {
                return Err(ProviderError::safety_blocked(
                    "completion stopped by safety policy",
                ));
            }
        }

        Ok(())
    }

    pub(crate) fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .map(|part| part.text.as_str())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    pub(crate) fn into_response(self, model: String) -> Result<GeminiResponse, ProviderError> {
        self.reject_if_blocked()?;
        let text = self.text();
        Ok(GeminiResponse {
            model,
            text,
            usage: self.usage_metadata.map(GeminiApiUsageMetadata::into_usage),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiApiModelList {
    #[serde(default)]
    pub models: Vec<GeminiApiModel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiApiModel {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_token_limit: u32,
    #[serde(default)]
    pub output_token_limit: u32,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl From<GeminiApiModel> for ModelInfo {
    fn from(value: GeminiApiModel) -> Self {
        ModelInfo {
            name: value.name,
            display_name: value.display_name,
            description: value.description,
            input_token_limit: value.input_token_limit,
            output_token_limit: value.output_token_limit,
            methods: value.supported_generation_methods,
        }
    }
}
