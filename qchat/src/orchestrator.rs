//! Top-level generation orchestration.
//!
//! One request flows: validate preconditions → assemble the system prompt →
//! truncate history → select the model pool → dispatch to the provider →
//! normalize the backend stream into [`ChatEvent`]s. Failures at any stage
//! become a terminal `error` event; the stream always ends with exactly one
//! terminal event and never propagates an unhandled fault.

use std::sync::Arc;

use async_stream::stream;
use futures_util::StreamExt;

use crate::{
    CONTEXT_TOKEN_BUDGET, ChatError, ChatEvent, ChatEventStream, TurnRequest, UsagePayload,
    assemble, truncate_history,
};
use qprovider::{
    BackendRequest, ProviderDelta, ProviderId, ProviderRegistry, ProviderReply,
};

/// Last-resort model when neither an override nor a verified pool is
/// usable; requests are never dropped for want of a model pool.
pub const DEFAULT_FALLBACK_MODEL: &str = "models/gemini-1.5-pro-latest";

pub struct GenerationOrchestrator {
    registry: Arc<ProviderRegistry>,
}

impl GenerationOrchestrator {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    /// Runs one generation turn, yielding normalized events.
    ///
    /// Cancellation is observed before dispatch and between every chunk;
    /// once seen, upstream consumption stops and a single `USER_ABORTED`
    /// terminal is emitted. No retries happen after cancellation.
    pub fn generate<'a>(&'a self, request: TurnRequest) -> ChatEventStream<'a> {
        Box::pin(stream! {
            if let Err(error) = request.config.validate() {
                yield ChatEvent::from(error);
                return;
            }

            let provider = match self
                .registry
                .resolve(&request.config.provider, &request.config.provider_settings())
            {
                Ok(provider) => provider,
                Err(error) => {
                    yield ChatEvent::from(ChatError::from(error));
                    return;
                }
            };

            // Configuration problems fail fast, before any network call.
            if provider.requires_user_credentials() {
                if request.pool.is_empty() {
                    yield ChatEvent::from(ChatError::api_key_required(
                        "this provider needs an API key; add one in settings and connect",
                    ));
                    return;
                }

                match request.pool.has_verified_models() {
                    Ok(true) => {}
                    Ok(false) => {
                        yield ChatEvent::from(ChatError::models_not_checked(
                            "the provider connection has not been checked; verify models in settings",
                        ));
                        return;
                    }
                    Err(error) => {
                        yield ChatEvent::from(ChatError::from(error));
                        return;
                    }
                }
            }

            if request.cancel.is_cancelled() {
                yield ChatEvent::from(ChatError::user_aborted("generation aborted by the user"));
                return;
            }

            let system_prompt = assemble(&request.config.preset.modules, &request.context);
            if system_prompt.trim().is_empty() {
                yield ChatEvent::from(ChatError::invalid_preset(format!(
                    "the active preset '{}' is empty or invalid",
                    request.config.preset.name,
                )));
                return;
            }

            let history = truncate_history(&system_prompt, &request.history, CONTEXT_TOKEN_BUDGET);

            let model_pool = match self.select_model_pool(&request, provider.id()) {
                Ok(model_pool) => model_pool,
                Err(error) => {
                    yield ChatEvent::from(error);
                    return;
                }
            };

            let backend_request = BackendRequest::new(model_pool, system_prompt, history)
                .with_sampling(request.config.sampling())
                .enable_streaming();

            match provider.call(request.pool.as_ref(), backend_request).await {
                Err(error) => {
                    yield ChatEvent::from(ChatError::from(error));
                }
                Ok(ProviderReply::Complete { text, model, usage }) => {
                    let trimmed = text.trim();
                    if trimmed.is_empty() {
                        yield ChatEvent::from(ChatError::empty_response(
                            "the model produced no usable content",
                        ));
                    } else {
                        yield ChatEvent::Full {
                            text: trimmed.to_string(),
                            token_usage: usage.map(UsagePayload::from),
                            model: Some(short_model_name(&model)),
                        };
                    }
                }
                Ok(ProviderReply::Stream { mut deltas, model }) => {
                    let mut full_text = String::new();
                    let mut usage = None;
                    let mut aborted = false;

                    loop {
                        if request.cancel.is_cancelled() {
                            aborted = true;
                            break;
                        }

                        match deltas.next().await {
                            None => break,
                            Some(Ok(ProviderDelta::Text(chunk))) => {
                                if chunk.is_empty() {
                                    continue;
                                }
                                full_text.push_str(&chunk);
                                yield ChatEvent::Chunk { text: chunk };
                            }
                            Some(Ok(ProviderDelta::Usage(value))) => usage = Some(value),
                            Some(Err(error)) => {
                                yield ChatEvent::from(ChatError::from(error));
                                return;
                            }
                        }
                    }

                    // Cancellation stops upstream consumption here; buffered
                    // remainder is dropped with the stream.
                    drop(deltas);

                    if aborted {
                        yield ChatEvent::from(ChatError::user_aborted(
                            "generation aborted by the user",
                        ));
                        return;
                    }

                    let trimmed = full_text.trim();
                    if trimmed.is_empty() {
                        yield ChatEvent::from(ChatError::empty_response(
                            "the model produced no usable content",
                        ));
                        return;
                    }

                    yield ChatEvent::Full {
                        text: trimmed.to_string(),
                        token_usage: usage.map(UsagePayload::from),
                        model: Some(short_model_name(&model)),
                    };
                }
            };
        })
    }

    /// Override > verified/configured pool > hardcoded fallback.
    fn select_model_pool(
        &self,
        request: &TurnRequest,
        provider_id: ProviderId,
    ) -> Result<Vec<String>, ChatError> {
        if let Some(model) = &request.model_override {
            return Ok(vec![model.clone()]);
        }

        let configured = match provider_id {
            ProviderId::KoboldHorde => request.config.horde_models.clone(),
            ProviderId::GoogleGemini => request
                .pool
                .verified_models()?
                .into_iter()
                .map(|model| model.name)
                .collect(),
        };

        if !configured.is_empty() {
            return Ok(configured);
        }

        Ok(match provider_id {
            ProviderId::KoboldHorde => vec![crate::DEFAULT_HORDE_MODEL.to_string()],
            ProviderId::GoogleGemini => vec![DEFAULT_FALLBACK_MODEL.to_string()],
        })
    }
}

fn short_model_name(model: &str) -> String {
    model.rsplit('/').next().unwrap_or(model).to_string()
}
