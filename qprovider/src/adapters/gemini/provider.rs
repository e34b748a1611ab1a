//! Gemini provider: nested model × credential failover over the transport.

use std::sync::Arc;

use async_stream::try_stream;
use futures_util::StreamExt;
use qcommon::BoxFuture;

use crate::{
    BackendRequest, BoxedDeltaStream, CredentialPool, FailoverHooks, ModelCatalog, ModelInfo,
    ModelProvider, NoopFailoverHooks, ProviderDelta, ProviderError, ProviderErrorKind,
    ProviderFuture, ProviderId, ProviderReply,
};

use super::transport::GeminiTransport;
use super::types::GeminiRequest;

#[derive(Clone)]
pub struct GeminiProvider {
    transport: Arc<dyn GeminiTransport>,
    hooks: Arc<dyn FailoverHooks>,
}

impl GeminiProvider {
    pub fn new(transport: Arc<dyn GeminiTransport>) -> Self {
        Self {
            transport,
            hooks: Arc::new(NoopFailoverHooks),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn FailoverHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    async fn attempt<'a>(
        &'a self,
        request: &BackendRequest,
        model: &str,
        api_key: String,
    ) -> Result<ProviderReply<'a>, ProviderError> {
        let candidate = GeminiRequest::for_candidate(request, model);

        if request.stream {
            let mut chunks = self.transport.stream_generate(candidate, api_key).await?;
            let deltas = try_stream! {
                while let Some(chunk) = chunks.next().await {
                    yield ProviderDelta::from(chunk?);
                }
            };

            Ok(ProviderReply::Stream {
                deltas: Box::pin(deltas) as BoxedDeltaStream<'a>,
                model: model.to_string(),
            })
        } else {
            let response = self.transport.generate(candidate, api_key).await?;
            Ok(ProviderReply::Complete {
                text: response.text,
                model: response.model,
                usage: response.usage,
            })
        }
    }
}

impl ModelProvider for GeminiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::GoogleGemini
    }

    fn call<'a>(
        &'a self,
        pool: &'a CredentialPool,
        request: BackendRequest,
    ) -> ProviderFuture<'a, Result<ProviderReply<'a>, ProviderError>> {
        Box::pin(async move {
            request.validate()?;

            if pool.is_empty() {
                return Err(ProviderError::no_credentials(
                    "Gemini calls require at least one API key",
                ));
            }

            // One availability snapshot per call: a credential that fails on
            // one model stays eligible for the remaining models of this
            // request; the cooldown filter applies to the next request.
            let candidates = pool.available_indices()?;
            if candidates.is_empty() {
                return Err(ProviderError::cooling_down(
                    "all Gemini API keys are currently cooling down",
                ));
            }

            let mut attempts = 0_u32;
            let mut last_error = None;

            for model in &request.model_pool {
                for &key_index in &candidates {
                    attempts += 1;
                    self.hooks
                        .on_attempt_start(ProviderId::GoogleGemini, model, key_index);
                    pool.activate(key_index)?;

                    let api_key = pool.with_key(key_index, str::to_string).ok_or_else(|| {
                        ProviderError::other(format!("credential index {key_index} out of range"))
                    })?;

                    match self.attempt(&request, model, api_key).await {
                        Ok(reply) => {
                            pool.report_success(key_index)?;
                            self.hooks.on_success(
                                ProviderId::GoogleGemini,
                                model,
                                key_index,
                                attempts,
                            );
                            return Ok(reply);
                        }
                        Err(error) => {
                            if error.kind == ProviderErrorKind::SafetyBlocked {
                                // Terminal for the whole request; no other
                                // credential or model is tried.
                                return Err(error);
                            }

                            self.hooks.on_attempt_failure(
                                ProviderId::GoogleGemini,
                                model,
                                key_index,
                                &error,
                            );
                            pool.report_failure(key_index)?;
                            last_error = Some(error);
                        }
                    }
                }
            }

            let last = last_error
                .unwrap_or_else(|| ProviderError::other("no generation attempts were made"));
            self.hooks
                .on_exhausted(ProviderId::GoogleGemini, attempts, &last);
            Err(ProviderError::exhausted(format!(
                "every Gemini model and API key combination failed; last error: {last}",
            )))
        })
    }
}

impl ModelCatalog for GeminiProvider {
    fn list_models<'a>(
        &'a self,
        api_key: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ModelInfo>, ProviderError>> {
        Box::pin(async move { self.transport.list_models(api_key.to_string()).await })
    }
}
