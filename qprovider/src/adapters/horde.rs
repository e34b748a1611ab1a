//! KoboldAI Horde provider: a shared-compute backend with anonymous access.
//!
//! The Horde runs generation as asynchronous jobs consumed over SSE, so
//! only streaming calls are supported; non-streaming calls are rejected
//! outright. With no key configured, the well-known anonymous key is used.

use std::pin::Pin;
use std::sync::Arc;

use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{
    BackendRequest, BoxedDeltaStream, CredentialPool, FailoverHooks, ModelProvider,
    NoopFailoverHooks, ProviderDelta, ProviderError, ProviderFuture, ProviderId, ProviderReply,
    Role, SecretString,
};

pub const HORDE_BASE_URL: &str = "https://koboldai.net/api";

/// Well-known shared key for anonymous Horde access.
pub const HORDE_ANONYMOUS_KEY: &str = "0000000000";

const HORDE_MAX_CONTEXT_LENGTH: u32 = 4096;
const HORDE_MAX_LENGTH: u32 = 1024;

/// Flattens the system prompt and transcript into the Horde's single-string
/// prompt encoding, with role labels and a trailing cue for the model.
fn flatten_prompt(request: &BackendRequest) -> String {
    let mut prompt = format!("{}\n\n", request.system_prompt.trim());
    for message in &request.history {
        match message.role {
            Role::User => {
                prompt.push_str("You: ");
            }
            Role::Model => {
                prompt.push_str("AI: ");
            }
        }
        prompt.push_str(&message.content);
        prompt.push('\n');
    }
    prompt.push_str("AI:");
    prompt
}

pub type HordeChunkStream<'a> =
    Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send + 'a>>;

pub trait HordeTransport: Send + Sync {
    fn submit_stream<'a>(
        &'a self,
        payload: HordeGeneratePayload,
        api_key: String,
    ) -> ProviderFuture<'a, Result<HordeChunkStream<'a>, ProviderError>>;
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HordeGeneratePayload {
    pub prompt: String,
    pub models: Vec<String>,
    pub params: HordeGenerateParams,
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HordeGenerateParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_context_length: u32,
    pub max_length: u32,
}

#[derive(Debug, Clone)]
pub struct HordeHttpTransport {
    client: Client,
    base_url: String,
}

impl HordeHttpTransport {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: HORDE_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl HordeTransport for HordeHttpTransport {
    fn submit_stream<'a>(
        &'a self,
        payload: HordeGeneratePayload,
        api_key: String,
    ) -> ProviderFuture<'a, Result<HordeChunkStream<'a>, ProviderError>> {
        Box::pin(async move {
            let url = format!(
                "{}/v2/generate/text/async",
                self.base_url.trim_end_matches('/')
            );
            let response = self
                .client
                .post(url)
                .header("apikey", api_key)
                .json(&payload)
                .send()
                .await
                .map_err(|err| {
                    if err.is_timeout() {
                        ProviderError::timeout(err.to_string())
                    } else {
                        ProviderError::transport(err.to_string())
                    }
                })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = format!("Horde request failed with status {status}: {body}");
                return Err(match status.as_u16() {
                    401 | 403 => ProviderError::authentication(message),
                    429 => ProviderError::rate_limited(message),
                    503 => ProviderError::unavailable(message),
                    _ => ProviderError::transport(message),
                });
            }

            let stream = try_stream! {
                let mut chunks = response.bytes_stream();
                let mut sse_buffer = String::new();
                let mut finished = false;

                while let Some(item) = chunks.next().await {
                    let bytes = item.map_err(|err| ProviderError::transport(err.to_string()))?;
                    let text = std::str::from_utf8(&bytes)
                        .map_err(|err| ProviderError::transport(err.to_string()))?;
                    sse_buffer.push_str(text);

                    while let Some(newline_index) = sse_buffer.find('\n') {
                        let line = sse_buffer.drain(..=newline_index).collect::<String>();
                        let line = line.trim();

                        if !line.starts_with("data:") {
                            continue;
                        }

                        let payload = line.trim_start_matches("data:").trim();
                        let event = match serde_json::from_str::<HordeStreamEvent>(payload) {
                            Ok(event) => event,
                            Err(_) => continue,
                        };

                        if let Some(generation) = event.generation {
                            if !generation.is_empty() {
                                yield generation;
                            }
                        } else if event.finished.is_some() {
                            finished = true;
                            break;
                        }
                    }

                    if finished {
                        break;
                    }
                }
            };

            Ok(Box::pin(stream) as HordeChunkStream<'a>)
        })
    }
}

#[derive(Debug, Deserialize)]
struct HordeStreamEvent {
    generation: Option<String>,
    finished: Option<serde_json::Value>,
}

#[derive(Clone)]
pub struct HordeProvider {
    transport: Arc<dyn HordeTransport>,
    hooks: Arc<dyn FailoverHooks>,
    api_key: Option<Arc<SecretString>>,
}

impl HordeProvider {
    pub fn new(transport: Arc<dyn HordeTransport>) -> Self {
        Self {
            transport,
            hooks: Arc::new(NoopFailoverHooks),
            api_key: None,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn FailoverHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(Arc::new(SecretString::new(api_key)));
        self
    }

    /// Dedicated key if configured, otherwise the pool's first credential,
    /// otherwise the anonymous shared key.
    fn resolve_api_key(&self, pool: &CredentialPool) -> String {
        if let Some(api_key) = &self.api_key {
            return api_key.expose().to_string();
        }

        pool.with_key(0, str::to_string)
            .unwrap_or_else(|| HORDE_ANONYMOUS_KEY.to_string())
    }

    fn build_payload(request: &BackendRequest) -> HordeGeneratePayload {
        HordeGeneratePayload {
            prompt: flatten_prompt(request),
            models: request.model_pool.clone(),
            params: HordeGenerateParams {
                temperature: request.sampling.temperature.unwrap_or(0.8),
                top_p: request.sampling.top_p.unwrap_or(0.9),
                max_context_length: HORDE_MAX_CONTEXT_LENGTH,
                max_length: HORDE_MAX_LENGTH,
            },
            stream: true,
        }
    }
}

impl ModelProvider for HordeProvider {
    fn id(&self) -> ProviderId {
        ProviderId::KoboldHorde
    }

    fn requires_user_credentials(&self) -> bool {
        false
    }

    fn call<'a>(
        &'a self,
        pool: &'a CredentialPool,
        request: BackendRequest,
    ) -> ProviderFuture<'a, Result<ProviderReply<'a>, ProviderError>> {
        Box::pin(async move {
            request.validate()?;

            if !request.stream {
                return Err(ProviderError::unsupported(
                    "the Horde backend only supports streaming generation",
                ));
            }

            let model = request
                .model_pool
                .first()
                .cloned()
                .unwrap_or_else(|| "Unknown Horde Model".to_string());
            self.hooks
                .on_attempt_start(ProviderId::KoboldHorde, &model, 0);

            let payload = Self::build_payload(&request);
            let api_key = self.resolve_api_key(pool);

            match self.transport.submit_stream(payload, api_key).await {
                Ok(mut chunks) => {
                    self.hooks.on_success(ProviderId::KoboldHorde, &model, 0, 1);
                    let deltas = try_stream! {
                        while let Some(chunk) = chunks.next().await {
                            yield ProviderDelta::Text(chunk?);
                        }
                    };

                    Ok(ProviderReply::Stream {
                        deltas: Box::pin(deltas) as BoxedDeltaStream<'a>,
                        model,
                    })
                }
                Err(error) => {
                    self.hooks
                        .on_attempt_failure(ProviderId::KoboldHorde, &model, 0, &error);
                    Err(error)
                }
            }
        })
    }
}
