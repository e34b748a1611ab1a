//! Focused unit tests for Gemini adapter internals.

#![cfg(test)]

use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use qcommon::SamplingOptions;

use crate::{
    BackendRequest, ChatMessage, CredentialPool, ModelCatalog, ModelInfo, ModelProvider,
    ProviderDelta, ProviderError, ProviderErrorKind, ProviderFuture, ProviderReply, Role,
    VecDeltaStream,
};

use super::provider::GeminiProvider;
use super::transport::{GeminiChunkStream, GeminiTransport};
use super::types::{GeminiRequest, GeminiResponse, GeminiStreamChunk};

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttemptRecord {
    model: String,
    api_key: String,
}

#[derive(Default)]
struct ScriptedTransport {
    attempts: Mutex<Vec<AttemptRecord>>,
    /// (model, api_key) pairs that succeed; everything else fails transport.
    succeed_on: Vec<(&'static str, &'static str)>,
    safety_block: bool,
}

impl ScriptedTransport {
    fn record(&self, request: &GeminiRequest, api_key: &str) {
        self.attempts.lock().expect("attempts lock").push(AttemptRecord {
            model: request.model.clone(),
            api_key: api_key.to_string(),
        });
    }

    fn outcome(&self, request: &GeminiRequest, api_key: &str) -> Result<(), ProviderError> {
        if self.safety_block {
            return Err(ProviderError::safety_blocked("prompt blocked"));
        }

        let matched = self
            .succeed_on
            .iter()
            .any(|(model, key)| *model == request.model && *key == api_key);
        if matched {
            Ok(())
        } else {
            Err(ProviderError::transport("backend unreachable"))
        }
    }
}

impl GeminiTransport for ScriptedTransport {
    fn generate<'a>(
        &'a self,
        request: GeminiRequest,
        api_key: String,
    ) -> ProviderFuture<'a, Result<GeminiResponse, ProviderError>> {
        Box::pin(async move {
            self.record(&request, &api_key);
            self.outcome(&request, &api_key)?;
            Ok(GeminiResponse {
                model: request.model,
                text: "generated text".to_string(),
                usage: None,
            })
        })
    }

    fn stream_generate<'a>(
        &'a self,
        request: GeminiRequest,
        api_key: String,
    ) -> ProviderFuture<'a, Result<GeminiChunkStream<'a>, ProviderError>> {
        Box::pin(async move {
            self.record(&request, &api_key);
            self.outcome(&request, &api_key)?;
            let chunks = futures_util::stream::iter(vec![
                Ok(GeminiStreamChunk::TextDelta("streamed".to_string())),
                Ok(GeminiStreamChunk::TextDelta(" text".to_string())),
            ]);
            Ok(Box::pin(chunks) as GeminiChunkStream<'a>)
        })
    }

    fn list_models<'a>(
        &'a self,
        _api_key: String,
    ) -> ProviderFuture<'a, Result<Vec<ModelInfo>, ProviderError>> {
        Box::pin(async move {
            Ok(vec![ModelInfo {
                name: "models/gemini-1.5-pro-latest".to_string(),
                display_name: "Gemini 1.5 Pro".to_string(),
                description: String::new(),
                input_token_limit: 2097152,
                output_token_limit: 8192,
                methods: vec!["generateContent".to_string()],
            }])
        })
    }
}

fn request(models: &[&str], stream: bool) -> BackendRequest {
    let mut request = BackendRequest::new(
        models.iter().map(|m| m.to_string()).collect(),
        "system prompt",
        vec![ChatMessage::new(Role::User, "hello")],
    )
    .with_sampling(SamplingOptions::default().with_temperature(0.8));

    if stream {
        request = request.enable_streaming();
    }

    request
}

#[tokio::test]
async fn complete_call_succeeds_with_first_candidate_and_promotes_key() {
    let transport = Arc::new(ScriptedTransport {
        succeed_on: vec![("model-a", "key-0")],
        ..ScriptedTransport::default()
    });
    let provider = GeminiProvider::new(transport.clone());
    let pool = CredentialPool::new(["key-0".to_string(), "key-1".to_string()]);

    let reply = provider
        .call(&pool, request(&["model-a"], false))
        .await
        .expect("call should succeed");

    match reply {
        ProviderReply::Complete { text, model, .. } => {
            assert_eq!(text, "generated text");
            assert_eq!(model, "model-a");
        }
        ProviderReply::Stream { .. } => panic!("expected a complete reply"),
    }

    assert_eq!(transport.attempts.lock().expect("attempts lock").len(), 1);
    assert_eq!(pool.available_indices().expect("pool lock"), vec![0, 1]);
}

#[tokio::test]
async fn streaming_call_reports_success_once_stream_is_established() {
    let transport = Arc::new(ScriptedTransport {
        succeed_on: vec![("model-a", "key-1")],
        ..ScriptedTransport::default()
    });
    let provider = GeminiProvider::new(transport.clone());
    let pool = CredentialPool::new(["key-0".to_string(), "key-1".to_string()]);

    let reply = provider
        .call(&pool, request(&["model-a"], true))
        .await
        .expect("call should succeed via key-1");

    let mut deltas = match reply {
        ProviderReply::Stream { deltas, model } => {
            assert_eq!(model, "model-a");
            deltas
        }
        ProviderReply::Complete { .. } => panic!("expected a stream reply"),
    };

    let first = deltas.next().await.expect("first delta").expect("ok delta");
    assert_eq!(first, ProviderDelta::Text("streamed".to_string()));

    // key-1 succeeded and is now priority-first; key-0 is cooling down.
    assert_eq!(pool.available_indices().expect("pool lock"), vec![1]);
}

#[tokio::test]
async fn safety_block_is_terminal_without_further_attempts() {
    let transport = Arc::new(ScriptedTransport {
        safety_block: true,
        ..ScriptedTransport::default()
    });
    let provider = GeminiProvider::new(transport.clone());
    let pool = CredentialPool::new(["key-0".to_string(), "key-1".to_string()]);

    let error = provider
        .call(&pool, request(&["model-a", "model-b"], false))
        .await
        .expect_err("safety block must fail the request");

    assert_eq!(error.kind, ProviderErrorKind::SafetyBlocked);
    assert_eq!(transport.attempts.lock().expect("attempts lock").len(), 1);
    // The blocked attempt is not held against the credential.
    assert_eq!(pool.available_indices().expect("pool lock"), vec![0, 1]);
}

#[tokio::test]
async fn empty_pool_and_cooling_pool_fail_with_distinct_kinds() {
    let transport = Arc::new(ScriptedTransport::default());
    let provider = GeminiProvider::new(transport.clone());

    let empty = CredentialPool::new(Vec::new());
    let error = provider
        .call(&empty, request(&["model-a"], false))
        .await
        .expect_err("empty pool must fail");
    assert_eq!(error.kind, ProviderErrorKind::NoCredentials);

    let cooling = CredentialPool::new(["key-0".to_string()]);
    cooling.report_failure(0).expect("pool lock");
    let error = provider
        .call(&cooling, request(&["model-a"], false))
        .await
        .expect_err("cooling pool must fail");
    assert_eq!(error.kind, ProviderErrorKind::CoolingDown);

    // Neither condition reached the transport.
    assert!(transport.attempts.lock().expect("attempts lock").is_empty());
}

#[tokio::test]
async fn exhaustion_carries_the_last_underlying_error() {
    let transport = Arc::new(ScriptedTransport::default());
    let provider = GeminiProvider::new(transport.clone());
    let pool = CredentialPool::new(["key-0".to_string()]);

    let error = provider
        .call(&pool, request(&["model-a", "model-b"], false))
        .await
        .expect_err("everything fails");

    assert_eq!(error.kind, ProviderErrorKind::Exhausted);
    assert!(error.message.contains("backend unreachable"));
    assert_eq!(transport.attempts.lock().expect("attempts lock").len(), 2);
}

#[tokio::test]
async fn catalog_delegates_to_transport() {
    let transport = Arc::new(ScriptedTransport::default());
    let provider = GeminiProvider::new(transport);

    let models = provider.list_models("key-0").await.expect("listing works");
    assert_eq!(models.len(), 1);
    assert!(models[0].supports_generation());
}

#[test]
fn vec_delta_stream_is_usable_as_a_reply_body() {
    let stream = VecDeltaStream::new(vec![Ok(ProviderDelta::Text("chunk".to_string()))]);
    let _reply = ProviderReply::Stream {
        deltas: Box::pin(stream),
        model: "model-a".to_string(),
    };
}
