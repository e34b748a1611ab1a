#![cfg(feature = "provider-horde")]

//! Behavior of the shared-compute Horde provider.

use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use qcommon::SamplingOptions;
use qprovider::adapters::horde::{
    HORDE_ANONYMOUS_KEY, HordeChunkStream, HordeGeneratePayload, HordeProvider, HordeTransport,
};
use qprovider::{
    BackendRequest, ChatMessage, CredentialPool, ModelProvider, ProviderDelta, ProviderError,
    ProviderErrorKind, ProviderFuture, ProviderId, ProviderReply, Role,
};

#[derive(Default)]
struct RecordingTransport {
    captured: Mutex<Vec<(HordeGeneratePayload, String)>>,
    fail_with: Option<ProviderError>,
}

impl HordeTransport for RecordingTransport {
    fn submit_stream<'a>(
        &'a self,
        payload: HordeGeneratePayload,
        api_key: String,
    ) -> ProviderFuture<'a, Result<HordeChunkStream<'a>, ProviderError>> {
        Box::pin(async move {
            self.captured
                .lock()
                .expect("capture lock")
                .push((payload, api_key));

            if let Some(error) = &self.fail_with {
                return Err(error.clone());
            }

            let chunks = futures_util::stream::iter(vec![
                Ok("Once upon".to_string()),
                Ok(" a time".to_string()),
            ]);
            Ok(Box::pin(chunks) as HordeChunkStream<'a>)
        })
    }
}

fn streaming_request() -> BackendRequest {
    BackendRequest::new(
        vec!["Chronos-Hermes-13b".to_string(), "Mythomax-L2-13b".to_string()],
        "You are a storyteller.",
        vec![
            ChatMessage::new(Role::User, "Start a story"),
            ChatMessage::new(Role::Model, "Gladly."),
            ChatMessage::new(Role::User, "Go on"),
        ],
    )
    .with_sampling(SamplingOptions::default().with_temperature(0.65).with_top_p(0.92))
    .enable_streaming()
}

#[tokio::test]
async fn the_whole_model_pool_is_submitted_with_the_job() {
    let transport = Arc::new(RecordingTransport::default());
    let provider = HordeProvider::new(transport.clone());
    let pool = CredentialPool::new(Vec::new());

    let reply = provider
        .call(&pool, streaming_request())
        .await
        .expect("streaming call works");

    match reply {
        ProviderReply::Stream { model, .. } => assert_eq!(model, "Chronos-Hermes-13b"),
        ProviderReply::Complete { .. } => panic!("expected a stream reply"),
    }

    let captured = transport.captured.lock().expect("capture lock");
    let (payload, api_key) = &captured[0];
    assert_eq!(
        payload.models,
        vec!["Chronos-Hermes-13b".to_string(), "Mythomax-L2-13b".to_string()]
    );
    assert_eq!(api_key, HORDE_ANONYMOUS_KEY);
    assert!(payload.prompt.starts_with("You are a storyteller."));
    assert!(payload.prompt.ends_with("AI:"));
    assert!(payload.prompt.contains("You: Start a story"));
    assert!(payload.prompt.contains("AI: Gladly."));
}

#[tokio::test]
async fn chunks_are_forwarded_in_order() {
    let transport = Arc::new(RecordingTransport::default());
    let provider = HordeProvider::new(transport);
    let pool = CredentialPool::new(Vec::new());

    let reply = provider
        .call(&pool, streaming_request())
        .await
        .expect("streaming call works");

    let mut deltas = match reply {
        ProviderReply::Stream { deltas, .. } => deltas,
        ProviderReply::Complete { .. } => panic!("expected a stream reply"),
    };

    let mut collected = Vec::new();
    while let Some(delta) = deltas.next().await {
        collected.push(delta.expect("ok delta"));
    }
    assert_eq!(
        collected,
        vec![
            ProviderDelta::Text("Once upon".to_string()),
            ProviderDelta::Text(" a time".to_string()),
        ]
    );
}

#[tokio::test]
async fn pool_credentials_take_precedence_over_anonymous_access() {
    let transport = Arc::new(RecordingTransport::default());
    let provider = HordeProvider::new(transport.clone());
    let pool = CredentialPool::new(["user-horde-key".to_string()]);

    let _reply = provider
        .call(&pool, streaming_request())
        .await
        .expect("streaming call works");

    let captured = transport.captured.lock().expect("capture lock");
    assert_eq!(captured[0].1, "user-horde-key");
}

#[tokio::test]
async fn non_streaming_calls_are_unsupported() {
    let transport = Arc::new(RecordingTransport::default());
    let provider = HordeProvider::new(transport.clone());
    let pool = CredentialPool::new(Vec::new());

    let mut request = streaming_request();
    request.stream = false;

    let error = provider
        .call(&pool, request)
        .await
        .expect_err("non-streaming is rejected");
    assert_eq!(error.kind, ProviderErrorKind::Unsupported);
    assert!(transport.captured.lock().expect("capture lock").is_empty());
}

#[tokio::test]
async fn transport_failures_propagate_without_retries() {
    let transport = Arc::new(RecordingTransport {
        fail_with: Some(ProviderError::rate_limited("horde queue is full")),
        ..RecordingTransport::default()
    });
    let provider = HordeProvider::new(transport.clone());
    let pool = CredentialPool::new(Vec::new());

    let error = provider
        .call(&pool, streaming_request())
        .await
        .expect_err("transport failure propagates");
    assert_eq!(error.kind, ProviderErrorKind::RateLimited);
    assert_eq!(transport.captured.lock().expect("capture lock").len(), 1);
}

#[test]
fn the_horde_does_not_require_user_credentials() {
    struct NeverTransport;

    impl HordeTransport for NeverTransport {
        fn submit_stream<'a>(
            &'a self,
            _payload: HordeGeneratePayload,
            _api_key: String,
        ) -> ProviderFuture<'a, Result<HordeChunkStream<'a>, ProviderError>> {
            Box::pin(async move { Err(ProviderError::other("not used")) })
        }
    }

    let provider = HordeProvider::new(Arc::new(NeverTransport));
    assert!(!provider.requires_user_credentials());
    assert_eq!(provider.id(), ProviderId::KoboldHorde);
}
