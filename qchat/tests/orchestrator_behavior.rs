//! End-to-end behavior of the generation orchestrator over fake providers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::StreamExt;

use qchat::{
    ChatEvent, ErrorCode, GenerationOrchestrator, Preset, PromptContext, PromptModule,
    TurnRequest, UserLlmConfig,
};
use qcommon::CancelSignal;
use qprovider::{
    BackendRequest, CredentialPool, ModelInfo, ModelProvider, ProviderDelta, ProviderError,
    ProviderFuture, ProviderId, ProviderRegistry, ProviderReply, TokenUsage, VecDeltaStream,
};

enum FakeReply {
    Stream(Vec<Result<ProviderDelta, ProviderError>>),
    Complete(String),
    Fail(ProviderError),
}

struct FakeProvider {
    reply: FakeReply,
    requires_credentials: bool,
    calls: AtomicUsize,
    captured: Mutex<Option<BackendRequest>>,
}

impl FakeProvider {
    fn streaming(deltas: Vec<Result<ProviderDelta, ProviderError>>) -> Self {
        Self {
            reply: FakeReply::Stream(deltas),
            requires_credentials: false,
            calls: AtomicUsize::new(0),
            captured: Mutex::new(None),
        }
    }

    fn completing(text: impl Into<String>) -> Self {
        Self {
            reply: FakeReply::Complete(text.into()),
            requires_credentials: false,
            calls: AtomicUsize::new(0),
            captured: Mutex::new(None),
        }
    }

    fn failing(error: ProviderError) -> Self {
        Self {
            reply: FakeReply::Fail(error),
            requires_credentials: false,
            calls: AtomicUsize::new(0),
            captured: Mutex::new(None),
        }
    }

    fn requiring_credentials(mut self) -> Self {
        self.requires_credentials = true;
        self
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ModelProvider for FakeProvider {
    fn id(&self) -> ProviderId {
        ProviderId::GoogleGemini
    }

    fn requires_user_credentials(&self) -> bool {
        self.requires_credentials
    }

    fn call<'a>(
        &'a self,
        _pool: &'a CredentialPool,
        request: BackendRequest,
    ) -> ProviderFuture<'a, Result<ProviderReply<'a>, ProviderError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let model = request
                .model_pool
                .first()
                .cloned()
                .unwrap_or_default();
            *self.captured.lock().expect("capture lock") = Some(request);

            match &self.reply {
                FakeReply::Stream(deltas) => Ok(ProviderReply::Stream {
                    deltas: Box::pin(VecDeltaStream::new(deltas.clone())),
                    model,
                }),
                FakeReply::Complete(text) => Ok(ProviderReply::Complete {
                    text: text.clone(),
                    model,
                    usage: None,
                }),
                FakeReply::Fail(error) => Err(error.clone()),
            }
        })
    }
}

fn registry_with(provider: Arc<FakeProvider>) -> Arc<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    registry.register(
        ProviderId::GoogleGemini,
        Arc::new(move |_settings| Ok(Arc::clone(&provider) as Arc<dyn ModelProvider>)),
    );
    Arc::new(registry)
}

fn narrative_config() -> UserLlmConfig {
    let preset = Preset::new("narrative")
        .with_module(PromptModule::literal("main", "You are {{char}}, stay in character."));
    UserLlmConfig::new("google_gemini", preset)
}

fn basic_request(config: UserLlmConfig) -> TurnRequest {
    TurnRequest::new("user-1", config, Arc::new(CredentialPool::new(Vec::new())))
        .with_context(PromptContext::new().with("char", "Mira"))
}

async fn collect(orchestrator: &GenerationOrchestrator, request: TurnRequest) -> Vec<ChatEvent> {
    orchestrator.generate(request).collect().await
}

fn verified_model(name: &str) -> ModelInfo {
    ModelInfo {
        name: name.to_string(),
        display_name: name.to_string(),
        description: String::new(),
        input_token_limit: 32768,
        output_token_limit: 8192,
        methods: vec!["generateContent".to_string()],
    }
}

#[tokio::test]
async fn stream_yields_chunks_then_exactly_one_terminal_full() {
    let provider = Arc::new(FakeProvider::streaming(vec![
        Ok(ProviderDelta::Text("Hello".to_string())),
        Ok(ProviderDelta::Text(" world".to_string())),
        Ok(ProviderDelta::Usage(TokenUsage {
            prompt_tokens: 12,
            completion_tokens: 3,
            total_tokens: 15,
        })),
    ]));
    let orchestrator = GenerationOrchestrator::new(registry_with(provider.clone()));

    let events = collect(&orchestrator, basic_request(narrative_config())).await;

    assert_eq!(events.len(), 3);
    assert_eq!(
        events[0],
        ChatEvent::Chunk {
            text: "Hello".to_string()
        }
    );
    assert_eq!(
        events[1],
        ChatEvent::Chunk {
            text: " world".to_string()
        }
    );
    match &events[2] {
        ChatEvent::Full {
            text,
            token_usage,
            model,
        } => {
            assert_eq!(text, "Hello world");
            assert_eq!(token_usage.expect("usage reported").total_token_count, 15);
            assert_eq!(model.as_deref(), Some("gemini-1.5-pro-latest"));
        }
        other => panic!("expected a full event, got {other:?}"),
    }

    let terminal_count = events.iter().filter(|event| event.is_terminal()).count();
    assert_eq!(terminal_count, 1);
    assert!(events.iter().take(events.len() - 1).all(|e| !e.is_terminal()));

    // The assembled prompt and sampling reached the provider.
    let captured = provider
        .captured
        .lock()
        .expect("capture lock")
        .clone()
        .expect("request captured");
    assert!(captured.system_prompt.contains("You are Mira"));
    assert!(captured.stream);
    assert_eq!(captured.sampling.max_output_tokens, Some(4096));
}

#[tokio::test]
async fn cancellation_after_first_chunk_stops_consumption() {
    let provider = Arc::new(FakeProvider::streaming(vec![
        Ok(ProviderDelta::Text("first".to_string())),
        Ok(ProviderDelta::Text("second".to_string())),
        Ok(ProviderDelta::Text("third".to_string())),
    ]));
    let orchestrator = GenerationOrchestrator::new(registry_with(provider.clone()));

    let cancel = CancelSignal::new();
    let request = basic_request(narrative_config()).with_cancel(cancel.clone());

    let mut stream = orchestrator.generate(request);
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        if events.is_empty() {
            cancel.cancel();
        }
        events.push(event);
    }

    assert_eq!(events.len(), 2);
    assert_eq!(
        events[0],
        ChatEvent::Chunk {
            text: "first".to_string()
        }
    );
    match &events[1] {
        ChatEvent::Error { code, .. } => assert_eq!(*code, ErrorCode::UserAborted),
        other => panic!("expected USER_ABORTED, got {other:?}"),
    }
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn cancellation_before_dispatch_skips_the_provider_entirely() {
    let provider = Arc::new(FakeProvider::streaming(Vec::new()));
    let orchestrator = GenerationOrchestrator::new(registry_with(provider.clone()));

    let cancel = CancelSignal::new();
    cancel.cancel();
    let request = basic_request(narrative_config()).with_cancel(cancel);

    let events = collect(&orchestrator, request).await;

    assert_eq!(events.len(), 1);
    match &events[0] {
        ChatEvent::Error { code, .. } => assert_eq!(*code, ErrorCode::UserAborted),
        other => panic!("expected USER_ABORTED, got {other:?}"),
    }
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn empty_preset_fails_fast_with_zero_provider_invocations() {
    let provider = Arc::new(FakeProvider::streaming(vec![Ok(ProviderDelta::Text(
        "never".to_string(),
    ))]));
    let orchestrator = GenerationOrchestrator::new(registry_with(provider.clone()));

    let config = UserLlmConfig::new("google_gemini", Preset::new("hollow"));
    let events = collect(&orchestrator, basic_request(config)).await;

    assert_eq!(events.len(), 1);
    match &events[0] {
        ChatEvent::Error { code, message } => {
            assert_eq!(*code, ErrorCode::InvalidPreset);
            assert!(message.contains("hollow"));
        }
        other => panic!("expected INVALID_PRESET, got {other:?}"),
    }
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn missing_credentials_fail_before_any_network_call() {
    let provider = Arc::new(
        FakeProvider::streaming(vec![Ok(ProviderDelta::Text("never".to_string()))])
            .requiring_credentials(),
    );
    let orchestrator = GenerationOrchestrator::new(registry_with(provider.clone()));

    let events = collect(&orchestrator, basic_request(narrative_config())).await;

    assert_eq!(events.len(), 1);
    match &events[0] {
        ChatEvent::Error { code, .. } => assert_eq!(*code, ErrorCode::ApiKeyRequired),
        other => panic!("expected API_KEY_REQUIRED, got {other:?}"),
    }
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn unverified_models_fail_before_any_network_call() {
    let provider = Arc::new(
        FakeProvider::streaming(vec![Ok(ProviderDelta::Text("never".to_string()))])
            .requiring_credentials(),
    );
    let orchestrator = GenerationOrchestrator::new(registry_with(provider.clone()));

    let pool = Arc::new(CredentialPool::new(["key-0".to_string()]));
    let request = TurnRequest::new("user-1", narrative_config(), pool)
        .with_context(PromptContext::new().with("char", "Mira"));
    let events = collect(&orchestrator, request).await;

    assert_eq!(events.len(), 1);
    match &events[0] {
        ChatEvent::Error { code, .. } => assert_eq!(*code, ErrorCode::ModelsNotChecked),
        other => panic!("expected MODELS_NOT_CHECKED, got {other:?}"),
    }
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn verified_models_feed_the_model_pool() {
    let provider = Arc::new(
        FakeProvider::streaming(vec![Ok(ProviderDelta::Text("reply".to_string()))])
            .requiring_credentials(),
    );
    let orchestrator = GenerationOrchestrator::new(registry_with(provider.clone()));

    let pool = Arc::new(CredentialPool::new(["key-0".to_string()]));
    pool.cache_verified_models(vec![
        verified_model("models/gemini-1.5-pro-latest"),
        verified_model("models/gemini-1.5-flash-latest"),
    ])
    .expect("pool lock");

    let request = TurnRequest::new("user-1", narrative_config(), pool)
        .with_context(PromptContext::new().with("char", "Mira"));
    let events = collect(&orchestrator, request).await;

    assert!(matches!(events.last(), Some(ChatEvent::Full { .. })));
    let captured = provider
        .captured
        .lock()
        .expect("capture lock")
        .clone()
        .expect("request captured");
    assert_eq!(
        captured.model_pool,
        vec![
            "models/gemini-1.5-pro-latest".to_string(),
            "models/gemini-1.5-flash-latest".to_string(),
        ]
    );
}

#[tokio::test]
async fn unknown_provider_names_fail_at_dispatch() {
    let provider = Arc::new(FakeProvider::streaming(Vec::new()));
    let orchestrator = GenerationOrchestrator::new(registry_with(provider.clone()));

    let preset = Preset::new("narrative").with_module(PromptModule::literal("main", "Hi."));
    let config = UserLlmConfig::new("mystery_backend", preset);
    let events = collect(&orchestrator, basic_request(config)).await;

    assert_eq!(events.len(), 1);
    match &events[0] {
        ChatEvent::Error { code, .. } => assert_eq!(*code, ErrorCode::UnknownProvider),
        other => panic!("expected UNKNOWN_PROVIDER, got {other:?}"),
    }
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn whitespace_only_output_is_an_empty_response() {
    let provider = Arc::new(FakeProvider::streaming(vec![
        Ok(ProviderDelta::Text("  ".to_string())),
        Ok(ProviderDelta::Text("\n".to_string())),
    ]));
    let orchestrator = GenerationOrchestrator::new(registry_with(provider));

    let events = collect(&orchestrator, basic_request(narrative_config())).await;

    match events.last() {
        Some(ChatEvent::Error { code, .. }) => assert_eq!(*code, ErrorCode::EmptyResponse),
        other => panic!("expected EMPTY_RESPONSE terminal, got {other:?}"),
    }
    let terminal_count = events.iter().filter(|event| event.is_terminal()).count();
    assert_eq!(terminal_count, 1);
}

#[tokio::test]
async fn blank_complete_reply_is_an_empty_response() {
    let provider = Arc::new(FakeProvider::completing("   "));
    let orchestrator = GenerationOrchestrator::new(registry_with(provider));

    let events = collect(&orchestrator, basic_request(narrative_config())).await;

    assert_eq!(events.len(), 1);
    match &events[0] {
        ChatEvent::Error { code, .. } => assert_eq!(*code, ErrorCode::EmptyResponse),
        other => panic!("expected EMPTY_RESPONSE, got {other:?}"),
    }
}

#[tokio::test]
async fn provider_exhaustion_surfaces_as_all_services_failed() {
    let provider = Arc::new(FakeProvider::failing(ProviderError::exhausted(
        "every Gemini model and API key combination failed; last error: Transport: reset",
    )));
    let orchestrator = GenerationOrchestrator::new(registry_with(provider));

    let events = collect(&orchestrator, basic_request(narrative_config())).await;

    assert_eq!(events.len(), 1);
    match &events[0] {
        ChatEvent::Error { code, message } => {
            assert_eq!(*code, ErrorCode::AllServicesFailed);
            assert!(message.contains("last error"));
        }
        other => panic!("expected ALL_SERVICES_FAILED, got {other:?}"),
    }
}

#[tokio::test]
async fn mid_stream_errors_terminate_with_a_single_error_event() {
    let provider = Arc::new(FakeProvider::streaming(vec![
        Ok(ProviderDelta::Text("partial".to_string())),
        Err(ProviderError::transport("stream interrupted")),
    ]));
    let orchestrator = GenerationOrchestrator::new(registry_with(provider));

    let events = collect(&orchestrator, basic_request(narrative_config())).await;

    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], ChatEvent::Chunk { .. }));
    match &events[1] {
        ChatEvent::Error { code, .. } => assert_eq!(*code, ErrorCode::PipelineCritical),
        other => panic!("expected a terminal error, got {other:?}"),
    }
}

#[tokio::test]
async fn long_histories_are_truncated_before_dispatch() {
    let provider = Arc::new(FakeProvider::streaming(vec![Ok(ProviderDelta::Text(
        "reply".to_string(),
    ))]));
    let orchestrator = GenerationOrchestrator::new(registry_with(provider.clone()));

    let history = (0..60)
        .map(|i| {
            let role = if i % 2 == 0 {
                qprovider::Role::User
            } else {
                qprovider::Role::Model
            };
            qprovider::ChatMessage::new(role, "word ".repeat(100))
        })
        .collect::<Vec<_>>();

    let request = basic_request(narrative_config()).with_history(history.clone());
    let events = collect(&orchestrator, request).await;
    assert!(matches!(events.last(), Some(ChatEvent::Full { .. })));

    let captured = provider
        .captured
        .lock()
        .expect("capture lock")
        .clone()
        .expect("request captured");

    // A strict suffix, order preserved, within the token budget.
    assert!(captured.history.len() < 60);
    assert!(!captured.history.is_empty());
    assert_eq!(
        captured.history.as_slice(),
        &history[60 - captured.history.len()..]
    );
}
