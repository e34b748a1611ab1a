//! Credential failover and backend abstraction for the quill LLM relay.
//!
//! The crate owns the pieces between "a prepared generation request" and "a
//! live backend stream": the [`CredentialPool`] that rotates priority under
//! partial failure, the [`ModelProvider`] capability interface with one
//! implementation per backend family, and the [`ProviderRegistry`] that
//! dispatches a configured provider name to a fresh provider instance.

mod credentials;
mod error;
mod hooks;
mod keypool;
mod model;
mod provider;
mod registry;
mod stream;

pub mod adapters;

pub mod prelude {
    pub use crate::{
        BackendRequest, BoxedDeltaStream, ChatMessage, CredentialPool, FailoverHooks,
        ModelCatalog, ModelInfo, ModelProvider, NoopFailoverHooks, ProviderDelta, ProviderError,
        ProviderErrorKind, ProviderFuture, ProviderId, ProviderRegistry, ProviderReply,
        ProviderSettings, Role, SecretString, TokenUsage, ToolDefinition, VecDeltaStream,
    };
}

pub use credentials::SecretString;
pub use error::{ProviderError, ProviderErrorKind};
pub use hooks::{FailoverHooks, NoopFailoverHooks};
pub use keypool::{
    CREDENTIAL_COOLDOWN, CredentialPool, DISCOVERY_ATTEMPT_TIMEOUT, ModelCatalog,
};
pub use model::{
    BackendRequest, ChatMessage, GENERATE_METHOD, ModelInfo, Role, TokenUsage, ToolDefinition,
};
pub use provider::{ModelProvider, ProviderFuture, ProviderReply};
pub use registry::{
    GENERATION_TIMEOUT, ProviderFactory, ProviderId, ProviderRegistry, ProviderSettings,
};
pub use stream::{BoxedDeltaStream, DeltaStream, ProviderDelta, VecDeltaStream};
