//! The backend capability interface.

use std::future::Future;
use std::pin::Pin;

use crate::{
    BackendRequest, BoxedDeltaStream, CredentialPool, ProviderError, ProviderId, TokenUsage,
};

pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of one successful backend call: either the complete text or a
/// live delta stream, plus the model that actually served it.
pub enum ProviderReply<'a> {
    Complete {
        text: String,
        model: String,
        usage: Option<TokenUsage>,
    },
    Stream {
        deltas: BoxedDeltaStream<'a>,
        model: String,
    },
}

impl std::fmt::Debug for dyn ModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("dyn ModelProvider").field(&self.id()).finish()
    }
}

impl std::fmt::Debug for ProviderReply<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderReply::Complete { text, model, usage } => f
                .debug_struct("Complete")
                .field("text", text)
                .field("model", model)
                .field("usage", usage)
                .finish(),
            ProviderReply::Stream { model, .. } => f
                .debug_struct("Stream")
                .field("model", model)
                .finish_non_exhaustive(),
        }
    }
}

/// One backend family's call semantics.
///
/// A provider iterates the (model, credential) search space itself,
/// reporting per-credential success and failure into the borrowed pool as
/// it goes; it never owns the pool's lifecycle. Implementations are
/// stateless and cheap to construct, one instantiation per call.
pub trait ModelProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Whether requests through this provider need caller-supplied
    /// credentials (as opposed to a shared/anonymous account).
    fn requires_user_credentials(&self) -> bool {
        true
    }

    fn call<'a>(
        &'a self,
        pool: &'a CredentialPool,
        request: BackendRequest,
    ) -> ProviderFuture<'a, Result<ProviderReply<'a>, ProviderError>>;
}
