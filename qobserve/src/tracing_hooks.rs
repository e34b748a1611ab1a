//! Tracing-based hooks for failover attempts.

use qprovider::{FailoverHooks, ProviderError, ProviderId};

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingFailoverHooks;

impl FailoverHooks for TracingFailoverHooks {
    fn on_attempt_start(&self, provider: ProviderId, model: &str, key_index: usize) {
        tracing::debug!(
            phase = "failover",
            event = "attempt_start",
            provider = %provider,
            model,
            key_index
        );
    }

    fn on_attempt_failure(
        &self,
        provider: ProviderId,
        model: &str,
        key_index: usize,
        error: &ProviderError,
    ) {
        tracing::warn!(
            phase = "failover",
            event = "attempt_failure",
            provider = %provider,
            model,
            key_index,
            error_kind = ?error.kind,
            retryable = error.retryable,
            error = %error
        );
    }

    fn on_success(&self, provider: ProviderId, model: &str, key_index: usize, attempts: u32) {
        tracing::info!(
            phase = "failover",
            event = "success",
            provider = %provider,
            model,
            key_index,
            attempts
        );
    }

    fn on_exhausted(&self, provider: ProviderId, attempts: u32, last_error: &ProviderError) {
        tracing::error!(
            phase = "failover",
            event = "exhausted",
            provider = %provider,
            attempts,
            error_kind = ?last_error.kind,
            error = %last_error
        );
    }
}
