//! Operational hook contracts for the failover hot path.
//!
//! Providers report each candidate attempt through these hooks; the
//! `qobserve` crate supplies tracing- and metrics-backed implementations.

use crate::{ProviderError, ProviderId};

pub trait FailoverHooks: Send + Sync {
    fn on_attempt_start(&self, _provider: ProviderId, _model: &str, _key_index: usize) {}

    fn on_attempt_failure(
        &self,
        _provider: ProviderId,
        _model: &str,
        _key_index: usize,
        _error: &ProviderError,
    ) {
    }

    fn on_success(&self, _provider: ProviderId, _model: &str, _key_index: usize, _attempts: u32) {}

    fn on_exhausted(&self, _provider: ProviderId, _attempts: u32, _last_error: &ProviderError) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFailoverHooks;

impl FailoverHooks for NoopFailoverHooks {}
