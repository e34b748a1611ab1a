//! Metrics-based hooks for failover attempts.

use qprovider::{FailoverHooks, ProviderError, ProviderId};

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsFailoverHooks;

impl FailoverHooks for MetricsFailoverHooks {
    fn on_attempt_start(&self, provider: ProviderId, model: &str, _key_index: usize) {
        metrics::counter!(
            "quill_failover_attempt_start_total",
            "provider" => provider.to_string(),
            "model" => model.to_string()
        )
        .increment(1);
    }

    fn on_attempt_failure(
        &self,
        provider: ProviderId,
        model: &str,
        _key_index: usize,
        error: &ProviderError,
    ) {
        metrics::counter!(
            "quill_failover_attempt_failure_total",
            "provider" => provider.to_string(),
            "model" => model.to_string(),
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
    }

    fn on_success(&self, provider: ProviderId, model: &str, _key_index: usize, attempts: u32) {
        metrics::counter!(
            "quill_failover_success_total",
            "provider" => provider.to_string(),
            "model" => model.to_string()
        )
        .increment(1);
        metrics::histogram!(
            "quill_failover_attempts_per_success",
            "provider" => provider.to_string()
        )
        .record(f64::from(attempts));
    }

    fn on_exhausted(&self, provider: ProviderId, attempts: u32, last_error: &ProviderError) {
        metrics::counter!(
            "quill_failover_exhausted_total",
            "provider" => provider.to_string(),
            "error_kind" => format!("{:?}", last_error.kind)
        )
        .increment(1);
        metrics::histogram!(
            "quill_failover_attempts_per_exhaustion",
            "provider" => provider.to_string()
        )
        .record(f64::from(attempts));
    }
}
