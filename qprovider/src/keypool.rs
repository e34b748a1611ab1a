//! Credential pool with priority rotation and failure cooldowns.
//!
//! One pool exists per backend account (possibly per end user for
//! user-supplied keys). Credential values never change after construction;
//! their standing does: success moves a credential to the front of the
//! priority order, failure moves it to the back and starts a cooldown
//! window during which `available_indices` skips it. All standing updates
//! go through one mutex so concurrent requests sharing a pool cannot race
//! the bookkeeping.
//!
//! ```rust
//! use qprovider::CredentialPool;
//!
//! let pool = CredentialPool::new(["key-a".to_string(), "key-b".to_string()]);
//! pool.report_success(1).expect("pool lock");
//! assert_eq!(pool.available_indices().expect("pool lock"), vec![1, 0]);
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use qcommon::BoxFuture;

use crate::{ModelInfo, ProviderError, SecretString};

/// How long a failed credential is skipped before becoming eligible again.
pub const CREDENTIAL_COOLDOWN: Duration = Duration::from_secs(300);

/// Per-credential bound on one model-discovery attempt.
pub const DISCOVERY_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(20);

/// Lists the models one credential can reach. Implemented by backend
/// transports and by test fakes.
pub trait ModelCatalog: Send + Sync {
    fn list_models<'a>(
        &'a self,
        api_key: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ModelInfo>, ProviderError>>;
}

#[derive(Debug)]
struct PoolState {
    active: usize,
    priority: Vec<usize>,
    cooldowns: HashMap<usize, Instant>,
    verified_models: Vec<ModelInfo>,
}

#[derive(Debug)]
pub struct CredentialPool {
    keys: Vec<SecretString>,
    cooldown: Duration,
    state: Mutex<PoolState>,
}

impl CredentialPool {
    /// Builds a pool from raw key strings; entries are trimmed and blanks
    /// dropped, so the resulting indices are stable for the pool lifetime.
    pub fn new(raw_keys: impl IntoIterator<Item = String>) -> Self {
        let keys = raw_keys
            .into_iter()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .map(SecretString::new)
            .collect::<Vec<_>>();

        let priority = (0..keys.len()).collect();
        Self {
            keys,
            cooldown: CREDENTIAL_COOLDOWN,
            state: Mutex::new(PoolState {
                active: 0,
                priority,
                cooldowns: HashMap::new(),
                verified_models: Vec::new(),
            }),
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Scoped access to one credential's secret value.
    pub fn with_key<R>(&self, index: usize, f: impl FnOnce(&str) -> R) -> Option<R> {
        self.keys.get(index).map(|key| f(key.expose()))
    }

    pub fn active_index(&self) -> Result<usize, ProviderError> {
        Ok(self.lock()?.active)
    }

    /// Makes `index` the ambient credential. Out-of-range indices are
    /// ignored.
    pub fn activate(&self, index: usize) -> Result<(), ProviderError> {
        let mut state = self.lock()?;
        if index < self.keys.len() {
            state.active = index;
        }
        Ok(())
    }

    /// Promotes `index` to the front of the priority order, clears its
    /// cooldown, and adopts it as the active credential.
    pub fn report_success(&self, index: usize) -> Result<(), ProviderError> {
        let mut state = self.lock()?;
        if index >= self.keys.len() {
            return Ok(());
        }

        state.priority.retain(|entry| *entry != index);
        state.priority.insert(0, index);
        state.cooldowns.remove(&index);
        state.active = index;
        Ok(())
    }

    /// Demotes `index` to the back of the priority order and stamps the
    /// start of its cooldown window.
    pub fn report_failure(&self, index: usize) -> Result<(), ProviderError> {
        let mut state = self.lock()?;
        if index >= self.keys.len() {
            return Ok(());
        }

        state.priority.retain(|entry| *entry != index);
        state.priority.push(index);
        state.cooldowns.insert(index, Instant::now());
        Ok(())
    }

    /// Priority order filtered to credentials whose cooldown has elapsed.
    ///
    /// An empty result from a non-empty pool means every credential is
    /// cooling down — a retryable-later condition distinct from "no
    /// credentials configured".
    pub fn available_indices(&self) -> Result<Vec<usize>, ProviderError> {
        let state = self.lock()?;
        let now = Instant::now();
        Ok(state
            .priority
            .iter()
            .copied()
            .filter(|index| match state.cooldowns.get(index) {
                Some(failed_at) => now.duration_since(*failed_at) > self.cooldown,
                None => true,
            })
            .collect())
    }

    pub fn verified_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        Ok(self.lock()?.verified_models.clone())
    }

    /// Seeds the verified-model cache directly, for callers restoring a
    /// previously discovered list instead of re-running discovery.
    pub fn cache_verified_models(&self, models: Vec<ModelInfo>) -> Result<(), ProviderError> {
        self.lock()?.verified_models = models;
        Ok(())
    }

    pub fn has_verified_models(&self) -> Result<bool, ProviderError> {
        Ok(!self.lock()?.verified_models.is_empty())
    }

    /// Round-robin model discovery starting at the active credential.
    ///
    /// Each attempt is bounded by `per_attempt_timeout`; a timeout or error
    /// moves on to the next credential rather than aborting the sweep. The
    /// first credential that yields generation-capable models is adopted as
    /// active and the filtered list cached. If every credential fails the
    /// cache is cleared and the condition reported upward.
    pub async fn discover_models(
        &self,
        catalog: &dyn ModelCatalog,
        per_attempt_timeout: Duration,
    ) -> Result<Vec<ModelInfo>, ProviderError> {
        if self.keys.is_empty() {
            return Err(ProviderError::no_credentials(
                "cannot discover models without any credentials",
            ));
        }

        let start = self.active_index()?;
        let mut last_error = None;

        for offset in 0..self.keys.len() {
            let index = (start + offset) % self.keys.len();
            let attempt = tokio::time::timeout(
                per_attempt_timeout,
                catalog.list_models(self.keys[index].expose()),
            )
            .await;

            match attempt {
                Ok(Ok(models)) => {
                    let mut usable = models
                        .into_iter()
                        .filter(ModelInfo::supports_generation)
                        .collect::<Vec<_>>();
                    usable.sort_by(|a, b| a.display_name.cmp(&b.display_name));

                    if !usable.is_empty() {
                        let mut state = self.lock()?;
                        state.active = index;
                        state.verified_models = usable.clone();
                        return Ok(usable);
                    }

                    last_error = Some(ProviderError::unavailable(format!(
                        "credential {index} listed no generation-capable models",
                    )));
                }
                Ok(Err(error)) => last_error = Some(error),
                Err(_) => {
                    last_error = Some(ProviderError::timeout(format!(
                        "model listing with credential {index} exceeded {per_attempt_timeout:?}",
                    )));
                }
            }
        }

        self.lock()?.verified_models.clear();
        let detail = last_error
            .map(|error| error.to_string())
            .unwrap_or_else(|| "no attempts were made".to_string());
        Err(ProviderError::unavailable(format!(
            "model discovery failed for every credential; last error: {detail}",
        )))
    }

    fn lock(&self) -> Result<MutexGuard<'_, PoolState>, ProviderError> {
        self.state
            .lock()
            .map_err(|_| ProviderError::other("credential pool lock poisoned"))
    }
}
