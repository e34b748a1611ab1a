//! Provider naming, typed per-call settings, and the dispatch registry.
//!
//! ```rust
//! use qprovider::{ProviderErrorKind, ProviderRegistry, ProviderSettings};
//!
//! let registry = ProviderRegistry::new();
//! let err = registry
//!     .resolve("telepathy", &ProviderSettings::default())
//!     .expect_err("unregistered names fail before any I/O");
//! assert_eq!(err.kind, ProviderErrorKind::UnknownProvider);
//! ```

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use qcommon::Registry;

use crate::{ModelProvider, ProviderError};

#[cfg(all(feature = "provider-gemini", feature = "provider-horde"))]
use crate::FailoverHooks;

/// Overall bound on one generation HTTP exchange, applied to both
/// backends. Cancellation is cooperative and cannot interrupt an in-flight
/// call, so the call itself must not be unbounded.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    GoogleGemini,
    KoboldHorde,
}

impl ProviderId {
    /// Parses the provider name used in caller configuration.
    pub fn parse(name: &str) -> Result<Self, ProviderError> {
        match name {
            "google_gemini" => Ok(Self::GoogleGemini),
            "koboldai_horde" => Ok(Self::KoboldHorde),
            other => Err(ProviderError::unknown_provider(format!(
                "unknown LLM provider: {other}",
            ))),
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let id = match self {
            Self::GoogleGemini => "google_gemini",
            Self::KoboldHorde => "koboldai_horde",
        };

        f.write_str(id)
    }
}

/// Per-call provider construction settings, resolved from the caller's
/// configuration. Replaces the loosely-typed config dictionaries the wire
/// formats grew up with; validation happens here, before any network I/O.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderSettings {
    /// Optional proxy URL applied to the backend HTTP client.
    pub proxy: Option<String>,
    /// Dedicated shared-compute key; the anonymous key is used when unset.
    pub horde_api_key: Option<String>,
}

impl ProviderSettings {
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn with_horde_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.horde_api_key = Some(api_key.into());
        self
    }

    /// Builds the HTTP client backends share: rustls, bounded generation
    /// timeout, optional proxy.
    #[cfg(any(feature = "provider-gemini", feature = "provider-horde"))]
    pub fn http_client(&self) -> Result<reqwest::Client, ProviderError> {
        let mut builder = reqwest::Client::builder().timeout(GENERATION_TIMEOUT);

        if let Some(proxy_url) = &self.proxy {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|err| {
                ProviderError::invalid_request(format!("invalid proxy URL: {err}"))
            })?;
            builder = builder.proxy(proxy);
        }

        builder
            .build()
            .map_err(|err| ProviderError::transport(err.to_string()))
    }
}

pub type ProviderFactory =
    Arc<dyn Fn(&ProviderSettings) -> Result<Arc<dyn ModelProvider>, ProviderError> + Send + Sync>;

/// Static name-to-constructor table. Providers are constructed fresh per
/// call (they are stateless); requesting an unregistered name fails with a
/// distinct condition at dispatch time, before any network I/O.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: Registry<ProviderId, ProviderFactory>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry wired with every built-in backend, all reporting through
    /// the given hooks.
    #[cfg(all(feature = "provider-gemini", feature = "provider-horde"))]
    pub fn with_default_backends(hooks: Arc<dyn FailoverHooks>) -> Self {
        let mut registry = Self::new();

        let gemini_hooks = Arc::clone(&hooks);
        registry.register(
            ProviderId::GoogleGemini,
            Arc::new(move |settings: &ProviderSettings| {
                let transport = Arc::new(crate::adapters::gemini::GeminiHttpTransport::new(
                    settings.http_client()?,
                ));
                let provider = crate::adapters::gemini::GeminiProvider::new(transport)
                    .with_hooks(Arc::clone(&gemini_hooks));
                Ok(Arc::new(provider) as Arc<dyn ModelProvider>)
            }),
        );

        registry.register(
            ProviderId::KoboldHorde,
            Arc::new(move |settings: &ProviderSettings| {
                let transport = Arc::new(crate::adapters::horde::HordeHttpTransport::new(
                    settings.http_client()?,
                ));
                let mut provider = crate::adapters::horde::HordeProvider::new(transport)
                    .with_hooks(Arc::clone(&hooks));
                if let Some(api_key) = &settings.horde_api_key {
                    provider = provider.with_api_key(api_key.clone());
                }
                Ok(Arc::new(provider) as Arc<dyn ModelProvider>)
            }),
        );

        registry
    }

    pub fn register(&mut self, provider_id: ProviderId, factory: ProviderFactory) {
        self.factories.insert(provider_id, factory);
    }

    pub fn contains(&self, provider_id: ProviderId) -> bool {
        self.factories.contains_key(&provider_id)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Resolves a configured provider name into a fresh provider instance.
    pub fn resolve(
        &self,
        name: &str,
        settings: &ProviderSettings,
    ) -> Result<Arc<dyn ModelProvider>, ProviderError> {
        let provider_id = ProviderId::parse(name)?;
        let factory = self.factories.get(&provider_id).ok_or_else(|| {
            ProviderError::unknown_provider(format!("no provider registered for {provider_id}"))
        })?;

        factory(settings)
    }
}
