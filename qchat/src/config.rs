//! Typed per-user generation configuration.
//!
//! The surrounding application resolves these from its own storage; the
//! orchestrator treats them as read-only input per call and validates them
//! before dispatch, so malformed configuration never reaches a backend.

use qcommon::SamplingOptions;
use qprovider::ProviderSettings;

use crate::{ChatError, ErrorCode, PromptModule};

pub const DEFAULT_TEMPERATURE: f32 = 0.8;
pub const DEFAULT_TOP_P: f32 = 0.9;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4096;

/// Shared-compute model used when the caller configured none.
pub const DEFAULT_HORDE_MODEL: &str = "Chronos-Hermes-13b";

/// The active preset: ordered prompt modules plus its sampling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    pub name: String,
    pub temperature: f32,
    pub top_p: f32,
    pub modules: Vec<PromptModule>,
}

impl Preset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            modules: Vec::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn with_module(mut self, module: PromptModule) -> Self {
        self.modules.push(module);
        self
    }

    pub fn with_modules(mut self, modules: Vec<PromptModule>) -> Self {
        self.modules = modules;
        self
    }

    pub fn validate(&self) -> Result<(), ChatError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ChatError::new(
                ErrorCode::InvalidPreset,
                format!("preset '{}': temperature out of range", self.name),
            ));
        }

        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(ChatError::new(
                ErrorCode::InvalidPreset,
                format!("preset '{}': top_p out of range", self.name),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserLlmConfig {
    /// Configured provider name, resolved through the registry at dispatch.
    pub provider: String,
    pub api_keys: Vec<String>,
    pub proxy: Option<String>,
    pub horde_api_key: Option<String>,
    pub horde_models: Vec<String>,
    pub max_output_tokens: u32,
    pub preset: Preset,
}

impl UserLlmConfig {
    pub fn new(provider: impl Into<String>, preset: Preset) -> Self {
        Self {
            provider: provider.into(),
            api_keys: Vec::new(),
            proxy: None,
            horde_api_key: None,
            horde_models: Vec::new(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            preset,
        }
    }

    pub fn with_api_keys(mut self, api_keys: Vec<String>) -> Self {
        self.api_keys = api_keys;
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn with_horde_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.horde_api_key = Some(api_key.into());
        self
    }

    pub fn with_horde_models(mut self, models: Vec<String>) -> Self {
        self.horde_models = models;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn validate(&self) -> Result<(), ChatError> {
        if self.provider.trim().is_empty() {
            return Err(ChatError::new(
                ErrorCode::UnknownProvider,
                "provider name must not be empty",
            ));
        }

        if self.max_output_tokens == 0 {
            return Err(ChatError::pipeline_critical(
                "max_output_tokens must be greater than zero",
            ));
        }

        self.preset.validate()
    }

    /// Sampling parameters for one generation: the preset's temperature and
    /// top-p with the configured output cap.
    pub fn sampling(&self) -> SamplingOptions {
        SamplingOptions::default()
            .with_temperature(self.preset.temperature)
            .with_top_p(self.preset.top_p)
            .with_max_output_tokens(self.max_output_tokens)
    }

    pub fn provider_settings(&self) -> ProviderSettings {
        let mut settings = ProviderSettings::default();
        if let Some(proxy) = &self.proxy {
            settings = settings.with_proxy(proxy.clone());
        }
        if let Some(api_key) = &self.horde_api_key {
            settings = settings.with_horde_api_key(api_key.clone());
        }
        settings
    }
}
