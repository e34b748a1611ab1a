//! System-prompt assembly from ordered prompt modules.
//!
//! A preset is an ordered list of modules: literal text emitted verbatim,
//! or markers resolved from the rendering context (character description,
//! persona, world info, and so on). The concatenated result then goes
//! through one `{{name}}` substitution pass.
//!
//! ```rust
//! use qchat::{PromptContext, PromptModule, assemble};
//!
//! let modules = vec![
//!     PromptModule::literal("main", "You are {{char}}."),
//!     PromptModule::marker("charDescription"),
//! ];
//! let ctx = PromptContext::new()
//!     .with("char", "Mira")
//!     .with("charDescription", "A wandering cartographer.");
//!
//! assert_eq!(assemble(&modules, &ctx), "You are Mira.\nA wandering cartographer.");
//! ```

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

/// The transcript's place in the module order. History is injected by the
/// orchestrator after truncation, so this marker emits nothing here.
pub const HISTORY_MARKER: &str = "chatHistory";

/// Context key carrying the wall-clock timestamp appended to the prompt.
pub const TIME_KEY: &str = "time";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*(.*?)\s*\}\}").expect("placeholder pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleKind {
    /// Emits its content verbatim.
    Literal(String),
    /// Resolved from the rendering context by the module's identifier.
    Marker,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptModule {
    pub identifier: String,
    pub kind: ModuleKind,
}

impl PromptModule {
    pub fn literal(identifier: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            kind: ModuleKind::Literal(content.into()),
        }
    }

    pub fn marker(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            kind: ModuleKind::Marker,
        }
    }
}

/// Named values markers and `{{placeholders}}` resolve against. Marker
/// identifiers (`charDescription`) and placeholder names (`char`) share
/// this namespace; the data layer populates both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptContext {
    values: BTreeMap<String, String>,
}

impl PromptContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Stamps the current wall-clock time into the context so the model can
    /// reason about the real-world date.
    pub fn with_current_time(self) -> Self {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        self.with(TIME_KEY, now)
    }
}

/// Replaces every `{{name}}` with the context value for `name`, leaving
/// unknown placeholders unchanged. Never fails.
pub fn render_template(template: &str, ctx: &PromptContext) -> String {
    PLACEHOLDER
        .replace_all(template, |captures: &regex::Captures<'_>| {
            let key = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
            match ctx.get(key) {
                Some(value) => value.to_string(),
                None => captures
                    .get(0)
                    .map(|m| m.as_str())
                    .unwrap_or_default()
                    .to_string(),
            }
        })
        .into_owned()
}

/// Renders the ordered module list into one system-prompt string.
///
/// Unknown marker identifiers are emitted verbatim rather than dropped, so
/// a misconfigured preset stays visible in the output instead of silently
/// shrinking. An empty module list yields an empty string; the orchestrator
/// turns that into a user-facing configuration error.
pub fn assemble(modules: &[PromptModule], ctx: &PromptContext) -> String {
    let mut parts = Vec::new();

    for module in modules {
        match &module.kind {
            ModuleKind::Literal(content) => parts.push(content.clone()),
            ModuleKind::Marker => {
                if module.identifier == HISTORY_MARKER {
                    continue;
                }

                match ctx.get(&module.identifier) {
                    Some(value) => parts.push(value.to_string()),
                    None => parts.push(module.identifier.clone()),
                }
            }
        }
    }

    if let Some(time) = ctx.get(TIME_KEY) {
        parts.push(format!(
            "[System note: the current real-world time is {time}. Keep it in mind where it matters.]",
        ));
    }

    let joined = parts
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    render_template(&joined, ctx)
}
