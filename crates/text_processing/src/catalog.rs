//! Prompt Catalog
//!
//! Renders a template key plus parameters into speech markup. When a key has
//! several phrasings one is picked with the caller-supplied RNG, so a seeded
//! RNG gives reproducible output in tests.
//!
//! Rendering order: fill placeholders, run the anti-filter pass, escape for
//! XML, wrap in `<speak>`.

use rand::Rng;
use serde::{Deserialize, Serialize};
use voice_support_config::{PromptSettings, PromptTemplates};

use crate::anti_filter::AntiFilter;
use crate::error::{Result, TextProcessingError};

/// Named template parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptParams(Vec<(String, String)>);

impl PromptParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert; a repeated name replaces the earlier value
    pub fn with(mut self, name: &str, value: impl ToString) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl ToString) {
        let value = value.to_string();
        match self.0.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Rendered prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedPrompt {
    pub key: String,
    /// Which phrasing was used
    pub variant: usize,
    /// Plain text, before substitution and markup (history and logs)
    pub text: String,
    /// SSML sent to the synthesizer
    pub markup: String,
}

/// Template set plus rendering policy, immutable and shared across sessions
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    templates: PromptTemplates,
    anti_filter: Option<AntiFilter>,
}

impl PromptCatalog {
    pub fn new(templates: PromptTemplates, anti_filter: Option<AntiFilter>) -> Self {
        Self {
            templates,
            anti_filter,
        }
    }

    /// Built-in phrasings, no substitution pass
    pub fn builtin() -> Self {
        Self::new(PromptTemplates::builtin(), None)
    }

    /// Catalog as configured: overrides file (if any) and anti-filter words
    pub fn from_settings(
        settings: &PromptSettings,
    ) -> std::result::Result<Self, voice_support_config::ConfigError> {
        let templates = match &settings.catalog_path {
            Some(path) => PromptTemplates::builtin_with_overrides(path)?,
            None => PromptTemplates::builtin(),
        };
        let anti_filter = settings
            .anti_filter
            .then(|| AntiFilter::new(&settings.anti_filter_words));
        Ok(Self::new(templates, anti_filter))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.templates.variants(key).is_some()
    }

    /// Render with a randomly chosen phrasing
    pub fn render<R: Rng + ?Sized>(
        &self,
        key: &str,
        params: &PromptParams,
        rng: &mut R,
    ) -> Result<RenderedPrompt> {
        let variants = self
            .templates
            .variants(key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| TextProcessingError::UnknownTemplate(key.to_string()))?;
        let index = rng.gen_range(0..variants.len());
        self.render_variant(key, index, params)
    }

    /// Render a specific phrasing
    pub fn render_variant(
        &self,
        key: &str,
        index: usize,
        params: &PromptParams,
    ) -> Result<RenderedPrompt> {
        let template = self
            .templates
            .variants(key)
            .and_then(|v| v.get(index))
            .ok_or_else(|| TextProcessingError::UnknownTemplate(format!("{}[{}]", key, index)))?;

        let text = fill(key, template, params)?;
        let spoken = match &self.anti_filter {
            Some(filter) => filter.apply(&text),
            None => text.clone(),
        };

        Ok(RenderedPrompt {
            key: key.to_string(),
            variant: index,
            markup: format!("<speak>{}</speak>", escape_xml(&spoken)),
            text,
        })
    }
}

/// Replace `{name}` placeholders
fn fill(key: &str, template: &str, params: &PromptParams) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| TextProcessingError::MalformedTemplate {
            key: key.to_string(),
            message: "unclosed '{'".to_string(),
        })?;

        let name = &after[..close];
        let value = params.get(name).ok_or_else(|| TextProcessingError::MissingParam {
            key: key.to_string(),
            param: name.to_string(),
        })?;
        out.push_str(value);
        rest = &after[close + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
