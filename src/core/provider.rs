//! AI provider descriptors and the capability table.
//!
//! The table is resolved once from configuration. Selection walks a fixed
//! per-capability preference order and picks the first provider whose
//! credentials are present; nothing is re-derived per call.

use serde::{Deserialize, Serialize};

use crate::error::{BimcostError, Result};

// =============================================================================
// Provider Enum
// =============================================================================

/// Supported AI backends. Both speak the OpenAI-compatible chat API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    Xai,
    OpenAi,
}

impl AiProvider {
    /// All providers in display order.
    pub const ALL: &'static [Self] = &[Self::Xai, Self::OpenAi];

    /// CLI name for this provider.
    #[must_use]
    pub const fn cli_name(self) -> &'static str {
        match self {
            Self::Xai => "xai",
            Self::OpenAi => "openai",
        }
    }

    /// Display name for human output.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Xai => "xAI Grok",
            Self::OpenAi => "OpenAI",
        }
    }

    /// Public API base URL.
    #[must_use]
    pub const fn default_base_url(self) -> &'static str {
        match self {
            Self::Xai => "https://api.x.ai/v1",
            Self::OpenAi => "https://api.openai.com/v1",
        }
    }

    /// Capabilities this backend advertises.
    #[must_use]
    pub const fn supports(self) -> &'static [Capability] {
        match self {
            Self::Xai | Self::OpenAi => &[
                Capability::TextCompletion,
                Capability::VisionAnalysis,
                Capability::JsonMode,
            ],
        }
    }

    /// Whether the backend honours `response_format` for the model used
    /// for `capability`.
    #[must_use]
    pub const fn json_mode_for(self, capability: Capability) -> bool {
        match (self, capability) {
            // grok vision models reject response_format
            (Self::Xai, Capability::VisionAnalysis) => false,
            _ => true,
        }
    }
}

impl std::fmt::Display for AiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.cli_name())
    }
}

// =============================================================================
// Capabilities
// =============================================================================

/// What a request needs from a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    TextCompletion,
    VisionAnalysis,
    /// Structured output; advertised, never requested on its own.
    JsonMode,
}

impl Capability {
    /// Deterministic preference order. Text and vision deliberately differ.
    #[must_use]
    pub const fn preference(self) -> &'static [AiProvider] {
        match self {
            Self::TextCompletion | Self::JsonMode => &[AiProvider::Xai, AiProvider::OpenAi],
            Self::VisionAnalysis => &[AiProvider::OpenAi, AiProvider::Xai],
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::TextCompletion => "text completion",
            Self::VisionAnalysis => "vision analysis",
            Self::JsonMode => "json mode",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Provider Descriptor
// =============================================================================

/// Configured credentials and models for one backend.
#[derive(Clone)]
pub struct ProviderCredentials {
    pub provider: AiProvider,
    pub api_key: Option<String>,
    pub base_url: String,
    pub text_model: String,
    pub vision_model: String,
}

/// Resolved provider entry in the capability table.
#[derive(Clone)]
pub struct ProviderDescriptor {
    pub provider: AiProvider,
    pub supports: &'static [Capability],
    /// Computed from credential presence.
    pub available: bool,
    api_key: String,
    pub base_url: String,
    pub text_model: String,
    pub vision_model: String,
}

impl ProviderDescriptor {
    /// Bearer credential for requests.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Model name used for `capability`.
    #[must_use]
    pub fn model_for(&self, capability: Capability) -> &str {
        match capability {
            Capability::VisionAnalysis => &self.vision_model,
            Capability::TextCompletion | Capability::JsonMode => &self.text_model,
        }
    }

    /// Whether this provider can serve `capability` right now.
    #[must_use]
    pub fn can_serve(&self, capability: Capability) -> bool {
        self.available && self.supports.contains(&capability)
    }
}

impl std::fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("provider", &self.provider)
            .field("available", &self.available)
            .field("base_url", &self.base_url)
            .field("text_model", &self.text_model)
            .field("vision_model", &self.vision_model)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Capability Table
// =============================================================================

/// Provider → capabilities → priority, fixed for the life of the process.
#[derive(Debug, Clone, Default)]
pub struct ProviderTable {
    descriptors: Vec<ProviderDescriptor>,
}

impl ProviderTable {
    /// Build the table from configured credentials.
    #[must_use]
    pub fn resolve(credentials: &[ProviderCredentials]) -> Self {
        let descriptors = credentials
            .iter()
            .map(|c| {
                let api_key = c.api_key.clone().unwrap_or_default();
                ProviderDescriptor {
                    provider: c.provider,
                    supports: c.provider.supports(),
                    available: !api_key.trim().is_empty(),
                    api_key,
                    base_url: c.base_url.trim_end_matches('/').to_string(),
                    text_model: c.text_model.clone(),
                    vision_model: c.vision_model.clone(),
                }
            })
            .collect();
        Self { descriptors }
    }

    /// Descriptor for a provider, if configured at all.
    #[must_use]
    pub fn descriptor(&self, provider: AiProvider) -> Option<&ProviderDescriptor> {
        self.descriptors.iter().find(|d| d.provider == provider)
    }

    /// Whether the provider has credentials.
    #[must_use]
    pub fn is_available(&self, provider: AiProvider) -> bool {
        self.descriptor(provider).is_some_and(|d| d.available)
    }

    /// Pick the preferred available provider for `capability`.
    ///
    /// # Errors
    ///
    /// Returns `NoProviderAvailable` when no provider in the preference
    /// order can serve the capability.
    pub fn select(&self, capability: Capability) -> Result<&ProviderDescriptor> {
        capability
            .preference()
            .iter()
            .filter_map(|p| self.descriptor(*p))
            .find(|d| d.can_serve(capability))
            .ok_or_else(|| BimcostError::NoProviderAvailable {
                capability: capability.label().to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(provider: AiProvider, key: Option<&str>) -> ProviderCredentials {
        ProviderCredentials {
            provider,
            api_key: key.map(str::to_string),
            base_url: provider.default_base_url().to_string(),
            text_model: format!("{}-text", provider.cli_name()),
            vision_model: format!("{}-vision", provider.cli_name()),
        }
    }

    fn table(xai: bool, openai: bool) -> ProviderTable {
        ProviderTable::resolve(&[
            creds(AiProvider::Xai, xai.then_some("xai-key")),
            creds(AiProvider::OpenAi, openai.then_some("sk-key")),
        ])
    }

    #[test]
    fn text_prefers_xai_vision_prefers_openai() {
        let t = table(true, true);
        assert_eq!(t.select(Capability::TextCompletion).unwrap().provider, AiProvider::Xai);
        assert_eq!(t.select(Capability::VisionAnalysis).unwrap().provider, AiProvider::OpenAi);
    }

    #[test]
    fn falls_back_to_secondary() {
        let only_openai = table(false, true);
        assert_eq!(
            only_openai.select(Capability::TextCompletion).unwrap().provider,
            AiProvider::OpenAi
        );
        let only_xai = table(true, false);
        assert_eq!(
            only_xai.select(Capability::VisionAnalysis).unwrap().provider,
            AiProvider::Xai
        );
    }

    #[test]
    fn none_available() {
        let t = table(false, false);
        let err = t.select(Capability::TextCompletion).unwrap_err();
        assert!(matches!(err, BimcostError::NoProviderAvailable { .. }));
        assert!(t.select(Capability::VisionAnalysis).is_err());
    }

    #[test]
    fn blank_key_is_unavailable() {
        let t = ProviderTable::resolve(&[creds(AiProvider::Xai, Some("   "))]);
        assert!(!t.is_available(AiProvider::Xai));
        assert!(!t.is_available(AiProvider::OpenAi));
    }

    #[test]
    fn selection_is_deterministic() {
        let t = table(true, true);
        let first = t.select(Capability::TextCompletion).unwrap().provider;
        for _ in 0..10 {
            assert_eq!(t.select(Capability::TextCompletion).unwrap().provider, first);
        }
    }

    #[test]
    fn model_follows_capability() {
        let t = table(true, true);
        let d = t.descriptor(AiProvider::OpenAi).unwrap();
        assert_eq!(d.model_for(Capability::VisionAnalysis), "openai-vision");
        assert_eq!(d.model_for(Capability::TextCompletion), "openai-text");
    }

    #[test]
    fn debug_redacts_key() {
        let t = table(true, false);
        let rendered = format!("{:?}", t.descriptor(AiProvider::Xai).unwrap());
        assert!(!rendered.contains("xai-key"));
    }
}
