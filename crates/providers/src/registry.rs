//! Provider registry.
//!
//! Constructs and holds all configured adapter instances.  At startup
//! the registry reads the provider tables, resolves authentication
//! (config value or environment variable), and instantiates the family
//! adapter for each entry.  Providers that fail to initialize are
//! logged (secrets masked) and skipped rather than aborting startup.

use std::collections::HashMap;
use std::sync::Arc;

use cq_domain::config::{Config, ProviderKind};
use cq_domain::error::{Error, Result};

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::LlmProvider;
use crate::util::mask_secrets;

/// Holds all instantiated LLM providers.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
}

impl ProviderRegistry {
    /// Build the registry from the application config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();

        for pc in &config.providers {
            let result: Result<Arc<dyn LlmProvider>> = match pc.kind {
                ProviderKind::OpenaiCompat => {
                    OpenAiCompatProvider::from_config(pc).map(|p| Arc::new(p) as _)
                }
                ProviderKind::Anthropic => {
                    AnthropicProvider::from_config(pc).map(|p| Arc::new(p) as _)
                }
            };

            match result {
                Ok(provider) => {
                    tracing::info!(provider_id = %pc.id, kind = ?pc.kind, "registered LLM provider");
                    providers.insert(pc.id.clone(), provider);
                }
                Err(e) => {
                    tracing::warn!(
                        provider_id = %pc.id,
                        kind = ?pc.kind,
                        error = %mask_secrets(&e.to_string()),
                        "failed to initialize LLM provider, skipping"
                    );
                }
            }
        }

        Ok(Self { providers })
    }

    /// Look up a provider by its config id.
    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(provider_id).cloned()
    }

    /// Resolve a `"provider_id/model_name"` spec into an adapter and the
    /// model to request.  A spec without a `/` resolves the provider by
    /// the whole string and uses the adapter's default model.
    pub fn for_model_spec(&self, spec: &str) -> Result<(Arc<dyn LlmProvider>, String)> {
        let (provider_id, model) = match spec.split_once('/') {
            Some((provider, model)) => (provider, Some(model)),
            None => (spec, None),
        };
        let provider = self.get(provider_id).ok_or_else(|| Error::Config(format!(
            "model spec '{spec}': no provider with id '{provider_id}' is configured"
        )))?;
        let model = model
            .map(String::from)
            .unwrap_or_else(|| provider.default_model().to_owned());
        Ok((provider, model))
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cq_domain::config::ProviderConfig;

    fn config_with_provider(id: &str) -> Config {
        let mut config = Config::default();
        config.providers.push(ProviderConfig {
            id: id.into(),
            kind: ProviderKind::OpenaiCompat,
            base_url: "https://example.invalid/v1".into(),
            api_key: Some("sk-test".into()),
            api_key_env: None,
            default_model: Some("test-model".into()),
            max_tokens: 4096,
        });
        config
    }

    #[test]
    fn builds_and_resolves_by_id() {
        let registry = ProviderRegistry::from_config(&config_with_provider("gw")).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.get("gw").is_some());
        assert!(registry.get("other").is_none());
    }

    #[test]
    fn model_spec_splits_on_first_slash() {
        let registry = ProviderRegistry::from_config(&config_with_provider("gw")).unwrap();
        let (provider, model) = registry.for_model_spec("gw/org/some-model").unwrap();
        assert_eq!(provider.provider_id(), "gw");
        assert_eq!(model, "org/some-model");
    }

    #[test]
    fn bare_spec_uses_default_model() {
        let registry = ProviderRegistry::from_config(&config_with_provider("gw")).unwrap();
        let (_, model) = registry.for_model_spec("gw").unwrap();
        assert_eq!(model, "test-model");
    }

    #[test]
    fn unknown_provider_is_a_config_error() {
        let registry = ProviderRegistry::from_config(&Config::default()).unwrap();
        let err = registry.for_model_spec("ghost/model").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn failed_init_is_skipped_not_fatal() {
        // No api_key and no env var set: init fails, registry stays empty.
        let mut config = config_with_provider("gw");
        config.providers[0].api_key = None;
        config.providers[0].api_key_env = Some("CQ_TEST_REGISTRY_UNSET_VAR".into());

        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert!(registry.is_empty());
    }
}
