//! Provider factory
//!
//! Builds the configured provider. Providers are behind `Arc<dyn
//! EodProvider>` so the ingest path is provider-agnostic.

use std::sync::Arc;

use crate::config::ProviderSettings;
use crate::provider::{EodProvider, MockProvider, ProviderError, YahooProvider};

/// Create the provider named in settings.
pub fn build_provider(settings: &ProviderSettings) -> Result<Arc<dyn EodProvider>, ProviderError> {
    match settings.source.as_str() {
        "yahoo" => Ok(Arc::new(YahooProvider::new(
            &settings.yahoo,
            settings.timeout_secs,
        )?)),
        "mock" => Ok(Arc::new(MockProvider::new())),
        other => Err(ProviderError::Configuration(format!(
            "unknown provider '{}' (expected 'yahoo' or 'mock')",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderSettings;

    #[test]
    fn test_builds_known_providers() {
        let mut settings = ProviderSettings::default();
        assert_eq!(build_provider(&settings).unwrap().name(), "yahoo");

        settings.source = "mock".to_string();
        assert_eq!(build_provider(&settings).unwrap().name(), "mock");
    }

    #[test]
    fn test_unknown_provider_is_configuration_error() {
        let mut settings = ProviderSettings::default();
        settings.source = "bloomberg".to_string();
        assert!(matches!(
            build_provider(&settings),
            Err(ProviderError::Configuration(_))
        ));
    }
}
