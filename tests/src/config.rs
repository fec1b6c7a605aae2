use agentkit_core::llm::ProviderConfig;

/// Reads `OPENAI_API_KEY` (and optionally `OPENAI_BASE_URL`/`OPENAI_MODEL`)
/// from the environment and builds a [`ProviderConfig`] from them.
///
/// Core runtime types never read the environment themselves (SPEC §10.3);
/// this lives in the testing/demo layer for harnesses and examples that want
/// a quick real-provider config without hand-assembling one.
pub trait ProviderConfigExt: Sized {
    fn from_env() -> Option<Self>;
}

impl ProviderConfigExt for ProviderConfig {
    fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok()?;
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let mut config = ProviderConfig::new(api_key, model);
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            config = config.with_base_url(base_url);
        }
        Some(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_returns_none_without_api_key() {
        // SAFETY: test-only, single-threaded within this test function's scope.
        unsafe {
            std::env::remove_var("OPENAI_API_KEY");
        }
        assert!(ProviderConfig::from_env().is_none());
    }
}
