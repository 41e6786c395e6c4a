use std::sync::Arc;
use std::time::Duration;

use chat_provider::{CompletionService, Tokenizer};
use chat_provider_mock::{MockCompletionService, WhitespaceTokenizer, MOCK_PROVIDER_ID};
use chat_provider_openai::{
    OpenAiCompletionService, OpenAiProviderConfig, TiktokenTokenizer, OPENAI_PROVIDER_ID,
};

use crate::config::Settings;

pub const DEFAULT_PROVIDER_ID: &str = OPENAI_PROVIDER_ID;
pub const PROVIDER_ENV_VAR: &str = "CHAT_PROVIDER";

const MOCK_TOKEN_DELAY: Duration = Duration::from_millis(20);

/// The completion service and matching tokenizer for one session.
pub struct ProviderBundle {
    pub service: Arc<dyn CompletionService>,
    pub tokenizer: Arc<dyn Tokenizer>,
}

impl std::fmt::Debug for ProviderBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderBundle")
            .field("provider_id", &self.service.provider_id())
            .finish_non_exhaustive()
    }
}

pub fn provider_from_env(settings: &Settings) -> Result<ProviderBundle, String> {
    let provider_id = std::env::var(PROVIDER_ENV_VAR)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    provider_for_id(
        provider_id.as_deref().unwrap_or(DEFAULT_PROVIDER_ID),
        settings,
    )
}

pub fn provider_for_id(provider_id: &str, settings: &Settings) -> Result<ProviderBundle, String> {
    match provider_id {
        OPENAI_PROVIDER_ID => {
            let mut config = OpenAiProviderConfig::new(settings.apikey.clone().unwrap_or_default());
            if let Some(base_url) = &settings.base_url {
                config = config.with_base_url(base_url.clone());
            }
            if let Some(organization) = &settings.organization {
                config = config.with_organization(organization.clone());
            }
            if let Some(timeout) = settings.timeout {
                config = config.with_timeout(timeout);
            }

            let service = OpenAiCompletionService::new(config).map_err(|error| error.to_string())?;
            let tokenizer =
                TiktokenTokenizer::for_model(&settings.model).map_err(|error| error.to_string())?;

            Ok(ProviderBundle {
                service: Arc::new(service),
                tokenizer: Arc::new(tokenizer),
            })
        }
        MOCK_PROVIDER_ID => Ok(ProviderBundle {
            service: Arc::new(MockCompletionService::default().with_token_delay(MOCK_TOKEN_DELAY)),
            tokenizer: Arc::new(WhitespaceTokenizer),
        }),
        unknown => Err(format!(
            "Unsupported provider '{unknown}'. Available providers: {OPENAI_PROVIDER_ID}, {MOCK_PROVIDER_ID}"
        )),
    }
}
