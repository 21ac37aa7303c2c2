use std::sync::Arc;
use std::time::Duration;

use streamchat_ai::{LlmClient, OpenAIClient};

use crate::config::{RelayMode, ServerConfig};
use crate::relay::{FixedParagraphSource, FragmentSource, LiveProviderSource, RelayError};

/// Application state shared across all API handlers
pub type AppState = Arc<RelayState>;

/// Everything a chat request needs to pick its fragment source.
pub struct RelayState {
    mode: RelayMode,
    llm: Option<Arc<dyn LlmClient>>,
    token_interval: Duration,
}

impl RelayState {
    pub fn new(mode: RelayMode, llm: Option<Arc<dyn LlmClient>>, token_interval: Duration) -> Self {
        Self {
            mode,
            llm,
            token_interval,
        }
    }

    /// Build the provider client once, only when a credential is configured.
    pub fn from_config(config: &ServerConfig) -> Self {
        let llm = config.api_key.as_ref().map(|key| {
            Arc::new(
                OpenAIClient::new(key.clone())
                    .with_model(config.model.clone())
                    .with_base_url(config.base_url.clone()),
            ) as Arc<dyn LlmClient>
        });

        Self::new(config.mode, llm, config.token_interval)
    }

    pub fn mode(&self) -> RelayMode {
        self.mode
    }

    pub fn has_credential(&self) -> bool {
        self.llm.is_some()
    }

    /// Select the fragment source for one session.
    pub fn fragment_source(&self) -> Result<Box<dyn FragmentSource>, RelayError> {
        match self.mode {
            RelayMode::Development => Ok(Box::new(FixedParagraphSource::new(self.token_interval))),
            RelayMode::Production => {
                let client = self.llm.clone().ok_or(RelayError::MissingApiKey)?;
                Ok(Box::new(LiveProviderSource::new(client)))
            }
        }
    }
}
