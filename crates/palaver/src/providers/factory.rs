use anyhow::Result;
use std::sync::Arc;
use strum_macros::{Display, EnumIter, EnumString};

use super::{
    anthropic::AnthropicProvider,
    base::{ModelClient, ProviderClient},
    configs::{
        AnthropicProviderConfig, EnvConfig, GoogleProviderConfig, OpenAiProviderConfig,
        ProviderConfig,
    },
    google::GoogleProvider,
    openai::OpenAiProvider,
};
use crate::transport::Transport;

#[derive(EnumIter, EnumString, Display, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum ProviderType {
    Anthropic,
    OpenAi,
    Google,
}

impl ProviderConfig {
    pub fn provider_type(&self) -> ProviderType {
        match self {
            ProviderConfig::Anthropic(_) => ProviderType::Anthropic,
            ProviderConfig::OpenAi(_) => ProviderType::OpenAi,
            ProviderConfig::Google(_) => ProviderType::Google,
        }
    }

    pub fn from_env(provider_type: ProviderType) -> Result<Self> {
        Ok(match provider_type {
            ProviderType::Anthropic => {
                ProviderConfig::Anthropic(AnthropicProviderConfig::from_env()?)
            }
            ProviderType::OpenAi => ProviderConfig::OpenAi(OpenAiProviderConfig::from_env()?),
            ProviderType::Google => ProviderConfig::Google(GoogleProviderConfig::from_env()?),
        })
    }
}

pub fn get_client(config: ProviderConfig, transport: Arc<dyn Transport>) -> Box<dyn ModelClient> {
    match config {
        ProviderConfig::Anthropic(anthropic_config) => Box::new(ProviderClient::new(
            AnthropicProvider::new(anthropic_config),
            transport,
        )),
        ProviderConfig::OpenAi(openai_config) => Box::new(ProviderClient::new(
            OpenAiProvider::new(openai_config),
            transport,
        )),
        ProviderConfig::Google(google_config) => Box::new(ProviderClient::new(
            GoogleProvider::new(google_config),
            transport,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_provider_type_names() {
        let names: Vec<String> = ProviderType::iter().map(|p| p.to_string()).collect();
        assert_eq!(names, vec!["anthropic", "openai", "google"]);
        assert_eq!("openai".parse::<ProviderType>().unwrap(), ProviderType::OpenAi);
    }

    #[test]
    fn test_config_type() {
        let config = ProviderConfig::Google(GoogleProviderConfig::new("key"));
        assert_eq!(config.provider_type(), ProviderType::Google);
    }
}
