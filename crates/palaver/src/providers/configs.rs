use anyhow::{anyhow, Result};
use std::env;

pub const ANTHROPIC_HOST: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const OPENAI_HOST: &str = "https://api.openai.com";
pub const GOOGLE_HOST: &str = "https://generativelanguage.googleapis.com";

pub trait EnvConfig {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self>
    where
        Self: Sized;

    /// Helper function to get environment variables with error handling
    fn get_env(key: &str, required: bool, default: Option<String>) -> Result<Option<String>> {
        match env::var(key) {
            Ok(value) => Ok(Some(value)),
            Err(env::VarError::NotPresent) if !required => Ok(default),
            Err(env::VarError::NotPresent) => Err(anyhow!(
                "Environment variable '{}' is required but not set.",
                key
            )),
            Err(e) => Err(e.into()),
        }
    }
}

// Unified enum to wrap different provider configurations
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    Anthropic(AnthropicProviderConfig),
    OpenAi(OpenAiProviderConfig),
    Google(GoogleProviderConfig),
}

#[derive(Debug, Clone)]
pub struct AnthropicProviderConfig {
    pub host: String,
    pub api_key: String,
    pub version: String,
}

impl AnthropicProviderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            host: ANTHROPIC_HOST.to_string(),
            api_key: api_key.into(),
            version: ANTHROPIC_VERSION.to_string(),
        }
    }
}

impl EnvConfig for AnthropicProviderConfig {
    fn from_env() -> Result<Self> {
        let api_key = Self::get_env("ANTHROPIC_API_KEY", true, None)?
            .ok_or_else(|| anyhow!("Anthropic API key should be present"))?;
        let host = Self::get_env("ANTHROPIC_HOST", false, Some(ANTHROPIC_HOST.to_string()))?
            .unwrap_or_else(|| ANTHROPIC_HOST.to_string());

        Ok(Self {
            host,
            ..Self::new(api_key)
        })
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
}

impl OpenAiProviderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            host: OPENAI_HOST.to_string(),
            api_key: api_key.into(),
        }
    }
}

impl EnvConfig for OpenAiProviderConfig {
    fn from_env() -> Result<Self> {
        let api_key = Self::get_env("OPENAI_API_KEY", true, None)?
            .ok_or_else(|| anyhow!("OpenAI API key should be present"))?;
        let host = Self::get_env("OPENAI_HOST", false, Some(OPENAI_HOST.to_string()))?
            .unwrap_or_else(|| OPENAI_HOST.to_string());

        Ok(Self { host, api_key })
    }
}

#[derive(Debug, Clone)]
pub struct GoogleProviderConfig {
    pub host: String,
    pub api_key: String,
}

impl GoogleProviderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            host: GOOGLE_HOST.to_string(),
            api_key: api_key.into(),
        }
    }
}

impl EnvConfig for GoogleProviderConfig {
    fn from_env() -> Result<Self> {
        let api_key = Self::get_env("GOOGLE_API_KEY", true, None)?
            .ok_or_else(|| anyhow!("Google API key should be present"))?;
        let host = Self::get_env("GOOGLE_HOST", false, Some(GOOGLE_HOST.to_string()))?
            .unwrap_or_else(|| GOOGLE_HOST.to_string());

        Ok(Self { host, api_key })
    }
}
