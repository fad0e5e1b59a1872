use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment, File};
use palaver::models::model::ModelInfo;
use palaver::models::request::DEFAULT_MAX_TOKENS;
use palaver::providers::configs::{
    AnthropicProviderConfig, GoogleProviderConfig, OpenAiProviderConfig, ProviderConfig,
    ANTHROPIC_HOST, ANTHROPIC_VERSION, GOOGLE_HOST, OPENAI_HOST,
};
use palaver::providers::factory::ProviderType;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct AgentSettings {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: default_max_tokens(),
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ProviderSettings {
    Anthropic {
        #[serde(default = "default_anthropic_host")]
        host: String,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_anthropic_version")]
        version: String,
    },
    OpenAi {
        #[serde(default = "default_openai_host")]
        host: String,
        #[serde(default)]
        api_key: Option<String>,
    },
    Google {
        #[serde(default = "default_google_host")]
        host: String,
        #[serde(default)]
        api_key: Option<String>,
    },
}

impl ProviderSettings {
    pub fn provider_type(&self) -> ProviderType {
        match self {
            ProviderSettings::Anthropic { .. } => ProviderType::Anthropic,
            ProviderSettings::OpenAi { .. } => ProviderType::OpenAi,
            ProviderSettings::Google { .. } => ProviderType::Google,
        }
    }

    /// The model used when none is configured
    pub fn default_model(&self) -> ModelInfo {
        match self {
            ProviderSettings::Anthropic { .. } => ModelInfo::claude_sonnet_4_5(),
            ProviderSettings::OpenAi { .. } => ModelInfo::gpt_4_1(),
            ProviderSettings::Google { .. } => ModelInfo::gemini_2_5_pro(),
        }
    }

    // Convert to the palaver ProviderConfig, falling back to the vendor's usual key variable
    pub fn into_config(self) -> Result<ProviderConfig, ConfigError> {
        Ok(match self {
            ProviderSettings::Anthropic {
                host,
                api_key,
                version,
            } => ProviderConfig::Anthropic(AnthropicProviderConfig {
                host,
                api_key: api_key_or_env(api_key, "ANTHROPIC_API_KEY")?,
                version,
            }),
            ProviderSettings::OpenAi { host, api_key } => {
                ProviderConfig::OpenAi(OpenAiProviderConfig {
                    host,
                    api_key: api_key_or_env(api_key, "OPENAI_API_KEY")?,
                })
            }
            ProviderSettings::Google { host, api_key } => {
                ProviderConfig::Google(GoogleProviderConfig {
                    host,
                    api_key: api_key_or_env(api_key, "GOOGLE_API_KEY")?,
                })
            }
        })
    }
}

fn api_key_or_env(api_key: Option<String>, fallback: &str) -> Result<String, ConfigError> {
    api_key
        .or_else(|| env::var(fallback).ok())
        .ok_or_else(|| ConfigError::MissingEnvVar {
            env_var: format!("{} or {}", to_env_var("provider.api_key"), fallback),
        })
}

/// Values given on the command line, which win over every other source
#[derive(Debug, Default)]
pub struct Overrides {
    pub config_file: Option<PathBuf>,
    pub provider: Option<ProviderType>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub agent: AgentSettings,
    pub provider: ProviderSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(Overrides::default())
    }

    pub fn load(overrides: Overrides) -> Result<Self, ConfigError> {
        let file = match &overrides.config_file {
            Some(path) => File::from(path.as_path()).required(true),
            None => File::with_name("palaver").required(false),
        };

        let config = Config::builder()
            .set_default("agent.max_tokens", i64::from(DEFAULT_MAX_TOKENS))?
            .set_default("agent.temperature", 0.0)?
            .add_source(file)
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("PALAVER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("provider.type", overrides.provider.map(|p| p.to_string()))?
            .set_override_option("agent.model", overrides.model)?
            .set_override_option(
                "agent.max_tokens",
                overrides.max_tokens.map(|v| v.to_string()),
            )?
            .set_override_option(
                "agent.temperature",
                overrides.temperature.map(|v| v.to_string()),
            )?
            .build()?;

        match config.try_deserialize::<Self>() {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    // "missing field `type`" comes from the provider tag
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    let field = match field {
                        "type" | "provider" => "provider.type",
                        other => other,
                    };
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }

    /// The configured model, or the provider's default
    pub fn model(&self) -> ModelInfo {
        match &self.agent.model {
            Some(code) => ModelInfo::from_code(code),
            None => self.provider.default_model(),
        }
    }
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_anthropic_host() -> String {
    ANTHROPIC_HOST.to_string()
}

fn default_anthropic_version() -> String {
    ANTHROPIC_VERSION.to_string()
}

fn default_openai_host() -> String {
    OPENAI_HOST.to_string()
}

fn default_google_host() -> String {
    GOOGLE_HOST.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clean_env() {
        for (key, _) in env::vars() {
            if key.starts_with("PALAVER_") {
                env::remove_var(&key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_default_settings() {
        clean_env();
        env::set_var("PALAVER_PROVIDER__TYPE", "anthropic");
        env::set_var("PALAVER_PROVIDER__API_KEY", "test-key");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.agent.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(settings.agent.temperature, 0.0);
        assert_eq!(settings.model().code, "claude-sonnet-4-5-20250929");

        if let ProviderSettings::Anthropic {
            host,
            api_key,
            version,
        } = settings.provider
        {
            assert_eq!(host, ANTHROPIC_HOST);
            assert_eq!(api_key.as_deref(), Some("test-key"));
            assert_eq!(version, ANTHROPIC_VERSION);
        } else {
            panic!("Expected Anthropic provider");
        }

        clean_env();
    }

    #[test]
    #[serial]
    fn test_environment_values() {
        clean_env();
        env::set_var("PALAVER_PROVIDER__TYPE", "google");
        env::set_var("PALAVER_PROVIDER__HOST", "http://localhost:8080");
        env::set_var("PALAVER_AGENT__MODEL", "gemini-2.5-flash");
        env::set_var("PALAVER_AGENT__MAX_TOKENS", "2000");
        env::set_var("PALAVER_AGENT__TEMPERATURE", "0.5");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.agent.max_tokens, 2000);
        assert_eq!(settings.agent.temperature, 0.5);
        assert_eq!(settings.model().code, "gemini-2.5-flash");
        assert_eq!(settings.provider.provider_type(), ProviderType::Google);
        if let ProviderSettings::Google { host, api_key } = settings.provider {
            assert_eq!(host, "http://localhost:8080");
            assert_eq!(api_key, None);
        } else {
            panic!("Expected Google provider");
        }

        clean_env();
    }

    #[test]
    #[serial]
    fn test_overrides_win() {
        clean_env();
        env::set_var("PALAVER_PROVIDER__TYPE", "anthropic");
        env::set_var("PALAVER_AGENT__MAX_TOKENS", "2000");

        let settings = Settings::load(Overrides {
            provider: Some(ProviderType::OpenAi),
            model: Some("gpt-4o".to_string()),
            max_tokens: Some(512),
            ..Overrides::default()
        })
        .unwrap();
        assert_eq!(settings.provider.provider_type(), ProviderType::OpenAi);
        assert_eq!(settings.model().code, "gpt-4o");
        assert_eq!(settings.agent.max_tokens, 512);

        clean_env();
    }

    #[test]
    #[serial]
    fn test_missing_provider_type() {
        clean_env();

        let err = Settings::new().unwrap_err();
        match err {
            ConfigError::MissingEnvVar { env_var } => {
                assert_eq!(env_var, "PALAVER_PROVIDER__TYPE")
            }
            other => panic!("Expected missing env var, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_config_file() {
        clean_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("palaver.toml");
        std::fs::write(
            &path,
            "[agent]\nmodel = \"gpt-4.1-mini\"\n\n[provider]\ntype = \"openai\"\napi_key = \"file-key\"\n",
        )
        .unwrap();

        let settings = Settings::load(Overrides {
            config_file: Some(path),
            ..Overrides::default()
        })
        .unwrap();
        assert_eq!(settings.model().code, "gpt-4.1-mini");
        match settings.provider.into_config().unwrap() {
            ProviderConfig::OpenAi(config) => {
                assert_eq!(config.api_key, "file-key");
                assert_eq!(config.host, OPENAI_HOST);
            }
            other => panic!("Expected OpenAI config, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_api_key_falls_back_to_vendor_variable() {
        clean_env();
        env::set_var("GOOGLE_API_KEY", "vendor-key");
        let settings = ProviderSettings::Google {
            host: GOOGLE_HOST.to_string(),
            api_key: None,
        };
        match settings.into_config().unwrap() {
            ProviderConfig::Google(config) => assert_eq!(config.api_key, "vendor-key"),
            other => panic!("Expected Google config, got {:?}", other),
        }
        env::remove_var("GOOGLE_API_KEY");
    }
}
