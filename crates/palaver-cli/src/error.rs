use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },
    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// The environment variable that sets a configuration key, e.g. `provider.api_key` is set by
/// `PALAVER_PROVIDER__API_KEY`
pub fn to_env_var(field: &str) -> String {
    format!("PALAVER_{}", field.replace('.', "__").to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_env_var() {
        assert_eq!(to_env_var("provider.type"), "PALAVER_PROVIDER__TYPE");
        assert_eq!(to_env_var("agent.max_tokens"), "PALAVER_AGENT__MAX_TOKENS");
    }
}
