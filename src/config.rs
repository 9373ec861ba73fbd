use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub max_connections: u32,
    pub excerpt_words: usize,
    pub words_per_minute: u32,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let max_connections = parse_positive::<u32>(&env_map, "MAX_CONNECTIONS", "5")?;
        let excerpt_words = parse_positive::<usize>(&env_map, "EXCERPT_WORDS", "100")?;
        let words_per_minute = parse_positive::<u32>(&env_map, "WORDS_PER_MINUTE", "200")?;

        Ok(Config {
            database_path,
            max_connections,
            excerpt_words,
            words_per_minute,
        })
    }
}

fn parse_positive<T>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let value = env_map
        .get(key)
        .map(|s| s.as_str())
        .unwrap_or(default)
        .trim()
        .parse::<T>()
        .map_err(|_| {
            ConfigError::InvalidValue(key.to_string(), "must be a positive integer".to_string())
        })?;

    if value <= T::default() {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }

    Ok(value)
}
