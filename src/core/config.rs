//! Loads relay settings and selects the provider backend.

use llm::builder::LLMBackend;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::api::{
    LlmGateway, LlmSettings, MockGateway, ProviderGateway, StreamEncoder, DEFAULT_CACHE_TTL,
    DEFAULT_FLUSH_CHARS,
};

const TTL_ENV: &str = "PROMPT_CACHE_TTL_SECONDS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config.toml: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid backend '{0}'")]
    Backend(String),

    #[error("Environment variable '{var}' not set for backend '{backend}'")]
    MissingKey { var: String, backend: String },

    #[error("Invalid value for {var}: {value}")]
    Env { var: String, value: String },
}

#[derive(Deserialize, Debug, Default)]
pub struct Settings {
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub stream: StreamSettings,
    #[serde(default)]
    pub provider: ProviderConfig,
}

#[derive(Deserialize, Debug)]
pub struct CacheSettings {
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

#[derive(Deserialize, Debug)]
pub struct StreamSettings {
    #[serde(default = "default_flush_chars")]
    pub flush_chars: usize,
    #[serde(default = "default_true")]
    pub flush_on_newline: bool,
}

#[derive(Deserialize, Debug)]
pub struct ProviderConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub model: String,
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

fn default_ttl_seconds() -> u64 {
    DEFAULT_CACHE_TTL.as_secs()
}

fn default_flush_chars() -> usize {
    DEFAULT_FLUSH_CHARS
}

fn default_true() -> bool {
    true
}

fn default_backend() -> String {
    "mock".to_string()
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            flush_chars: default_flush_chars(),
            flush_on_newline: true,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            model: String::new(),
            api_key_env: None,
            base_url: None,
            timeout_seconds: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

impl Settings {
    /// Reads `config.toml` at `path`; a missing file yields the defaults.
    /// `PROMPT_CACHE_TTL_SECONDS` overrides the cache TTL.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_ttl(path, env::var(TTL_ENV).ok())
    }

    fn load_with_ttl(path: &Path, ttl_override: Option<String>) -> Result<Self, ConfigError> {
        let mut settings = if path.exists() {
            let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
            Self::from_toml(&content)?
        } else {
            Self::default()
        };

        if let Some(value) = ttl_override {
            settings.cache.ttl_seconds = value.trim().parse().map_err(|_| ConfigError::Env {
                var: TTL_ENV.to_string(),
                value,
            })?;
        }
        Ok(settings)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_seconds)
    }

    pub fn encoder(&self) -> StreamEncoder {
        StreamEncoder::new(self.stream.flush_chars, self.stream.flush_on_newline)
    }
}

/// Default API key variable for a backend, empty when none is needed.
fn default_key_env(backend: &LLMBackend) -> &'static str {
    match backend {
        LLMBackend::OpenAI => "OPENAI_API_KEY",
        LLMBackend::Anthropic => "ANTHROPIC_API_KEY",
        LLMBackend::Google => "GOOGLE_API_KEY",
        LLMBackend::Groq => "GROQ_API_KEY",
        LLMBackend::XAI => "XAI_API_KEY",
        LLMBackend::Cohere => "COHERE_API_KEY",
        LLMBackend::DeepSeek => "DEEPSEEK_API_KEY",
        LLMBackend::Mistral => "MISTRAL_API_KEY",
        _ => "",
    }
}

/// Builds the gateway named by `[provider] backend`.
pub fn build_gateway(conf: &ProviderConfig) -> Result<Arc<dyn ProviderGateway>, ConfigError> {
    if conf.backend.eq_ignore_ascii_case("mock") {
        return Ok(Arc::new(MockGateway::echo()));
    }

    let backend = LLMBackend::from_str(&conf.backend)
        .map_err(|_| ConfigError::Backend(conf.backend.clone()))?;

    let key_var = conf
        .api_key_env
        .clone()
        .unwrap_or_else(|| default_key_env(&backend).to_string());
    let api_key = if key_var.is_empty() {
        None // Some backends like Ollama don't require a key
    } else {
        Some(env::var(&key_var).map_err(|_| ConfigError::MissingKey {
            var: key_var.clone(),
            backend: conf.backend.clone(),
        })?)
    };

    let settings = LlmSettings {
        backend,
        model: conf.model.clone(),
        api_key,
        base_url: conf.base_url.clone(),
        timeout_seconds: conf.timeout_seconds,
        temperature: conf.temperature,
        max_tokens: conf.max_tokens,
    };
    Ok(Arc::new(LlmGateway::new(conf.backend.to_lowercase(), settings)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.cache_ttl(), Duration::from_secs(300));
        assert_eq!(settings.stream.flush_chars, 64);
        assert!(settings.stream.flush_on_newline);
        assert_eq!(settings.provider.backend, "mock");
    }

    #[test]
    fn sections_override_defaults() {
        let settings = Settings::from_toml(
            r#"
            [cache]
            ttl_seconds = 30

            [stream]
            flush_chars = 16
            flush_on_newline = false

            [provider]
            backend = "ollama"
            model = "llama3"
            base_url = "http://localhost:11434"
            "#,
        )
        .unwrap();
        assert_eq!(settings.cache.ttl_seconds, 30);
        let encoder = settings.encoder();
        assert_eq!(encoder.flush_chars, 16);
        assert!(!encoder.flush_on_newline);
        assert_eq!(settings.provider.model, "llama3");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_with_ttl(&dir.path().join("config.toml"), None).unwrap();
        assert_eq!(settings.provider.backend, "mock");
    }

    #[test]
    fn ttl_override_wins_over_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[cache]\nttl_seconds = 30\n").unwrap();

        let settings = Settings::load_with_ttl(&path, Some(" 5 ".into())).unwrap();
        assert_eq!(settings.cache_ttl(), Duration::from_secs(5));

        let settings = Settings::load_with_ttl(&path, None).unwrap();
        assert_eq!(settings.cache_ttl(), Duration::from_secs(30));
    }

    #[test]
    fn invalid_ttl_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load_with_ttl(&dir.path().join("config.toml"), Some("soon".into()))
            .unwrap_err();
        match err {
            ConfigError::Env { var, value } => {
                assert_eq!(var, "PROMPT_CACHE_TTL_SECONDS");
                assert_eq!(value, "soon");
            }
            other => panic!("expected Env error, got {:?}", other),
        }
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            Settings::from_toml("[cache\nttl_seconds = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn mock_backend_builds_without_keys() {
        let gateway = build_gateway(&ProviderConfig::default()).unwrap();
        assert_eq!(gateway.name(), "mock");
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let conf = ProviderConfig {
            backend: "carrier-pigeon".into(),
            ..Default::default()
        };
        assert!(matches!(build_gateway(&conf), Err(ConfigError::Backend(_))));
    }

    #[test]
    fn missing_api_key_is_reported() {
        let conf = ProviderConfig {
            backend: "openai".into(),
            model: "gpt-4o-mini".into(),
            api_key_env: Some("PROMPT_RELAY_TEST_KEY_THAT_IS_NOT_SET".into()),
            ..Default::default()
        };
        assert!(matches!(
            build_gateway(&conf),
            Err(ConfigError::MissingKey { .. })
        ));
    }
}
