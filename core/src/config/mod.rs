use crate::agent::client::DEFAULT_MAX_TOOL_ROUNDS;
use crate::retry::{
    DEFAULT_EXP_BASE, DEFAULT_INITIAL_DELAY, DEFAULT_JITTER_FRACTION, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_DELAY, DEFAULT_RETRYABLE_STATUS, RetryPolicy,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const TROUPE_DIR: &str = ".troupe";

pub fn api_key_env_vars(provider: &str) -> &'static [&'static str] {
    match provider {
        "gemini" | "google" => &["GOOGLE_API_KEY", "GEMINI_API_KEY", "TROUPE_API_KEY"],
        "openai" => &["OPENAI_API_KEY", "TROUPE_API_KEY"],
        _ => &["TROUPE_API_KEY"],
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: u32,
    pub exp_base: f64,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_fraction: f64,
    pub http_status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_MAX_ATTEMPTS,
            exp_base: DEFAULT_EXP_BASE,
            initial_delay_ms: DEFAULT_INITIAL_DELAY.as_millis() as u64,
            max_delay_ms: DEFAULT_MAX_DELAY.as_millis() as u64,
            jitter_fraction: DEFAULT_JITTER_FRACTION,
            http_status_codes: DEFAULT_RETRYABLE_STATUS.to_vec(),
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> Result<RetryPolicy> {
        let policy = RetryPolicy::new(
            self.attempts,
            Duration::from_millis(self.initial_delay_ms),
            self.exp_base,
        )?
        .with_max_delay(Duration::from_millis(self.max_delay_ms))
        .with_jitter(self.jitter_fraction)?
        .with_retryable_status(self.http_status_codes.iter().copied());
        Ok(policy)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub provider: String,
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
    pub max_tool_rounds: usize,
    pub deadline_secs: Option<u64>,
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            provider: "gemini".to_string(),
            api_key: String::new(),
            base_url: None,
            model: "gemini-2.5-flash-lite".to_string(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            deadline_secs: None,
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        if config_exists() {
            load_config()
        } else {
            Ok(Config::default())
        }
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }

    pub fn resolve_api_key(&mut self) {
        self.resolve_api_key_with(|name| std::env::var(name).ok());
    }

    fn resolve_api_key_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if !self.api_key.trim().is_empty() {
            return;
        }
        let provider = self.provider.to_lowercase();
        if let Some(key) = api_key_env_vars(&provider)
            .iter()
            .filter_map(|name| lookup(name))
            .find(|value| !value.trim().is_empty())
        {
            self.api_key = key;
        }
    }
}

pub fn get_troupe_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(TROUPE_DIR)
}

pub fn get_config_path() -> PathBuf {
    get_troupe_dir().join("config.toml")
}

pub fn ensure_troupe_dir() -> Result<PathBuf> {
    let troupe_dir = get_troupe_dir();

    if !troupe_dir.exists() {
        std::fs::create_dir_all(&troupe_dir).with_context(|| {
            format!(
                "Failed to create troupe directory at {}",
                troupe_dir.display()
            )
        })?;
    }

    Ok(troupe_dir)
}

pub fn load_config() -> Result<Config> {
    load_config_from(&get_config_path())
}

pub fn load_config_from(config_path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(config_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            anyhow::anyhow!(
                "Config file not found. Run 'troupe onboard' to set up your configuration."
            )
        } else {
            anyhow::anyhow!("Failed to read config from {}: {}", config_path.display(), e)
        }
    })?;

    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", config_path.display()))
}

pub fn save_config(config: &Config) -> Result<()> {
    ensure_troupe_dir()?;
    save_config_to(config, &get_config_path())
}

pub fn save_config_to(config: &Config, config_path: &Path) -> Result<()> {
    let content =
        toml::to_string_pretty(config).with_context(|| "Failed to serialize config to TOML")?;

    std::fs::write(config_path, content)
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

    Ok(())
}

pub fn config_exists() -> bool {
    get_config_path().exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_retry_policy_defaults() {
        let config = Config::default();
        let policy = config.retry.to_policy().unwrap();

        assert_eq!(config.provider, "gemini");
        assert_eq!(config.max_tool_rounds, 8);
        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.base_delay(2), Duration::from_secs(7));
        assert!(policy.is_retryable_status(503));
        assert!(!policy.is_retryable_status(400));
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
provider = "openai"
model = "gpt-4o-mini"

[retry]
attempts = 2
http_status_codes = [502]
"#,
        )
        .unwrap();

        assert_eq!(config.provider, "openai");
        assert_eq!(config.retry.attempts, 2);
        assert_eq!(config.retry.exp_base, DEFAULT_EXP_BASE);
        assert_eq!(config.max_tool_rounds, DEFAULT_MAX_TOOL_ROUNDS);

        let policy = config.retry.to_policy().unwrap();
        assert!(policy.is_retryable_status(502));
        assert!(!policy.is_retryable_status(503));
    }

    #[test]
    fn invalid_retry_table_is_rejected() {
        let retry = RetryConfig {
            attempts: 0,
            ..RetryConfig::default()
        };
        assert!(retry.to_policy().is_err());

        let retry = RetryConfig {
            exp_base: 1.0,
            ..RetryConfig::default()
        };
        assert!(retry.to_policy().is_err());
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let config = Config {
            api_key: "secret".into(),
            deadline_secs: Some(90),
            ..Config::default()
        };

        save_config_to(&config, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();

        assert_eq!(loaded, config);
        assert_eq!(loaded.deadline(), Some(Duration::from_secs(90)));
    }

    #[test]
    fn missing_file_points_at_onboarding() {
        let dir = TempDir::new().unwrap();
        let err = load_config_from(&dir.path().join("nope.toml")).unwrap_err();
        assert!(err.to_string().contains("troupe onboard"));
    }

    #[test]
    fn env_key_fills_only_empty_key() {
        let lookup = |name: &str| (name == "GEMINI_API_KEY").then(|| "from-env".to_string());

        let mut config = Config::default();
        config.resolve_api_key_with(lookup);
        assert_eq!(config.api_key, "from-env");

        let mut config = Config {
            api_key: "from-file".into(),
            ..Config::default()
        };
        config.resolve_api_key_with(lookup);
        assert_eq!(config.api_key, "from-file");
    }

    #[test]
    fn openai_ignores_google_variables() {
        let lookup = |name: &str| (name == "GOOGLE_API_KEY").then(|| "g".to_string());
        let mut config = Config {
            provider: "openai".into(),
            ..Config::default()
        };
        config.resolve_api_key_with(lookup);
        assert!(config.api_key.is_empty());
    }
}
