/*
[INPUT]:  Optional YAML file, SAGESPACE_* and VITE_* environment variables
[OUTPUT]: Layered application configuration
[POS]:    Configuration layer - client, auth and session settings
[UPDATE]: When adding new configuration options
*/

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use sagespace_client::{ClientConfig, GoTrueConfig, RetryOptions, SessionConfig};
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "SAGESPACE";

/// App variables that override everything else, mapped to config keys.
const VITE_OVERRIDES: &[(&str, &str)] = &[
    ("VITE_API_URL", "api_url"),
    ("VITE_SUPABASE_URL", "auth_url"),
    ("VITE_SUPABASE_ANON_KEY", "auth_anon_key"),
];

/// Top-level configuration for the SageSpace CLI
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    /// API base URL; unset runs the client in demo mode
    #[serde(default)]
    pub api_url: Option<String>,
    /// Auth service URL; unset (or no anon key) runs in guest mode
    #[serde(default)]
    pub auth_url: Option<String>,
    #[serde(default)]
    pub auth_anon_key: Option<String>,
    /// Client state file (bearer token and auth session)
    #[serde(default)]
    pub token_file: Option<PathBuf>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub oauth_redirect_url: Option<String>,
}

/// Retry settings for transient API failures
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            auth_url: None,
            auth_anon_key: None,
            token_file: None,
            request_timeout_secs: default_request_timeout_secs(),
            retry: RetryConfig::default(),
            oauth_redirect_url: None,
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

/// `~/.config/sagespace/config.yaml` (platform equivalent)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sagespace").join("config.yaml"))
}

/// `~/.local/share/sagespace/storage.json` (platform equivalent)
pub fn default_token_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sagespace")
        .join("storage.json")
}

impl AppConfig {
    /// Load defaults, then the YAML file, then `SAGESPACE_*`, then `VITE_*`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// [`AppConfig::load`] with an explicit lookup for the `VITE_*` variables.
    pub fn load_with(path: Option<&Path>, vite_var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = Config::builder();

        let file = path.map(Path::to_path_buf).or_else(default_config_path);
        if let Some(file) = file {
            // An explicit path must exist; the default location is optional.
            let required = path.is_some();
            builder = builder.add_source(
                File::from(file.as_path())
                    .format(FileFormat::Yaml)
                    .required(required),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        for (var, key) in VITE_OVERRIDES {
            let value = vite_var(var).filter(|value| !value.trim().is_empty());
            builder = builder
                .set_override_option(*key, value)
                .with_context(|| format!("override {key} from {var}"))?;
        }

        let config: Self = builder
            .build()
            .context("build configuration")?
            .try_deserialize()
            .context("parse configuration")?;
        Ok(config)
    }

    pub fn token_path(&self) -> PathBuf {
        self.token_file.clone().unwrap_or_else(default_token_path)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.api_url.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
            retry: self.retry.enabled.then(|| {
                RetryOptions::new(
                    self.retry.max_retries,
                    Duration::from_millis(self.retry.retry_delay_ms),
                )
            }),
            ..ClientConfig::default()
        }
    }

    /// Auth provider settings, or `None` for guest mode.
    pub fn gotrue_config(&self) -> Option<GoTrueConfig> {
        let url = self.auth_url.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let key = self.auth_anon_key.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let mut config = GoTrueConfig::new(url, key);
        config.timeout = Duration::from_secs(self.request_timeout_secs);
        Some(config)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            oauth_redirect_url: self.oauth_redirect_url.clone(),
            password_reset_redirect_url: self.oauth_redirect_url.clone(),
            ..SessionConfig::default()
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("serialize config to YAML")
    }
}
