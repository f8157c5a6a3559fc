//! Configuration loading for the vizgen CLI.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag, must exist)
//! 2. `~/.vizgen/config.toml` (user)
//! 3. `/etc/vizgen/config.toml` (system)
//! 4. built-in defaults
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.vizgen/secrets.toml` (user, must be 0600 or 0400)
//! 2. the `OPENROUTER_API_KEY` environment variable

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{CacheConfig, FileBackend};
use crate::gateway::{DEFAULT_BASE_TIMEOUT, DEFAULT_RESULT_TTL, DEFAULT_SWEEP_INTERVAL};
use crate::history::{DEFAULT_MAX_ITEMS, HistoryStore};
use crate::providers::RetryConfig;
use crate::providers::openrouter::{DEFAULT_APP_TITLE, DEFAULT_APP_URL, DEFAULT_BASE_URL};
use crate::templates::{DEFAULT_TEMPLATE, Template, TemplateLibrary};
use crate::types::{DEFAULT_MAX_PROMPT_CHARS, KnownModel, OutputFormat};
use crate::{Result, VisualizerBuilder, VizgenError};

/// Environment variable holding the OpenRouter API key.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// CLI configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub history: HistorySection,
    #[serde(default)]
    pub templates: Vec<CustomTemplate>,
}

/// OpenRouter endpoint and app identification.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Sent as `HTTP-Referer`.
    #[serde(default = "default_app_url")]
    pub app_url: String,
    /// Sent as `X-Title`.
    #[serde(default = "default_app_title")]
    pub app_title: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            app_url: default_app_url(),
            app_title: default_app_title(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_app_url() -> String {
    DEFAULT_APP_URL.to_string()
}

fn default_app_title() -> String {
    DEFAULT_APP_TITLE.to_string()
}

/// Defaults for `vizgen generate`.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default = "default_template")]
    pub template: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            format: OutputFormat::default(),
            template: default_template(),
        }
    }
}

fn default_model() -> String {
    KnownModel::ClaudeSonnet4.id().to_string()
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

/// Input and timeout limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum prompt length in characters (default: 8000).
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    /// Base per-attempt timeout in seconds (default: 30).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_input_chars: default_max_input_chars(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_max_input_chars() -> usize {
    DEFAULT_MAX_PROMPT_CHARS
}

fn default_timeout() -> u64 {
    DEFAULT_BASE_TIMEOUT.as_secs()
}

/// Retry policy.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    RetryConfig::default().max_attempts
}

fn default_initial_delay_ms() -> u64 {
    RetryConfig::default().initial_delay.as_millis() as u64
}

fn default_max_delay_ms() -> u64 {
    RetryConfig::default().max_delay.as_millis() as u64
}

/// Result cache.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Persistent cache directory (default: `<user cache dir>/vizgen`).
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_max_memory_entries")]
    pub max_memory_entries: usize,
    #[serde(default = "default_result_ttl_secs")]
    pub result_ttl_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            dir: None,
            max_memory_entries: default_max_memory_entries(),
            result_ttl_secs: default_result_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_max_memory_entries() -> usize {
    CacheConfig::default().max_memory_entries
}

fn default_result_ttl_secs() -> u64 {
    DEFAULT_RESULT_TTL.as_secs()
}

fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL.as_secs()
}

/// Generation history.
#[derive(Debug, Clone, Deserialize)]
pub struct HistorySection {
    /// History file (default: `<user data dir>/vizgen/history.json`).
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            path: None,
            max_items: default_max_items(),
        }
    }
}

fn default_max_items() -> usize {
    DEFAULT_MAX_ITEMS
}

/// A user-defined prompt template.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomTemplate {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub template: String,
}

/// Secrets configuration (API keys).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub openrouter: Option<ApiKeySecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// An explicit path must exist; otherwise a missing file means defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            VizgenError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            VizgenError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(VizgenError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".vizgen").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        let system_config = PathBuf::from("/etc/vizgen/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .max_attempts(self.retry.max_attempts)
            .initial_delay(Duration::from_millis(self.retry.initial_delay_ms))
            .max_delay(Duration::from_millis(self.retry.max_delay_ms))
    }

    /// Cache configuration; the CLI always uses a persistent directory.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .max_memory_entries(self.cache.max_memory_entries)
            .persistent_dir(
                self.cache
                    .dir
                    .clone()
                    .unwrap_or_else(FileBackend::default_dir),
            )
    }

    /// A visualizer builder configured from this file and `api_key`.
    pub fn visualizer_builder(&self, api_key: impl Into<String>) -> VisualizerBuilder {
        VisualizerBuilder::new()
            .openrouter(api_key)
            .base_url(&self.api.base_url)
            .app_url(&self.api.app_url)
            .app_title(&self.api.app_title)
            .cache_config(self.cache_config())
            .retry(self.retry_config())
            .base_timeout(Duration::from_secs(self.limits.timeout_secs))
            .max_prompt_chars(self.limits.max_input_chars)
            .result_ttl(Duration::from_secs(self.cache.result_ttl_secs))
            .sweep_interval(Duration::from_secs(self.cache.sweep_interval_secs))
    }

    /// Built-in templates plus the ones defined in `[[templates]]`.
    pub fn template_library(&self) -> Result<TemplateLibrary> {
        let mut library = TemplateLibrary::new();
        for custom in &self.templates {
            library.add_custom(
                custom.key.clone(),
                Template::new(&custom.name, &custom.description, &custom.template),
            )?;
        }
        Ok(library)
    }

    pub fn history_store(&self) -> HistoryStore {
        HistoryStore::new(
            self.history
                .path
                .clone()
                .unwrap_or_else(HistoryStore::default_path),
        )
        .max_items(self.history.max_items)
    }
}

impl Secrets {
    /// Load secrets from `~/.vizgen/secrets.toml` with permission checks.
    ///
    /// Returns empty secrets if no file exists (the key may come from the
    /// environment).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".vizgen").join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from_file(&user_secrets);
            }
        }
        Ok(Secrets::default())
    }

    /// Load secrets from `path`, which must not be group or world accessible.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            VizgenError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            VizgenError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            VizgenError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(VizgenError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// The OpenRouter API key, falling back to `OPENROUTER_API_KEY`.
    pub fn api_key(&self) -> Option<String> {
        self.openrouter
            .as_ref()
            .map(|s| s.api_key.clone())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }

    /// Like [`api_key`](Self::api_key), but missing is an error.
    pub fn require_api_key(&self) -> Result<String> {
        self.api_key().ok_or(VizgenError::MissingApiKey)
    }
}
