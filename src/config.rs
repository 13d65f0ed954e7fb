use crate::error::{Result, TranscacheError};
use crate::language::normalize_language;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default Google Cloud Translation endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://translation.googleapis.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub source_language: String,
    pub cache_capacity: usize,
    pub cache_ttl_secs: Option<u64>,
    pub timeout_secs: u64,
    pub batch_size: usize,
    pub concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            source_language: "en".to_string(),
            cache_capacity: 1024,
            cache_ttl_secs: None,
            timeout_secs: 10,
            batch_size: 100,
            concurrency: 4,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_file_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };

        config.apply_env(|name| std::env::var(name).ok());

        Ok(config)
    }

    /// Read a TOML config file. Missing keys keep their defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str::<Config>(&contents)?)
    }

    /// Override fields from environment variables looked up through `var`.
    ///
    /// Unparseable numeric values are ignored.
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = var("TRANSCACHE_API_KEY").or_else(|| var("GOOGLE_TRANSLATE_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(endpoint) = var("TRANSCACHE_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(lang) = var("TRANSCACHE_SOURCE_LANGUAGE") {
            self.source_language = lang;
        }
        if let Some(capacity) = var("TRANSCACHE_CACHE_CAPACITY") {
            if let Ok(c) = capacity.parse() {
                self.cache_capacity = c;
            }
        }
        if let Some(ttl) = var("TRANSCACHE_CACHE_TTL_SECS") {
            if let Ok(t) = ttl.parse() {
                self.cache_ttl_secs = Some(t);
            }
        }
        if let Some(timeout) = var("TRANSCACHE_TIMEOUT_SECS") {
            if let Ok(t) = timeout.parse() {
                self.timeout_secs = t;
            }
        }
        if let Some(batch_size) = var("TRANSCACHE_BATCH_SIZE") {
            if let Ok(b) = batch_size.parse() {
                self.batch_size = b;
            }
        }
        if let Some(concurrency) = var("TRANSCACHE_CONCURRENCY") {
            if let Ok(c) = concurrency.parse() {
                self.concurrency = c;
            }
        }
    }

    /// Check value ranges. A missing API key is not an error here; the
    /// translator degrades to the original text without one.
    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(TranscacheError::Config(
                "cache_capacity must be greater than 0".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(TranscacheError::Config(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.batch_size == 0 {
            return Err(TranscacheError::Config(
                "batch_size must be greater than 0".to_string(),
            ));
        }

        if self.concurrency == 0 {
            return Err(TranscacheError::Config(
                "concurrency must be greater than 0".to_string(),
            ));
        }

        if self.cache_ttl_secs == Some(0) {
            return Err(TranscacheError::Config(
                "cache_ttl_secs must be greater than 0 when set".to_string(),
            ));
        }

        normalize_language(&self.source_language).map_err(|e| {
            TranscacheError::Config(format!("source_language: {}", e))
        })?;

        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(TranscacheError::Config(format!(
                "endpoint must be an http(s) URL: {}",
                self.endpoint
            )));
        }

        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs.map(Duration::from_secs)
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("transcache").join("config.toml"))
    }
}
