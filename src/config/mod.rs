use crate::global;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub const DAILY_API_KEY_ENV: &str = "DAILY_API_KEY";
pub const DEEPGRAM_API_KEY_ENV: &str = "DEEPGRAM_API_KEY";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub transcription: TranscriptionConfig,
    pub daily: DailyConfig,
    pub embedding: EmbeddingConfig,
    pub indexing: IndexingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Largest accepted upload, in bytes.
    pub max_upload_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Overrides the platform data directory.
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// `whisper-cpp` or `deepgram`. Unset means auto-detect.
    pub provider: Option<String>,
    pub model: Option<String>,
    pub model_path: Option<String>,
    pub command_path: Option<String>,
    pub language: Option<String>,
    pub api_endpoint: Option<String>,
    pub api_key: Option<String>,
    /// Per-request timeout for the remote backend; 0 disables it.
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub room_name: Option<String>,
    pub max_recordings: usize,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `hashing` or `openai`.
    pub provider: String,
    pub model: Option<String>,
    pub dims: usize,
    pub api_key: Option<String>,
    pub max_retries: u32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Recordings processed in parallel within one job.
    pub concurrency: usize,
    /// Upper bound for fetching or transcribing a single recording.
    pub recording_timeout_seconds: u64,
    pub chunk_max_words: usize,
    pub query_top_k: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 5000,
            max_upload_bytes: 600 * 1_000_000,
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            model_path: None,
            command_path: None,
            language: Some("en".to_string()),
            api_endpoint: None,
            api_key: None,
            timeout_seconds: 1800,
        }
    }
}

impl Default for DailyConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: "https://api.daily.co/v1".to_string(),
            room_name: None,
            max_recordings: 10,
            request_timeout_seconds: 5,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "hashing".to_string(),
            model: None,
            dims: 384,
            api_key: None,
            max_retries: 5,
            timeout_seconds: 30,
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            recording_timeout_seconds: 1800,
            chunk_max_words: 200,
            query_top_k: 4,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save_to(&config_path)?;
            return config.finish();
        }
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", path);
        config.finish()
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }

    fn finish(mut self) -> Result<Self> {
        self.apply_env_overrides();
        self.validate()?;
        Ok(self)
    }

    /// Credentials from the environment win over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Some(key) = non_empty_env(DAILY_API_KEY_ENV) {
            self.daily.api_key = Some(key);
        }
        if let Some(key) = non_empty_env(DEEPGRAM_API_KEY_ENV) {
            self.transcription.api_key = Some(key);
        }
        if let Some(key) = non_empty_env(OPENAI_API_KEY_ENV) {
            self.embedding.api_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.indexing.concurrency == 0 {
            bail!("indexing.concurrency must be > 0");
        }
        if self.indexing.chunk_max_words == 0 {
            bail!("indexing.chunk_max_words must be > 0");
        }
        if self.indexing.query_top_k == 0 {
            bail!("indexing.query_top_k must be > 0");
        }
        if self.daily.max_recordings == 0 {
            bail!("daily.max_recordings must be > 0");
        }
        if self.embedding.dims == 0 {
            bail!("embedding.dims must be > 0");
        }
        match self.embedding.provider.as_str() {
            "hashing" | "openai" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be hashing or openai.",
                other
            ),
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.indexing.concurrency, 5);
        assert_eq!(config.daily.api_url, "https://api.daily.co/v1");
        assert_eq!(config.bind_address(), "127.0.0.1:5000");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[indexing]\nconcurrency = 2\n\n[daily]\nroom_name = \"all-hands\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.indexing.concurrency, 2);
        assert_eq!(config.indexing.query_top_k, 4);
        assert_eq!(config.daily.room_name.as_deref(), Some("all-hands"));
        assert_eq!(config.daily.max_recordings, 10);
    }

    #[test]
    fn test_rejects_unknown_embedding_provider() {
        let mut config = Config::default();
        config.embedding.provider = "magic".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.indexing.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.server.port = 8080;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.server.port, 8080);
    }
}
