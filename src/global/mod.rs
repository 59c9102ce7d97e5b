use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

const APP_DIR: &str = "recall-index";

pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .context("Unable to determine config directory")
}

pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = dirs::data_dir() {
        return Ok(dir.join(APP_DIR));
    }
    if let Some(home) = dirs::home_dir() {
        return Ok(home.join(".local").join("share").join(APP_DIR));
    }
    Err(anyhow!("Unable to determine data directory"))
}

/// Resolved on-disk layout for one data directory.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Uses the configured override, falling back to the platform data dir.
    pub fn resolve(data_dir_override: Option<&PathBuf>) -> Result<Self> {
        match data_dir_override {
            Some(dir) => Ok(Self::new(dir.clone())),
            None => Ok(Self::new(data_dir()?)),
        }
    }

    pub fn index_db(&self) -> PathBuf {
        self.root.join("index.db")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join("staging")
    }

    pub fn lock_file(&self) -> PathBuf {
        self.root.join("index.lock")
    }

    pub fn ensure(&self) -> Result<()> {
        for dir in [self.root.clone(), self.uploads_dir(), self.staging_dir()] {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory {:?}", dir))?;
        }
        Ok(())
    }
}
